//! Linear → display transfer.
//!
//! Encodes linear radiance with the sRGB curve and quantizes to 8 bits:
//! - `v <= 0.0031308`: `12.92 * v`
//! - otherwise: `1.055 * v^(1/2.4) - 0.055`
//!
//! Clamping to `[0, 1]` happens only after the curve. Denoised values may
//! overshoot 1 slightly; they go through the curve unchanged and saturate at
//! quantization.

use ndarray::{Array3, ArrayView3, ArrayViewMut3};

/// Boundary between the linear segment and the power segment.
pub const SRGB_THRESHOLD: f32 = 0.0031308;

const LINEAR_SCALE: f32 = 12.92;
const GAMMA: f32 = 2.4;
const A: f32 = 0.055;

/// Apply the sRGB transfer curve to one linear value.
#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= SRGB_THRESHOLD {
        LINEAR_SCALE * v
    } else {
        (1.0 + A) * v.powf(1.0 / GAMMA) - A
    }
}

/// Apply [`linear_to_srgb`] to every sample, in place.
pub fn linear_to_srgb_in_place(mut buffer: ArrayViewMut3<f32>) {
    buffer.mapv_inplace(linear_to_srgb);
}

/// Clamp to `[0, 1]`, scale to `[0, 255]` and round to nearest.
#[inline]
pub fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Quantize an already display-encoded buffer to 8 bits.
pub fn quantize_u8(input: ArrayView3<f32>) -> Array3<u8> {
    input.mapv(quantize)
}

/// Full display conversion: transfer curve, then clamp and quantize.
pub fn to_display_u8(input: ArrayView3<f32>) -> Array3<u8> {
    input.mapv(|v| quantize(linear_to_srgb(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_branches_agree_at_threshold() {
        let linear = LINEAR_SCALE * SRGB_THRESHOLD;
        let power = (1.0 + A) * SRGB_THRESHOLD.powf(1.0 / GAMMA) - A;

        assert_abs_diff_eq!(linear, power, epsilon = 1e-6);
        assert_abs_diff_eq!(linear_to_srgb(SRGB_THRESHOLD), power, epsilon = 1e-6);
    }

    #[test]
    fn test_threshold_takes_linear_branch() {
        assert_eq!(linear_to_srgb(SRGB_THRESHOLD), LINEAR_SCALE * SRGB_THRESHOLD);
    }

    #[test]
    fn test_continuous_across_threshold() {
        let below = linear_to_srgb(SRGB_THRESHOLD);
        let above = linear_to_srgb(f32::from_bits(SRGB_THRESHOLD.to_bits() + 1));

        assert_abs_diff_eq!(above, below, epsilon = 1e-6);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert_abs_diff_eq!(linear_to_srgb(1.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(linear_to_srgb(0.18), 0.4613, epsilon = 1e-3);
        assert_abs_diff_eq!(linear_to_srgb(0.001), 0.01292, epsilon = 1e-6);
    }

    #[test]
    fn test_monotonic() {
        let mut prev = linear_to_srgb(0.0);
        for i in 1..=1000 {
            let v = linear_to_srgb(i as f32 / 1000.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_quantize_rounds_and_clamps() {
        assert_eq!(quantize(-0.5), 0);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.5), 128); // 127.5 rounds away from zero
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(3.0), 255);
        assert_eq!(quantize(1.0 / 255.0 * 0.49), 0);
        assert_eq!(quantize(1.0 / 255.0 * 0.51), 1);
    }

    #[test]
    fn test_display_range_with_overshoot() {
        for i in 0..=10_000 {
            let v = i as f32 / 1000.0; // 0..10
            let q = quantize(linear_to_srgb(v));
            // u8 guarantees the range; check the curve saturates instead of wrapping
            if v >= 1.0 {
                assert_eq!(q, 255, "v = {v}");
            }
        }
    }

    #[test]
    fn test_clamp_happens_after_curve() {
        // Negative input stays on the linear branch and clamps to 0 afterwards
        assert_eq!(quantize(linear_to_srgb(-0.2)), 0);
        // Overshoot goes through the power branch before saturating
        assert!(linear_to_srgb(1.2) > 1.0);
        assert_eq!(quantize(linear_to_srgb(1.2)), 255);
    }

    #[test]
    fn test_in_place_matches_scalar() {
        let mut img = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 9 + x * 3 + c) as f32 * 0.05);
        let expected = img.mapv(linear_to_srgb);

        linear_to_srgb_in_place(img.view_mut());

        assert_eq!(img, expected);
    }

    #[test]
    fn test_to_display_u8_shape_and_values() {
        let mut img = Array3::<f32>::zeros((2, 2, 3));
        img[[0, 0, 0]] = 1.0;
        img[[1, 1, 2]] = 5.0;

        let out = to_display_u8(img.view());

        assert_eq!(out.dim(), (2, 2, 3));
        assert_eq!(out[[0, 0, 0]], 255);
        assert_eq!(out[[0, 0, 1]], 0);
        assert_eq!(out[[1, 1, 2]], 255);
    }

    #[test]
    fn test_quantize_u8_matches_to_display_after_transfer() {
        let img = Array3::from_shape_fn((3, 3, 1), |(y, x, _)| (y * 3 + x) as f32 * 0.1);
        let mut encoded = img.clone();
        linear_to_srgb_in_place(encoded.view_mut());

        assert_eq!(quantize_u8(encoded.view()), to_display_u8(img.view()));
    }
}
