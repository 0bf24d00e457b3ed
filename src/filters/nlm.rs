//! Variance-aware non-local means.
//!
//! Denoises a Monte-Carlo render using the renderer's own per-pixel variance
//! estimate. For every search offset `(dx, dy)` in `[-r, r]²` the whole image
//! is compared against a toroidally shifted copy of itself:
//!
//! 1. per-sample distance
//!    `d2 = ((u_p - u_q)² - (var_p + min(var_q, var_p))) / (ε + k² (var_p + var_q))`
//! 2. patch distance: box mean of `d2` over `(2f+1)²`, edge-replicated
//! 3. weight `exp(-max(0, d2patch))`, smoothed by a `(2f-1)²` box mean
//! 4. `flt += wgt * ngb`, `wgtsum += wgt`
//!
//! The result is `flt / wgtsum`. Offsets are independent, so they are spread
//! over the rayon pool; each worker folds into a private [`WeightAccumulator`]
//! and the partial sums are added at the end.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use ndarray::{Array3, ArrayView3, Zip};
use rayon::prelude::*;

use super::boundary::{shift, Boundary};
use super::box_filter::box_filter;
use super::buffer::{validate_color, validate_shapes, validate_variance, ImageShape, PixelBuffer};
use crate::error::{DenoiseError, Result};

/// Guards the distance denominator when both samples have zero variance.
pub const EPSILON: f64 = 1e-10;

/// Default search radius (41×41 window).
pub const DEFAULT_RADIUS: usize = 20;

/// Default patch radius (19×19 comparison patch).
pub const DEFAULT_PATCH_RADIUS: usize = 9;

/// Default damping constant.
pub const DEFAULT_K: f32 = 0.45;

/// Patch distance above which `exp(-d)` is 0 in `f32` (it underflows near 104).
pub const WEIGHT_CUTOFF: f64 = 128.0;

// ============================================================================
// Parameters
// ============================================================================

/// Filter configuration, fixed for one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParameters {
    /// Search window half-extent `r`. Must be > 0.
    pub radius: usize,
    /// Comparison patch half-extent `f`. `0` means single-pixel patches.
    pub patch_radius: usize,
    /// Damping constant `k`. Must be finite and > 0.
    pub k: f32,
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            patch_radius: DEFAULT_PATCH_RADIUS,
            k: DEFAULT_K,
        }
    }
}

impl FilterParameters {
    pub fn new(radius: usize, patch_radius: usize, k: f32) -> Result<Self> {
        let params = Self { radius, patch_radius, k };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            return Err(DenoiseError::InvalidParameter {
                name: "r",
                value: self.radius as f64,
            });
        }
        if !(self.k > 0.0) || !self.k.is_finite() {
            return Err(DenoiseError::InvalidParameter {
                name: "k",
                value: self.k as f64,
            });
        }
        Ok(())
    }

    /// Side of the patch used to aggregate distances, `2f + 1`.
    pub fn patch_window(&self) -> usize {
        2 * self.patch_radius + 1
    }

    /// Side of the box used to smooth weights, `2f - 1` (at least 1).
    pub fn smoothing_window(&self) -> usize {
        (2 * self.patch_radius).saturating_sub(1).max(1)
    }

    /// Every search offset, `(2r + 1)²` of them, `(0, 0)` included.
    pub fn offsets(&self) -> impl Iterator<Item = (isize, isize)> {
        let r = self.radius as isize;
        (-r..=r).flat_map(move |dx| (-r..=r).map(move |dy| (dx, dy)))
    }

    pub fn offset_count(&self) -> usize {
        let side = 2 * self.radius + 1;
        side * side
    }

    /// Largest per-sample distance that can still change a weight.
    ///
    /// `d2` never drops below `-1/k²`, so a patch holding one sample at this
    /// distance has a mean above [`WEIGHT_CUTOFF`] whatever the other samples
    /// are, and its weight is already 0. Distances are capped here before the
    /// box filter sums them.
    pub fn distance_cap(&self) -> f64 {
        let window = self.patch_window() as f64;
        let k = self.k as f64;
        let cap = window * window * (WEIGHT_CUTOFF + 1.0 / (k * k));
        cap.min(f32::MAX as f64)
    }
}

// ============================================================================
// Weighting
// ============================================================================

/// Variance-corrected squared difference between two samples.
///
/// The bias term subtracts `var_p + min(var_q, var_p)`; the result can be
/// negative and is clamped later by [`patch_weight`].
#[inline]
pub fn d2(up: f32, uq: f32, var_p: f32, var_q: f32, k: f32) -> f64 {
    let (up, uq, var_p, var_q, k) = (up as f64, uq as f64, var_p as f64, var_q as f64, k as f64);
    let diff = up - uq;
    (diff * diff - (var_p + var_q.min(var_p))) / (EPSILON + k * k * (var_p + var_q))
}

/// Weight for a patch distance: `exp(-max(0, d2patch))`, always in `[0, 1]`.
#[inline]
pub fn patch_weight(d2patch: f32) -> f32 {
    (-d2patch.max(0.0)).exp()
}

/// Per-sample distances between `data` and its shifted copy `ngb`.
///
/// Clamped to `±`[`FilterParameters::distance_cap`]: a converged emitter next
/// to black gives distances around `1e16`, which would swamp every other term
/// of the patch sums without changing a single weight.
pub fn pixel_distances(
    data: ArrayView3<f32>,
    variance: ArrayView3<f32>,
    ngb: ArrayView3<f32>,
    ngb_variance: ArrayView3<f32>,
    params: &FilterParameters,
) -> Array3<f32> {
    let cap = params.distance_cap();
    let k = params.k;
    Zip::from(&data)
        .and(&ngb)
        .and(&variance)
        .and(&ngb_variance)
        .map_collect(|&up, &uq, &vp, &vq| d2(up, uq, vp, vq, k).clamp(-cap, cap) as f32)
}

/// Smoothed patch weights for one search offset.
pub fn patch_weights(
    data: ArrayView3<f32>,
    variance: ArrayView3<f32>,
    ngb: ArrayView3<f32>,
    ngb_variance: ArrayView3<f32>,
    params: &FilterParameters,
) -> Array3<f32> {
    let d2pixel = pixel_distances(data, variance, ngb, ngb_variance, params);
    let d2patch = box_filter(d2pixel.view(), params.patch_window(), Boundary::Replicate);
    let wgt = d2patch.mapv_into(patch_weight);
    box_filter(wgt.view(), params.smoothing_window(), Boundary::Replicate)
}

// ============================================================================
// Accumulation
// ============================================================================

/// Running weighted sums for one set of offsets.
///
/// Kept in `f64`: a full sweep adds up to `(2r+1)²` terms per sample.
#[derive(Debug, Clone)]
pub struct WeightAccumulator {
    flt: Array3<f64>,
    wgtsum: Array3<f64>,
}

impl WeightAccumulator {
    pub fn new(shape: ImageShape) -> Self {
        Self {
            flt: Array3::zeros(shape.dim()),
            wgtsum: Array3::zeros(shape.dim()),
        }
    }

    /// Add one offset's contribution: `flt += wgt * ngb`, `wgtsum += wgt`.
    pub fn accumulate(&mut self, wgt: ArrayView3<f32>, ngb: ArrayView3<f32>) {
        Zip::from(&mut self.flt)
            .and(&mut self.wgtsum)
            .and(&wgt)
            .and(&ngb)
            .for_each(|flt, wgtsum, &w, &v| {
                *flt += w as f64 * v as f64;
                *wgtsum += w as f64;
            });
    }

    /// Combine two partial accumulators.
    pub fn merge(mut self, other: Self) -> Self {
        self.flt += &other.flt;
        self.wgtsum += &other.wgtsum;
        self
    }

    pub fn weight_sum(&self) -> &Array3<f64> {
        &self.wgtsum
    }

    /// Normalize into the output buffer.
    ///
    /// Also returns how many samples ended with a zero weight sum. That only
    /// happens if every weight underflowed (or the input held NaN); those
    /// samples come out as NaN rather than being patched over.
    pub fn finish(self) -> (PixelBuffer, usize) {
        let mut underflow = 0usize;
        let output = Zip::from(&self.flt)
            .and(&self.wgtsum)
            .map_collect(|&flt, &wgtsum| {
                if !(wgtsum > 0.0) {
                    underflow += 1;
                }
                (flt / wgtsum) as f32
            });
        (output, underflow)
    }
}

// ============================================================================
// Denoise
// ============================================================================

/// Denoise `data` using its per-sample `variance`.
///
/// Returns a new buffer of the same shape; the inputs are only read.
///
/// # Errors
/// * `InvalidParameter` - `r == 0` or `k` not strictly positive
/// * `ShapeMismatch` - color and variance shapes differ
/// * `EmptyImage` - zero-sized input
/// * `NegativeVariance` - a variance sample is negative or NaN
/// * `NonFiniteColor` - a color sample is NaN or infinite
pub fn denoise(
    data: ArrayView3<f32>,
    variance: ArrayView3<f32>,
    params: &FilterParameters,
) -> Result<PixelBuffer> {
    let progress = AtomicUsize::new(0);
    denoise_with_progress(data, variance, params, &progress)
}

/// Same as [`denoise`], bumping `progress` once per finished search offset.
///
/// The counter reaches [`FilterParameters::offset_count`] when the sweep is
/// done. It is advisory only; offsets finish in no particular order.
pub fn denoise_with_progress(
    data: ArrayView3<f32>,
    variance: ArrayView3<f32>,
    params: &FilterParameters,
    progress: &AtomicUsize,
) -> Result<PixelBuffer> {
    params.validate()?;
    let shape = validate_shapes(data, variance)?;
    validate_color(data)?;
    validate_variance(variance)?;

    let total = params.offset_count();
    let row = 2 * params.radius + 1;
    info!(
        "Denoising image of size {:?}: r={}, f={}, k={} ({} offsets)",
        shape.dim(),
        params.radius,
        params.patch_radius,
        params.k,
        total
    );

    let offsets: Vec<(isize, isize)> = params.offsets().collect();
    let accumulator = offsets
        .into_par_iter()
        .fold(
            || WeightAccumulator::new(shape),
            |mut acc, (dx, dy)| {
                let ngb = shift(data, dx, dy);
                let ngb_variance = shift(variance, dx, dy);
                let wgt = patch_weights(data, variance, ngb.view(), ngb_variance.view(), params);
                acc.accumulate(wgt.view(), ngb.view());

                let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                if done % row == 0 {
                    debug!("{done}/{total} offsets");
                }
                acc
            },
        )
        .reduce(|| WeightAccumulator::new(shape), WeightAccumulator::merge);

    let (output, underflow) = accumulator.finish();
    if underflow > 0 {
        warn!("{underflow} samples have a zero weight sum; their output is NaN");
    }

    Ok(output)
}
