//! Pixel and variance buffers.
//!
//! Buffers are plain `ndarray` arrays in `(height, width, channels)` order,
//! the same layout numpy hands over through the Python bindings:
//! - **Grayscale**: (height, width, 1)
//! - **RGB**: (height, width, 3)
//! - any other channel count is processed the same way, channel by channel
//!
//! Values are linear radiance (color) or per-sample variance, both `f32`.

use ndarray::{Array3, ArrayView3};

use crate::error::{DenoiseError, Result};

/// Linear-radiance image, `(height, width, channels)`.
pub type PixelBuffer = Array3<f32>;

/// Per-sample variance estimate, same shape as the [`PixelBuffer`] it describes.
pub type VarianceBuffer = Array3<f32>;

/// Dimensions of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn of(view: &ArrayView3<f32>) -> Self {
        let (height, width, channels) = view.dim();
        ImageShape { height, width, channels }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check that color and variance describe the same non-empty image.
pub fn validate_shapes(data: ArrayView3<f32>, variance: ArrayView3<f32>) -> Result<ImageShape> {
    let shape = ImageShape::of(&data);
    let var_shape = ImageShape::of(&variance);

    if shape != var_shape {
        return Err(DenoiseError::ShapeMismatch {
            data: shape.dim(),
            variance: var_shape.dim(),
        });
    }
    if shape.is_empty() {
        return Err(DenoiseError::EmptyImage);
    }

    Ok(shape)
}

/// Fail on the first negative (or NaN) variance sample.
///
/// Negative variance would flip the sign of the distance denominator, so it
/// is rejected instead of clamped.
pub fn validate_variance(variance: ArrayView3<f32>) -> Result<()> {
    for ((y, x, channel), &value) in variance.indexed_iter() {
        if value < 0.0 || value.is_nan() {
            return Err(DenoiseError::NegativeVariance { y, x, channel, value });
        }
    }
    Ok(())
}

/// Fail on the first NaN or infinite color sample.
///
/// A single non-finite sample turns every patch distance it touches into NaN,
/// and NaN cannot be ordered against the weight clamp.
pub fn validate_color(data: ArrayView3<f32>) -> Result<()> {
    for ((y, x, channel), &value) in data.indexed_iter() {
        if !value.is_finite() {
            return Err(DenoiseError::NonFiniteColor { y, x, channel, value });
        }
    }
    Ok(())
}
