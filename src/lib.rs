//! NLM Denoise
//!
//! Variance-aware non-local means denoising for Monte-Carlo renders, with
//! Python bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Image Format
//! Buffers are `(height, width, channels)` arrays of `f32`:
//! - **Color**: linear radiance as written by the renderer
//! - **Variance**: the renderer's per-sample variance estimate, same shape
//!
//! The denoised buffer is still linear; [`to_display_u8`] applies the sRGB
//! curve and quantizes to 8 bits for writing.
//!
//! ## Example
//! ```
//! use ndarray::Array3;
//! use nlm_denoise::{denoise, to_display_u8, FilterParameters};
//!
//! let color = Array3::<f32>::from_elem((4, 4, 3), 0.5);
//! let variance = Array3::<f32>::zeros((4, 4, 3));
//! let params = FilterParameters::new(2, 1, 0.45).unwrap();
//!
//! let denoised = denoise(color.view(), variance.view(), &params).unwrap();
//! let display = to_display_u8(denoised.view());
//! assert_eq!(display.dim(), (4, 4, 3));
//! ```

pub mod error;
pub mod filters;
pub mod io;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{DenoiseError, Result};
pub use filters::buffer::{ImageShape, PixelBuffer, VarianceBuffer};
pub use filters::nlm::{denoise, denoise_with_progress, FilterParameters, WeightAccumulator};
pub use filters::transfer::{linear_to_srgb, linear_to_srgb_in_place, quantize_u8, to_display_u8};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::error::DenoiseError;
    use crate::filters::nlm::{self, FilterParameters};
    use crate::filters::transfer;

    fn to_py_err(err: DenoiseError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    /// Denoise a linear float image using its per-pixel variance.
    ///
    /// # Arguments
    /// * `image` - Linear color (height, width, channels) as float32
    /// * `variance` - Variance estimate, same shape as `image`
    /// * `r` - Search window radius
    /// * `f` - Patch radius
    /// * `k` - Damping constant
    ///
    /// Raises `ValueError` on invalid parameters, mismatched shapes or
    /// negative variance.
    #[pyfunction]
    #[pyo3(signature = (image, variance, r=nlm::DEFAULT_RADIUS, f=nlm::DEFAULT_PATCH_RADIUS, k=nlm::DEFAULT_K))]
    pub fn denoise<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        variance: PyReadonlyArray3<'py, f32>,
        r: usize,
        f: usize,
        k: f32,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let params = FilterParameters::new(r, f, k).map_err(to_py_err)?;
        let result = nlm::denoise(image.as_array(), variance.as_array(), &params).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    /// Apply the sRGB transfer curve (no clamping).
    #[pyfunction]
    pub fn linear_to_srgb<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
    ) -> Bound<'py, PyArray3<f32>> {
        let result = image.as_array().mapv(transfer::linear_to_srgb);
        result.into_pyarray(py)
    }

    /// Linear float image to sRGB uint8 (curve, clamp, round).
    #[pyfunction]
    pub fn to_srgb_u8<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
    ) -> Bound<'py, PyArray3<u8>> {
        let result = transfer::to_display_u8(image.as_array());
        result.into_pyarray(py)
    }

    /// NLM denoise extension module
    #[pymodule]
    pub fn nlm_denoise(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(denoise, m)?)?;
        m.add_function(wrap_pyfunction!(linear_to_srgb, m)?)?;
        m.add_function(wrap_pyfunction!(to_srgb_u8, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::nlm_denoise;
