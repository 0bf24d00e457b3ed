//! WebAssembly exports.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images are
//! passed as flat row-major slices of length `width * height * channels`.

use ndarray::ArrayView3;
use wasm_bindgen::prelude::*;

use crate::error::DenoiseError;
use crate::filters::nlm::{self, FilterParameters};
use crate::filters::transfer;

fn view<'a>(data: &'a [f32], width: usize, height: usize, channels: usize) -> Result<ArrayView3<'a, f32>, JsValue> {
    ArrayView3::from_shape((height, width, channels), data)
        .map_err(|e| JsValue::from_str(&format!("invalid dimensions: {e}")))
}

fn to_js(err: DenoiseError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Denoise a linear float image using its per-pixel variance.
///
/// # Arguments
/// * `data` - Linear color, flat (length = width * height * channels)
/// * `variance` - Variance estimate, same layout as `data`
/// * `width` / `height` / `channels` - Image dimensions
/// * `r` / `f` / `k` - Search radius, patch radius, damping constant
///
/// # Returns
/// Flat array of denoised linear floats
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn denoise_wasm(
    data: &[f32],
    variance: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    r: usize,
    f: usize,
    k: f32,
) -> Result<Vec<f32>, JsValue> {
    let color = view(data, width, height, channels)?;
    let var = view(variance, width, height, channels)?;
    let params = FilterParameters::new(r, f, k).map_err(to_js)?;

    let result = nlm::denoise(color, var, &params).map_err(to_js)?;
    Ok(result.into_raw_vec_and_offset().0)
}

/// Linear float image to sRGB bytes (curve, clamp, round).
#[wasm_bindgen]
pub fn to_srgb_u8_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<Vec<u8>, JsValue> {
    let input = view(data, width, height, channels)?;
    let result = transfer::to_display_u8(input);
    Ok(result.into_raw_vec_and_offset().0)
}
