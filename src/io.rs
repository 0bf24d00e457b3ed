//! File boundary: path naming, loading float buffers, writing results.
//!
//! Inputs come in pairs named after a common base:
//! `<name>.<ext>` (color) and `<name>_variance.<ext>` (variance). The result
//! is written to `<name>_denoised.png`. Decoding goes through the `image`
//! crate, so OpenEXR and the usual LDR formats are accepted.
//!
//! Writes are all-or-nothing: the encoder targets a hidden sibling file that
//! is renamed over the destination only once encoding succeeded. A job with
//! several outputs encodes all of them before the first rename.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, Rgb32FImage, RgbImage, Rgba, Rgba32FImage, RgbaImage};
use log::debug;
use ndarray::{Array3, ArrayView3};

use crate::error::{DenoiseError, Result};
use crate::filters::buffer::PixelBuffer;
use crate::filters::transfer::to_display_u8;

/// Default container extension for the color and variance inputs.
pub const DEFAULT_INPUT_EXT: &str = "exr";

/// The files that make up one denoising job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub color: PathBuf,
    pub variance: PathBuf,
    pub output: PathBuf,
}

impl JobPaths {
    /// Derive the job files from any path sharing the base name.
    ///
    /// The last extension of `input` is dropped, so `render.exr`,
    /// `render.png` and `render` all name the same job.
    pub fn from_input(input: &Path, ext: &str) -> Self {
        let base = input.with_extension("");
        JobPaths {
            color: with_suffix(&base, &format!(".{ext}")),
            variance: with_suffix(&base, &format!("_variance.{ext}")),
            output: with_suffix(&base, "_denoised.png"),
        }
    }

    /// Sibling of the output holding the denoised linear buffer.
    pub fn linear_output(&self) -> PathBuf {
        self.output.with_extension("exr")
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Load an image as a linear `(height, width, 3)` float buffer.
///
/// Alpha, if present, is dropped. 8-bit inputs are scaled to `[0, 1]`
/// without any transfer-curve decoding.
pub fn load_buffer(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path)
        .map_err(|source| DenoiseError::MissingInput {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb32f();

    let (width, height) = img.dimensions();
    debug!("loaded {} ({}x{})", path.display(), width, height);

    Ok(Array3::from_shape_fn(
        (height as usize, width as usize, 3),
        |(y, x, c)| img.get_pixel(x as u32, y as u32)[c],
    ))
}

fn encoded_dimensions(height: usize, width: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(DenoiseError::TooLarge { width, height }),
    }
}

/// Wrap an 8-bit buffer with 1, 3 or 4 channels as an `image` value.
pub fn to_dynamic_u8(buffer: ArrayView3<u8>) -> Result<DynamicImage> {
    let (height, width, channels) = buffer.dim();
    let (w, h) = encoded_dimensions(height, width)?;
    let at = |x: u32, y: u32, c: usize| buffer[[y as usize, x as usize, c]];

    match channels {
        1 => Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| Luma([at(x, y, 0)])))),
        3 => Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([at(x, y, 0), at(x, y, 1), at(x, y, 2)])
        }))),
        4 => Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([at(x, y, 0), at(x, y, 1), at(x, y, 2), at(x, y, 3)])
        }))),
        channels => Err(DenoiseError::UnsupportedChannels { channels }),
    }
}

/// Wrap a float buffer with 3 or 4 channels as an `image` value.
pub fn to_dynamic_f32(buffer: ArrayView3<f32>) -> Result<DynamicImage> {
    let (height, width, channels) = buffer.dim();
    let (w, h) = encoded_dimensions(height, width)?;
    let at = |x: u32, y: u32, c: usize| buffer[[y as usize, x as usize, c]];

    match channels {
        3 => Ok(DynamicImage::ImageRgb32F(Rgb32FImage::from_fn(w, h, |x, y| {
            Rgb([at(x, y, 0), at(x, y, 1), at(x, y, 2)])
        }))),
        4 => Ok(DynamicImage::ImageRgba32F(Rgba32FImage::from_fn(w, h, |x, y| {
            Rgba([at(x, y, 0), at(x, y, 1), at(x, y, 2), at(x, y, 3)])
        }))),
        channels => Err(DenoiseError::UnsupportedChannels { channels }),
    }
}

/// An encoded file waiting next to its destination.
///
/// [`commit`](StagedFile::commit) moves it into place; dropping it
/// uncommitted removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.path).map_err(|source| DenoiseError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.committed = true;
        debug!("wrote {}", self.path.display());
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Encode an 8-bit display buffer next to `path`; the format follows the extension.
pub fn stage_display(buffer: ArrayView3<u8>, path: &Path) -> Result<StagedFile> {
    let img = to_dynamic_u8(buffer)?;
    stage(&img, path, ImageFormat::Png)
}

/// Encode a linear float buffer as OpenEXR next to `path`.
pub fn stage_linear(buffer: ArrayView3<f32>, path: &Path) -> Result<StagedFile> {
    let img = to_dynamic_f32(buffer)?;
    stage(&img, path, ImageFormat::OpenExr)
}

/// Write an 8-bit display buffer; the format follows the file extension.
pub fn save_display(buffer: ArrayView3<u8>, path: &Path) -> Result<()> {
    stage_display(buffer, path)?.commit()
}

/// Write a linear float buffer as OpenEXR.
pub fn save_linear(buffer: ArrayView3<f32>, path: &Path) -> Result<()> {
    stage_linear(buffer, path)?.commit()
}

/// Write the outputs of one job: the display image and, if asked, the linear
/// buffer. Either every file lands or none is touched (short of a failing
/// rename once encoding is done).
pub fn write_outputs(denoised: ArrayView3<f32>, paths: &JobPaths, with_linear: bool) -> Result<Vec<PathBuf>> {
    let display = to_display_u8(denoised);
    let mut staged = vec![stage_display(display.view(), &paths.output)?];
    if with_linear {
        staged.push(stage_linear(denoised, &paths.linear_output())?);
    }

    let mut written = Vec::with_capacity(staged.len());
    for file in staged {
        written.push(file.path().to_path_buf());
        file.commit()?;
    }
    Ok(written)
}

fn stage(img: &DynamicImage, path: &Path, fallback: ImageFormat) -> Result<StagedFile> {
    let format = ImageFormat::from_path(path).unwrap_or(fallback);
    let staged = StagedFile {
        tmp: temp_sibling(path),
        path: path.to_path_buf(),
        committed: false,
    };

    img.save_with_format(&staged.tmp, format).map_err(|e| DenoiseError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    Ok(staged)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}
