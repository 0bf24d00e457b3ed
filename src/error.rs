//! Error type shared by the filter, the transfer stage and the I/O boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a denoising invocation.
///
/// All variants are fatal: the filter is a deterministic batch transform, so
/// there is nothing to retry.
#[derive(Debug, Error)]
pub enum DenoiseError {
    #[error("invalid parameter {name} = {value} (must be > 0)")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("shape mismatch: color is {data:?} but variance is {variance:?} (height, width, channels)")]
    ShapeMismatch {
        data: (usize, usize, usize),
        variance: (usize, usize, usize),
    },

    #[error("image has no pixels (height, width and channels must all be non-zero)")]
    EmptyImage,

    #[error("variance at (y={y}, x={x}, c={channel}) is {value}; variance must be non-negative")]
    NegativeVariance {
        y: usize,
        x: usize,
        channel: usize,
        value: f32,
    },

    #[error("color at (y={y}, x={x}, c={channel}) is {value}; color samples must be finite")]
    NonFiniteColor {
        y: usize,
        x: usize,
        channel: usize,
        value: f32,
    },

    #[error("image of {width}x{height} is too large to encode")]
    TooLarge { width: usize, height: usize },

    #[error("could not read input {path}")]
    MissingInput {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write a {channels}-channel image (expected 1, 3 or 4)")]
    UnsupportedChannels { channels: usize },

    #[error("could not write output {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DenoiseError>;
