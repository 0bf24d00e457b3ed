//! Filter modules for render denoising.
//!
//! ## Supported Formats
//!
//! Filters take `f32` buffers shaped `(height, width, channels)`:
//!
//! | Buffer | Shape | Type | Description |
//! |--------|-------|------|-------------|
//! | Color | (H, W, C) | f32 | Linear radiance, unbounded above |
//! | Variance | (H, W, C) | f32 | Per-sample variance, >= 0 |
//! | Display | (H, W, C) | u8 | sRGB-encoded, 0-255 |
//!
//! Any channel count works; channels never mix.
//!
//! ## Pipeline
//!
//! - **nlm**: variance-aware non-local means (color + variance -> color)
//! - **transfer**: linear -> sRGB curve and 8-bit quantization
//!
//! Supporting pieces:
//! - **buffer**: buffer aliases and input validation
//! - **boundary**: wrap / replicate boundary policies and the toroidal shift
//! - **box_filter**: separable window mean

pub mod boundary;
pub mod box_filter;
pub mod buffer;
pub mod nlm;
pub mod transfer;
