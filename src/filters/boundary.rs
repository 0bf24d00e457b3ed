//! Boundary handling.
//!
//! Two policies are used by the filter and must never be mixed up:
//! - [`Boundary::Wrap`]: toroidal addressing, used to build the shifted
//!   neighbour image for a search offset.
//! - [`Boundary::Replicate`]: edge replication, used by the patch box
//!   filters (`aaa|abcd|ddd`).

use ndarray::{Array3, ArrayView3, Axis};

/// How an out-of-range coordinate is mapped back into `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Wrap around to the opposite edge.
    Wrap,
    /// Clamp to the nearest edge sample.
    Replicate,
}

impl Boundary {
    /// Resolve a possibly out-of-range index. `len` must be non-zero.
    #[inline]
    pub fn resolve(self, index: isize, len: usize) -> usize {
        debug_assert!(len > 0);
        match self {
            Boundary::Wrap => index.rem_euclid(len as isize) as usize,
            Boundary::Replicate => index.clamp(0, len as isize - 1) as usize,
        }
    }
}

/// Toroidally shift an image by `(dx, dy)`.
///
/// `out[y, x] = input[(y - dy) mod h, (x - dx) mod w]`, i.e. content moves
/// right by `dx` and down by `dy`, wrapping at the edges.
pub fn shift(input: ArrayView3<f32>, dx: isize, dy: isize) -> Array3<f32> {
    let (height, width, _) = input.dim();
    let mut output = Array3::<f32>::zeros(input.raw_dim());

    for (y, mut out_row) in output.axis_iter_mut(Axis(0)).enumerate() {
        let sy = Boundary::Wrap.resolve(y as isize - dy, height);
        let src_row = input.index_axis(Axis(0), sy);
        for (x, mut out_px) in out_row.axis_iter_mut(Axis(0)).enumerate() {
            let sx = Boundary::Wrap.resolve(x as isize - dx, width);
            out_px.assign(&src_row.index_axis(Axis(0), sx));
        }
    }

    output
}
