//! Normalized box filter (window mean) with a selectable boundary policy.
//!
//! Implemented as two separable passes with running sums, so the cost per
//! pixel does not depend on the window size. The sliding sums are `f64` with
//! Neumaier compensation: a large sample entering the window would otherwise
//! absorb the low bits of every small one, and leave the sum wrong after it
//! slides out again.

use ndarray::{Array3, ArrayView3};

use super::boundary::Boundary;

/// Compensated (Neumaier) running sum.
#[derive(Debug, Clone, Copy, Default)]
struct RunningSum {
    sum: f64,
    compensation: f64,
}

impl RunningSum {
    #[inline]
    fn add(&mut self, v: f64) {
        let t = self.sum + v;
        if self.sum.abs() >= v.abs() {
            self.compensation += (self.sum - t) + v;
        } else {
            self.compensation += (v - t) + self.sum;
        }
        self.sum = t;
    }

    /// Slide the window: one sample in, one out.
    #[inline]
    fn slide(&mut self, entering: f64, leaving: f64) {
        self.add(entering);
        self.add(-leaving);
    }

    #[inline]
    fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Replace each sample with the mean of the `window × window` square around it.
///
/// Channels are filtered independently. Out-of-range samples are fetched
/// through `boundary`. Odd windows are centered; for an even window the
/// extra sample is on the low side (top/left). A window of 0 or 1 returns a
/// copy of the input.
pub fn box_filter(input: ArrayView3<f32>, window: usize, boundary: Boundary) -> Array3<f32> {
    let (height, width, channels) = input.dim();
    if window <= 1 || input.is_empty() {
        return input.to_owned();
    }

    let lo = (window / 2) as isize;
    let hi = (window - 1) as isize - lo;
    let area = (window * window) as f64;

    // Horizontal pass (unnormalized sums)
    let mut temp = Array3::<f64>::zeros((height, width, channels));
    for y in 0..height {
        for c in 0..channels {
            let mut sum = RunningSum::default();
            for k in -lo..=hi {
                sum.add(input[[y, boundary.resolve(k, width), c]] as f64);
            }

            for x in 0..width {
                temp[[y, x, c]] = sum.value();

                let leaving = boundary.resolve(x as isize - lo, width);
                let entering = boundary.resolve(x as isize + hi + 1, width);
                sum.slide(input[[y, entering, c]] as f64, input[[y, leaving, c]] as f64);
            }
        }
    }

    // Vertical pass
    let mut output = Array3::<f32>::zeros((height, width, channels));
    for x in 0..width {
        for c in 0..channels {
            let mut sum = RunningSum::default();
            for k in -lo..=hi {
                sum.add(temp[[boundary.resolve(k, height), x, c]]);
            }

            for y in 0..height {
                output[[y, x, c]] = (sum.value() / area) as f32;

                let leaving = boundary.resolve(y as isize - lo, height);
                let entering = boundary.resolve(y as isize + hi + 1, height);
                sum.slide(temp[[entering, x, c]], temp[[leaving, x, c]]);
            }
        }
    }

    output
}
