//! Display normalization.
//!
//! Rescales a raw [`Matrix`] into `[0, 1]` using its finite range, then
//! compresses it with `log10(x + 1)`, giving values in `[0, log10(2)]`.

use alloc::vec::Vec;

use log::debug;

use crate::error::PreviewError;
use crate::image::Matrix;
use crate::palette::{select_palette, Palette};

/// NaN fraction above which a matrix is rejected.
pub const MAX_INVALID_FRACTION: f64 = 0.8;

/// Added to the value range so flat images do not divide by zero.
pub const EPSILON: f64 = 1e-5;

/// Log-scaled samples ready for colorizing, same shape as the source matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMatrix {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl DisplayMatrix {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major samples, row 0 first. NaN marks pixels without data.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Minimum and maximum over non-NaN samples.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.values)
    }

    #[cfg(feature = "array")]
    pub fn to_array2(&self) -> ndarray::Array2<f64> {
        ndarray::Array2::from_shape_fn((self.height, self.width), |(y, x)| {
            self.values[y * self.width + x]
        })
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
        })
}

/// Normalize `matrix` and pick a palette from `filename`.
pub fn normalize(
    matrix: Option<&Matrix>,
    filename: &str,
) -> Result<(DisplayMatrix, Palette), PreviewError> {
    let matrix = matrix.ok_or(PreviewError::EmptyData)?;
    let display = normalize_samples(matrix, MAX_INVALID_FRACTION)?;
    let (_, palette) = select_palette(filename);
    Ok((display, palette))
}

/// Rescale `matrix` for display.
///
/// Fails with `EmptyData` for an empty matrix or one without finite
/// samples, and with `TooManyInvalidSamples` when the NaN fraction exceeds
/// `max_invalid_fraction`. Non-finite inputs come out as NaN.
pub fn normalize_samples(
    matrix: &Matrix,
    max_invalid_fraction: f64,
) -> Result<DisplayMatrix, PreviewError> {
    let values = matrix.values();
    if values.is_empty() {
        return Err(PreviewError::EmptyData);
    }

    let invalid = values.iter().filter(|v| v.is_nan()).count();
    let fraction = invalid as f64 / values.len() as f64;
    if fraction > max_invalid_fraction {
        debug!("rejecting matrix: {invalid} of {} samples are NaN", values.len());
        return Err(PreviewError::TooManyInvalidSamples {
            fraction,
            limit: max_invalid_fraction,
        });
    }

    let (lo, hi) = finite_range(values).ok_or(PreviewError::EmptyData)?;
    // Halve everything when the span itself overflows.
    let scale = if (hi - lo).is_finite() { 1.0 } else { 0.5 };
    let (lo_s, span) = (lo * scale, hi * scale - lo * scale + EPSILON * scale);
    debug!(
        "normalizing {}x{} matrix: range [{lo}, {hi}], {invalid} NaN",
        matrix.width(),
        matrix.height()
    );

    let values = values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                libm::log10((v * scale - lo_s) / span + 1.0)
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(DisplayMatrix {
        width: matrix.width(),
        height: matrix.height(),
        values,
    })
}
