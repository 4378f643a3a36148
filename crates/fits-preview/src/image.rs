//! Image data decoding.
//!
//! Converts big-endian on-disk pixels of any standard BITPIX into physical
//! `f64` samples (BSCALE/BZERO applied, BLANK mapped to NaN) and exposes the
//! first 2-D plane as a [`Matrix`].

use alloc::vec::Vec;

use bytemuck::pod_collect_to_vec;

use crate::error::{Error, Result};
use crate::header::Header;

/// Element type of an image, from the BITPIX keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitpix {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Bitpix {
    pub fn from_value(bitpix: i64) -> Result<Self> {
        match bitpix {
            8 => Ok(Bitpix::U8),
            16 => Ok(Bitpix::I16),
            32 => Ok(Bitpix::I32),
            64 => Ok(Bitpix::I64),
            -32 => Ok(Bitpix::F32),
            -64 => Ok(Bitpix::F64),
            other => Err(Error::InvalidBitpix(other)),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Bitpix::U8 => 1,
            Bitpix::I16 => 2,
            Bitpix::I32 | Bitpix::F32 => 4,
            Bitpix::I64 | Bitpix::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Bitpix::F32 | Bitpix::F64)
    }
}

/// Shape and element type of an image HDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    pub bitpix: Bitpix,
    /// Axis lengths, NAXIS1 first.
    pub naxes: Vec<usize>,
}

impl ImageLayout {
    /// Total number of pixels, zero for `NAXIS = 0`. Saturates at
    /// `usize::MAX` instead of overflowing.
    pub fn pixel_count(&self) -> usize {
        if self.naxes.is_empty() {
            0
        } else {
            self.naxes.iter().fold(1usize, |acc, &n| acc.saturating_mul(n))
        }
    }

    /// `(width, height)` of the first 2-D plane.
    pub fn plane_shape(&self) -> (usize, usize) {
        let width = self.naxes.first().copied().unwrap_or(0);
        let height = match self.naxes.len() {
            0 => 0,
            1 => 1,
            _ => self.naxes[1],
        };
        (width, height)
    }
}

/// Linear calibration and undefined-pixel marker for integer images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub bscale: f64,
    pub bzero: f64,
    pub blank: Option<i64>,
}

impl Scaling {
    pub const IDENTITY: Scaling = Scaling {
        bscale: 1.0,
        bzero: 0.0,
        blank: None,
    };

    /// Read BSCALE, BZERO and BLANK, defaulting to the identity.
    pub fn from_header(header: &Header) -> Self {
        Scaling {
            bscale: header.float("BSCALE").unwrap_or(1.0),
            bzero: header.float("BZERO").unwrap_or(0.0),
            blank: header.integer("BLANK"),
        }
    }

    /// Physical value of an integer pixel.
    pub fn integer(&self, raw: i64) -> f64 {
        if self.blank == Some(raw) {
            f64::NAN
        } else {
            self.bzero + self.bscale * raw as f64
        }
    }

    /// Physical value of a floating-point pixel; NaN stays NaN.
    pub fn float(&self, raw: f64) -> f64 {
        self.bzero + self.bscale * raw
    }
}

/// Decode `raw` big-endian pixels into physical samples.
///
/// Trailing bytes that do not form a whole pixel are ignored.
pub fn decode_physical(raw: &[u8], bitpix: Bitpix, scaling: &Scaling) -> Vec<f64> {
    let usable = raw.len() - raw.len() % bitpix.bytes_per_pixel();
    let raw = &raw[..usable];
    match bitpix {
        Bitpix::U8 => raw.iter().map(|&p| scaling.integer(p as i64)).collect(),
        Bitpix::I16 => {
            let pixels: Vec<i16> = pod_collect_to_vec(raw);
            pixels
                .into_iter()
                .map(|p| scaling.integer(i16::from_be(p) as i64))
                .collect()
        }
        Bitpix::I32 => {
            let pixels: Vec<i32> = pod_collect_to_vec(raw);
            pixels
                .into_iter()
                .map(|p| scaling.integer(i32::from_be(p) as i64))
                .collect()
        }
        Bitpix::I64 => {
            let pixels: Vec<i64> = pod_collect_to_vec(raw);
            pixels
                .into_iter()
                .map(|p| scaling.integer(i64::from_be(p)))
                .collect()
        }
        Bitpix::F32 => {
            let pixels: Vec<u32> = pod_collect_to_vec(raw);
            pixels
                .into_iter()
                .map(|p| scaling.float(f32::from_bits(u32::from_be(p)) as f64))
                .collect()
        }
        Bitpix::F64 => {
            let pixels: Vec<u64> = pod_collect_to_vec(raw);
            pixels
                .into_iter()
                .map(|p| scaling.float(f64::from_bits(u64::from_be(p))))
                .collect()
        }
    }
}

/// A 2-D array of physical samples in row-major order.
///
/// Row `y` holds the pixels with NAXIS2 index `y`, so row 0 is the bottom
/// row of the image as conventionally displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Build a matrix, failing if `values` does not hold `width * height` samples.
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        if width.checked_mul(height) != Some(values.len()) {
            return Err(Error::InvalidValue);
        }
        Ok(Matrix {
            width,
            height,
            values,
        })
    }

    /// Take the first plane of an N-D pixel array laid out NAXIS1-fastest.
    pub fn from_plane(layout: &ImageLayout, mut pixels: Vec<f64>) -> Result<Self> {
        let (width, height) = layout.plane_shape();
        let plane = width * height;
        if pixels.len() < plane {
            return Err(Error::UnexpectedEof);
        }
        pixels.truncate(plane);
        Matrix::new(width, height, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

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

    /// Copy into an `ndarray` array of shape `(height, width)`.
    #[cfg(feature = "array")]
    pub fn to_array2(&self) -> ndarray::Array2<f64> {
        ndarray::Array2::from_shape_fn((self.height, self.width), |(y, x)| {
            self.values[y * self.width + x]
        })
    }
}
