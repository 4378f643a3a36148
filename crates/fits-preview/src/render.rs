//! Colorizing display matrices into RGBA rasters.

use alloc::vec::Vec;

use crate::normalize::DisplayMatrix;
use crate::palette::{lut_index, Palette};

/// An 8-bit RGBA image, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl Raster {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Interleaved RGBA bytes, `width * height * 4` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.rgba
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.rgba[i..i + 4]);
        Some(px)
    }
}

/// Map `display` through `palette`.
///
/// Values are stretched linearly over the finite range of the matrix; a
/// flat matrix maps entirely to the first palette entry. NaN pixels are
/// fully transparent. Matrix row 0 becomes the bottom raster row.
pub fn colorize(display: &DisplayMatrix, palette: Palette) -> Raster {
    let (width, height) = (display.width(), display.height());
    let lut = palette.lut();
    let (vmin, vmax) = display.finite_range().unwrap_or((0.0, 0.0));
    let span = vmax - vmin;

    let mut rgba = Vec::with_capacity(width * height * 4);
    for row in display.values().chunks_exact(width.max(1)).rev() {
        for &v in row {
            if v.is_nan() {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let t = if span > 0.0 { (v - vmin) / span } else { 0.0 };
            let [r, g, b] = lut[lut_index(t)];
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }

    Raster {
        width,
        height,
        rgba,
    }
}
