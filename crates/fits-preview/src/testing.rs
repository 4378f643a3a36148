//! In-memory FITS builders shared by the unit and integration tests.

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

const CARD_SIZE: usize = 80;
const BLOCK_SIZE: usize = 2880;

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Accumulates header cards and a data segment for one HDU.
pub struct HduBuilder {
    cards: Vec<String>,
    data: Vec<u8>,
}

impl HduBuilder {
    pub fn primary(bitpix: i64) -> Self {
        HduBuilder {
            cards: Vec::new(),
            data: Vec::new(),
        }
        .logical("SIMPLE", true)
        .int("BITPIX", bitpix)
    }

    pub fn extension(xtension: &str, bitpix: i64) -> Self {
        HduBuilder {
            cards: Vec::new(),
            data: Vec::new(),
        }
        .string("XTENSION", xtension)
        .int("BITPIX", bitpix)
    }

    fn raw(mut self, card: String) -> Self {
        self.cards.push(card);
        self
    }

    pub fn int(self, key: &str, value: i64) -> Self {
        self.raw(format!("{key:<8}= {value:>20}"))
    }

    pub fn float(self, key: &str, value: f64) -> Self {
        self.raw(format!("{key:<8}= {:>20}", format!("{value:?}")))
    }

    pub fn logical(self, key: &str, value: bool) -> Self {
        self.raw(format!("{key:<8}= {:>20}", if value { "T" } else { "F" }))
    }

    pub fn string(self, key: &str, value: &str) -> Self {
        let escaped = value.replace('\'', "''");
        self.raw(format!("{key:<8}= '{escaped:<8}'"))
    }

    /// Add `EXTNAME` when a name is given.
    pub fn name(self, extname: Option<&str>) -> Self {
        match extname {
            Some(name) => self.string("EXTNAME", name),
            None => self,
        }
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Serialize header (with END and blank padding) followed by padded data.
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        for card in self.cards.iter().map(String::as_str).chain(["END"]) {
            let mut bytes = [b' '; CARD_SIZE];
            bytes[..card.len()].copy_from_slice(card.as_bytes());
            out.extend_from_slice(&bytes);
        }
        out.resize(padded(out.len()), b' ');
        let data_len = self.data.len();
        out.extend_from_slice(&self.data);
        out.resize(out.len() + padded(data_len) - data_len, 0);
        out
    }
}

pub fn f32_bytes(pixels: &[f32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_be_bytes()).collect()
}

pub fn primary_empty() -> Vec<u8> {
    HduBuilder::primary(8).int("NAXIS", 0).build()
}

pub fn primary_f32(width: usize, height: usize, pixels: &[f32], extname: Option<&str>) -> Vec<u8> {
    HduBuilder::primary(-32)
        .int("NAXIS", 2)
        .int("NAXIS1", width as i64)
        .int("NAXIS2", height as i64)
        .name(extname)
        .data(f32_bytes(pixels))
        .build()
}

/// An f32 IMAGE extension of any dimensionality, NAXIS1 first.
pub fn image_extension(naxes: &[usize], pixels: &[f32], extname: Option<&str>) -> Vec<u8> {
    let mut builder = HduBuilder::extension("IMAGE", -32).int("NAXIS", naxes.len() as i64);
    for (i, n) in naxes.iter().enumerate() {
        builder = builder.int(&format!("NAXIS{}", i + 1), *n as i64);
    }
    builder
        .int("PCOUNT", 0)
        .int("GCOUNT", 1)
        .name(extname)
        .data(f32_bytes(pixels))
        .build()
}

pub fn image_extension_f32(
    width: usize,
    height: usize,
    pixels: &[f32],
    extname: Option<&str>,
) -> Vec<u8> {
    image_extension(&[width, height], pixels, extname)
}

/// An IMAGE extension with `NAXIS = 0`.
pub fn header_only_extension(extname: Option<&str>) -> Vec<u8> {
    HduBuilder::extension("IMAGE", 8)
        .int("NAXIS", 0)
        .int("PCOUNT", 0)
        .int("GCOUNT", 1)
        .name(extname)
        .build()
}

pub fn fits_file(hdus: &[Vec<u8>]) -> Vec<u8> {
    hdus.concat()
}
