//! In-memory FITS construction for integration tests.
#![allow(dead_code)]

#[path = "../../src/testing.rs"]
mod builders;

pub use builders::{
    f32_bytes, fits_file, header_only_extension, image_extension, primary_empty, HduBuilder,
};

pub fn i16_bytes(pixels: &[i16]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_be_bytes()).collect()
}

pub fn ascii_table(extname: &str) -> Vec<u8> {
    HduBuilder::extension("TABLE", 8)
        .int("NAXIS", 2)
        .int("NAXIS1", 4)
        .int("NAXIS2", 1)
        .int("PCOUNT", 0)
        .int("GCOUNT", 1)
        .int("TFIELDS", 1)
        .string("TFORM1", "A4")
        .int("TBCOL1", 1)
        .name(Some(extname))
        .data(b"abcd".to_vec())
        .build()
}

// ---------------------------------------------------------------------------
// Tile-compressed images
// ---------------------------------------------------------------------------

/// One row of a compressed image table.
pub struct Tile {
    pub compressed: Vec<u8>,
    pub zscale: Option<f64>,
    pub zzero: Option<f64>,
    /// Big-endian f32 pixels stored in an `UNCOMPRESSED_DATA` column.
    pub uncompressed: Option<Vec<u8>>,
}

impl Tile {
    pub fn new(compressed: Vec<u8>) -> Self {
        Tile {
            compressed,
            zscale: None,
            zzero: None,
            uncompressed: None,
        }
    }

    pub fn quantized(compressed: Vec<u8>, zscale: f64, zzero: f64) -> Self {
        Tile {
            compressed,
            zscale: Some(zscale),
            zzero: Some(zzero),
            uncompressed: None,
        }
    }

    /// A tile left uncompressed, with an empty `COMPRESSED_DATA` cell.
    pub fn raw_f32(pixels: &[f32]) -> Self {
        Tile {
            compressed: Vec::new(),
            zscale: Some(1.0),
            zzero: Some(0.0),
            uncompressed: Some(f32_bytes(pixels)),
        }
    }
}

/// Layout of a `ZIMAGE = T` binary table.
pub struct Compressed<'a> {
    pub zbitpix: i64,
    pub naxes: &'a [usize],
    pub tile: &'a [usize],
    pub algorithm: &'a str,
    pub tiles: Vec<Tile>,
    pub extname: Option<&'a str>,
    /// Extra header cards appended after the standard ones.
    pub extra: Vec<(&'a str, Keyword<'a>)>,
}

pub enum Keyword<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
}

impl Compressed<'_> {
    pub fn build(self) -> Vec<u8> {
        let quantized = self.tiles.iter().any(|t| t.zscale.is_some());
        let fallback = self.tiles.iter().any(|t| t.uncompressed.is_some());
        let row_len = 8 + if quantized { 16 } else { 0 } + if fallback { 8 } else { 0 };
        let fields = 1 + if quantized { 2 } else { 0 } + usize::from(fallback);

        let mut rows = Vec::new();
        let mut heap = Vec::new();
        for tile in &self.tiles {
            rows.extend_from_slice(&(tile.compressed.len() as i32).to_be_bytes());
            rows.extend_from_slice(&(heap.len() as i32).to_be_bytes());
            heap.extend_from_slice(&tile.compressed);
            if quantized {
                rows.extend_from_slice(&tile.zscale.unwrap_or(1.0).to_be_bytes());
                rows.extend_from_slice(&tile.zzero.unwrap_or(0.0).to_be_bytes());
            }
            if fallback {
                let raw = tile.uncompressed.as_deref().unwrap_or(&[]);
                rows.extend_from_slice(&(raw.len() as i32 / 4).to_be_bytes());
                rows.extend_from_slice(&(heap.len() as i32).to_be_bytes());
                heap.extend_from_slice(raw);
            }
        }

        let mut hdu = HduBuilder::extension("BINTABLE", 8)
            .int("NAXIS", 2)
            .int("NAXIS1", row_len)
            .int("NAXIS2", self.tiles.len() as i64)
            .int("PCOUNT", heap.len() as i64)
            .int("GCOUNT", 1)
            .int("TFIELDS", fields as i64)
            .string("TTYPE1", "COMPRESSED_DATA")
            .string("TFORM1", "1PB");
        if quantized {
            hdu = hdu
                .string("TTYPE2", "ZSCALE")
                .string("TFORM2", "1D")
                .string("TTYPE3", "ZZERO")
                .string("TFORM3", "1D");
        }
        if fallback {
            hdu = hdu
                .string(&format!("TTYPE{fields}"), "UNCOMPRESSED_DATA")
                .string(&format!("TFORM{fields}"), "1PE");
        }
        hdu = hdu
            .logical("ZIMAGE", true)
            .int("ZBITPIX", self.zbitpix)
            .int("ZNAXIS", self.naxes.len() as i64);
        for (i, n) in self.naxes.iter().enumerate() {
            hdu = hdu.int(&format!("ZNAXIS{}", i + 1), *n as i64);
        }
        for (i, n) in self.tile.iter().enumerate() {
            hdu = hdu.int(&format!("ZTILE{}", i + 1), *n as i64);
        }
        hdu = hdu.string("ZCMPTYPE", self.algorithm);
        for (key, value) in self.extra {
            hdu = match value {
                Keyword::Int(v) => hdu.int(key, v),
                Keyword::Float(v) => hdu.float(key, v),
                Keyword::Str(v) => hdu.string(key, v),
            };
        }

        rows.extend_from_slice(&heap);
        hdu.name(self.extname).data(rows).build()
    }
}

pub fn zlib(bytes: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(bytes, 6)
}

pub fn be_i32(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}
