//! Tile-compressed image decompression.
//!
//! Images written with the FITS tiled image convention are stored as binary
//! tables (`ZIMAGE = T`) where each row holds one compressed tile in the
//! heap. Supported algorithms are `RICE_1`, `GZIP_1`, `GZIP_2` and
//! `NOCOMPRESS`; quantized floating-point tiles are restored from their
//! ZSCALE/ZZERO values, including subtractive dithering.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::image::{decode_physical, Bitpix, ImageLayout, Scaling};

// ---------------------------------------------------------------------------
// Header parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Rice,
    Gzip1,
    Gzip2,
    NoCompress,
}

impl Algorithm {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "RICE_1" | "RICE_ONE" => Ok(Algorithm::Rice),
            "GZIP_1" => Ok(Algorithm::Gzip1),
            "GZIP_2" => Ok(Algorithm::Gzip2),
            "NOCOMPRESS" => Ok(Algorithm::NoCompress),
            other => Err(Error::UnsupportedCompression(String::from(other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dither {
    None,
    Subtractive1,
    /// Like `Subtractive1`, but exact zeros are stored as a reserved value.
    Subtractive2,
}

/// Reserved integer for an exact 0.0 under `SUBTRACTIVE_DITHER_2`.
const DITHER2_ZERO: i64 = -2_147_483_646;

struct TileParams {
    algorithm: Algorithm,
    tile: Vec<usize>,
    blocksize: usize,
    bytepix: usize,
    dither: Dither,
    dither_seed: usize,
}

impl TileParams {
    fn from_header(header: &Header, layout: &ImageLayout) -> Result<Self> {
        let algorithm = Algorithm::from_name(
            header
                .string("ZCMPTYPE")
                .ok_or(Error::MissingKeyword("ZCMPTYPE"))?,
        )?;

        let tile = (1..=layout.naxes.len())
            .map(|i| {
                let default = if i == 1 { layout.naxes[0] } else { 1 };
                match header.integer(&format!("ZTILE{i}")) {
                    Some(n) if n > 0 => usize::try_from(n).map_err(|_| Error::InvalidValue),
                    Some(_) => Err(Error::InvalidHeader("non-positive ZTILE")),
                    None => Ok(default),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut blocksize = 32;
        let mut bytepix = 4;
        for i in 1.. {
            let Some(name) = header.string(&format!("ZNAME{i}")) else {
                break;
            };
            let value = header.integer(&format!("ZVAL{i}"));
            match (name, value) {
                ("BLOCKSIZE", Some(v)) if v > 0 => blocksize = v as usize,
                ("BYTEPIX", Some(v)) if v > 0 => bytepix = v as usize,
                _ => {}
            }
        }

        let dither = match header.string("ZQUANTIZ") {
            None | Some("NO_DITHER") | Some("NONE") => Dither::None,
            Some("SUBTRACTIVE_DITHER_1") => Dither::Subtractive1,
            Some("SUBTRACTIVE_DITHER_2") => Dither::Subtractive2,
            Some(other) => {
                return Err(Error::UnsupportedCompression(format!("ZQUANTIZ = {other}")))
            }
        };
        let dither_seed = header.integer("ZDITHER0").unwrap_or(1).max(1) as usize;

        Ok(TileParams {
            algorithm,
            tile,
            blocksize,
            bytepix,
            dither,
            dither_seed,
        })
    }
}

// ---------------------------------------------------------------------------
// Binary table layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descriptor {
    /// 32-bit count and offset.
    P,
    /// 64-bit count and offset.
    Q,
}

/// A parsed TFORMn value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnFormat {
    repeat: usize,
    /// Element type code (`B`, `I`, `J`, `K`, `E`, `D`, ...).
    code: u8,
    descriptor: Option<Descriptor>,
}

impl ColumnFormat {
    fn parse(tform: &str) -> Result<Self> {
        let tform = tform.trim();
        let tform = tform.split_once('(').map_or(tform, |(head, _)| head);
        let digits = tform.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            tform[..digits].parse().map_err(|_| Error::InvalidValue)?
        };
        let rest = tform[digits..].as_bytes();
        match rest {
            [b'P', code] => Ok(ColumnFormat {
                repeat,
                code: *code,
                descriptor: Some(Descriptor::P),
            }),
            [b'Q', code] => Ok(ColumnFormat {
                repeat,
                code: *code,
                descriptor: Some(Descriptor::Q),
            }),
            [code] => Ok(ColumnFormat {
                repeat,
                code: *code,
                descriptor: None,
            }),
            _ => Err(Error::InvalidValue),
        }
    }

    /// Size of one element of type `code`.
    fn element_size(code: u8) -> Result<usize> {
        match code {
            b'L' | b'B' | b'A' => Ok(1),
            b'I' => Ok(2),
            b'J' | b'E' => Ok(4),
            b'K' | b'D' | b'C' => Ok(8),
            b'M' => Ok(16),
            _ => Err(Error::InvalidValue),
        }
    }

    /// Bytes the column occupies in each row of the main table.
    fn width(&self) -> Result<usize> {
        let per_element = match (self.descriptor, self.code) {
            (Some(Descriptor::P), _) => 8,
            (Some(Descriptor::Q), _) => 16,
            (None, b'X') => return Ok(self.repeat.div_ceil(8)),
            (None, code) => Self::element_size(code)?,
        };
        self.repeat
            .checked_mul(per_element)
            .ok_or(Error::InvalidHeader("column width overflow"))
    }
}

struct Column {
    offset: usize,
    format: ColumnFormat,
}

struct TableLayout {
    row_len: usize,
    rows: usize,
    heap_start: usize,
    columns: Vec<(String, Column)>,
}

impl TableLayout {
    fn from_header(header: &Header) -> Result<Self> {
        let size = |key: &'static str| {
            usize::try_from(header.required_integer(key)?)
                .map_err(|_| Error::InvalidHeader("negative table dimension"))
        };
        let row_len = size("NAXIS1")?;
        let rows = size("NAXIS2")?;
        let fields = size("TFIELDS")?;
        let heap_start = match header.integer("THEAP") {
            Some(_) => size("THEAP")?,
            None => row_len
                .checked_mul(rows)
                .ok_or(Error::InvalidHeader("table size overflow"))?,
        };

        let mut columns = Vec::new();
        let mut offset = 0usize;
        for i in 1..=fields {
            let tform = header
                .string(&format!("TFORM{i}"))
                .ok_or(Error::MissingKeyword("TFORMn"))?;
            let format = ColumnFormat::parse(tform)?;
            let name = header.string(&format!("TTYPE{i}")).unwrap_or_default();
            columns.push((String::from(name), Column { offset, format }));
            offset = offset
                .checked_add(format.width()?)
                .ok_or(Error::InvalidHeader("column width overflow"))?;
        }
        if offset > row_len {
            return Err(Error::InvalidHeader("columns wider than NAXIS1"));
        }

        Ok(TableLayout {
            row_len,
            rows,
            heap_start,
            columns,
        })
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| c)
    }

    fn cell<'a>(
        &self,
        data: &'a [u8],
        row: usize,
        column: &Column,
        len: usize,
    ) -> Result<&'a [u8]> {
        let start = row
            .checked_mul(self.row_len)
            .and_then(|n| n.checked_add(column.offset))
            .ok_or(Error::InvalidValue)?;
        let end = start.checked_add(len).ok_or(Error::InvalidValue)?;
        data.get(start..end).ok_or(Error::UnexpectedEof)
    }

    /// First element of a fixed-width numeric column.
    fn number(&self, data: &[u8], row: usize, column: &Column) -> Result<f64> {
        let size = ColumnFormat::element_size(column.format.code)?;
        let cell = self.cell(data, row, column, size)?;
        read_number(cell, column.format.code)
    }

    /// The heap bytes a variable-length column points at.
    fn heap_bytes<'a>(&self, data: &'a [u8], row: usize, column: &Column) -> Result<&'a [u8]> {
        let (count, offset) = match column.format.descriptor {
            Some(Descriptor::P) => {
                let cell = self.cell(data, row, column, 8)?;
                let count = u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]);
                let offset = u32::from_be_bytes([cell[4], cell[5], cell[6], cell[7]]);
                (count as usize, offset as usize)
            }
            Some(Descriptor::Q) => {
                let cell = self.cell(data, row, column, 16)?;
                let mut count = [0u8; 8];
                let mut offset = [0u8; 8];
                count.copy_from_slice(&cell[..8]);
                offset.copy_from_slice(&cell[8..]);
                (
                    u64::from_be_bytes(count) as usize,
                    u64::from_be_bytes(offset) as usize,
                )
            }
            None => return Err(Error::InvalidHeader("tile column is not variable-length")),
        };
        let len = count
            .checked_mul(ColumnFormat::element_size(column.format.code)?)
            .ok_or(Error::InvalidValue)?;
        let start = self
            .heap_start
            .checked_add(offset)
            .ok_or(Error::InvalidValue)?;
        let end = start.checked_add(len).ok_or(Error::InvalidValue)?;
        data.get(start..end).ok_or(Error::UnexpectedEof)
    }
}

fn read_number(bytes: &[u8], code: u8) -> Result<f64> {
    let value = match code {
        b'B' => bytes[0] as f64,
        b'I' => i16::from_be_bytes([bytes[0], bytes[1]]) as f64,
        b'J' => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        b'E' => f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        b'K' | b'D' => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[..8]);
            if code == b'K' {
                i64::from_be_bytes(b) as f64
            } else {
                f64::from_be_bytes(b)
            }
        }
        _ => return Err(Error::InvalidValue),
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Rice
// ---------------------------------------------------------------------------

/// MSB-first bit reader over a byte slice. Reads past the end yield zeros;
/// callers check [`BitReader::overrun`] at block boundaries.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    acc: u64,
    avail: u32,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            pos: 0,
            acc: 0,
            avail: 0,
        }
    }

    fn refill(&mut self) {
        while self.avail <= 56 {
            let byte = self.bytes.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
            self.acc = (self.acc << 8) | byte as u64;
            self.avail += 8;
        }
    }

    fn mask(bits: u32) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Read `n <= 32` bits.
    fn bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        if self.avail < n {
            self.refill();
        }
        self.avail -= n;
        let value = (self.acc >> self.avail) & Self::mask(n);
        self.acc &= Self::mask(self.avail);
        value as u32
    }

    /// Count zero bits up to and including the next one bit.
    fn unary(&mut self) -> Result<u32> {
        let mut zeros = 0;
        loop {
            if self.avail == 0 {
                self.refill();
                if self.overrun() {
                    return Err(Error::Decompression("rice stream ended early"));
                }
            }
            if self.acc == 0 {
                zeros += self.avail;
                self.avail = 0;
                continue;
            }
            let leading = self.acc.leading_zeros() - (64 - self.avail);
            zeros += leading;
            self.avail -= leading + 1;
            self.acc &= Self::mask(self.avail);
            return Ok(zeros);
        }
    }

    /// Whether more bits were consumed than the input holds.
    fn overrun(&self) -> bool {
        (self.pos * 8).saturating_sub(self.avail as usize) > self.bytes.len() * 8
    }
}

fn unzigzag(diff: u32) -> u32 {
    if diff & 1 == 0 {
        diff >> 1
    } else {
        !(diff >> 1)
    }
}

/// Largest BLOCKSIZE accepted for RICE_1; writers use 16 or 32.
const MAX_RICE_BLOCKSIZE: usize = 64;

/// Decode one Rice-compressed tile of `count` pixels, `bytepix` bytes each.
fn rice_decode(input: &[u8], count: usize, blocksize: usize, bytepix: usize) -> Result<Vec<i64>> {
    let (fs_bits, fs_max, raw_bits) = match bytepix {
        1 => (3, 6, 8),
        2 => (4, 14, 16),
        4 => (5, 25, 32),
        other => {
            return Err(Error::UnsupportedCompression(format!(
                "RICE_1 with BYTEPIX = {other}"
            )))
        }
    };
    if blocksize == 0 || blocksize > MAX_RICE_BLOCKSIZE {
        return Err(Error::UnsupportedCompression(format!(
            "RICE_1 with BLOCKSIZE = {blocksize}"
        )));
    }
    if input.len() < bytepix {
        return Err(Error::Decompression("rice tile shorter than its seed pixel"));
    }
    // Each block costs at least its fs code, which caps the pixel count.
    let stream_bits = (input.len() - bytepix).saturating_mul(8);
    if count.div_ceil(blocksize).saturating_mul(fs_bits as usize) > stream_bits {
        return Err(Error::Decompression("rice tile shorter than ZTILE"));
    }

    let mut last = input[..bytepix]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);
    let mut reader = BitReader::new(&input[bytepix..]);
    let mut raw: Vec<u32> = Vec::with_capacity(count);

    while raw.len() < count {
        if reader.overrun() {
            return Err(Error::Decompression("rice stream ended early"));
        }
        let block_end = (raw.len() + blocksize).min(count);
        let fs = reader.bits(fs_bits) as i32 - 1;
        if fs < 0 {
            raw.resize(block_end, last);
        } else if fs == fs_max {
            while raw.len() < block_end {
                last = last.wrapping_add(unzigzag(reader.bits(raw_bits)));
                raw.push(last);
            }
        } else {
            while raw.len() < block_end {
                let high = reader.unary()?;
                let diff = (high << fs) | reader.bits(fs as u32);
                last = last.wrapping_add(unzigzag(diff));
                raw.push(last);
            }
        }
    }
    if reader.overrun() {
        return Err(Error::Decompression("rice stream ended early"));
    }

    Ok(raw
        .into_iter()
        .map(|v| match bytepix {
            1 => v as u8 as i64,
            2 => v as u16 as i16 as i64,
            _ => v as i32 as i64,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// GZIP
// ---------------------------------------------------------------------------

/// Return the deflate payload of a gzip member (RFC 1952).
fn gzip_payload(data: &[u8]) -> Result<&[u8]> {
    const FHCRC: u8 = 0x02;
    const FEXTRA: u8 = 0x04;
    const FNAME: u8 = 0x08;
    const FCOMMENT: u8 = 0x10;
    let bad = Error::Decompression("malformed gzip header");

    if data.len() < 18 || data[2] != 8 {
        return Err(bad);
    }
    let flags = data[3];
    let mut pos = 10;
    if flags & FEXTRA != 0 {
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2 + xlen;
    }
    for flag in [FNAME, FCOMMENT] {
        if flags & flag != 0 {
            let end = data
                .get(pos..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or(Error::Decompression("unterminated gzip header field"))?;
            pos += end + 1;
        }
    }
    if flags & FHCRC != 0 {
        pos += 2;
    }
    let end = data.len() - 8;
    if pos > end {
        return Err(bad);
    }
    Ok(&data[pos..end])
}

/// Inflate a gzip member, a zlib stream, or a bare deflate stream.
fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    use miniz_oxide::inflate::{decompress_to_vec, decompress_to_vec_zlib};

    let failed = |_| Error::Decompression("corrupt deflate stream");
    if data.starts_with(&[0x1f, 0x8b]) {
        return decompress_to_vec(gzip_payload(data)?).map_err(failed);
    }
    decompress_to_vec_zlib(data)
        .or_else(|_| decompress_to_vec(data))
        .map_err(failed)
}

/// Undo GZIP_2 byte shuffling: all most-significant bytes come first.
fn unshuffle(bytes: &[u8], width: usize) -> Vec<u8> {
    let count = bytes.len() / width;
    let mut out = vec![0u8; count * width];
    for (plane, chunk) in bytes.chunks_exact(count.max(1)).take(width).enumerate() {
        for (i, &b) in chunk.iter().enumerate() {
            out[i * width + plane] = b;
        }
    }
    out
}

fn be_integers(bytes: &[u8], width: usize) -> Result<Vec<i64>> {
    let values = match width {
        1 => bytes.iter().map(|&b| b as i64).collect(),
        2 => bytes
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]) as i64)
            .collect(),
        4 => bytes
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64)
            .collect(),
        8 => bytes
            .chunks_exact(8)
            .map(|c| i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
        _ => return Err(Error::Decompression("tile size is not a whole number of pixels")),
    };
    Ok(values)
}

// ---------------------------------------------------------------------------
// Dithering
// ---------------------------------------------------------------------------

const N_RANDOM: usize = 10_000;

/// The fixed pseudo-random sequence shared by all FITS quantizers
/// (Park–Miller minimal standard generator, seed 1).
fn random_sequence() -> Vec<f32> {
    const A: f64 = 16807.0;
    const M: f64 = 2_147_483_647.0;
    let mut seed = 1.0f64;
    (0..N_RANDOM)
        .map(|_| {
            let temp = A * seed;
            seed = temp - M * libm::trunc(temp / M);
            (seed / M) as f32
        })
        .collect()
}

/// Walks the dither offsets for one tile.
struct DitherOffsets<'a> {
    table: &'a [f32],
    seed_index: usize,
    next: usize,
}

impl<'a> DitherOffsets<'a> {
    /// `tile` is the 0-based tile number, `zdither0` the ZDITHER0 keyword.
    fn new(table: &'a [f32], tile: usize, zdither0: usize) -> Self {
        let seed_index = (tile + zdither0 - 1) % N_RANDOM;
        DitherOffsets {
            table,
            seed_index,
            next: Self::start(table, seed_index),
        }
    }

    fn start(table: &[f32], seed_index: usize) -> usize {
        (table[seed_index] * 500.0) as usize
    }

    fn next_offset(&mut self) -> f64 {
        let value = self.table[self.next] as f64;
        self.next += 1;
        if self.next == N_RANDOM {
            self.seed_index = (self.seed_index + 1) % N_RANDOM;
            self.next = Self::start(self.table, self.seed_index);
        }
        value
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Per-tile quantization constants for floating-point images.
struct Quantization {
    scale: f64,
    zero: f64,
    null: Option<i64>,
}

/// Everything needed to decode the tiles of one compressed HDU.
struct TiledImage<'a> {
    header: &'a Header,
    data: &'a [u8],
    table: &'a TableLayout,
    params: TileParams,
    bitpix: Bitpix,
    scaling: Scaling,
    quantized: bool,
    random: Vec<f32>,
}

impl TiledImage<'_> {
    fn column(&self, name: &str) -> Option<&Column> {
        self.table.column(name)
    }

    /// ZSCALE/ZZERO/ZBLANK for `row`, preferring table columns over keywords.
    fn quantization(&self, row: usize) -> Result<Quantization> {
        let read = |key: &str| -> Result<Option<f64>> {
            match self.column(key) {
                Some(col) => self.table.number(self.data, row, col).map(Some),
                None => Ok(self.header.float(key)),
            }
        };
        Ok(Quantization {
            scale: read("ZSCALE")?.unwrap_or(1.0),
            zero: read("ZZERO")?.unwrap_or(0.0),
            null: read("ZBLANK")?.map(|v| v as i64),
        })
    }

    fn decode_tile(&self, row: usize, count: usize) -> Result<Vec<f64>> {
        let compressed_col = self
            .column("COMPRESSED_DATA")
            .ok_or(Error::MissingKeyword("TTYPEn = 'COMPRESSED_DATA'"))?;
        let compressed = self.table.heap_bytes(self.data, row, compressed_col)?;
        if compressed.is_empty() {
            return self.decode_fallback_tile(row, count);
        }

        let integers = match self.params.algorithm {
            Algorithm::Rice => {
                let bytepix = if self.quantized { 4 } else { self.params.bytepix };
                rice_decode(compressed, count, self.params.blocksize, bytepix)?
            }
            algorithm => {
                let bytes = match algorithm {
                    Algorithm::NoCompress => compressed.to_vec(),
                    _ => inflate(compressed)?,
                };
                if count == 0 || bytes.len() < count || bytes.len() % count != 0 {
                    return Err(Error::Decompression("tile size does not match ZTILE"));
                }
                let width = bytes.len() / count;
                let bytes = if algorithm == Algorithm::Gzip2 {
                    unshuffle(&bytes, width)
                } else {
                    bytes
                };
                if !self.quantized && self.bitpix.is_float() {
                    let element = match width {
                        4 => Bitpix::F32,
                        8 => Bitpix::F64,
                        _ => return Err(Error::Decompression("tile size does not match ZTILE")),
                    };
                    return Ok(decode_physical(&bytes, element, &self.scaling));
                }
                be_integers(&bytes, width)?
            }
        };
        if integers.len() < count {
            return Err(Error::Decompression("tile holds fewer pixels than ZTILE"));
        }
        let integers = &integers[..count];

        if !self.quantized {
            let scaling = Scaling {
                blank: self.header.integer("ZBLANK").or(self.scaling.blank),
                ..self.scaling
            };
            return Ok(integers.iter().map(|&v| scaling.integer(v)).collect());
        }

        let q = self.quantization(row)?;
        let dither = self.params.dither;
        let mut offsets = (dither != Dither::None)
            .then(|| DitherOffsets::new(&self.random, row, self.params.dither_seed));
        Ok(integers
            .iter()
            .map(|&v| {
                let offset = offsets.as_mut().map(DitherOffsets::next_offset);
                if q.null == Some(v) {
                    f64::NAN
                } else if dither == Dither::Subtractive2 && v == DITHER2_ZERO {
                    0.0
                } else {
                    match offset {
                        Some(r) => (v as f64 - r + 0.5) * q.scale + q.zero,
                        None => v as f64 * q.scale + q.zero,
                    }
                }
            })
            .collect())
    }

    /// Tiles that could not be quantized are stored losslessly in a
    /// separate column, either gzip-compressed or raw.
    fn decode_fallback_tile(&self, row: usize, count: usize) -> Result<Vec<f64>> {
        let (bytes, code) = if let Some(col) = self.column("GZIP_COMPRESSED_DATA") {
            let bytes = inflate(self.table.heap_bytes(self.data, row, col)?)?;
            let code = if self.bitpix == Bitpix::F64 { b'D' } else { b'E' };
            (bytes, code)
        } else if let Some(col) = self.column("UNCOMPRESSED_DATA") {
            let bytes = self.table.heap_bytes(self.data, row, col)?.to_vec();
            (bytes, col.format.code)
        } else {
            return Err(Error::Decompression("empty tile without fallback data"));
        };

        let element = match code {
            b'E' => Bitpix::F32,
            b'D' => Bitpix::F64,
            b'B' => Bitpix::U8,
            b'I' => Bitpix::I16,
            b'J' => Bitpix::I32,
            b'K' => Bitpix::I64,
            _ => return Err(Error::InvalidValue),
        };
        let values = decode_physical(&bytes, element, &Scaling::IDENTITY);
        if values.len() < count {
            return Err(Error::Decompression("fallback tile holds fewer pixels than ZTILE"));
        }
        Ok(values)
    }
}

/// Decompress the first 2-D plane of a tile-compressed image.
///
/// Returns `width * height` physical samples, NAXIS1 fastest, with
/// undefined pixels as NaN. Tiles lying entirely beyond the first plane are
/// not decoded.
pub fn decompress_image(header: &Header, data: &[u8], layout: &ImageLayout) -> Result<Vec<f64>> {
    let params = TileParams::from_header(header, layout)?;
    let table = TableLayout::from_header(header)?;
    let quantized = layout.bitpix.is_float()
        && (table.column("ZSCALE").is_some() || header.float("ZSCALE").is_some());
    let random = if quantized && params.dither != Dither::None {
        random_sequence()
    } else {
        Vec::new()
    };

    let naxes = &layout.naxes;
    let tiles_per_axis: Vec<usize> = naxes
        .iter()
        .zip(&params.tile)
        .map(|(&n, &t)| n.div_ceil(t))
        .collect();
    let tile_count: usize = tiles_per_axis.iter().product();
    if tile_count > table.rows {
        return Err(Error::InvalidHeader("fewer table rows than tiles"));
    }
    // Tiles run NAXIS1 fastest, so the first plane is covered by the leading rows.
    let plane_tiles: usize = tiles_per_axis.iter().take(2).product();
    trace!(
        "tiled image {naxes:?}: {:?}, tiles of {:?}, {} rows",
        params.algorithm,
        params.tile,
        table.rows
    );

    let image = TiledImage {
        header,
        data,
        table: &table,
        params,
        bitpix: layout.bitpix,
        scaling: Scaling::from_header(header),
        quantized,
        random,
    };

    let mut decoded = Vec::new();
    for row in 0..plane_tiles {
        let mut rest = row;
        let mut origin = vec![0usize; naxes.len()];
        let mut dims = vec![0usize; naxes.len()];
        for axis in 0..naxes.len() {
            let t = rest % tiles_per_axis[axis];
            rest /= tiles_per_axis[axis];
            origin[axis] = t * image.params.tile[axis];
            dims[axis] = image.params.tile[axis].min(naxes[axis] - origin[axis]);
        }
        let tile = image.decode_tile(row, dims.iter().product())?;
        decoded.push((origin, dims, tile));
    }

    // The plane is only allocated once tiles covering all of it have decoded.
    let (width, height) = layout.plane_shape();
    let mut plane = vec![f64::NAN; width * height];
    for (origin, dims, tile) in &decoded {
        // Only the leading dims[0] x dims[1] block lies in the first plane.
        let run = dims[0];
        let y0 = origin.get(1).copied().unwrap_or(0);
        for r in 0..dims.get(1).copied().unwrap_or(1) {
            let dst = (y0 + r) * width + origin[0];
            plane[dst..dst + run].copy_from_slice(&tile[r * run..(r + 1) * run]);
        }
    }

    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names() {
        assert_eq!(Algorithm::from_name("RICE_ONE").unwrap(), Algorithm::Rice);
        assert_eq!(Algorithm::from_name("GZIP_2").unwrap(), Algorithm::Gzip2);
        assert!(matches!(
            Algorithm::from_name("HCOMPRESS_1"),
            Err(Error::UnsupportedCompression(name)) if name == "HCOMPRESS_1"
        ));
    }

    #[test]
    fn tform_parsing() {
        let f = ColumnFormat::parse("1PB(2048)").unwrap();
        assert_eq!(f.descriptor, Some(Descriptor::P));
        assert_eq!(f.code, b'B');
        assert_eq!(f.width().unwrap(), 8);

        let f = ColumnFormat::parse("1QI").unwrap();
        assert_eq!(f.width().unwrap(), 16);

        let f = ColumnFormat::parse("D").unwrap();
        assert_eq!((f.repeat, f.width().unwrap()), (1, 8));

        assert_eq!(ColumnFormat::parse("12X").unwrap().width().unwrap(), 2);
        assert!(ColumnFormat::parse("").is_err());
    }

    #[test]
    fn rice_low_entropy_block_repeats_seed() {
        // seed 7, then a zero FS code: every pixel equals the seed
        let out = rice_decode(&[0, 0, 0, 7, 0x00], 10, 32, 4).unwrap();
        assert_eq!(out, [7; 10]);
    }

    #[test]
    fn rice_normal_block() {
        // 16-bit seed 100, FS = 1, zigzag differences 0, 3, 1
        let out = rice_decode(&[0x00, 0x64, 0x29, 0xE0], 3, 32, 2).unwrap();
        assert_eq!(out, [100, 98, 97]);
    }

    #[test]
    fn rice_high_entropy_block() {
        // 8-bit seed 10, FS = FSMAX, raw differences 0, +1, -3
        let out = rice_decode(&[0x0A, 0xE0, 0x00, 0x40, 0xA0], 3, 32, 1).unwrap();
        assert_eq!(out, [10, 11, 8]);
    }

    #[test]
    fn rice_truncated_stream_fails() {
        // a normal-coded block that needs more bits than are present
        let err = rice_decode(&[0x00, 0x64, 0x20], 40, 32, 2).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }

    #[test]
    fn rice_pixel_count_bounded_by_stream() {
        let err = rice_decode(&[0, 0, 0, 7, 0], 1 << 40, 32, 4).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
        assert!(matches!(
            rice_decode(&[0, 0, 0, 7, 0], 10, 1 << 20, 4),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn rice_rejects_odd_bytepix() {
        assert!(matches!(
            rice_decode(&[0; 8], 1, 32, 3),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn unshuffle_restores_pixel_order() {
        // two 16-bit pixels 0x0102 and 0x0304, shuffled as [01 03 02 04]
        assert_eq!(unshuffle(&[1, 3, 2, 4], 2), [1, 2, 3, 4]);
    }

    #[test]
    fn inflate_zlib_and_gzip() {
        let payload = b"tile payload bytes";
        let zlib = miniz_oxide::deflate::compress_to_vec_zlib(payload, 6);
        assert_eq!(inflate(&zlib).unwrap(), payload);

        let deflate = miniz_oxide::deflate::compress_to_vec(payload, 6);
        let mut gzip = alloc::vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 255];
        gzip.extend_from_slice(&deflate);
        gzip.extend_from_slice(&[0; 8]);
        assert_eq!(inflate(&gzip).unwrap(), payload);
    }

    #[test]
    fn random_sequence_matches_reference_endpoint() {
        let table = random_sequence();
        assert_eq!(table.len(), N_RANDOM);
        // The generator is specified to reach seed 1043618065 after 10000 draws.
        let last = table[N_RANDOM - 1] as f64 * 2_147_483_647.0;
        assert!((last - 1_043_618_065.0).abs() < 256.0);
        assert!(table.iter().all(|&r| (0.0..1.0).contains(&r)));
    }

    #[test]
    fn dither_offsets_wrap_around_table() {
        let table = random_sequence();
        let mut offsets = DitherOffsets::new(&table, 0, 1);
        for _ in 0..N_RANDOM * 2 {
            let r = offsets.next_offset();
            assert!((0.0..1.0).contains(&r));
        }
    }
}
