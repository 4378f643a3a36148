//! Splitting a FITS byte stream into its sequence of extensions.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::image::{decode_physical, Bitpix, ImageLayout, Matrix, Scaling};
use crate::tiled;

const PIXEL_OVERFLOW: &str = "pixel count overflow";

/// What an HDU holds, as far as previewing is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionKind {
    /// The primary HDU (an image, possibly with `NAXIS = 0`).
    Primary(ImageLayout),
    /// `XTENSION = 'IMAGE'`.
    Image(ImageLayout),
    /// Tile-compressed image stored in a binary table (`ZIMAGE = T`).
    /// The layout describes the uncompressed image.
    CompressedImage(ImageLayout),
    AsciiTable,
    BinaryTable,
    RandomGroups,
}

/// One HDU of a parsed file.
#[derive(Debug, Clone)]
pub struct Extension<'a> {
    index: usize,
    header: Header,
    kind: ExtensionKind,
    data: &'a [u8],
}

impl<'a> Extension<'a> {
    /// Position in the container, 0 for the primary HDU.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The `EXTNAME` value, if present.
    pub fn name(&self) -> Option<&str> {
        self.header.extname()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn kind(&self) -> &ExtensionKind {
        &self.kind
    }

    /// The unpadded data segment, including any binary table heap.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Shape of the image this HDU holds, if it is an image.
    pub fn image_layout(&self) -> Option<&ImageLayout> {
        match &self.kind {
            ExtensionKind::Primary(layout)
            | ExtensionKind::Image(layout)
            | ExtensionKind::CompressedImage(layout) => Some(layout),
            _ => None,
        }
    }

    /// Whether this HDU carries image samples that can be previewed.
    pub fn has_matrix(&self) -> bool {
        self.image_layout()
            .is_some_and(|layout| layout.pixel_count() > 0)
    }

    /// Decode the first 2-D plane of the image, or `None` for data-less HDUs.
    pub fn matrix(&self) -> Result<Option<Matrix>> {
        if !self.has_matrix() {
            return Ok(None);
        }
        let pixels = match &self.kind {
            ExtensionKind::CompressedImage(layout) => {
                tiled::decompress_image(&self.header, self.data, layout)?
            }
            ExtensionKind::Primary(layout) | ExtensionKind::Image(layout) => {
                let (width, height) = layout.plane_shape();
                let plane_bytes = width * height * layout.bitpix.bytes_per_pixel();
                let raw = self.data.get(..plane_bytes).ok_or(Error::UnexpectedEof)?;
                decode_physical(raw, layout.bitpix, &Scaling::from_header(&self.header))
            }
            _ => return Ok(None),
        };
        let layout = self.image_layout().ok_or(Error::InvalidValue)?;
        Matrix::from_plane(layout, pixels).map(Some)
    }
}

/// All extensions of one FITS file, in file order.
#[derive(Debug, Clone)]
pub struct Container<'a> {
    extensions: Vec<Extension<'a>>,
}

impl<'a> Container<'a> {
    /// Parse the HDU structure of `data`.
    ///
    /// The first HDU must be a valid primary HDU. Anything after the last HDU
    /// that does not parse as a header is ignored, as are missing padding
    /// bytes after the final data segment. Data that a header declares but
    /// the stream does not contain is an error.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < BLOCK_SIZE {
            return Err(Error::UnexpectedEof);
        }

        let mut extensions: Vec<Extension<'a>> = Vec::new();
        let mut offset = 0usize;

        while data.len().saturating_sub(offset) >= BLOCK_SIZE {
            let index = extensions.len();
            let parsed = Header::parse(&data[offset..]).and_then(|(header, header_len)| {
                classify(&header, index == 0).map(|kind| (header, header_len, kind))
            });
            let (header, header_len, kind) = match parsed {
                Ok(parsed) => parsed,
                Err(e) if index == 0 => return Err(e),
                // impossible dimensions are corrupt data, not trailing garbage
                Err(e @ Error::InvalidHeader(PIXEL_OVERFLOW)) => return Err(e),
                Err(e) => {
                    debug!("stopping HDU scan at byte {offset}: {e}");
                    break;
                }
            };
            let data_len = data_byte_len(&header, &kind)?;

            let data_start = offset + header_len;
            let data_end = data_start
                .checked_add(data_len)
                .ok_or(Error::InvalidHeader("data size overflow"))?;
            if data_end > data.len() {
                return Err(Error::UnexpectedEof);
            }

            trace!(
                "HDU {index}: {kind:?}, EXTNAME={:?}, {data_len} data bytes",
                header.extname()
            );
            extensions.push(Extension {
                index,
                header,
                kind,
                data: &data[data_start..data_end],
            });
            offset = data_start + padded_byte_len(data_len);
        }

        debug!("parsed {} HDUs from {} bytes", extensions.len(), data.len());
        Ok(Container { extensions })
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Extension<'a>> {
        self.extensions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension<'a>> {
        self.extensions.iter()
    }

    /// Every extension's `EXTNAME` in order, `None` where absent.
    pub fn extension_names(&self) -> Vec<Option<String>> {
        self.extensions
            .iter()
            .map(|ext| ext.name().map(String::from))
            .collect()
    }
}

fn image_layout(
    header: &Header,
    bitpix_key: &'static str,
    naxis_key: &'static str,
) -> Result<ImageLayout> {
    let bitpix = Bitpix::from_value(header.required_integer(bitpix_key)?)?;
    let naxis = usize::try_from(header.required_integer(naxis_key)?)
        .map_err(|_| Error::InvalidHeader("negative NAXIS"))?;
    let naxes = header.axes(naxis_key, naxis, "NAXISn")?;
    naxes
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or(Error::InvalidHeader(PIXEL_OVERFLOW))?;
    Ok(ImageLayout { bitpix, naxes })
}

fn classify(header: &Header, first: bool) -> Result<ExtensionKind> {
    if first {
        if header.first_keyword() != Some("SIMPLE") {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }
        let layout = image_layout(header, "BITPIX", "NAXIS")?;
        let groups = header.logical("GROUPS") == Some(true);
        if groups && layout.naxes.first() == Some(&0) {
            return Ok(ExtensionKind::RandomGroups);
        }
        return Ok(ExtensionKind::Primary(layout));
    }

    if header.first_keyword() != Some("XTENSION") {
        return Err(Error::InvalidHeader("extension header must start with XTENSION"));
    }
    let xtension = header.string("XTENSION").ok_or(Error::MissingKeyword("XTENSION"))?;
    match xtension {
        "IMAGE" | "IUEIMAGE" => {
            let layout = image_layout(header, "BITPIX", "NAXIS")?;
            Ok(ExtensionKind::Image(layout))
        }
        "TABLE" => Ok(ExtensionKind::AsciiTable),
        "BINTABLE" | "A3DTABLE" => {
            if header.logical("ZIMAGE") == Some(true) {
                Ok(ExtensionKind::CompressedImage(image_layout(
                    header, "ZBITPIX", "ZNAXIS",
                )?))
            } else {
                Ok(ExtensionKind::BinaryTable)
            }
        }
        "FOREIGN" => Err(Error::UnsupportedExtension("FOREIGN")),
        _ => Err(Error::UnsupportedExtension("unknown XTENSION")),
    }
}

/// Size of the data segment the header declares, without padding:
/// `|BITPIX| / 8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`.
fn data_byte_len(header: &Header, kind: &ExtensionKind) -> Result<usize> {
    let bitpix = header.required_integer("BITPIX")?;
    let bytes_per_value = usize::try_from(bitpix.unsigned_abs() / 8)
        .map_err(|_| Error::InvalidBitpix(bitpix))?;
    let naxis = usize::try_from(header.required_integer("NAXIS")?)
        .map_err(|_| Error::InvalidHeader("negative NAXIS"))?;
    if naxis == 0 {
        return Ok(0);
    }
    let naxes = header.axes("NAXIS", naxis, "NAXISn")?;

    let (axes, pcount, gcount) = match kind {
        ExtensionKind::Primary(_) => (&naxes[..], 0, 1),
        ExtensionKind::RandomGroups => (
            &naxes[1..],
            non_negative(header, "PCOUNT", 0)?,
            non_negative(header, "GCOUNT", 1)?,
        ),
        _ => (
            &naxes[..],
            non_negative(header, "PCOUNT", 0)?,
            non_negative(header, "GCOUNT", 1)?.max(1),
        ),
    };

    let overflow = Error::InvalidHeader("data size overflow");
    let elements = axes
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::InvalidHeader(PIXEL_OVERFLOW))?;
    elements
        .checked_add(pcount)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bytes_per_value))
        .ok_or(overflow)
}

fn non_negative(header: &Header, keyword: &'static str, default: i64) -> Result<usize> {
    usize::try_from(header.integer(keyword).unwrap_or(default))
        .map_err(|_| Error::InvalidHeader("negative PCOUNT or GCOUNT"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        fits_file, header_only_extension, image_extension_f32, primary_f32, primary_empty,
        HduBuilder,
    };
    use alloc::vec;

    #[test]
    fn single_primary_image() {
        let bytes = fits_file(&[primary_f32(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None)]);
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.len(), 1);
        let ext = container.get(0).unwrap();
        assert_eq!(ext.index(), 0);
        assert!(ext.has_matrix());
        let m = ext.matrix().unwrap().unwrap();
        assert_eq!((m.width(), m.height()), (3, 2));
        assert_eq!(m.get(2, 1), Some(6.0));
    }

    #[test]
    fn names_preserve_order_and_absence() {
        let bytes = fits_file(&[
            primary_empty(),
            image_extension_f32(1, 1, &[1.0], Some("SCI")),
            header_only_extension(None),
            image_extension_f32(1, 1, &[2.0], Some("ERR")),
        ]);
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(
            container.extension_names(),
            vec![None, Some("SCI".into()), None, Some("ERR".into())]
        );
    }

    #[test]
    fn empty_primary_has_no_matrix() {
        let bytes = fits_file(&[primary_empty()]);
        let container = Container::parse(&bytes).unwrap();
        let ext = container.get(0).unwrap();
        assert!(!ext.has_matrix());
        assert!(ext.matrix().unwrap().is_none());
    }

    #[test]
    fn bintable_is_not_an_image() {
        let table = HduBuilder::extension("BINTABLE", 8)
            .int("NAXIS", 2)
            .int("NAXIS1", 4)
            .int("NAXIS2", 3)
            .int("PCOUNT", 0)
            .int("GCOUNT", 1)
            .int("TFIELDS", 1)
            .string("TFORM1", "1J")
            .string("EXTNAME", "EVENTS")
            .data(vec![0u8; 12])
            .build();
        let bytes = fits_file(&[primary_empty(), table]);
        let container = Container::parse(&bytes).unwrap();
        let ext = container.get(1).unwrap();
        assert_eq!(ext.kind(), &ExtensionKind::BinaryTable);
        assert_eq!(ext.name(), Some("EVENTS"));
        assert_eq!(ext.data().len(), 12);
        assert!(!ext.has_matrix());
    }

    #[test]
    fn first_hdu_must_be_primary() {
        let bytes = fits_file(&[header_only_extension(Some("SCI"))]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(Error::InvalidHeader("first HDU must be primary"))
        ));
    }

    #[test]
    fn short_input_is_eof() {
        assert!(matches!(Container::parse(b"SIMPLE"), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn truncated_data_is_eof() {
        let mut bytes = fits_file(&[primary_f32(100, 100, &vec![0.0; 10_000], None)]);
        bytes.truncate(BLOCK_SIZE * 2);
        assert!(matches!(Container::parse(&bytes), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn missing_final_padding_is_tolerated() {
        let mut bytes = fits_file(&[primary_f32(2, 1, &[1.0, 2.0], None)]);
        bytes.truncate(BLOCK_SIZE + 8);
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn trailing_garbage_ends_scan() {
        let mut bytes = fits_file(&[primary_f32(1, 1, &[1.0], None)]);
        bytes.extend(core::iter::repeat(b'x').take(BLOCK_SIZE));
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn random_groups_is_not_an_image() {
        let groups = HduBuilder::primary(-32)
            .int("NAXIS", 2)
            .int("NAXIS1", 0)
            .int("NAXIS2", 2)
            .logical("GROUPS", true)
            .int("PCOUNT", 1)
            .int("GCOUNT", 2)
            .data(vec![0u8; 4 * 2 * 3])
            .build();
        let bytes = fits_file(&[groups]);
        let container = Container::parse(&bytes).unwrap();
        let ext = container.get(0).unwrap();
        assert_eq!(ext.kind(), &ExtensionKind::RandomGroups);
        assert_eq!(ext.data().len(), 24);
        assert!(!ext.has_matrix());
    }

    #[test]
    fn scaled_integer_image() {
        let raw: Vec<u8> = [10i16, -5].iter().flat_map(|v| v.to_be_bytes()).collect();
        let hdu = HduBuilder::primary(16)
            .int("NAXIS", 2)
            .int("NAXIS1", 2)
            .int("NAXIS2", 1)
            .float("BSCALE", 0.5)
            .float("BZERO", 100.0)
            .data(raw)
            .build();
        let bytes = fits_file(&[hdu]);
        let container = Container::parse(&bytes).unwrap();
        let m = container.get(0).unwrap().matrix().unwrap().unwrap();
        assert_eq!(m.values(), &[105.0, 97.5]);
    }

    #[test]
    fn unknown_xtension_after_primary_stops_scan() {
        let foreign = HduBuilder::extension("FOREIGN", 8).int("NAXIS", 0).build();
        let bytes = fits_file(&[primary_empty(), foreign]);
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.len(), 1);
    }
}
