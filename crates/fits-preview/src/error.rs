//! Error types for container parsing and for the preview pipeline.

use alloc::string::String;
use alloc::vec::Vec;

use thiserror::Error;

/// Errors raised while reading the FITS block structure or decoding data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Malformed keyword name in a header card.
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// Unknown XTENSION type.
    #[error("unsupported XTENSION type: {0}")]
    UnsupportedExtension(&'static str),
    /// A header value could not be interpreted.
    #[error("invalid header value")]
    InvalidValue,
    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(&'static str),
    /// Tile compression algorithm this reader does not implement.
    #[error("unsupported tile compression: {0}")]
    UnsupportedCompression(String),
    /// A compressed tile could not be decoded.
    #[error("failed to decompress tile: {0}")]
    Decompression(&'static str),
}

/// Convenience alias used by the container reader.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures of the preview pipeline.
///
/// Every kind describes a problem with the caller's input; none of them is
/// fatal to the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreviewError {
    /// The bytes are not a readable FITS file.
    #[error("malformed FITS file: {0}")]
    MalformedContainer(#[from] Error),
    /// A numeric identifier points past either end of the container.
    #[error("extension index {index} is out of range for a file with {count} extensions")]
    OutOfRange {
        /// The requested (possibly negative) index.
        index: i64,
        /// Number of extensions in the container.
        count: usize,
    },
    /// No extension with data carries the requested name.
    #[error(
        "extension '{identifier}' not found or has no data; available extensions: {}",
        format_names(.available)
    )]
    NotFound {
        /// The requested name.
        identifier: String,
        /// Every extension name in container order, `None` where absent.
        available: Vec<Option<String>>,
    },
    /// The selected extension carries no samples.
    #[error("selected extension has no image data")]
    EmptyData,
    /// Too many samples are NaN to produce a meaningful image.
    #[error(
        "image data contains {:.1}% NaN samples (limit {:.0}%)",
        .fraction * 100.0,
        .limit * 100.0
    )]
    TooManyInvalidSamples {
        /// Observed NaN fraction.
        fraction: f64,
        /// Fraction above which data is rejected.
        limit: f64,
    },
    /// The identifier is empty or not representable.
    #[error("invalid extension identifier: {0}")]
    InvalidIdentifier(String),
}

impl PreviewError {
    /// Returns `true` when the failure stems from the request itself.
    ///
    /// All pipeline failures are client errors; callers reserve server-class
    /// responses for their own I/O problems.
    pub fn is_client_error(&self) -> bool {
        match self {
            PreviewError::MalformedContainer(_)
            | PreviewError::OutOfRange { .. }
            | PreviewError::NotFound { .. }
            | PreviewError::EmptyData
            | PreviewError::TooManyInvalidSamples { .. }
            | PreviewError::InvalidIdentifier(_) => true,
        }
    }
}

/// Render a name list as `[A, -, B]`, with `-` standing for an unnamed extension.
pub fn format_names(names: &[Option<String>]) -> String {
    let mut out = String::from("[");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(name.as_deref().unwrap_or("-"));
    }
    out.push(']');
    out
}
