//! Extension selection.
//!
//! An [`Identifier`] names the extension a caller wants to preview, either
//! by `EXTNAME` or by position. [`resolve`] turns it into a decoded
//! [`Matrix`], skipping extensions that carry no image data.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use log::debug;

use crate::container::{Container, Extension};
use crate::error::PreviewError;
use crate::image::Matrix;

/// Extension name used when the caller does not ask for one.
pub const DEFAULT_EXTNAME: &str = "COMPRESSED_IMAGE";

/// How the caller selects an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Match on `EXTNAME`.
    Name(String),
    /// Container position; negative values count from the end.
    Index(i64),
    /// The configured default name.
    Default,
}

impl Identifier {
    /// Classify a raw selector string.
    ///
    /// `None` selects the default extension. A string of ASCII digits with an
    /// optional leading `-` is an index; anything else is a name.
    pub fn parse(raw: Option<&str>) -> Result<Identifier, PreviewError> {
        let Some(raw) = raw else {
            return Ok(Identifier::Default);
        };
        if raw.is_empty() {
            return Err(PreviewError::InvalidIdentifier(String::from(
                "empty extension identifier",
            )));
        }
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse::<i64>().map(Identifier::Index).map_err(|_| {
                PreviewError::InvalidIdentifier(alloc::format!("index '{raw}' is out of bounds"))
            });
        }
        Ok(Identifier::Name(String::from(raw)))
    }
}

impl FromStr for Identifier {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(Some(s))
    }
}

impl From<i64> for Identifier {
    fn from(index: i64) -> Self {
        Identifier::Index(index)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Name(name) => f.write_str(name),
            Identifier::Index(index) => write!(f, "{index}"),
            Identifier::Default => f.write_str("<default>"),
        }
    }
}

/// The outcome of a successful [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Position of the chosen extension.
    pub index: usize,
    /// Its `EXTNAME`, if any.
    pub name: Option<String>,
    /// Its first image plane.
    pub matrix: Matrix,
    /// Every extension name in container order.
    pub names: Vec<Option<String>>,
}

/// Resolve `identifier` against `container`, using [`DEFAULT_EXTNAME`] for
/// [`Identifier::Default`].
pub fn resolve(
    container: &Container<'_>,
    identifier: &Identifier,
) -> Result<Resolved, PreviewError> {
    resolve_with_default(container, identifier, DEFAULT_EXTNAME)
}

/// Resolve `identifier`, with `default_name` standing in for
/// [`Identifier::Default`].
///
/// Indices fail with `OutOfRange` outside `[-count, count - 1]` and with
/// `EmptyData` when the position holds no image. Names return the first
/// extension that both matches and carries data; same-named header-only
/// extensions are skipped.
pub fn resolve_with_default(
    container: &Container<'_>,
    identifier: &Identifier,
    default_name: &str,
) -> Result<Resolved, PreviewError> {
    let names = container.extension_names();
    let extension = match identifier {
        Identifier::Index(index) => by_index(container, *index)?,
        Identifier::Name(name) => by_name(container, name, &names)?,
        Identifier::Default => by_name(container, default_name, &names)?,
    };
    debug!(
        "resolved {identifier} to extension {} ({})",
        extension.index(),
        extension.name().unwrap_or("-")
    );

    let matrix = extension.matrix()?.ok_or(PreviewError::EmptyData)?;
    Ok(Resolved {
        index: extension.index(),
        name: extension.name().map(String::from),
        matrix,
        names,
    })
}

fn by_index<'c, 'a>(
    container: &'c Container<'a>,
    index: i64,
) -> Result<&'c Extension<'a>, PreviewError> {
    let count = container.len();
    let position = if index < 0 {
        (count as i64).checked_add(index)
    } else {
        Some(index)
    };
    let extension = position
        .and_then(|p| usize::try_from(p).ok())
        .and_then(|p| container.get(p))
        .ok_or(PreviewError::OutOfRange { index, count })?;
    if !extension.has_matrix() {
        debug!("extension {} has no image data", extension.index());
        return Err(PreviewError::EmptyData);
    }
    Ok(extension)
}

fn by_name<'c, 'a>(
    container: &'c Container<'a>,
    name: &str,
    names: &[Option<String>],
) -> Result<&'c Extension<'a>, PreviewError> {
    container
        .iter()
        .find(|ext| ext.name() == Some(name) && ext.has_matrix())
        .ok_or_else(|| PreviewError::NotFound {
            identifier: name.to_string(),
            available: names.to_vec(),
        })
}

/// List every extension name of a FITS file, `None` where `EXTNAME` is absent.
pub fn list_extension_names(bytes: &[u8]) -> Result<Vec<Option<String>>, PreviewError> {
    Ok(Container::parse(bytes)?.extension_names())
}
