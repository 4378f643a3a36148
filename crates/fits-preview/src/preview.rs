//! The end-to-end preview pipeline.

use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use crate::container::Container;
use crate::error::PreviewError;
use crate::normalize::{normalize_samples, DisplayMatrix, MAX_INVALID_FRACTION};
use crate::palette::{select_palette, Palette};
use crate::render::{colorize, Raster};
use crate::resolve::{resolve_with_default, Identifier, DEFAULT_EXTNAME};

/// Caller-owned settings for [`preview`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    /// Name looked up for [`Identifier::Default`].
    pub default_extension: String,
    /// NaN fraction above which data is rejected.
    pub max_invalid_fraction: f64,
    /// Palette to use instead of the filename-derived one.
    pub palette: Option<Palette>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        PreviewOptions {
            default_extension: String::from(DEFAULT_EXTNAME),
            max_invalid_fraction: MAX_INVALID_FRACTION,
            palette: None,
        }
    }
}

/// A resolved and normalized extension, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub display: DisplayMatrix,
    pub palette: Palette,
    /// Wavelength parsed from the filename, if any.
    pub wavelength: Option<u32>,
    pub extension_index: usize,
    pub extension_name: Option<String>,
    /// Every extension name in the file, `None` where absent.
    pub available: Vec<Option<String>>,
}

impl Preview {
    pub fn render(&self) -> Raster {
        colorize(&self.display, self.palette)
    }
}

/// Parse `bytes`, select the extension named by `identifier`, and normalize
/// it for display. `filename` only feeds palette selection.
pub fn preview(
    bytes: &[u8],
    identifier: &Identifier,
    filename: &str,
    options: &PreviewOptions,
) -> Result<Preview, PreviewError> {
    let container = Container::parse(bytes)?;
    let resolved = resolve_with_default(&container, identifier, &options.default_extension)?;
    let display = normalize_samples(&resolved.matrix, options.max_invalid_fraction)?;

    let (wavelength, derived) = select_palette(filename);
    let palette = options.palette.unwrap_or(derived);
    debug!(
        "{filename}: extension {} with palette {palette} (wavelength {wavelength:?})",
        resolved.index
    );

    Ok(Preview {
        display,
        palette,
        wavelength,
        extension_index: resolved.index,
        extension_name: resolved.name,
        available: resolved.names,
    })
}
