#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod container;
pub mod error;
pub mod header;
pub mod image;
pub mod normalize;
pub mod palette;
pub mod preview;
pub mod render;
pub mod resolve;
pub mod tiled;
pub mod value;

#[cfg(test)]
mod testing;

pub use container::{Container, Extension, ExtensionKind};
pub use error::{Error, PreviewError, Result};
pub use image::Matrix;
pub use normalize::{normalize, DisplayMatrix, EPSILON, MAX_INVALID_FRACTION};
pub use palette::{select_palette, wavelength_hint, Palette, DEFAULT_PALETTE};
pub use preview::{preview, Preview, PreviewOptions};
pub use render::{colorize, Raster};
pub use resolve::{list_extension_names, resolve, Identifier, Resolved, DEFAULT_EXTNAME};
