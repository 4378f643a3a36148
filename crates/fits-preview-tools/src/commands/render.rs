use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use fits_preview::{
    preview, Identifier, Palette, Preview, PreviewError, PreviewOptions, Raster, DEFAULT_EXTNAME,
};
use image::{ImageFormat, RgbaImage};
use log::warn;

use super::read_fits;

#[derive(FromArgs, Debug)]
/// Render one image extension of a FITS file to a PNG
#[argh(subcommand, name = "render")]
pub struct RenderCmd {
    /// input FITS file
    #[argh(positional)]
    pub input: PathBuf,

    /// extension name or index; negative indices count from the end
    #[argh(option, short = 'e')]
    pub extension: Option<String>,

    /// output PNG path [default: input path with a .png suffix]
    #[argh(option, short = 'o')]
    pub output: Option<PathBuf>,

    /// palette override: plasma, viridis or sdoaia<wavelength>
    #[argh(option)]
    pub palette: Option<Palette>,

    /// extension name used when -e is not given [default: COMPRESSED_IMAGE]
    #[argh(option, default = "String::from(DEFAULT_EXTNAME)")]
    pub default_extension: String,

    /// render the last extension when the requested name is not found
    #[argh(switch)]
    pub fallback_last: bool,
}

/// Run the pipeline, retrying with the last extension on `NotFound` when
/// `fallback_last` is set.
fn build_preview(
    bytes: &[u8],
    identifier: &Identifier,
    filename: &str,
    options: &PreviewOptions,
    fallback_last: bool,
) -> Result<Preview, PreviewError> {
    match preview(bytes, identifier, filename, options) {
        Err(PreviewError::NotFound { identifier: name, .. }) if fallback_last => {
            warn!("extension '{name}' not found, falling back to the last extension");
            preview(bytes, &Identifier::Index(-1), filename, options)
        }
        other => other,
    }
}

fn write_png(raster: &Raster, path: &Path) -> Result<()> {
    let image = RgbaImage::from_raw(
        u32::try_from(raster.width())?,
        u32::try_from(raster.height())?,
        raster.as_bytes().to_vec(),
    )
    .context("raster buffer does not match its dimensions")?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn handle_render_command(cmd: RenderCmd) -> Result<()> {
    let (bytes, filename) = read_fits(&cmd.input)?;
    let identifier = Identifier::parse(cmd.extension.as_deref())?;
    let options = PreviewOptions {
        default_extension: cmd.default_extension,
        palette: cmd.palette,
        ..PreviewOptions::default()
    };

    let preview = build_preview(&bytes, &identifier, &filename, &options, cmd.fallback_last)
        .with_context(|| format!("cannot preview {filename}"))?;
    let output = cmd
        .output
        .unwrap_or_else(|| cmd.input.with_extension("png"));
    write_png(&preview.render(), &output)?;

    let wavelength = preview
        .wavelength
        .map_or_else(|| "-".to_string(), |w| format!("{w} A"));
    println!(
        "{}: extension {} ({}), wavelength {wavelength}, palette {} -> {}",
        filename,
        preview.extension_index,
        preview.extension_name.as_deref().unwrap_or("-"),
        preview.palette,
        output.display()
    );
    Ok(())
}
