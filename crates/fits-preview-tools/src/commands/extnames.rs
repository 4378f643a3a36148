use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use fits_preview::list_extension_names;

use super::read_fits;

#[derive(FromArgs, Debug)]
/// List every extension of a FITS file by index and name
#[argh(subcommand, name = "extnames")]
pub struct ExtnamesCmd {
    /// input FITS file
    #[argh(positional)]
    pub input: PathBuf,
}

/// One `index<TAB>name` line per extension, `-` for unnamed ones.
fn format_listing(names: &[Option<String>]) -> String {
    let mut out = String::new();
    for (index, name) in names.iter().enumerate() {
        let _ = writeln!(out, "{index}\t{}", name.as_deref().unwrap_or("-"));
    }
    out
}

pub fn handle_extnames_command(cmd: ExtnamesCmd) -> Result<()> {
    let (bytes, _) = read_fits(&cmd.input)?;
    let names = list_extension_names(&bytes)?;
    print!("{}", format_listing(&names));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::write_sample;

    #[test]
    fn listing_marks_unnamed() {
        let names = [None, Some("SCI".to_string()), Some("ERR".to_string())];
        assert_eq!(format_listing(&names), "0\t-\n1\tSCI\n2\tERR\n");
    }

    #[test]
    fn lists_sample_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "sample.fits");
        handle_extnames_command(ExtnamesCmd { input }).unwrap();
    }

    #[test]
    fn rejects_non_fits_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("junk.fits");
        std::fs::write(&input, vec![b'x'; 2880]).unwrap();
        let err = handle_extnames_command(ExtnamesCmd { input }).unwrap_err();
        assert!(err.to_string().contains("malformed FITS"), "{err}");
    }
}
