pub mod extnames;
pub mod render;

use std::path::Path;

use anyhow::{bail, Context, Result};

const FITS_SUFFIXES: [&str; 3] = ["fits", "fit", "fts"];

/// Read a FITS file, returning its bytes and its file name.
///
/// Files without a `.fits`, `.fit` or `.fts` suffix are refused before any
/// I/O happens.
pub fn read_fits(path: &Path) -> Result<(Vec<u8>, String)> {
    let is_fits = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FITS_SUFFIXES.iter().any(|s| ext.eq_ignore_ascii_case(s)));
    if !is_fits {
        bail!(
            "{} is not a FITS file (expected a .fits, .fit or .fts suffix)",
            path.display()
        );
    }

    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::debug!("read {} bytes from {filename}", bytes.len());
    Ok((bytes, filename))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_checked_before_reading() {
        let err = read_fits(Path::new("/nonexistent/image.png")).unwrap_err();
        assert!(err.to_string().contains("not a FITS file"), "{err}");
    }

    #[test]
    fn reads_bytes_and_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_sample(dir.path(), "AIA_0171.FITS");
        let (bytes, filename) = read_fits(&path).unwrap();
        assert_eq!(bytes.len(), 3 * 2880);
        assert_eq!(filename, "AIA_0171.FITS");
    }

    #[test]
    fn missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_fits(&dir.path().join("absent.fits")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }
}
