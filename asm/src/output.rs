use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::Error;

/// Writes `bytes` next to `path` and renames it into place; a failed run leaves `path` untouched.
pub fn write_image(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let fail = |err: std::io::Error| Error::IoFailure(path.display().to_string(), err);

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(fail)?;
    file.write_all(bytes).map_err(fail)?;
    file.as_file().sync_all().map_err(fail)?;
    file.persist(path).map_err(|err| fail(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"old").unwrap();

        write_image(&path, &[1, 2, 3]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("out.bin");
        assert!(matches!(
            write_image(&path, &[0]),
            Err(Error::IoFailure(..))
        ));
        assert!(!path.exists());
    }
}
