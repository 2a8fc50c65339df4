//! `.partner` file access.
//!
//! - File-name validation happens before any read or write
//! - Atomic writes: write to temp file, sync to disk, then rename

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Required file extension, compared case-insensitively.
pub const EXTENSION: &str = ".partner";

/// Check that `name` designates a `.partner` file.
///
/// Looks at the name only, never at the content.
///
/// # Errors
///
/// Returns `Error::InvalidFileType` for any other name.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.to_lowercase().ends_with(EXTENSION) {
        Ok(())
    } else {
        Err(Error::InvalidFileType {
            name: name.to_string(),
        })
    }
}

fn validate_path(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    validate_file_name(&name)
}

/// Read a `.partner` file as UTF-8 text.
///
/// # Errors
///
/// Returns an error if the name is not a `.partner` file, the file does
/// not exist, or it cannot be read as UTF-8.
pub fn read_partner_file(path: &Path) -> Result<String> {
    validate_path(path)?;

    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(fs::read_to_string(path)?)
}

/// Write a `.partner` file atomically.
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if the name is not a `.partner` file or any file
/// operation fails.
pub fn write_partner_file(path: &Path, content: &str) -> Result<()> {
    validate_path(path)?;
    write_atomic(path, content.as_bytes())
}

/// Write `bytes` to `path` through a synced temp file and a rename.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("atlas.partner").is_ok());
        assert!(validate_file_name("ATLAS.PARTNER").is_ok());
        assert!(validate_file_name("Atlas.Partner").is_ok());
        assert!(matches!(
            validate_file_name("atlas.partner.txt"),
            Err(Error::InvalidFileType { .. })
        ));
        assert!(validate_file_name("atlas.csv").is_err());
        assert!(validate_file_name("partner").is_err());
    }

    #[test]
    fn test_read_rejects_wrong_extension_before_reading() {
        // The file does not exist: the type check must fire first.
        let result = read_partner_file(Path::new("/nonexistent/atlas.json"));
        assert!(matches!(result, Err(Error::InvalidFileType { .. })));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_partner_file(Path::new("/nonexistent/atlas.partner"));
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("atlas.partner");

        write_partner_file(&path, "name__:Atlas;\n").unwrap();
        assert_eq!(read_partner_file(&path).unwrap(), "name__:Atlas;\n");
        assert!(!temp_dir.path().join("nested").join("atlas.partner.tmp").exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exports").join("orders.xlsx");

        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"id,reference\n").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"id,reference\n");
        assert!(!temp_dir.path().join("exports").join("orders.xlsx.tmp").exists());
    }
}
