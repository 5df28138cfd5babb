//! Atomic CSV file helpers shared by both tables

use crate::error::{Result, StoreError};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Date format used in every table
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render a numeric cell. Shortest round-trip form keeps output byte-stable.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        // Collapse -0.0 so sign noise never changes the bytes written
        return "0".to_string();
    }
    value.to_string()
}

/// Write a file by streaming into a sibling temp file and renaming it over the target
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if path.file_name().is_none() {
        return Err(StoreError::invalid_operation(format!("{:?} is not a file path", path)));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);

    if let Err(e) = write(&mut writer) {
        drop(writer);
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))?
        .sync_all()?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_value_is_stable() {
        assert_eq!(format_value(20.0), "20");
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(22.5), "22.5");
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");
        fs::write(&path, "old").unwrap();

        let result = write_atomic(&path, |_| Err(StoreError::invalid_operation("boom")));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("table.csv");

        write_atomic(&path, |w| {
            w.write_all(b"a,b\n")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");
    }
}
