//! Moving processed originals out of the watch directory
//!
//! Archived names carry a local timestamp suffix, e.g.
//! `receipt.jpg` → `receipt_20250115_093012.jpg`. A numeric suffix is added
//! when that name is taken too.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Timestamp format appended to archived file names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Give up looking for a free name after this many candidates
const MAX_COLLISIONS: u32 = 1000;

/// File name for `source` inside the archive, before collision handling
pub fn archive_name(source: &Path, now: DateTime<Local>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let stamp = now.format(TIMESTAMP_FORMAT);
    match source.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    }
}

/// First unused destination path in `archive_dir`
pub fn archive_path(archive_dir: &Path, source: &Path, now: DateTime<Local>) -> io::Result<PathBuf> {
    let name = archive_name(source, now);
    let candidate = archive_dir.join(&name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let name = Path::new(&name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    for n in 1..=MAX_COLLISIONS {
        let file_name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = archive_dir.join(file_name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free archive name for {}", source.display()),
    ))
}

/// Move `source` into `archive_dir`, returning the new path
///
/// Uses a rename. When that fails (e.g. across filesystems) the file is
/// copied and the original removed; if the removal fails the copy is
/// deleted again so the document exists in exactly one place.
pub fn archive_file(source: &Path, archive_dir: &Path) -> io::Result<PathBuf> {
    let destination = archive_path(archive_dir, source, Local::now())?;

    if fs::rename(source, &destination).is_ok() {
        return Ok(destination);
    }

    fs::copy(source, &destination)?;
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(&destination);
        return Err(e);
    }
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 15, 9, 30, 12).unwrap()
    }

    #[test]
    fn test_archive_name_keeps_extension() {
        let name = archive_name(Path::new("/in/receipt.jpg"), fixed_time());
        assert_eq!(name, "receipt_20250115_093012.jpg");

        let name = archive_name(Path::new("/in/scan.tar.pdf"), fixed_time());
        assert_eq!(name, "scan.tar_20250115_093012.pdf");

        let name = archive_name(Path::new("/in/README"), fixed_time());
        assert_eq!(name, "README_20250115_093012");
    }

    #[test]
    fn test_archive_path_disambiguates() {
        let dir = tempfile::tempdir().unwrap();
        let source = Path::new("/in/receipt.jpg");

        let first = archive_path(dir.path(), source, fixed_time()).unwrap();
        fs::write(&first, b"x").unwrap();
        let second = archive_path(dir.path(), source, fixed_time()).unwrap();
        fs::write(&second, b"x").unwrap();
        let third = archive_path(dir.path(), source, fixed_time()).unwrap();

        assert_eq!(first.file_name().unwrap(), "receipt_20250115_093012.jpg");
        assert_eq!(second.file_name().unwrap(), "receipt_20250115_093012_1.jpg");
        assert_eq!(third.file_name().unwrap(), "receipt_20250115_093012_2.jpg");
    }

    #[test]
    fn test_archive_file_moves() {
        let watch = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let source = watch.path().join("invoice.pdf");
        fs::write(&source, b"%PDF-1.4").unwrap();

        let moved = archive_file(&source, archive.path()).unwrap();

        assert!(!source.exists());
        assert!(moved.starts_with(archive.path()));
        assert_eq!(fs::read(&moved).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_archive_file_missing_source_fails() {
        let archive = tempfile::tempdir().unwrap();
        let missing = archive.path().join("nope.jpg");
        assert!(archive_file(&missing, archive.path()).is_err());
    }
}
