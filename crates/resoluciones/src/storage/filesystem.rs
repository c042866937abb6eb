use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on same
/// filesystem). Falls back to copy + delete when rename fails, which covers
/// moves from local staging onto a network share.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    copy_preserving_mtime(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Copies `src` to `dst` and carries the modification time over.
///
/// Content and permissions come from `std::fs::copy`; the mtime is applied
/// afterwards and is best effort where the platform refuses it.
pub fn copy_preserving_mtime(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let bytes = std::fs::copy(src, dst)?;

    let modified = std::fs::metadata(src).and_then(|m| m.modified());
    if let Ok(modified) = modified {
        let applied = std::fs::File::options()
            .write(true)
            .open(dst)
            .and_then(|f| f.set_modified(modified));
        if let Err(e) = applied {
            log::debug!("Could not preserve mtime on {}: {}", dst.display(), e);
        }
    }

    Ok(bytes)
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Returns the first name in `directory` that `exists` reports as free:
/// `name`, then `stem_1.ext`, `stem_2.ext`, ...
///
/// The existence check is injected so the search can run without touching
/// the filesystem. Only safe with a single writer per directory.
pub fn first_available_name<F>(directory: &Path, filename: &str, exists: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let path = directory.join(filename);
    if !exists(&path) {
        return path;
    }

    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    };

    (1u64..)
        .map(|counter| match ext {
            Some(ext) => directory.join(format!("{}_{}{}", base, counter, ext)),
            None => directory.join(format!("{}_{}", base, counter)),
        })
        .find(|candidate| !exists(candidate))
        .unwrap_or(path)
}

/// [`first_available_name`] against the real filesystem.
///
/// Uses `symlink_metadata` so broken symlinks also count as occupied.
pub fn available_path(directory: &Path, filename: &str) -> PathBuf {
    first_available_name(directory, filename, |p| std::fs::symlink_metadata(p).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn occupied(names: &[&str]) -> impl Fn(&Path) -> bool {
        let taken: HashSet<PathBuf> = names.iter().map(|n| Path::new("/dir").join(n)).collect();
        move |p: &Path| taken.contains(p)
    }

    #[test]
    fn test_first_available_name_free() {
        let path = first_available_name(Path::new("/dir"), "a.pdf", occupied(&[]));
        assert_eq!(path, Path::new("/dir/a.pdf"));
    }

    #[test]
    fn test_first_available_name_numbering_sequence() {
        let path = first_available_name(Path::new("/dir"), "a.pdf", occupied(&["a.pdf"]));
        assert_eq!(path, Path::new("/dir/a_1.pdf"));

        let path = first_available_name(
            Path::new("/dir"),
            "a.pdf",
            occupied(&["a.pdf", "a_1.pdf"]),
        );
        assert_eq!(path, Path::new("/dir/a_2.pdf"));
    }

    #[test]
    fn test_first_available_name_fills_gaps() {
        let path = first_available_name(
            Path::new("/dir"),
            "a.pdf",
            occupied(&["a.pdf", "a_2.pdf"]),
        );
        assert_eq!(path, Path::new("/dir/a_1.pdf"));
    }

    #[test]
    fn test_first_available_name_no_extension() {
        let path = first_available_name(Path::new("/dir"), "noext", occupied(&["noext"]));
        assert_eq!(path, Path::new("/dir/noext_1"));
    }

    #[test]
    fn test_first_available_name_dotfile() {
        let path = first_available_name(Path::new("/dir"), ".hidden", occupied(&[".hidden"]));
        assert_eq!(path, Path::new("/dir/.hidden_1"));
    }

    #[test]
    fn test_available_path_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("doc.pdf"), b"first").unwrap();

        let path = available_path(temp_dir.path(), "doc.pdf");
        assert_eq!(path, temp_dir.path().join("doc_1.pdf"));
    }

    #[test]
    fn test_move_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.pdf");
        let dst = temp_dir.path().join("dst.pdf");
        std::fs::write(&src, b"content").unwrap();

        move_file(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"content");
    }

    #[test]
    fn test_move_missing_source_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = move_file(
            &temp_dir.path().join("nonexistent.pdf"),
            &temp_dir.path().join("dst.pdf"),
        );

        match result {
            Err(StorageError::MoveFile { from, .. }) => {
                assert!(from.to_string_lossy().contains("nonexistent.pdf"));
            }
            _ => panic!("Expected MoveFile error"),
        }
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.pdf");
        let dst = temp_dir.path().join("dst.pdf");
        std::fs::write(&src, b"content").unwrap();

        let old = SystemTime::now() - Duration::from_secs(10 * 24 * 3600);
        std::fs::File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        copy_preserving_mtime(&src, &dst).unwrap();

        let copied = std::fs::metadata(&dst).unwrap().modified().unwrap();
        let delta = copied
            .duration_since(old)
            .unwrap_or_else(|e| e.duration());
        assert!(delta < Duration::from_secs(2));
        assert!(src.exists());
    }

    #[test]
    fn test_ensure_directory_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("deep/nested/dir");
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
