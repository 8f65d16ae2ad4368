use std::{fs, path::Path};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory, ignoring paths that don't exist.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Copies `from` to `to`, returning the number of bytes written.
///
/// The parent directory of `to` must already exist.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> FileSystemResult<u64> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::copy(from, to).map_err(|err| FileSystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: err,
    })
}

/// Returns true when `name` is a single normal path component.
///
/// Rejects empty names, `.`/`..`, and anything containing a path separator or NUL.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_safe_remove_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("blob");
        fs::write(&file_path, "hello").unwrap();
        safe_remove(&file_path).unwrap();
        assert!(!file_path.exists());
    }

    #[test]
    fn test_safe_remove_dir_and_missing() {
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("sub");
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("inner"), "x").unwrap();
        safe_remove(&sub_dir).unwrap();
        assert!(!sub_dir.exists());
        safe_remove(dir.path().join("never-existed")).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists_on_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_copy_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("pkg-1.0.tar.gz");
        fs::write(&src, b"payload").unwrap();
        assert_eq!(copy_file(&src, &dst).unwrap(), 7);
        assert_eq!(fs::read(&dst).unwrap(), b"payload");

        let err = copy_file(dir.path().join("missing"), &dst).unwrap_err();
        assert!(matches!(err, FileSystemError::Copy { .. }));
    }

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("pkg-1.0-py3-none-any.whl"));
        assert!(is_plain_file_name(".hidden.tar.gz"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../evil.whl"));
        assert!(!is_plain_file_name("dir/pkg.whl"));
        assert!(!is_plain_file_name("dir\\pkg.whl"));
    }
}
