use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{BuildError, Result};
use crate::paths;

/// `clean:<path> [-r]`: removes a file, or a directory when `-r` is given.
/// A path that does not exist is already clean.
pub fn clean(base_dir: &Path, path: &str, recursive: bool) -> Result<()> {
    let full = paths::resolve(base_dir, path);

    let metadata = match fs::symlink_metadata(&full) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(BuildError::io(full, e)),
    };

    if metadata.is_dir() {
        if !recursive {
            return Err(BuildError::command(format!(
                "{:?} is a directory and \"-r\" was not specified",
                path
            )));
        }
        fs::remove_dir_all(&full).map_err(|e| BuildError::io(&full, e))
    } else {
        fs::remove_file(&full).map_err(|e| BuildError::io(&full, e))
    }
}

/// `mkdir:<path>`: creates the directory and its parents unless it exists.
pub fn make_dir(base_dir: &Path, path: &str) -> Result<()> {
    let full = paths::resolve(base_dir, path);

    match fs::metadata(&full) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(BuildError::command(format!(
            "will not overwrite non-directory {:?}",
            path
        ))),
        Err(_) => fs::create_dir_all(&full).map_err(|e| BuildError::io(full, e)),
    }
}

/// `copy:<source>`: replaces `destination` with the contents of `source`.
pub fn copy(base_dir: &Path, source: &str, destination: &str) -> Result<()> {
    let from = paths::resolve(base_dir, source);
    let to = paths::resolve(base_dir, destination);

    let metadata = fs::metadata(&from).map_err(|e| BuildError::io(&from, e))?;
    if metadata.is_dir() {
        return Err(BuildError::command(format!(
            "copy source {:?} must be a file",
            source
        )));
    }

    fs::copy(&from, &to).map_err(|e| BuildError::io(&to, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.o"), "x").unwrap();

        clean(dir.path(), "out.o", false).unwrap();
        assert!(!dir.path().join("out.o").exists());
    }

    #[test]
    fn test_clean_absent_path_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(clean(dir.path(), "never/there", false).is_ok());
    }

    #[test]
    fn test_clean_directory_needs_recursive_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/sub")).unwrap();
        fs::write(dir.path().join("build/sub/file"), "x").unwrap();

        let result = clean(dir.path(), "build", false);
        assert!(matches!(result, Err(BuildError::CommandFailure(_))));
        assert!(dir.path().join("build").exists());

        clean(dir.path(), "build", true).unwrap();
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn test_make_dir() {
        let dir = tempfile::tempdir().unwrap();

        make_dir(dir.path(), "a/b/c").unwrap();
        assert!(dir.path().join("a/b/c").is_dir());

        make_dir(dir.path(), "a/b/c").unwrap();
    }

    #[test]
    fn test_make_dir_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("file"), "x").unwrap();

        assert!(make_dir(dir.path(), "file").is_err());
    }

    #[test]
    fn test_copy_overwrites_destination() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("src.txt"), "new contents").unwrap();
        fs::write(dir.path().join("dst.txt"), "old contents that are longer").unwrap();

        copy(dir.path(), "src.txt", "dst.txt").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("dst.txt")).unwrap(),
            "new contents"
        );
    }

    #[test]
    fn test_copy_rejects_missing_source_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("folder")).unwrap();

        assert!(matches!(
            copy(dir.path(), "missing.txt", "dst.txt"),
            Err(BuildError::Io { .. })
        ));
        assert!(matches!(
            copy(dir.path(), "folder", "dst.txt"),
            Err(BuildError::CommandFailure(_))
        ));
    }
}
