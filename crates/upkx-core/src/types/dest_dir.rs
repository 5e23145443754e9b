//! Validated destination directory type.

use crate::ExtractionError;
use crate::Result;
use std::path::Path;
use std::path::PathBuf;

use super::SafePath;

/// A validated, canonical directory that assets are written under.
///
/// Once constructed, a `DestDir` is guaranteed to exist, to be a directory
/// and to be represented as an absolute canonical path. Joining a
/// [`SafePath`] to it cannot leave it lexically.
///
/// # Examples
///
/// ```no_run
/// use upkx_core::types::DestDir;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dest = DestDir::create("/tmp/extraction")?;
/// println!("Extracting to: {}", dest.as_path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestDir(PathBuf);

impl DestDir {
    /// Validates an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist, is not a directory,
    /// or cannot be canonicalized.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let metadata = std::fs::metadata(&path).map_err(|e| ExtractionError::io(&path, e))?;
        if !metadata.is_dir() {
            return Err(ExtractionError::io(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("path is not a directory: {}", path.display()),
                ),
            ));
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| ExtractionError::io(&path, e))?;

        Ok(Self(canonical))
    }

    /// Creates the directory (and parents) if missing, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if creation or validation fails.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| ExtractionError::io(&path, e))?;
        Self::new(path)
    }

    /// Returns the path as a `&Path`.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Joins a validated asset path to this directory.
    #[inline]
    #[must_use]
    pub fn join(&self, safe_path: &SafePath) -> PathBuf {
        self.0.join(safe_path.to_path_buf())
    }

    /// Joins an already validated relative path to this directory.
    #[inline]
    #[must_use]
    pub fn join_path(&self, path: &Path) -> PathBuf {
        self.0.join(path)
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_dest_dir_valid() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dest = DestDir::new(temp.path()).expect("dest should be valid");
        assert!(dest.as_path().is_absolute());
    }

    #[test]
    fn test_dest_dir_nonexistent() {
        let result = DestDir::new("/nonexistent/directory/that/does/not/exist");
        assert!(matches!(result, Err(ExtractionError::Io { .. })));
    }

    #[test]
    fn test_dest_dir_not_a_directory() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let file_path = temp.path().join("file.txt");
        fs::write(&file_path, "test").expect("failed to write file");

        assert!(matches!(
            DestDir::new(file_path),
            Err(ExtractionError::Io { .. })
        ));
    }

    #[test]
    fn test_dest_dir_create_nested() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let nested = temp.path().join("a").join("b");
        let dest = DestDir::create(&nested).expect("should create nested");
        assert!(nested.is_dir());
        assert_eq!(dest.as_path(), nested.canonicalize().unwrap());
    }

    #[test]
    fn test_dest_dir_canonicalization() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let subdir = temp.path().join("subdir");
        fs::create_dir(&subdir).expect("failed to create subdir");

        let dest = DestDir::new(subdir.join(".").join("..")).expect("should create dest dir");
        assert_eq!(dest.as_path(), temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_join_safe_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dest = DestDir::new(temp.path()).unwrap();
        let safe = SafePath::from_pathname("Assets/Scripts/Player.cs").unwrap();

        let joined = dest.join(&safe);
        assert!(joined.starts_with(dest.as_path()));
        assert!(joined.ends_with("Assets/Scripts/Player.cs"));
    }
}
