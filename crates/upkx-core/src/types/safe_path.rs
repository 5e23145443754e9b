//! Validated relative asset path.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::ExtractionError;
use crate::Result;

/// Maximum number of components in an asset path.
pub const MAX_PATH_DEPTH: usize = 64;

/// A relative asset path that cannot escape the directory it is joined to.
///
/// `SafePath` is decoded from a package's `pathname` entry and rejects:
/// - Absolute, rooted and drive-prefixed paths
/// - Parent directory traversal (`..`)
/// - Null bytes and `:` (drive letters, alternate data streams)
/// - Empty paths and excessive depth
///
/// Separators are normalized to `/` and `.`/empty components are dropped, so
/// validation is identical on every platform.
///
/// # Security Properties
///
/// - Can ONLY be constructed through validation
/// - NO `From<String>` implementation
///
/// # Examples
///
/// ```
/// use upkx_core::types::SafePath;
///
/// let safe = SafePath::from_pathname("Assets\\Scripts/./Player.cs")?;
/// assert_eq!(safe.as_str(), "Assets/Scripts/Player.cs");
///
/// assert!(SafePath::from_pathname("../../etc/passwd").is_err());
/// assert!(SafePath::from_pathname("C:/Windows/evil.dll").is_err());
/// # Ok::<(), upkx_core::ExtractionError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafePath(String);

impl SafePath {
    /// Validates a `pathname` string.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::UnsafePath` if any check fails.
    pub fn from_pathname(raw: &str) -> Result<Self> {
        let reject = || ExtractionError::UnsafePath {
            path: raw.to_string(),
        };

        if raw.contains('\0') {
            return Err(reject());
        }

        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(reject());
        }

        let mut components = Vec::new();
        for component in unified.split('/') {
            match component {
                "" | "." => {}
                ".." => return Err(reject()),
                c if c.contains(':') => return Err(reject()),
                c => components.push(c),
            }
        }

        if components.is_empty() || components.len() > MAX_PATH_DEPTH {
            return Err(reject());
        }

        Ok(Self(components.join("/")))
    }

    /// Returns the normalized path with `/` separators.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path as a platform `PathBuf`.
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.split('/').collect()
    }

    /// Iterates over the path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns the final component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the lowercased extension of the final component, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Returns the parent path, or `None` for a single component.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }
}

impl fmt::Display for SafePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
