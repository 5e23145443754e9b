//! Error types for package extraction operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// The extraction limit that was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// A single asset's content exceeded `max_asset_bytes`.
    AssetBytes,
    /// The running package total exceeded `max_package_bytes`.
    PackageBytes,
    /// The number of assets exceeded `max_assets`.
    AssetCount,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetBytes => write!(f, "asset size"),
            Self::PackageBytes => write!(f, "package size"),
            Self::AssetCount => write!(f, "asset count"),
        }
    }
}

/// Classification of an I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFailureKind {
    /// The target volume ran out of space.
    DiskFull,
    /// Any other I/O failure.
    Other,
}

/// Errors that can occur while reading, previewing or extracting a package.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Gzip or tar framing is malformed.
    #[error("corrupt package: {0}")]
    ArchiveCorrupt(String),

    /// The decompressed stream grew disproportionately to the compressed input.
    #[error(
        "decompression bomb suspected: compressed={compressed} bytes, decompressed={decompressed} bytes (ratio: {ratio:.2})"
    )]
    DecompressionBombSuspected {
        /// Compressed bytes consumed so far.
        compressed: u64,
        /// Decompressed bytes produced so far.
        decompressed: u64,
        /// Observed ratio.
        ratio: f64,
    },

    /// An extraction limit was exceeded.
    #[error("limit exceeded: {kind} ({actual} > {limit})")]
    LimitExceeded {
        /// Which limit was breached.
        kind: LimitKind,
        /// The configured limit.
        limit: u64,
        /// The observed value.
        actual: u64,
    },

    /// A GUID directory never received a `pathname` entry.
    ///
    /// Diagnostic only: the engine records these as warnings and never
    /// returns this variant from an extraction.
    #[error("asset {guid} has no pathname entry")]
    AssetMissingPathname {
        /// GUID of the orphaned bucket.
        guid: String,
    },

    /// An asset's `pathname` would escape the output root.
    #[error("unsafe asset path: {path}")]
    UnsafePath {
        /// The offending path as stored in the package.
        path: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error at {path}: {message}")]
    Io {
        /// Disk-full or generic failure.
        kind: IoFailureKind,
        /// The path being written or read.
        path: PathBuf,
        /// Human-readable description.
        message: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The job was cancelled cooperatively.
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Wraps an I/O error as a generic failure at `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            kind: IoFailureKind::Other,
            path: path.into(),
            message: source.to_string(),
            source,
        }
    }

    /// Wraps an I/O error as a disk-full failure with a user-facing message.
    pub fn disk_full(path: impl Into<PathBuf>, message: String, source: std::io::Error) -> Self {
        Self::Io {
            kind: IoFailureKind::DiskFull,
            path: path.into(),
            message,
            source,
        }
    }

    /// Builds a `LimitExceeded` error.
    #[must_use]
    pub const fn limit(kind: LimitKind, limit: u64, actual: u64) -> Self {
        Self::LimitExceeded {
            kind,
            limit,
            actual,
        }
    }

    /// Returns `true` if the package itself is hostile or malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use upkx_core::ExtractionError;
    ///
    /// let err = ExtractionError::UnsafePath {
    ///     path: "../../etc/passwd".into(),
    /// };
    /// assert!(err.is_security_violation());
    /// assert!(!ExtractionError::Cancelled.is_security_violation());
    /// ```
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::DecompressionBombSuspected { .. }
                | Self::LimitExceeded { .. }
                | Self::UnsafePath { .. }
        )
    }

    /// Returns `true` if this error aborts a job and requires rollback.
    #[must_use]
    pub const fn is_cleanup_required(&self) -> bool {
        !matches!(self, Self::AssetMissingPathname { .. })
    }

    /// Returns the breached limit kind, if applicable.
    #[must_use]
    pub const fn limit_kind(&self) -> Option<LimitKind> {
        match self {
            Self::LimitExceeded { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` for disk-full I/O failures.
    #[must_use]
    pub const fn is_disk_full(&self) -> bool {
        matches!(
            self,
            Self::Io {
                kind: IoFailureKind::DiskFull,
                ..
            }
        )
    }
}

/// Errors raised by the malicious content scanner.
///
/// Findings are never errors; these only cover unusable rules or unreadable
/// input.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A rule pattern failed to compile.
    #[error("invalid scan rule '{rule}': {source}")]
    InvalidRule {
        /// Rule name.
        rule: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// A rule set file could not be parsed.
    #[error("invalid rule set: {0}")]
    RulesParse(#[from] serde_json::Error),

    /// A file to scan could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The package could not be decoded.
    #[error(transparent)]
    Package(#[from] ExtractionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_exceeded_display() {
        let err = ExtractionError::limit(LimitKind::AssetBytes, 10, 11);
        let display = err.to_string();
        assert!(display.contains("asset size"));
        assert!(display.contains("11 > 10"));
        assert_eq!(err.limit_kind(), Some(LimitKind::AssetBytes));
        assert!(err.is_security_violation());
    }

    #[test]
    fn test_bomb_display() {
        let err = ExtractionError::DecompressionBombSuspected {
            compressed: 1000,
            decompressed: 1_000_000,
            ratio: 1000.0,
        };
        assert!(err.to_string().contains("decompression bomb"));
        assert!(err.to_string().contains("1000.00"));
        assert!(err.is_security_violation());
    }

    #[test]
    fn test_io_helpers() {
        let source = std::io::Error::other("boom");
        let err = ExtractionError::io("/tmp/x", source);
        assert!(!err.is_disk_full());
        assert!(err.to_string().contains("/tmp/x"));

        let source = std::io::Error::other("no space");
        let err = ExtractionError::disk_full("/tmp/y", "Drive / is full".into(), source);
        assert!(err.is_disk_full());
        assert!(err.to_string().contains("Drive / is full"));
    }

    #[test]
    fn test_io_source_chain() {
        use std::error::Error;

        let err = ExtractionError::io("a", std::io::Error::other("inner"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_missing_pathname_is_diagnostic() {
        let err = ExtractionError::AssetMissingPathname {
            guid: "abc".into(),
        };
        assert!(!err.is_cleanup_required());
        assert!(!err.is_security_violation());
        assert!(ExtractionError::Cancelled.is_cleanup_required());
    }
}
