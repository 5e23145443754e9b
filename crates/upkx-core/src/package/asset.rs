//! Logical asset assembled from a GUID directory.

use crate::types::SafePath;

/// One asset of a package, with all of its parts gathered.
///
/// Content is owned. In extraction mode it is complete and bounded by the
/// asset-size limit; in prefix mode it may be truncated, which is flagged
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalAsset {
    /// GUID directory name.
    pub guid: String,

    /// Order in which the GUID was first encountered in the archive.
    pub index: usize,

    /// Validated relative path decoded from the `pathname` entry.
    pub path: SafePath,

    /// `true` for a folder asset (a `pathname` with no `asset` entry).
    pub is_folder: bool,

    /// Asset bytes, possibly a prefix when `truncated` is set.
    pub content: Vec<u8>,

    /// Declared size of the `asset` entry.
    pub size: u64,

    /// `content` holds only a prefix of the asset.
    pub truncated: bool,

    /// Bytes of the `asset.meta` sidecar.
    pub meta: Option<Vec<u8>>,

    /// Bytes of the `preview.png` thumbnail.
    pub preview_image: Option<Vec<u8>>,
}

impl LogicalAsset {
    /// Returns `true` if the package carried an `asset.meta` sidecar.
    #[inline]
    #[must_use]
    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    /// Returns `true` if the package carried a `preview.png` thumbnail.
    #[inline]
    #[must_use]
    pub fn has_preview_image(&self) -> bool {
        self.preview_image.is_some()
    }
}
