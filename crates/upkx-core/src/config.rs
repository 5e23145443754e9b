//! Configuration values for extraction, preview and scanning.
//!
//! Every value here is an explicit, immutable input to a job. Nothing is read
//! from global state.

use std::num::NonZeroUsize;
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Resource limits applied to an extraction job.
///
/// Use [`ExtractionLimits::normalize`] before enforcing; the extractor does
/// this itself for limits passed through [`ExtractionOptions`].
///
/// # Examples
///
/// ```
/// use upkx_core::ExtractionLimits;
///
/// let limits = ExtractionLimits {
///     max_asset_bytes: 100 * 1024 * 1024,
///     max_package_bytes: 10, // smaller than one asset
///     max_assets: 0,         // out of range
/// }
/// .normalize();
///
/// assert_eq!(limits.max_package_bytes, 100 * 1024 * 1024);
/// assert_eq!(limits.max_assets, ExtractionLimits::DEFAULT_MAX_ASSETS);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Maximum content size of a single asset in bytes.
    pub max_asset_bytes: u64,

    /// Maximum total asset bytes for the whole package.
    pub max_package_bytes: u64,

    /// Maximum number of assets.
    pub max_assets: u64,
}

impl ExtractionLimits {
    /// Default single-asset limit: 512 MiB.
    pub const DEFAULT_MAX_ASSET_BYTES: u64 = 512 * MIB;
    /// Absolute single-asset ceiling: 8 GiB.
    pub const CEILING_MAX_ASSET_BYTES: u64 = 8 * GIB;
    /// Default package limit: 4 GiB.
    pub const DEFAULT_MAX_PACKAGE_BYTES: u64 = 4 * GIB;
    /// Absolute package ceiling: 64 GiB.
    pub const CEILING_MAX_PACKAGE_BYTES: u64 = 64 * GIB;
    /// Default asset count limit.
    pub const DEFAULT_MAX_ASSETS: u64 = 100_000;
    /// Absolute asset count ceiling.
    pub const CEILING_MAX_ASSETS: u64 = 1_000_000;

    /// Returns a copy with every value inside `(0, ceiling]` and
    /// `max_package_bytes >= max_asset_bytes`.
    ///
    /// Out-of-range values are replaced by their default, never clamped.
    /// The operation is idempotent.
    #[must_use]
    pub fn normalize(self) -> Self {
        let max_asset_bytes = in_range_or(
            self.max_asset_bytes,
            Self::CEILING_MAX_ASSET_BYTES,
            Self::DEFAULT_MAX_ASSET_BYTES,
        );
        let max_package_bytes = in_range_or(
            self.max_package_bytes,
            Self::CEILING_MAX_PACKAGE_BYTES,
            Self::DEFAULT_MAX_PACKAGE_BYTES,
        )
        .max(max_asset_bytes);
        let max_assets = in_range_or(
            self.max_assets,
            Self::CEILING_MAX_ASSETS,
            Self::DEFAULT_MAX_ASSETS,
        );

        Self {
            max_asset_bytes,
            max_package_bytes,
            max_assets,
        }
    }
}

impl Default for ExtractionLimits {
    /// Default values:
    /// - `max_asset_bytes`: 512 MiB
    /// - `max_package_bytes`: 4 GiB
    /// - `max_assets`: 100,000
    fn default() -> Self {
        Self {
            max_asset_bytes: Self::DEFAULT_MAX_ASSET_BYTES,
            max_package_bytes: Self::DEFAULT_MAX_PACKAGE_BYTES,
            max_assets: Self::DEFAULT_MAX_ASSETS,
        }
    }
}

fn in_range_or(value: u64, ceiling: u64, default: u64) -> u64 {
    if value == 0 || value > ceiling {
        default
    } else {
        value
    }
}

/// Options for an extraction job.
///
/// # Examples
///
/// ```
/// use upkx_core::ExtractionOptions;
///
/// let options = ExtractionOptions::default()
///     .with_organize_by_categories(false)
///     .with_workers(2);
/// assert!(!options.organize_by_categories);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Place assets under category folders (`Scripts/`, `Textures/`, ...).
    pub organize_by_categories: bool,

    /// Directory in which the staging tree is created. Defaults to the
    /// output directory itself.
    pub temp_dir: Option<PathBuf>,

    /// Limits override. `None` uses [`ExtractionLimits::default`].
    pub limits: Option<ExtractionLimits>,

    /// Write `.meta` sidecars next to their assets.
    pub write_meta: bool,

    /// Number of write workers.
    pub workers: NonZeroUsize,

    /// Scan the written assets and attach the result.
    pub scan_after_extract: bool,
}

impl ExtractionOptions {
    /// Upper bound for the write pool size.
    pub const MAX_WORKERS: usize = 16;

    /// Returns the normalized effective limits.
    #[must_use]
    pub fn effective_limits(&self) -> ExtractionLimits {
        self.limits.unwrap_or_default().normalize()
    }

    /// Sets category organization.
    pub fn with_organize_by_categories(mut self, organize: bool) -> Self {
        self.organize_by_categories = organize;
        self
    }

    /// Sets the staging directory root.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Sets a limits override.
    pub fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Enables or disables `.meta` sidecars.
    pub fn with_write_meta(mut self, write_meta: bool) -> Self {
        self.write_meta = write_meta;
        self
    }

    /// Sets the worker count, clamped to `1..=MAX_WORKERS`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = clamp_workers(workers);
        self
    }

    /// Enables scanning after a successful write.
    pub fn with_scan_after_extract(mut self, scan: bool) -> Self {
        self.scan_after_extract = scan;
        self
    }
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            organize_by_categories: true,
            temp_dir: None,
            limits: None,
            write_meta: true,
            workers: clamp_workers(parallelism),
            scan_after_extract: false,
        }
    }
}

fn clamp_workers(workers: usize) -> NonZeroUsize {
    NonZeroUsize::new(workers.clamp(1, ExtractionOptions::MAX_WORKERS)).unwrap_or(NonZeroUsize::MIN)
}

/// Options for the preview pass.
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    /// Assets larger than this are returned as a truncated prefix.
    pub preview_bytes: usize,

    /// Write `preview.png` thumbnails to a temporary root.
    pub materialize_preview_images: bool,

    /// Parent directory for the thumbnail root. Defaults to the system
    /// temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl PreviewOptions {
    /// Default preview threshold: 64 KiB.
    pub const DEFAULT_PREVIEW_BYTES: usize = 64 * 1024;
    /// Hard safety cap on the preview threshold: 8 MiB.
    pub const HARD_CAP_BYTES: usize = 8 * 1024 * 1024;

    /// Returns the threshold clamped to the hard cap.
    #[must_use]
    pub fn effective_preview_bytes(&self) -> usize {
        self.preview_bytes.min(Self::HARD_CAP_BYTES)
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            preview_bytes: Self::DEFAULT_PREVIEW_BYTES,
            materialize_preview_images: false,
            temp_dir: None,
        }
    }
}

/// Options for the malicious content scanner.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Assets larger than this are skipped.
    pub max_content_bytes: u64,
}

impl ScanOptions {
    /// Default content ceiling: 4 MiB.
    pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 4 * MIB;
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_content_bytes: Self::DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_normalized() {
        let limits = ExtractionLimits::default();
        assert_eq!(limits, limits.normalize());
        assert!(limits.max_package_bytes >= limits.max_asset_bytes);
    }

    #[test]
    fn test_normalize_replaces_zero_with_default() {
        let limits = ExtractionLimits {
            max_asset_bytes: 0,
            max_package_bytes: 0,
            max_assets: 0,
        }
        .normalize();
        assert_eq!(limits, ExtractionLimits::default());
    }

    #[test]
    fn test_normalize_replaces_above_ceiling_with_default() {
        let limits = ExtractionLimits {
            max_asset_bytes: u64::MAX,
            max_package_bytes: ExtractionLimits::CEILING_MAX_PACKAGE_BYTES + 1,
            max_assets: ExtractionLimits::CEILING_MAX_ASSETS + 1,
        }
        .normalize();
        assert_eq!(limits.max_asset_bytes, ExtractionLimits::DEFAULT_MAX_ASSET_BYTES);
        assert_eq!(
            limits.max_package_bytes,
            ExtractionLimits::DEFAULT_MAX_PACKAGE_BYTES
        );
        assert_eq!(limits.max_assets, ExtractionLimits::DEFAULT_MAX_ASSETS);
    }

    #[test]
    fn test_normalize_raises_package_to_asset() {
        let limits = ExtractionLimits {
            max_asset_bytes: 1000,
            max_package_bytes: 10,
            max_assets: 5,
        }
        .normalize();
        assert_eq!(limits.max_package_bytes, 1000);
        assert_eq!(limits.max_assets, 5);
    }

    #[test]
    fn test_normalize_keeps_ceiling_values() {
        let limits = ExtractionLimits {
            max_asset_bytes: ExtractionLimits::CEILING_MAX_ASSET_BYTES,
            max_package_bytes: ExtractionLimits::CEILING_MAX_PACKAGE_BYTES,
            max_assets: ExtractionLimits::CEILING_MAX_ASSETS,
        };
        assert_eq!(limits.normalize(), limits);
    }

    #[test]
    fn test_workers_clamped() {
        assert_eq!(ExtractionOptions::default().with_workers(0).workers.get(), 1);
        assert_eq!(
            ExtractionOptions::default().with_workers(1000).workers.get(),
            ExtractionOptions::MAX_WORKERS
        );
    }

    #[test]
    fn test_preview_hard_cap() {
        let options = PreviewOptions {
            preview_bytes: usize::MAX,
            ..Default::default()
        };
        assert_eq!(options.effective_preview_bytes(), PreviewOptions::HARD_CAP_BYTES);
    }
}
