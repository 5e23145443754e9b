//! Extraction result and progress reporting.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use crate::scan::ScanResult;

/// Result of a successful extraction.
///
/// `extracted_files` is in archive encounter order and `total_bytes` is the
/// sum of bytes actually written for those files.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Package that was extracted.
    pub source: PathBuf,

    /// Canonical output directory.
    pub output_dir: PathBuf,

    /// Number of asset files written.
    pub total_files: usize,

    /// Absolute paths of the written asset files.
    pub extracted_files: Vec<PathBuf>,

    /// Asset bytes written, `.meta` sidecars excluded.
    pub total_bytes: u64,

    /// Folder assets materialized as directories.
    pub directories_created: usize,

    /// `.meta` sidecars written.
    pub meta_files_written: usize,

    /// GUID directories dropped for lack of a `pathname`.
    pub orphaned_assets: usize,

    /// Non-fatal diagnostics.
    pub warnings: Vec<String>,

    /// Wall-clock duration of the job.
    pub duration: Duration,

    /// Post-extraction scan, when requested.
    pub scan: Option<ScanResult>,
}

impl ExtractionResult {
    /// Returns whether any warnings were generated.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Callback trait for progress reporting during extraction.
///
/// Callbacks are invoked from the orchestrating thread, never from write
/// workers, so implementations need no synchronization.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use upkx_core::ProgressCallback;
///
/// struct Printer;
///
/// impl ProgressCallback for Printer {
///     fn on_asset_start(&mut self, path: &Path, index: usize) {
///         println!("#{index}: {}", path.display());
///     }
///
///     fn on_bytes_written(&mut self, _bytes: u64) {}
///
///     fn on_asset_complete(&mut self, path: &Path) {
///         println!("done: {}", path.display());
///     }
///
///     fn on_complete(&mut self) {
///         println!("finished");
///     }
/// }
/// ```
pub trait ProgressCallback: Send {
    /// An asset was handed to a write worker. `index` is its archive
    /// encounter index.
    fn on_asset_start(&mut self, path: &Path, index: usize);

    /// Bytes of a completed asset were written.
    fn on_bytes_written(&mut self, bytes: u64);

    /// An asset was written.
    fn on_asset_complete(&mut self, path: &Path);

    /// The job committed successfully.
    fn on_complete(&mut self);
}

/// Progress callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_asset_start(&mut self, _path: &Path, _index: usize) {}

    fn on_bytes_written(&mut self, _bytes: u64) {}

    fn on_asset_complete(&mut self, _path: &Path) {}

    fn on_complete(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_default_is_empty() {
        let result = ExtractionResult::default();
        assert_eq!(result.total_files, 0);
        assert!(result.extracted_files.is_empty());
        assert!(!result.has_warnings());
        assert!(result.scan.is_none());
    }

    #[test]
    fn test_noop_progress() {
        let mut progress = NoopProgress;
        progress.on_asset_start(Path::new("Assets/a.cs"), 0);
        progress.on_bytes_written(10);
        progress.on_asset_complete(Path::new("Assets/a.cs"));
        progress.on_complete();
    }
}
