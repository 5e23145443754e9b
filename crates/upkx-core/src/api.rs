//! High-level public API for package extraction, preview and scanning.
//!
//! These functions use a fresh cancellation token, no progress reporting and
//! the built-in scan rules. Use [`Extractor`](crate::Extractor) or
//! [`MaliciousContentScanner`] directly for finer control.

use std::path::Path;

use crate::CancellationToken;
use crate::ExtractionOptions;
use crate::ExtractionResult;
use crate::NoopProgress;
use crate::PreviewOptions;
use crate::Result;
use crate::ScanError;
use crate::ScanOptions;
use crate::extraction::Extractor;
use crate::inspection::PreviewResult;
use crate::scan::MaliciousContentScanner;
use crate::scan::ScanResult;

/// Extracts a package into `output_dir`.
///
/// Either every asset is committed or nothing from this call remains in
/// `output_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - The package cannot be opened or decoded
/// - A decompression bomb is suspected
/// - An extraction limit is exceeded
/// - A `pathname` is unsafe
/// - Writing fails
///
/// # Examples
///
/// ```no_run
/// use upkx_core::ExtractionOptions;
/// use upkx_core::extract_package;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ExtractionOptions::default().with_organize_by_categories(false);
/// let result = extract_package("Asset.unitypackage", "/tmp/project", &options)?;
/// println!("Extracted {} files", result.total_files);
/// # Ok(())
/// # }
/// ```
pub fn extract_package<P: AsRef<Path>, Q: AsRef<Path>>(
    package: P,
    output_dir: Q,
    options: &ExtractionOptions,
) -> Result<ExtractionResult> {
    Extractor::new(options.clone()).extract(package, output_dir, &mut NoopProgress)
}

/// Previews a package without writing anything but optional thumbnails.
///
/// # Errors
///
/// Returns an error if the package cannot be opened or decoded, a
/// decompression bomb is suspected, or a `pathname` is unsafe.
pub fn preview_package<P: AsRef<Path>>(
    package: P,
    options: &PreviewOptions,
) -> Result<PreviewResult> {
    crate::inspection::preview_package(package, options, &CancellationToken::new())
}

/// Scans a package in memory with the built-in rules.
///
/// # Errors
///
/// Returns an error if the package cannot be decoded.
pub fn scan_package<P: AsRef<Path>>(
    package: P,
    options: ScanOptions,
) -> std::result::Result<ScanResult, ScanError> {
    MaliciousContentScanner::with_builtin_rules(options)?
        .scan_package(package, &CancellationToken::new())
}

/// Scans an already-extracted directory with the built-in rules.
///
/// `package` is recorded as the source in the result.
///
/// # Errors
///
/// Returns an error if a file under `root` cannot be read.
pub fn scan_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    package: P,
    root: Q,
    options: ScanOptions,
) -> std::result::Result<ScanResult, ScanError> {
    MaliciousContentScanner::with_builtin_rules(options)?
        .scan_directory(package.as_ref(), root)
}
