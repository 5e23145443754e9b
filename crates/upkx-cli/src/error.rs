//! Error conversion utilities for CLI.
//!
//! Converts upkx-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use std::path::Path;
use upkx_core::ExtractionError;
use upkx_core::IoFailureKind;
use upkx_core::LimitKind;
use upkx_core::ScanError;

/// Converts `ExtractionError` to user-friendly anyhow error with context
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn convert_extraction_error(err: ExtractionError, package: &Path) -> anyhow::Error {
    match err {
        ExtractionError::UnsafePath { path } => {
            anyhow!(
                "Security violation: Package '{}' contains an asset that would be written outside the output directory: '{}'\n\
                 HINT: This package may be malicious. Do not import it from untrusted sources.",
                package.display(),
                path
            )
        }
        ExtractionError::DecompressionBombSuspected {
            compressed,
            decompressed,
            ratio,
        } => {
            anyhow!(
                "Security violation: Package '{}' appears to be a decompression bomb\n\
                 Compression ratio: {}:1 ({}KB → {}MB)\n\
                 HINT: Legitimate Unity packages rarely compress beyond 100:1.",
                package.display(),
                ratio as u64,
                compressed / 1024,
                decompressed / 1024 / 1024
            )
        }
        ExtractionError::LimitExceeded {
            kind,
            limit,
            actual,
        } => {
            let flag = match kind {
                LimitKind::AssetBytes => "--max-asset-size",
                LimitKind::PackageBytes => "--max-package-size",
                LimitKind::AssetCount => "--max-assets",
            };
            anyhow!(
                "Extraction limit exceeded for '{}': {kind} ({actual} > {limit})\n\
                 HINT: Use {flag} to raise the limit if the package is trusted.",
                package.display(),
            )
        }
        ExtractionError::Io {
            kind: IoFailureKind::DiskFull,
            message,
            ..
        } => {
            anyhow!(
                "Not enough disk space while extracting '{}': {message}\n\
                 HINT: Free up space or choose another output directory with --temp-dir.",
                package.display(),
            )
        }
        ExtractionError::Io { path, message, .. } => {
            anyhow!(
                "I/O error while processing '{}' at '{}': {message}",
                package.display(),
                path.display()
            )
        }
        ExtractionError::ArchiveCorrupt(reason) => {
            anyhow!(
                "Invalid package '{}': {reason}\n\
                 HINT: The file may be truncated or not a .unitypackage.",
                package.display(),
            )
        }
        ExtractionError::Cancelled => {
            anyhow!("Extraction of '{}' was cancelled", package.display())
        }
        ExtractionError::AssetMissingPathname { .. } => anyhow::Error::from(err)
            .context(format!("Error processing package '{}'", package.display())),
    }
}

/// Converts `ScanError` to user-friendly anyhow error with context
pub fn convert_scan_error(err: ScanError, package: &Path) -> anyhow::Error {
    match err {
        ScanError::Package(inner) => convert_extraction_error(inner, package),
        ScanError::InvalidRule { rule, source } => {
            anyhow!(
                "Invalid scan rule '{rule}': {source}\n\
                 HINT: Check the pattern in the --rules file."
            )
        }
        ScanError::RulesParse(source) => {
            anyhow!("Invalid rule set: {source}\nHINT: The --rules file must be JSON.")
        }
        ScanError::Io { path, source } => {
            anyhow!("Failed to read '{}': {source}", path.display())
        }
    }
}

/// Adds context to a generic error about package operations
pub fn add_package_context<T>(
    result: Result<T, ExtractionError>,
    package: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_extraction_error(e, package))
}

/// Adds context to a scan error
pub fn add_scan_context<T>(result: Result<T, ScanError>, package: &Path) -> anyhow::Result<T> {
    result.map_err(|e| convert_scan_error(e, package))
}
