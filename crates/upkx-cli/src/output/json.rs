//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use upkx_core::ExtractionResult;
use upkx_core::PreviewResult;
use upkx_core::ScanResult;

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ExtractionOutput<'a> {
    source: String,
    output_dir: String,
    files_extracted: usize,
    directories_created: usize,
    meta_files_written: usize,
    orphaned_assets: usize,
    bytes_written: u64,
    duration_ms: u128,
    warnings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<&'a ScanResult>,
}

#[derive(Serialize)]
struct PreviewEntryOutput<'a> {
    guid: &'a str,
    path: &'a str,
    category: &'static str,
    is_folder: bool,
    size: u64,
    has_meta: bool,
    truncated: bool,
    has_preview_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview_image: Option<String>,
}

#[derive(Serialize)]
struct PruneOutput<'a> {
    path: &'a str,
    reason: String,
}

#[derive(Serialize)]
struct PreviewOutput<'a> {
    package: String,
    package_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
    asset_count: usize,
    total_asset_bytes: u64,
    truncated_count: usize,
    orphaned_assets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_root: Option<String>,
    prune_candidates: Vec<PruneOutput<'a>>,
    entries: Vec<PreviewEntryOutput<'a>>,
}

impl OutputFormatter for JsonFormatter {
    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()> {
        let data = ExtractionOutput {
            source: result.source.display().to_string(),
            output_dir: result.output_dir.display().to_string(),
            files_extracted: result.total_files,
            directories_created: result.directories_created,
            meta_files_written: result.meta_files_written,
            orphaned_assets: result.orphaned_assets,
            bytes_written: result.total_bytes,
            duration_ms: result.duration.as_millis(),
            warnings: &result.warnings,
            scan: result.scan.as_ref(),
        };

        Self::output(&JsonOutput::success("extract", data))
    }

    fn format_preview_result(&self, result: &PreviewResult, _long: bool) -> Result<()> {
        let data = PreviewOutput {
            package: result.package.display().to_string(),
            package_size: result.package_size,
            modified: result.modified.map(|m| m.to_rfc3339()),
            asset_count: result.entries.len(),
            total_asset_bytes: result.total_asset_bytes,
            truncated_count: result.truncated_count(),
            orphaned_assets: result.orphaned_assets,
            temp_root: result.temp_root.as_ref().map(|p| p.display().to_string()),
            prune_candidates: result
                .prune_candidates
                .iter()
                .map(|c| PruneOutput {
                    path: &c.path,
                    reason: c.reason.to_string(),
                })
                .collect(),
            entries: result
                .entries
                .iter()
                .map(|e| PreviewEntryOutput {
                    guid: &e.guid,
                    path: &e.path,
                    category: e.category.folder_name(),
                    is_folder: e.is_folder,
                    size: e.size,
                    has_meta: e.has_meta,
                    truncated: e.is_asset_data_truncated,
                    has_preview_image: e.has_preview_image,
                    preview_image: e
                        .preview_image_path
                        .as_ref()
                        .map(|p| p.display().to_string()),
                })
                .collect(),
        };

        Self::output(&JsonOutput::success("preview", data))
    }

    fn format_scan_result(&self, result: &ScanResult) -> Result<()> {
        Self::output(&JsonOutput::success("scan", result))
    }

    fn format_error(&self, operation: &str, error: &anyhow::Error) {
        let output = JsonOutput::error(operation, format!("{error:#}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData<'a> {
            message: &'a str,
        }

        // Warnings go to stderr so stdout stays a single document.
        if let Ok(json) = serde_json::to_string(&JsonOutput::success(
            "warning",
            WarningData { message },
        )) {
            let _ = writeln!(io::stderr(), "{json}");
        }
    }
}
