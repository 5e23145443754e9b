//! Output formatter trait for CLI results.

use anyhow::Result;
use serde::Serialize;
use upkx_core::ExtractionResult;
use upkx_core::PreviewResult;
use upkx_core::ScanResult;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format extraction result
    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()>;

    /// Format preview result; `long` lists every asset
    fn format_preview_result(&self, result: &PreviewResult, long: bool) -> Result<()>;

    /// Format scan result
    fn format_scan_result(&self, result: &ScanResult) -> Result<()>;

    /// Format error message
    fn format_error(&self, operation: &str, error: &anyhow::Error);

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }
}

impl JsonOutput<()> {
    pub fn error(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }
}
