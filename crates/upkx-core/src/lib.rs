//! Hardened `.unitypackage` extraction with malicious content scanning.
//!
//! `upkx-core` streams a gzip-compressed Unity package, regroups its GUID
//! directories into logical assets and writes them into a project tree.
//! Every job is guarded against decompression bombs, path traversal and
//! resource exhaustion, and is all-or-nothing: a failed or cancelled job
//! leaves no files behind. Extracted or in-memory assets can be scanned for
//! Discord webhooks, unsafe links and code execution primitives.
//!
//! # Examples
//!
//! ```no_run
//! use upkx_core::ExtractionOptions;
//! use upkx_core::extract_package;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ExtractionOptions::default().with_scan_after_extract(true);
//! let result = extract_package("Asset.unitypackage", "/output/dir", &options)?;
//! println!("Extracted {} files", result.total_files);
//! if let Some(scan) = &result.scan {
//!     println!("Malicious: {}", scan.is_malicious);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod disk;
pub mod error;
pub mod extraction;
pub mod inspection;
pub mod io;
pub mod package;
pub mod report;
pub mod scan;
pub mod security;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

// Re-export main API types
pub use api::extract_package;
pub use api::preview_package;
pub use api::scan_directory;
pub use api::scan_package;
pub use cancel::CancellationToken;
pub use classify::Category;
pub use config::ExtractionLimits;
pub use config::ExtractionOptions;
pub use config::PreviewOptions;
pub use config::ScanOptions;
pub use disk::DefaultDiskSpaceAdvisor;
pub use disk::DiskSpaceAdvisor;
pub use error::ExtractionError;
pub use error::IoFailureKind;
pub use error::LimitKind;
pub use error::Result;
pub use error::ScanError;
pub use extraction::ExtractionState;
pub use extraction::Extractor;
pub use inspection::PreviewEntry;
pub use inspection::PreviewResult;
pub use report::ExtractionResult;
pub use report::NoopProgress;
pub use report::ProgressCallback;
pub use scan::MaliciousContentScanner;
pub use scan::MaliciousThreat;
pub use scan::RuleSet;
pub use scan::ScanResult;
pub use scan::Severity;
pub use scan::ThreatType;

// Re-export types module for easier access
pub use types::DestDir;
pub use types::SafePath;
