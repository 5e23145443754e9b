//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use upkx_core::ExtractionResult;
use upkx_core::PreviewResult;
use upkx_core::ScanResult;
use upkx_core::Severity;

/// Matches shown per threat unless `--verbose` is set.
const MATCHES_SHOWN: usize = 3;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn heading(&self, mark: &str, text: &str) {
        if self.use_colors {
            self.line(&format!("{} {text}", style(mark).green().bold()));
        } else {
            self.line(text);
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let digits = n.to_string();
        let mut result = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result
    }

    fn severity_label(&self, severity: Severity) -> String {
        if !self.use_colors {
            return format!("[{severity}]");
        }
        match severity {
            Severity::High => style("HIGH").red().bold().to_string(),
            Severity::Medium => style("MEDIUM").yellow().to_string(),
            Severity::Low => style("LOW").blue().to_string(),
        }
    }

    fn write_warnings(&self, warnings: &[String]) {
        if warnings.is_empty() {
            return;
        }
        self.line("");
        if self.use_colors {
            self.line(&format!("{}", style("Warnings:").yellow().bold()));
        } else {
            self.line("Warnings:");
        }
        for warning in warnings {
            self.line(&format!("  - {warning}"));
        }
    }

    fn write_scan(&self, result: &ScanResult) {
        if result.is_malicious {
            if self.use_colors {
                self.line(&format!(
                    "{} Package flagged as MALICIOUS",
                    style("✗").red().bold()
                ));
            } else {
                self.line("Package flagged as MALICIOUS");
            }
        } else if result.threats.is_empty() {
            self.heading("✓", "No malicious content found");
        } else {
            self.heading("✓", "No conclusive malicious content found");
        }

        self.line(&format!(
            "  Files scanned: {} ({} skipped as oversized)",
            Self::format_number(result.files_scanned),
            result.files_skipped
        ));
        if self.verbose {
            self.line(&format!("  Rules: {}", result.rules_version));
            self.line(&format!("  Scanned at: {}", result.scanned_at.to_rfc3339()));
        }

        for threat in &result.threats {
            self.line("");
            self.line(&format!(
                "  {} {}: {}",
                self.severity_label(threat.severity),
                threat.threat_type,
                threat.description
            ));
            let shown = if self.verbose {
                threat.matches.len()
            } else {
                MATCHES_SHOWN.min(threat.matches.len())
            };
            for found in &threat.matches[..shown] {
                self.line(&format!("    {} ({}): {}", found.file, found.rule, found.snippet));
            }
            if shown < threat.matches.len() {
                self.line(&format!(
                    "    ... and {} more (use --verbose)",
                    threat.matches.len() - shown
                ));
            }
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_extraction_result(&self, result: &ExtractionResult) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.heading("✓", "Extraction complete");
        self.line(&format!(
            "  Files extracted: {}",
            Self::format_number(result.total_files)
        ));
        self.line(&format!("  Directories: {}", result.directories_created));
        self.line(&format!(
            "  Total size: {}",
            Self::format_size(result.total_bytes)
        ));

        if self.verbose {
            self.line(&format!("  Output: {}", result.output_dir.display()));
            self.line(&format!("  Meta files: {}", result.meta_files_written));
            self.line(&format!("  Orphaned assets: {}", result.orphaned_assets));
            self.line(&format!("  Duration: {:?}", result.duration));
        }

        self.write_warnings(&result.warnings);

        if let Some(scan) = &result.scan {
            self.line("");
            self.write_scan(scan);
        }

        Ok(())
    }

    fn format_preview_result(&self, result: &PreviewResult, long: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.line(&format!("Package: {}", result.package.display()));
        self.line(&format!(
            "  Size: {}",
            Self::format_size(result.package_size)
        ));
        if let Some(modified) = result.modified {
            self.line(&format!(
                "  Modified: {}",
                modified.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        self.line(&format!(
            "  Assets: {} ({})",
            Self::format_number(result.entries.len()),
            Self::format_size(result.total_asset_bytes)
        ));
        let truncated = result.truncated_count();
        if truncated > 0 {
            self.line(&format!("  Truncated previews: {truncated}"));
        }
        if result.orphaned_assets > 0 {
            self.line(&format!("  Orphaned: {}", result.orphaned_assets));
        }
        if let Some(root) = &result.temp_root {
            self.line(&format!("  Thumbnails: {}", root.display()));
        }

        if long {
            self.line("");
            for entry in &result.entries {
                let mut flags = Vec::new();
                if entry.is_folder {
                    flags.push("folder");
                }
                if entry.has_meta {
                    flags.push("meta");
                }
                if entry.has_preview_image {
                    flags.push("preview");
                }
                if entry.is_asset_data_truncated {
                    flags.push("truncated");
                }
                self.line(&format!(
                    "  {:<10} {:>10}  {}  [{}]",
                    entry.category.folder_name(),
                    Self::format_size(entry.size),
                    entry.path,
                    flags.join(", ")
                ));
            }
        }

        if !result.prune_candidates.is_empty() {
            self.line("");
            self.line("Suggested for pruning:");
            for candidate in &result.prune_candidates {
                self.line(&format!("  {} ({})", candidate.path, candidate.reason));
            }
        }

        Ok(())
    }

    fn format_scan_result(&self, result: &ScanResult) -> Result<()> {
        // A malicious verdict is shown even in quiet mode.
        if self.quiet && !result.is_malicious {
            return Ok(());
        }
        self.write_scan(result);
        Ok(())
    }

    fn format_error(&self, _operation: &str, error: &anyhow::Error) {
        let term = Term::stderr();
        let message = format!("{error:#}");
        if self.use_colors {
            let _ = term.write_line(&format!("{} {message}", style("ERROR:").red().bold()));
        } else {
            let _ = term.write_line(&format!("ERROR: {message}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            self.line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            self.line(&format!("WARNING: {message}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(HumanFormatter::format_size(0), "0 B");
        assert_eq!(HumanFormatter::format_size(1023), "1023 B");
        assert_eq!(HumanFormatter::format_size(1536), "1.5 KB");
        assert_eq!(HumanFormatter::format_size(2 * 1024 * 1024), "2.0 MB");
        assert_eq!(HumanFormatter::format_size(1536 * 1024 * 1024), "1.5 GB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(HumanFormatter::format_number(0), "0");
        assert_eq!(HumanFormatter::format_number(999), "999");
        assert_eq!(HumanFormatter::format_number(1000), "1,000");
        assert_eq!(HumanFormatter::format_number(1_234_567), "1,234,567");
        assert_eq!(
            HumanFormatter::format_number(123_456_789_012),
            "123,456,789,012"
        );
    }

    #[test]
    fn test_plain_severity_label() {
        let formatter = HumanFormatter {
            verbose: false,
            quiet: false,
            use_colors: false,
            term: Term::stdout(),
        };
        assert_eq!(formatter.severity_label(Severity::High), "[High]");
    }
}
