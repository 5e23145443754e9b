//! Pattern matching over asset content and threat aggregation.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use walkdir::WalkDir;

use super::result::MaliciousThreat;
use super::result::ScanResult;
use super::result::Severity;
use super::result::ThreatMatch;
use super::result::ThreatType;
use super::result::is_malicious;
use super::rules::CompiledRules;
use super::rules::RuleSet;
use crate::CancellationToken;
use crate::ScanOptions;
use crate::error::ScanError;
use crate::package::AssetAssembler;
use crate::package::ContentPolicy;
use crate::package::LogicalAsset;
use crate::package::PackageReader;

/// Maximum snippet length in characters.
pub const MAX_SNIPPET_CHARS: usize = 160;

/// Matches recorded per rule per file.
pub const MAX_MATCHES_PER_RULE: usize = 8;

const PACKAGE_BATCH: usize = 64;

/// Read-only scanner for malicious indicators.
///
/// Scanning never mutates its input and never fails on findings. Content
/// larger than [`ScanOptions::max_content_bytes`] is skipped and counted,
/// never treated as evidence.
///
/// # Examples
///
/// ```
/// use upkx_core::ScanOptions;
/// use upkx_core::scan::MaliciousContentScanner;
/// use upkx_core::scan::ThreatType;
///
/// let scanner = MaliciousContentScanner::with_builtin_rules(ScanOptions::default())?;
/// let source = b"Process.Start(\"cmd.exe\");";
/// let result = scanner.scan("demo.unitypackage", &[("Assets/Evil.cs", &source[..])]);
///
/// assert!(result.is_malicious);
/// assert!(result.threat(ThreatType::SuspiciousCodePatterns).is_some());
/// # Ok::<(), upkx_core::ScanError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MaliciousContentScanner {
    rules: CompiledRules,
    options: ScanOptions,
}

#[derive(Debug)]
struct Finding {
    threat: ThreatType,
    found: ThreatMatch,
}

#[derive(Debug)]
enum FileOutcome {
    Scanned(Vec<Finding>),
    Skipped,
}

impl MaliciousContentScanner {
    /// Compiles `rules` into a scanner.
    pub fn new(rules: &RuleSet, options: ScanOptions) -> Result<Self, ScanError> {
        Ok(Self {
            rules: rules.compile()?,
            options,
        })
    }

    /// Scanner over [`RuleSet::builtin`].
    pub fn with_builtin_rules(options: ScanOptions) -> Result<Self, ScanError> {
        Self::new(&RuleSet::builtin(), options)
    }

    /// Version of the rule set in use.
    #[must_use]
    pub fn rules_version(&self) -> &str {
        self.rules.version()
    }

    /// Scans caller-supplied `(path, content)` pairs.
    pub fn scan(&self, package: impl Into<PathBuf>, files: &[(&str, &[u8])]) -> ScanResult {
        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|(path, content)| {
                if content.len() as u64 > self.options.max_content_bytes {
                    FileOutcome::Skipped
                } else {
                    FileOutcome::Scanned(self.match_content(path, content))
                }
            })
            .collect();
        self.aggregate(package.into(), outcomes)
    }

    /// Scans in-memory assets.
    ///
    /// Folder assets are ignored. Truncated assets are skipped.
    pub fn scan_assets(&self, package: impl Into<PathBuf>, assets: &[LogicalAsset]) -> ScanResult {
        let outcomes = self.scan_asset_batch(assets);
        self.aggregate(package.into(), outcomes)
    }

    /// Streams a package and scans every asset in memory.
    ///
    /// Assets are buffered up to the content ceiling; larger ones are
    /// skipped without being read in full.
    pub fn scan_package(
        &self,
        package: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        let package = package.as_ref();
        let ceiling = usize::try_from(self.options.max_content_bytes).unwrap_or(usize::MAX);

        let mut reader = PackageReader::open(package, cancel.clone())?;
        let assembler = AssetAssembler::new(reader.entries()?, ContentPolicy::Prefix(ceiling));

        let mut outcomes = Vec::new();
        let mut batch = Vec::with_capacity(PACKAGE_BATCH);
        for asset in assembler {
            batch.push(asset?);
            if batch.len() == PACKAGE_BATCH {
                outcomes.extend(self.scan_asset_batch(&batch));
                batch.clear();
            }
        }
        outcomes.extend(self.scan_asset_batch(&batch));

        Ok(self.aggregate(package.to_path_buf(), outcomes))
    }

    /// Scans every regular file under `root`. Symlinks are not followed.
    pub fn scan_directory(
        &self,
        package: impl Into<PathBuf>,
        root: impl AsRef<Path>,
    ) -> Result<ScanResult, ScanError> {
        let root = root.as_ref();
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| ScanError::Io {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        self.scan_files(package, root, &files)
    }

    /// Scans the given files, reporting paths relative to `root`.
    pub fn scan_files(
        &self,
        package: impl Into<PathBuf>,
        root: impl AsRef<Path>,
        files: &[PathBuf],
    ) -> Result<ScanResult, ScanError> {
        let root = root.as_ref();
        let outcomes = files
            .par_iter()
            .map(|path| self.scan_disk_file(root, path))
            .collect::<Result<Vec<_>, ScanError>>()?;
        Ok(self.aggregate(package.into(), outcomes))
    }

    fn scan_disk_file(&self, root: &Path, path: &Path) -> Result<FileOutcome, ScanError> {
        let io_error = |source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_error)?;
        let len = file.metadata().map_err(io_error)?.len();
        if len > self.options.max_content_bytes {
            debug!(path = %path.display(), len, "skipping oversized file");
            return Ok(FileOutcome::Skipped);
        }

        let mut content = Vec::new();
        file.take(self.options.max_content_bytes.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(io_error)?;
        if content.len() as u64 > self.options.max_content_bytes {
            return Ok(FileOutcome::Skipped);
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let display = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(FileOutcome::Scanned(self.match_content(&display, &content)))
    }

    fn scan_asset_batch(&self, assets: &[LogicalAsset]) -> Vec<FileOutcome> {
        assets
            .par_iter()
            .filter(|asset| !asset.is_folder)
            .map(|asset| {
                if asset.truncated || asset.size > self.options.max_content_bytes {
                    FileOutcome::Skipped
                } else {
                    FileOutcome::Scanned(self.match_content(asset.path.as_str(), &asset.content))
                }
            })
            .collect()
    }

    fn match_content(&self, file: &str, content: &[u8]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for rule in self.rules.rules() {
            for m in rule.regex().find_iter(content).take(MAX_MATCHES_PER_RULE) {
                findings.push(Finding {
                    threat: rule.threat,
                    found: ThreatMatch {
                        file: file.to_string(),
                        rule: rule.name.clone(),
                        offset: m.start(),
                        snippet: snippet(m.as_bytes()),
                    },
                });
            }
        }

        findings.sort_by_key(|f| f.found.offset);
        findings
    }

    fn aggregate(&self, package: PathBuf, outcomes: Vec<FileOutcome>) -> ScanResult {
        let mut files_scanned = 0;
        let mut files_skipped = 0;
        let mut by_type: BTreeMap<ThreatType, (Vec<ThreatMatch>, bool)> = BTreeMap::new();

        for outcome in outcomes {
            let findings = match outcome {
                FileOutcome::Skipped => {
                    files_skipped += 1;
                    continue;
                }
                FileOutcome::Scanned(findings) => findings,
            };
            files_scanned += 1;

            let has_execution = findings
                .iter()
                .any(|f| f.threat == ThreatType::SuspiciousCodePatterns);

            for finding in findings {
                let slot = by_type.entry(finding.threat).or_default();
                if finding.threat == ThreatType::UnsafeLinks && has_execution {
                    slot.1 = true;
                }
                slot.0.push(finding.found);
            }
        }

        let threats: Vec<MaliciousThreat> = by_type
            .into_iter()
            .map(|(threat_type, (matches, escalated))| MaliciousThreat {
                threat_type,
                severity: if escalated {
                    Severity::High
                } else {
                    threat_type.base_severity()
                },
                description: threat_type.description().to_string(),
                matches,
            })
            .collect();

        let result = ScanResult {
            package,
            is_malicious: is_malicious(&threats),
            threats,
            scanned_at: Utc::now(),
            rules_version: self.rules.version().to_string(),
            files_scanned,
            files_skipped,
        };

        info!(
            package = %result.package.display(),
            malicious = result.is_malicious,
            threats = result.threats.len(),
            files_scanned,
            files_skipped,
            "scan finished"
        );
        result
    }
}

/// Lossy, whitespace-collapsed excerpt of at most [`MAX_SNIPPET_CHARS`].
fn snippet(bytes: &[u8]) -> String {
    let window = &bytes[..bytes.len().min(MAX_SNIPPET_CHARS * 4)];
    let text = String::from_utf8_lossy(window);
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SNIPPET_CHARS)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WEBHOOK: &str =
        "https://discord.com/api/webhooks/123456789012345678/abcdefghijklmnopqrstuvwxyz0123";

    fn scanner() -> MaliciousContentScanner {
        MaliciousContentScanner::with_builtin_rules(ScanOptions::default()).unwrap()
    }

    #[test]
    fn test_clean_content() {
        let result = scanner().scan("p", &[("Assets/A.cs", b"public class A : MonoBehaviour {}")]);
        assert!(!result.is_malicious);
        assert!(result.threats.is_empty());
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.rules_version, RuleSet::BUILTIN_VERSION);
    }

    #[test]
    fn test_webhook_alone_is_single_medium() {
        let content = format!("const string Hook = \"{WEBHOOK}\";");
        let result = scanner().scan("p", &[("Assets/Hook.cs", content.as_bytes())]);
        assert_eq!(result.threats.len(), 1);
        assert_eq!(result.threats[0].threat_type, ThreatType::DiscordWebhook);
        assert_eq!(result.threats[0].severity, Severity::Medium);
        assert!(!result.is_malicious);
    }

    #[test]
    fn test_webhook_plus_shortener_is_malicious() {
        let content = format!("var a = \"{WEBHOOK}\";\nvar b = \"https://bit.ly/abc\";");
        let result = scanner().scan("p", &[("Assets/Hook.cs", content.as_bytes())]);
        assert_eq!(result.threats.len(), 2);
        assert!(result.threats.iter().all(|t| t.severity == Severity::Medium));
        assert!(result.is_malicious);
    }

    #[test]
    fn test_link_escalated_next_to_execution() {
        let content = b"var url = \"http://10.0.0.5/x.exe\"; Process.Start(path);";
        let result = scanner().scan("p", &[("Assets/Dropper.cs", content)]);
        let links = result.threat(ThreatType::UnsafeLinks).unwrap();
        assert_eq!(links.severity, Severity::High);
    }

    #[test]
    fn test_link_not_escalated_across_files() {
        let result = scanner().scan(
            "p",
            &[
                ("Assets/Links.cs", b"\"http://10.0.0.5/x\""),
                ("Assets/Run.cs", b"Process.Start(path);"),
            ],
        );
        assert_eq!(
            result.threat(ThreatType::UnsafeLinks).unwrap().severity,
            Severity::Medium
        );
        assert!(result.is_malicious);
    }

    #[test]
    fn test_base64_then_process_launch_is_high() {
        let blob = "QUJD".repeat(80);
        let content = format!(
            "string payload = \"{blob}\";\nvar bytes = Convert.FromBase64String(payload);\nFile.WriteAllBytes(p, bytes);\nProcess.Start(p);"
        );
        let result = scanner().scan("p", &[("Assets/Loader.cs", content.as_bytes())]);
        let code = result.threat(ThreatType::SuspiciousCodePatterns).unwrap();
        assert_eq!(code.severity, Severity::High);
        assert!(code.matches.iter().any(|m| m.rule == "base64-decode-execute"));
        assert!(result.is_malicious);
    }

    #[test]
    fn test_one_threat_per_type_in_input_order() {
        let result = scanner().scan(
            "p",
            &[
                ("b.cs", b"Process.Start(a);"),
                ("a.cs", b"Process.Start(b); Process.Start(c);"),
            ],
        );
        assert_eq!(result.threats.len(), 1);
        let files: Vec<_> = result.threats[0].matches.iter().map(|m| m.file.as_str()).collect();
        assert_eq!(files, vec!["b.cs", "a.cs", "a.cs"]);
        assert!(result.threats[0].matches[1].offset < result.threats[0].matches[2].offset);
    }

    #[test]
    fn test_oversized_content_skipped() {
        let scanner =
            MaliciousContentScanner::with_builtin_rules(ScanOptions { max_content_bytes: 8 }).unwrap();
        let result = scanner.scan("p", &[("big.cs", b"Process.Start(x);")]);
        assert_eq!(result.files_skipped, 1);
        assert_eq!(result.files_scanned, 0);
        assert!(!result.is_malicious);
    }

    #[test]
    fn test_snippet_bounded_and_collapsed() {
        let long = format!("Process.Start(\n\n{}\n)", "x".repeat(1000));
        let s = snippet(long.as_bytes());
        assert!(s.chars().count() <= MAX_SNIPPET_CHARS);
        assert!(!s.contains('\n'));
        assert!(s.starts_with("Process.Start( x"));
    }

    #[test]
    fn test_binary_content_scanned() {
        let mut content = vec![0u8, 159, 146, 150];
        content.extend_from_slice(b"http://192.168.1.1/a");
        content.push(0xFF);
        let result = scanner().scan("p", &[("Assets/lib.dll", content.as_slice())]);
        assert!(result.threat(ThreatType::UnsafeLinks).is_some());
    }
}
