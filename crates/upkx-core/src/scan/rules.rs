//! Versioned, swappable scan rule sets.
//!
//! A [`RuleSet`] is plain data: pattern strings and domain lists that can be
//! shipped as JSON and replaced without touching the matcher. It is compiled
//! once into [`CompiledRules`] before scanning.

use std::path::Path;

use regex::bytes::Regex;
use regex::bytes::RegexBuilder;
use serde::Deserialize;
use serde::Serialize;

use super::result::ThreatType;
use crate::error::ScanError;

/// A named pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Stable rule name, reported with every match.
    pub name: String,

    /// Regular expression over raw bytes. Unicode classes are disabled, so
    /// `\w`, `\s` and `\b` are ASCII-only and `.` matches any byte.
    pub pattern: String,
}

impl PatternRule {
    /// Creates a rule.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// Scanner rules.
///
/// # Examples
///
/// ```
/// use upkx_core::scan::RuleSet;
///
/// let rules = RuleSet::from_json(
///     r#"{
///         "version": "custom-1",
///         "denied_domains": ["evil.example"]
///     }"#,
/// )?;
/// assert_eq!(rules.version, "custom-1");
/// assert!(rules.webhook_patterns.is_empty());
/// # Ok::<(), upkx_core::ScanError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Reported in every scan result.
    pub version: String,

    /// Discord webhook URL shapes.
    #[serde(default)]
    pub webhook_patterns: Vec<PatternRule>,

    /// URL shortener hosts (subdomains match too).
    #[serde(default)]
    pub url_shorteners: Vec<String>,

    /// Known-malicious hosts (subdomains match too).
    #[serde(default)]
    pub denied_domains: Vec<String>,

    /// Flag `http(s)://` URLs whose host is an IPv4 literal.
    #[serde(default)]
    pub flag_ip_literal_urls: bool,

    /// Execution primitives: process launch, registry mutation,
    /// decode-and-execute, download-and-run.
    #[serde(default)]
    pub code_patterns: Vec<PatternRule>,
}

impl RuleSet {
    /// Version string of the built-in rules.
    pub const BUILTIN_VERSION: &'static str = "builtin-2024.1";

    /// The built-in rule set.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: Self::BUILTIN_VERSION.to_string(),
            webhook_patterns: vec![PatternRule::new(
                "discord-webhook",
                r"(?i)https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/api(?:/v\d+)?/webhooks/\d{5,}/[A-Za-z0-9_-]{20,}",
            )],
            url_shorteners: [
                "bit.ly",
                "tinyurl.com",
                "goo.gl",
                "t.co",
                "is.gd",
                "ow.ly",
                "buff.ly",
                "cutt.ly",
                "rebrand.ly",
                "shorturl.at",
                "rb.gy",
                "t.ly",
                "v.gd",
                "tiny.cc",
            ]
            .map(String::from)
            .to_vec(),
            denied_domains: [
                "grabify.link",
                "iplogger.org",
                "iplogger.com",
                "2no.co",
                "yip.su",
                "blasze.com",
                "pastebin.com",
                "transfer.sh",
                "anonfiles.com",
                "ngrok.io",
            ]
            .map(String::from)
            .to_vec(),
            flag_ip_literal_urls: true,
            code_patterns: vec![
                PatternRule::new(
                    "process-launch",
                    r"\b(?:Process\.Start|ShellExecute(?:Ex)?[AW]?|WinExec|CreateProcess[AW]?)\s*\(|\bnew\s+(?:System\.Diagnostics\.)?ProcessStartInfo\b",
                ),
                PatternRule::new(
                    "registry-mutation",
                    r"\bRegistry\.SetValue\s*\(|\bRegistry\.(?:CurrentUser|LocalMachine|ClassesRoot)\.(?:CreateSubKey|DeleteSubKey(?:Tree)?|DeleteValue)\s*\(|\bReg(?:SetValueEx|CreateKeyEx|DeleteKey(?:Ex)?|DeleteValue)[AW]?\s*\(",
                ),
                PatternRule::new(
                    "base64-decode-execute",
                    r#"[A-Za-z0-9+/]{200,}={0,2}(?s:.){0,400}?\bConvert\.FromBase64String\b(?s:.){0,400}?\b(?:Assembly\.Load|Process\.Start|Activator\.CreateInstance|\.Invoke)\s*\(|\bAssembly\.Load\s*\(\s*Convert\.FromBase64String\s*\("#,
                ),
                PatternRule::new(
                    "download-and-run",
                    r"\b(?:DownloadFile|DownloadData|GetByteArrayAsync|DownloadFileTaskAsync|DownloadDataTaskAsync)\s*\((?s:.){0,600}?\b(?:Process\.Start|Assembly\.Load(?:From|File)?)\s*\(",
                ),
                PatternRule::new(
                    "encoded-powershell",
                    r"(?i)\bpowershell(?:\.exe)?\b[^\n]{0,120}?\s-(?:e|enc|encodedcommand)\s",
                ),
            ],
        }
    }

    /// Parses a rule set from JSON.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a rule set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Compiles every pattern.
    pub fn compile(&self) -> Result<CompiledRules, ScanError> {
        let mut rules = Vec::new();

        for rule in &self.webhook_patterns {
            rules.push(CompiledRule::new(
                ThreatType::DiscordWebhook,
                &rule.name,
                &rule.pattern,
            )?);
        }

        if let Some(pattern) = host_pattern(&self.url_shorteners) {
            rules.push(CompiledRule::new(
                ThreatType::UnsafeLinks,
                "url-shortener",
                &pattern,
            )?);
        }
        if let Some(pattern) = host_pattern(&self.denied_domains) {
            rules.push(CompiledRule::new(
                ThreatType::UnsafeLinks,
                "denied-domain",
                &pattern,
            )?);
        }
        if self.flag_ip_literal_urls {
            rules.push(CompiledRule::new(
                ThreatType::UnsafeLinks,
                "ip-literal-url",
                r"(?i)\bhttps?://(?:\d{1,3}\.){3}\d{1,3}(?::\d{1,5})?(?:[^a-z0-9._-]|$)",
            )?);
        }

        for rule in &self.code_patterns {
            rules.push(CompiledRule::new(
                ThreatType::SuspiciousCodePatterns,
                &rule.name,
                &rule.pattern,
            )?);
        }

        Ok(CompiledRules {
            version: self.version.clone(),
            rules,
        })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn host_pattern(hosts: &[String]) -> Option<String> {
    let alternatives: Vec<String> = hosts
        .iter()
        .map(|host| host.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|host| !host.is_empty())
        .map(|host| regex::escape(&host))
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    // The host must end where the URL's authority ends, so a listed host
    // never matches as a prefix of a longer one.
    Some(format!(
        r"(?i)\bhttps?://(?:[a-z0-9-]+\.)*(?:{})(?::\d{{1,5}})?(?:[^a-z0-9._-]|$)",
        alternatives.join("|")
    ))
}

/// One compiled pattern.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Threat the rule contributes to.
    pub threat: ThreatType,
    /// Rule name.
    pub name: String,
    regex: Regex,
}

impl CompiledRule {
    fn new(threat: ThreatType, name: &str, pattern: &str) -> Result<Self, ScanError> {
        let regex = RegexBuilder::new(pattern)
            .unicode(false)
            .build()
            .map_err(|source| ScanError::InvalidRule {
                rule: name.to_string(),
                source,
            })?;
        Ok(Self {
            threat,
            name: name.to_string(),
            regex,
        })
    }

    /// The compiled expression.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// A compiled, ready-to-match rule set.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    version: String,
    rules: Vec<CompiledRule>,
}

impl CompiledRules {
    /// Version of the source rule set.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Compiled rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn first_match(rules: &CompiledRules, name: &str, haystack: &str) -> bool {
        rules
            .rules()
            .iter()
            .filter(|rule| rule.name == name)
            .any(|rule| rule.regex().is_match(haystack.as_bytes()))
    }

    #[test]
    fn test_builtin_compiles() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert_eq!(rules.version(), RuleSet::BUILTIN_VERSION);
        assert!(!rules.rules().is_empty());
    }

    #[test]
    fn test_webhook_shape() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(
            &rules,
            "discord-webhook",
            "https://discord.com/api/webhooks/123456789012345678/abcdefghijklmnopqrstuvwxyz_ABC-123"
        ));
        assert!(first_match(
            &rules,
            "discord-webhook",
            "http://ptb.discordapp.com/api/v10/webhooks/98765432101/AAAAAAAAAAAAAAAAAAAAAAAAAAAA"
        ));
        assert!(!first_match(&rules, "discord-webhook", "https://discord.com/channels/1/2"));
    }

    #[test]
    fn test_shortener_matches_host_not_substring() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(&rules, "url-shortener", "see https://bit.ly/3xYz"));
        assert!(!first_match(&rules, "url-shortener", "https://orbit.lyrics.example/x"));
    }

    #[test]
    fn test_shortener_host_must_end_there() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(&rules, "url-shortener", "https://bit.ly"));
        assert!(first_match(&rules, "url-shortener", "\"https://bit.ly:443/x\""));
        assert!(first_match(&rules, "url-shortener", "go https://t.co?x=1"));
        assert!(!first_match(&rules, "url-shortener", "https://bit.ly.example.com/"));
        assert!(!first_match(&rules, "url-shortener", "https://t.co-op.org/"));
    }

    #[test]
    fn test_ip_literal() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(&rules, "ip-literal-url", "http://185.12.4.9:8080/payload.exe"));
        assert!(!first_match(&rules, "ip-literal-url", "version 1.2.3.4"));
        assert!(!first_match(&rules, "ip-literal-url", "https://1.2.3.4.nip.io/"));
    }

    #[test]
    fn test_process_launch() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(
            &rules,
            "process-launch",
            r#"System.Diagnostics.Process.Start("cmd.exe", args);"#
        ));
        assert!(!first_match(&rules, "process-launch", "// Process the start event"));
    }

    #[test]
    fn test_decode_execute_inline() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(first_match(
            &rules,
            "base64-decode-execute",
            "var asm = Assembly.Load(Convert.FromBase64String(blob));"
        ));
    }

    #[test]
    fn test_empty_lists_produce_no_rules() {
        let rules = RuleSet {
            version: "empty".into(),
            webhook_patterns: Vec::new(),
            url_shorteners: Vec::new(),
            denied_domains: vec!["  ".into()],
            flag_ip_literal_urls: false,
            code_patterns: Vec::new(),
        }
        .compile()
        .unwrap();
        assert!(rules.rules().is_empty());
    }

    #[test]
    fn test_invalid_pattern_reported_by_name() {
        let mut rules = RuleSet::builtin();
        rules.code_patterns.push(PatternRule::new("broken", "(unclosed"));
        let err = rules.compile().unwrap_err();
        assert!(matches!(err, ScanError::InvalidRule { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn test_json_round_trip_of_builtin() {
        let json = serde_json::to_string(&RuleSet::builtin()).unwrap();
        assert_eq!(RuleSet::from_json(&json).unwrap(), RuleSet::builtin());
    }
}
