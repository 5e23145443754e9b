//! Scan findings and verdict.

use std::fmt;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Kind of malicious indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatType {
    /// Discord webhook URL, a common exfiltration channel.
    DiscordWebhook,
    /// URL shortener, IP-literal URL or denylisted domain.
    UnsafeLinks,
    /// Process launch, registry mutation, decode-and-execute or
    /// download-and-run code.
    SuspiciousCodePatterns,
}

impl ThreatType {
    /// Baseline severity before escalation.
    #[must_use]
    pub const fn base_severity(self) -> Severity {
        match self {
            Self::DiscordWebhook | Self::UnsafeLinks => Severity::Medium,
            Self::SuspiciousCodePatterns => Severity::High,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::DiscordWebhook => "Discord webhook URL that can be used to exfiltrate data",
            Self::UnsafeLinks => {
                "Link through a URL shortener, raw IP address or known-malicious domain"
            }
            Self::SuspiciousCodePatterns => {
                "Code that launches processes, edits the registry or runs downloaded or decoded payloads"
            }
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscordWebhook => write!(f, "DiscordWebhook"),
            Self::UnsafeLinks => write!(f, "UnsafeLinks"),
            Self::SuspiciousCodePatterns => write!(f, "SuspiciousCodePatterns"),
        }
    }
}

/// Threat severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Low,
    /// Inconclusive alone.
    Medium,
    /// Conclusive.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// A single match of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatMatch {
    /// Path of the file, relative to the scan root or as stored in the
    /// package.
    pub file: String,

    /// Name of the rule that matched.
    pub rule: String,

    /// Byte offset of the match.
    pub offset: usize,

    /// Bounded excerpt around the match, newlines collapsed.
    pub snippet: String,
}

/// All matches of one threat type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaliciousThreat {
    /// Threat type.
    pub threat_type: ThreatType,

    /// Severity after escalation.
    pub severity: Severity,

    /// Human-readable description.
    pub description: String,

    /// Matches in input order, then offset order.
    pub matches: Vec<ThreatMatch>,
}

/// Result of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Package the scanned content came from.
    pub package: PathBuf,

    /// Overall verdict: any High threat, or at least two Medium threats.
    pub is_malicious: bool,

    /// At most one threat per type.
    pub threats: Vec<MaliciousThreat>,

    /// When the scan finished.
    pub scanned_at: DateTime<Utc>,

    /// Version of the rule set used.
    pub rules_version: String,

    /// Files whose content was matched.
    pub files_scanned: usize,

    /// Files skipped for exceeding the content ceiling.
    pub files_skipped: usize,
}

impl ScanResult {
    /// Returns the threat of the given type, if found.
    #[must_use]
    pub fn threat(&self, threat_type: ThreatType) -> Option<&MaliciousThreat> {
        self.threats.iter().find(|t| t.threat_type == threat_type)
    }

    /// Highest severity found.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.threats.iter().map(|t| t.severity).max()
    }
}

/// Verdict rule: a High threat is conclusive; two distinct Medium threats
/// are conclusive together.
#[must_use]
pub fn is_malicious(threats: &[MaliciousThreat]) -> bool {
    let medium = threats
        .iter()
        .filter(|t| t.severity == Severity::Medium)
        .count();
    threats.iter().any(|t| t.severity == Severity::High) || medium >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threat(threat_type: ThreatType, severity: Severity) -> MaliciousThreat {
        MaliciousThreat {
            threat_type,
            severity,
            description: threat_type.description().to_string(),
            matches: Vec::new(),
        }
    }

    #[test]
    fn test_single_medium_not_malicious() {
        assert!(!is_malicious(&[threat(
            ThreatType::DiscordWebhook,
            Severity::Medium
        )]));
    }

    #[test]
    fn test_two_medium_malicious() {
        assert!(is_malicious(&[
            threat(ThreatType::DiscordWebhook, Severity::Medium),
            threat(ThreatType::UnsafeLinks, Severity::Medium),
        ]));
    }

    #[test]
    fn test_high_malicious() {
        assert!(is_malicious(&[threat(
            ThreatType::SuspiciousCodePatterns,
            Severity::High
        )]));
        assert!(!is_malicious(&[]));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
