//! Malicious content scanner.
//!
//! Inspects assembled or extracted assets for Discord webhooks, unsafe links
//! and execution primitives. Findings annotate a result; they never fail an
//! extraction.

pub mod result;
pub mod rules;
pub mod scanner;

pub use result::MaliciousThreat;
pub use result::ScanResult;
pub use result::Severity;
pub use result::ThreatMatch;
pub use result::ThreatType;
pub use rules::PatternRule;
pub use rules::RuleSet;
pub use scanner::MaliciousContentScanner;
