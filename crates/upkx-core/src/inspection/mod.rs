//! Package inspection without extraction.

pub mod preview;

pub use preview::PreviewEntry;
pub use preview::PreviewResult;
pub use preview::PruneCandidate;
pub use preview::PruneReason;
pub use preview::preview_package;
