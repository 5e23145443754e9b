//! Security checks: decompression-bomb detection and resource limits.

pub mod bomb;
pub mod limits;

pub use bomb::validate_compression_ratio;
pub use limits::LimitEnforcer;
pub use limits::PackageBudget;
