//! Type-safe wrappers for extraction paths.
//!
//! Both types are validated upon construction and cannot be created from raw
//! strings or paths without going through validation.

pub mod dest_dir;
pub mod safe_path;

pub use dest_dir::DestDir;
pub use safe_path::SafePath;
