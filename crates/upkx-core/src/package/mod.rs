//! `.unitypackage` decoding: raw entries and logical assets.
//!
//! A package is a gzip-compressed tar stream with one directory per asset,
//! named by the asset GUID:
//!
//! ```text
//! <guid>/asset         asset bytes (absent for folders)
//! <guid>/asset.meta    Unity import settings
//! <guid>/pathname      project-relative destination path
//! <guid>/preview.png   optional thumbnail
//! ```

pub mod assembler;
pub mod asset;
pub mod reader;

pub use assembler::AssemblyStats;
pub use assembler::AssetAssembler;
pub use assembler::ContentPolicy;
pub use assembler::LateSidecars;
pub use asset::LogicalAsset;
pub use reader::PackageReader;
pub use reader::RawArchiveEntry;
