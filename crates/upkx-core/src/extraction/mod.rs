//! Extraction of `.unitypackage` files into a project tree.

pub mod atomic;
pub mod engine;
pub mod stream;

pub use engine::ExtractionState;
pub use engine::Extractor;
