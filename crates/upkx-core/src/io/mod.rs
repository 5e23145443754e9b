//! I/O wrappers used by the package reader and the extractor.

pub mod counting;
pub mod metered;

pub use counting::CountingReader;
pub use counting::CountingWriter;
pub use metered::MeteredReader;
