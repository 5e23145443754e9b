//! Streaming gzip + tar decode of a `.unitypackage`.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::CancellationToken;
use crate::ExtractionError;
use crate::Result;
use crate::io::CountingReader;
use crate::io::MeteredReader;
use crate::io::metered::bomb_from_io;
use crate::security::bomb::MAX_COMPRESSION_RATIO;

/// Decoder stack between the package bytes and the tar parser.
pub type DecodedStream<R> = MeteredReader<GzDecoder<CountingReader<R>>>;

/// A file entry read from a package, as consumed by the assembler.
pub trait EntrySource: Read {
    /// Archive-relative path with `/` separators.
    fn path(&self) -> &str;

    /// Declared uncompressed size.
    fn size(&self) -> u64;
}

/// One regular-file entry of the tar stream.
///
/// Reading yields at most [`size`](EntrySource::size) bytes. Bytes left
/// unread are skipped (and still metered) when the next entry is requested.
pub struct RawArchiveEntry<'a, R: Read> {
    path: String,
    size: u64,
    entry: tar::Entry<'a, DecodedStream<R>>,
}

impl<R: Read> EntrySource for RawArchiveEntry<'_, R> {
    fn path(&self) -> &str {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl<R: Read> Read for RawArchiveEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.entry.read(buf)
    }
}

impl<R: Read> std::fmt::Debug for RawArchiveEntry<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawArchiveEntry")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Streaming reader over a gzip-compressed tar package.
///
/// The whole archive is never buffered. The compression ratio is checked on
/// every read of the decompressed stream, including header reads and
/// skipped entry data.
///
/// # Examples
///
/// ```no_run
/// use upkx_core::CancellationToken;
/// use upkx_core::package::PackageReader;
/// use upkx_core::package::reader::EntrySource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut reader = PackageReader::open("Asset.unitypackage", CancellationToken::new())?;
/// for entry in reader.entries()? {
///     let entry = entry?;
///     println!("{} ({} bytes)", entry.path(), entry.size());
/// }
/// # Ok(())
/// # }
/// ```
pub struct PackageReader<R: Read> {
    archive: tar::Archive<DecodedStream<R>>,
    cancel: CancellationToken,
}

impl PackageReader<BufReader<File>> {
    /// Opens a package file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, cancel: CancellationToken) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ExtractionError::io(path, e))?;
        Ok(Self::new(BufReader::new(file), cancel))
    }
}

impl<R: Read> PackageReader<R> {
    /// Wraps a byte stream presumed to be gzip-compressed tar.
    pub fn new(inner: R, cancel: CancellationToken) -> Self {
        Self::with_max_ratio(inner, cancel, MAX_COMPRESSION_RATIO)
    }

    /// Same as [`new`](Self::new) with a custom bomb threshold.
    pub fn with_max_ratio(inner: R, cancel: CancellationToken, max_ratio: f64) -> Self {
        let compressed = Arc::new(AtomicU64::new(0));
        let counting = CountingReader::new(inner, Arc::clone(&compressed));
        let metered = MeteredReader::new(GzDecoder::new(counting), compressed, max_ratio);
        Self {
            archive: tar::Archive::new(metered),
            cancel,
        }
    }

    /// Returns the entry sequence.
    ///
    /// The sequence can only be obtained once: the stream is not seekable.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveCorrupt` if the stream was already consumed.
    pub fn entries(&mut self) -> Result<RawEntries<'_, R>> {
        let inner = self
            .archive
            .entries()
            .map_err(|e| read_failure(e, "failed to read package entries"))?;
        Ok(RawEntries {
            inner,
            cancel: self.cancel.clone(),
            done: false,
        })
    }
}

/// Lazy, ordered sequence of file entries.
pub struct RawEntries<'a, R: Read> {
    inner: tar::Entries<'a, DecodedStream<R>>,
    cancel: CancellationToken,
    done: bool,
}

impl<'a, R: Read> Iterator for RawEntries<'a, R> {
    type Item = Result<RawArchiveEntry<'a, R>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Err(e) = self.cancel.check() {
                self.done = true;
                return Some(Err(e));
            }

            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.done = true;
                    return Some(Err(read_failure(e, "failed to read package entry")));
                }
            };

            let path = normalize_entry_path(&entry.path_bytes());
            let entry_type = entry.header().entry_type();

            if !(entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse()) {
                debug!(path = %path, ?entry_type, "skipping non-file package entry");
                continue;
            }

            let size = entry.size();
            return Some(Ok(RawArchiveEntry { path, size, entry }));
        }
    }
}

/// Converts a read error from the decode stack into an extraction error.
///
/// A bomb verdict is passed through; anything else is framing or
/// compression damage.
pub fn read_failure(err: std::io::Error, context: &str) -> ExtractionError {
    match bomb_from_io(err) {
        Ok(bomb) => bomb,
        Err(err) => ExtractionError::ArchiveCorrupt(format!("{context}: {err}")),
    }
}

fn normalize_entry_path(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw).replace('\\', "/");
    let trimmed = text.trim_start_matches("./").trim_end_matches('/');
    trimmed.to_string()
}
