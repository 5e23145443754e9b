//! Byte-counting reader and writer wrappers.
//!
//! `CountingWriter` tracks bytes written to an extracted file so the
//! extraction total is accumulated during the write. `CountingReader` tracks
//! compressed bytes pulled from the package file through a shared counter,
//! because the decoder stack takes ownership of the reader.

use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Wrapper writer that tracks total bytes written.
///
/// The counter only increments on successful writes. If a write operation
/// fails partway through, only the successfully written bytes are counted.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use upkx_core::io::CountingWriter;
///
/// let mut buffer = Vec::new();
/// let mut writer = CountingWriter::new(&mut buffer);
///
/// writer.write_all(b"Hello, ")?;
/// writer.write_all(b"World!")?;
///
/// assert_eq!(writer.total_bytes(), 13);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W> CountingWriter<W> {
    /// Creates a new counting writer.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Returns the total number of bytes successfully written.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the counting writer and returns the inner writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Returns a reference to the inner writer.
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.inner.write(buf)?;
        self.bytes_written += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }
}

/// Reader that publishes the number of bytes read to a shared counter.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R> CountingReader<R> {
    /// Wraps `inner`, adding every byte read to `counter`.
    #[must_use]
    pub fn new(inner: R, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }

    /// Returns the number of bytes read so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
