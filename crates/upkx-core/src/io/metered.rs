//! Decompressed-stream meter with continuous bomb detection.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::ExtractionError;
use crate::security::bomb::validate_compression_ratio;

/// Reader over a decompressed stream that checks the compression ratio on
/// every read.
///
/// `compressed` is the shared counter fed by a
/// [`CountingReader`](super::CountingReader) below the decoder. When the
/// ratio is exceeded the read fails with an `io::Error` carrying an
/// [`ExtractionError::DecompressionBombSuspected`] payload, recoverable with
/// [`bomb_from_io`]. Once tripped, every later read fails the same way.
#[derive(Debug)]
pub struct MeteredReader<R> {
    inner: R,
    compressed: Arc<AtomicU64>,
    decompressed: u64,
    max_ratio: f64,
    tripped: Option<(u64, u64, f64)>,
}

impl<R> MeteredReader<R> {
    /// Wraps a decompressed stream.
    #[must_use]
    pub fn new(inner: R, compressed: Arc<AtomicU64>, max_ratio: f64) -> Self {
        Self {
            inner,
            compressed,
            decompressed: 0,
            max_ratio,
            tripped: None,
        }
    }

    /// Decompressed bytes read so far.
    #[must_use]
    pub fn decompressed_bytes(&self) -> u64 {
        self.decompressed
    }

    /// Compressed bytes consumed so far.
    #[must_use]
    pub fn compressed_bytes(&self) -> u64 {
        self.compressed.load(Ordering::Relaxed)
    }

    fn bomb_error(compressed: u64, decompressed: u64, ratio: f64) -> std::io::Error {
        std::io::Error::other(ExtractionError::DecompressionBombSuspected {
            compressed,
            decompressed,
            ratio,
        })
    }
}

impl<R: Read> Read for MeteredReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some((compressed, decompressed, ratio)) = self.tripped {
            return Err(Self::bomb_error(compressed, decompressed, ratio));
        }

        let n = self.inner.read(buf)?;
        self.decompressed = self.decompressed.saturating_add(n as u64);

        let compressed = self.compressed.load(Ordering::Relaxed);
        if let Err(ExtractionError::DecompressionBombSuspected {
            compressed,
            decompressed,
            ratio,
        }) = validate_compression_ratio(compressed, self.decompressed, self.max_ratio)
        {
            self.tripped = Some((compressed, decompressed, ratio));
            return Err(Self::bomb_error(compressed, decompressed, ratio));
        }

        Ok(n)
    }
}

/// Recovers a bomb verdict carried through an `io::Error`.
///
/// Returns the original error unchanged when it carries no verdict.
pub fn bomb_from_io(err: std::io::Error) -> Result<ExtractionError, std::io::Error> {
    let is_bomb = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ExtractionError>())
        .is_some_and(|e| matches!(e, ExtractionError::DecompressionBombSuspected { .. }));

    if !is_bomb {
        return Err(err);
    }

    match err.into_inner().map(|inner| inner.downcast::<ExtractionError>()) {
        Some(Ok(extraction)) => Ok(*extraction),
        _ => Err(std::io::Error::other("decompression bomb payload lost")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::security::bomb::BOMB_CHECK_FLOOR;
    use std::io::Cursor;

    #[test]
    fn test_metered_reader_passes_normal_stream() {
        let compressed = Arc::new(AtomicU64::new(1_000_000));
        let mut reader = MeteredReader::new(Cursor::new(vec![0u8; 2_000_000]), compressed, 100.0);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.decompressed_bytes(), 2_000_000);
    }

    #[test]
    fn test_metered_reader_trips_and_stays_tripped() {
        let compressed = Arc::new(AtomicU64::new(10));
        let data = vec![0u8; usize::try_from(BOMB_CHECK_FLOOR).unwrap() * 2];
        let mut reader = MeteredReader::new(Cursor::new(data), compressed, 100.0);

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            bomb_from_io(err),
            Ok(ExtractionError::DecompressionBombSuspected { .. })
        ));

        let mut buf = [0u8; 16];
        let err = reader.read(&mut buf).unwrap_err();
        assert!(bomb_from_io(err).is_ok());
    }

    #[test]
    fn test_bomb_from_io_passes_other_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt deflate stream");
        let back = bomb_from_io(err).unwrap_err();
        assert_eq!(back.kind(), std::io::ErrorKind::InvalidData);
    }
}
