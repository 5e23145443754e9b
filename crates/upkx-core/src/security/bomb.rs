//! Decompression bomb detection.

use crate::ExtractionError;
use crate::Result;

/// Maximum tolerated ratio of decompressed to compressed bytes.
pub const MAX_COMPRESSION_RATIO: f64 = 100.0;

/// Decompressed volume below which the ratio is not evaluated.
///
/// Tar framing is mostly zero padding, so a small package legitimately
/// compresses far beyond 100:1.
pub const BOMB_CHECK_FLOOR: u64 = 1024 * 1024;

/// Validates the running compression ratio of a stream.
///
/// # Errors
///
/// Returns `DecompressionBombSuspected` if `decompressed / compressed`
/// exceeds `max_ratio` once `decompressed` has passed [`BOMB_CHECK_FLOOR`].
pub fn validate_compression_ratio(compressed: u64, decompressed: u64, max_ratio: f64) -> Result<()> {
    if decompressed < BOMB_CHECK_FLOOR {
        return Ok(());
    }

    // A zero compressed count past the floor cannot come from a real stream.
    let ratio = if compressed == 0 {
        f64::INFINITY
    } else {
        decompressed as f64 / compressed as f64
    };

    if ratio > max_ratio {
        return Err(ExtractionError::DecompressionBombSuspected {
            compressed,
            decompressed,
            ratio,
        });
    }

    Ok(())
}
