//! Disk-full classification of I/O failures.
//!
//! The engine never checks free space up front. When a write fails, the
//! failure is handed to a [`DiskSpaceAdvisor`] to decide whether it is a
//! disk-full condition and, if so, to phrase the user-facing message.

use std::error::Error;
use std::io;
use std::path::Component;
use std::path::Path;

use crate::ExtractionError;

#[cfg(windows)]
const DISK_FULL_OS_CODES: &[i32] = &[112, 39];
#[cfg(target_os = "linux")]
const DISK_FULL_OS_CODES: &[i32] = &[28, 122];
#[cfg(all(unix, not(target_os = "linux")))]
const DISK_FULL_OS_CODES: &[i32] = &[28, 69];
#[cfg(not(any(unix, windows)))]
const DISK_FULL_OS_CODES: &[i32] = &[];

/// Classifies and describes disk-full failures.
pub trait DiskSpaceAdvisor: Send + Sync {
    /// Returns `true` if `err` (or any error in its source chain) signals
    /// that the target volume is out of space.
    fn is_disk_full(&self, err: &io::Error) -> bool;

    /// User-facing message naming the volume `target` lives on.
    fn friendly_message(&self, target: &Path) -> String;
}

/// Recognizes `StorageFull`, `QuotaExceeded` and the platform's disk-full
/// OS error codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDiskSpaceAdvisor;

impl DiskSpaceAdvisor for DefaultDiskSpaceAdvisor {
    fn is_disk_full(&self, err: &io::Error) -> bool {
        let mut current: Option<&(dyn Error + 'static)> = Some(err);
        while let Some(error) = current {
            if let Some(io_err) = error.downcast_ref::<io::Error>() {
                if is_disk_full_signature(io_err) {
                    return true;
                }
                // io::Error::source skips its own payload
                if let Some(inner) = io_err.get_ref() {
                    current = Some(inner);
                    continue;
                }
            }
            current = error.source();
        }
        false
    }

    fn friendly_message(&self, target: &Path) -> String {
        format!(
            "Not enough free space on {} to write {}. Free up space or choose another output directory.",
            volume_of(target),
            target.display()
        )
    }
}

fn is_disk_full_signature(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
    ) || err
        .raw_os_error()
        .is_some_and(|code| DISK_FULL_OS_CODES.contains(&code))
}

fn volume_of(path: &Path) -> String {
    match path.components().next() {
        Some(Component::Prefix(prefix)) => prefix.as_os_str().to_string_lossy().into_owned(),
        Some(Component::RootDir) => "the volume mounted under /".to_string(),
        _ => "the target drive".to_string(),
    }
}

/// Converts an I/O failure at `path` into an `ExtractionError`, consulting
/// the advisor for disk-full conditions.
pub fn classify_io_error(
    advisor: &dyn DiskSpaceAdvisor,
    path: &Path,
    err: io::Error,
) -> ExtractionError {
    if advisor.is_disk_full(&err) {
        let message = advisor.friendly_message(path);
        ExtractionError::disk_full(path, message, err)
    } else {
        ExtractionError::io(path, err)
    }
}
