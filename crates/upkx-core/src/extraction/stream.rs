//! Writing a single asset into the staging tree.

use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::disk::DiskSpaceAdvisor;
use crate::disk::classify_io_error;
use crate::io::CountingWriter;
use crate::package::LogicalAsset;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// What [`write_asset`] put on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenAsset {
    /// Asset bytes written (zero for folders).
    pub bytes: u64,
    /// A `.meta` sidecar was written.
    pub meta_written: bool,
}

/// Returns `<path>.meta`.
#[must_use]
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".meta");
    PathBuf::from(name)
}

/// Writes an asset (or creates a folder asset) at `target`, plus its
/// `.meta` sidecar when `write_meta` is set and the package carried one.
///
/// Files are created with `create_new`: an existing file at `target` is an
/// error, never overwritten.
pub fn write_asset(
    asset: &LogicalAsset,
    target: &Path,
    write_meta: bool,
    advisor: &dyn DiskSpaceAdvisor,
) -> Result<WrittenAsset> {
    let bytes = if asset.is_folder {
        fs::create_dir_all(target).map_err(|e| classify_io_error(advisor, target, e))?;
        0
    } else {
        write_file(target, &asset.content, advisor)?
    };

    let meta_written = match asset.meta.as_deref() {
        Some(meta) if write_meta => {
            write_file(&meta_path(target), meta, advisor)?;
            true
        }
        _ => false,
    };

    Ok(WrittenAsset {
        bytes,
        meta_written,
    })
}

/// Writes the `.meta` sidecar of an asset already written at
/// `asset_target`.
pub fn write_late_meta(
    asset_target: &Path,
    meta: &[u8],
    advisor: &dyn DiskSpaceAdvisor,
) -> Result<()> {
    write_file(&meta_path(asset_target), meta, advisor).map(|_| ())
}

fn write_file(target: &Path, data: &[u8], advisor: &dyn DiskSpaceAdvisor) -> Result<u64> {
    let fail = |e| classify_io_error(advisor, target, e);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    let file = File::create_new(target).map_err(fail)?;
    let mut writer = CountingWriter::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
    writer.write_all(data).map_err(fail)?;
    writer.flush().map_err(fail)?;
    Ok(writer.total_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::disk::DefaultDiskSpaceAdvisor;
    use crate::types::SafePath;
    use tempfile::TempDir;

    fn asset(path: &str, content: &[u8], meta: Option<&[u8]>) -> LogicalAsset {
        LogicalAsset {
            guid: "g".into(),
            index: 0,
            path: SafePath::from_pathname(path).unwrap(),
            is_folder: false,
            content: content.to_vec(),
            size: content.len() as u64,
            truncated: false,
            meta: meta.map(<[u8]>::to_vec),
            preview_image: None,
        }
    }

    #[test]
    fn test_meta_path() {
        assert_eq!(
            meta_path(Path::new("a/b/Player.cs")),
            PathBuf::from("a/b/Player.cs.meta")
        );
    }

    #[test]
    fn test_write_with_meta() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("Assets/Scripts/A.cs");
        let asset = asset("Assets/Scripts/A.cs", b"class A {}", Some(b"guid: g"));

        let written = write_asset(&asset, &target, true, &DefaultDiskSpaceAdvisor).unwrap();

        assert_eq!(written.bytes, 10);
        assert!(written.meta_written);
        assert_eq!(fs::read(&target).unwrap(), b"class A {}");
        assert_eq!(fs::read(meta_path(&target)).unwrap(), b"guid: g");
    }

    #[test]
    fn test_meta_disabled() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a.txt");
        let asset = asset("a.txt", b"x", Some(b"m"));

        let written = write_asset(&asset, &target, false, &DefaultDiskSpaceAdvisor).unwrap();

        assert!(!written.meta_written);
        assert!(!meta_path(&target).exists());
    }

    #[test]
    fn test_folder_asset() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("Assets/Empty");
        let mut folder = asset("Assets/Empty", b"", Some(b"folderAsset: yes"));
        folder.is_folder = true;

        let written = write_asset(&folder, &target, true, &DefaultDiskSpaceAdvisor).unwrap();

        assert!(target.is_dir());
        assert_eq!(written.bytes, 0);
        assert!(meta_path(&target).is_file());
    }

    #[test]
    fn test_late_meta_next_to_asset() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("Assets/a.txt");
        write_asset(&asset("Assets/a.txt", b"a", None), &target, true, &DefaultDiskSpaceAdvisor)
            .unwrap();

        write_late_meta(&target, b"guid: g", &DefaultDiskSpaceAdvisor).unwrap();

        assert_eq!(fs::read(meta_path(&target)).unwrap(), b"guid: g");
        assert!(write_late_meta(&target, b"again", &DefaultDiskSpaceAdvisor).is_err());
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a.txt");
        fs::write(&target, b"original").unwrap();

        let result = write_asset(&asset("a.txt", b"new", None), &target, true, &DefaultDiskSpaceAdvisor);

        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"original");
    }
}
