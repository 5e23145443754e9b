//! Test utilities for building in-memory packages.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Gzip-compresses `data` at the default level.
#[must_use]
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Writes `bytes` to `dir/name` and returns the path.
pub fn write_package(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Builder for `.unitypackage` test archives.
///
/// Asset helpers emit GUID directories in the order Unity writes them:
/// `asset`, `asset.meta`, `pathname`, then `preview.png`. The raw helpers
/// allow arbitrary layouts.
///
/// # Examples
///
/// ```
/// use upkx_core::test_utils::PackageBuilder;
///
/// let package = PackageBuilder::new()
///     .asset("0a1b", "Assets/Scripts/Player.cs", b"class Player {}")
///     .folder("2c3d", "Assets/Scripts")
///     .build();
/// assert!(!package.is_empty());
/// ```
pub struct PackageBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl PackageBuilder {
    /// Creates an empty package builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    /// Adds a regular file entry at `path`.
    #[must_use]
    pub fn raw_file(mut self, path: &str, data: &[u8]) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append_data(&mut header, path, data).unwrap();
        self
    }

    /// Adds a directory entry at `path`.
    #[must_use]
    pub fn raw_directory(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a symlink entry at `path`.
    #[must_use]
    pub fn raw_symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a complete asset with a `.meta` sidecar.
    #[must_use]
    pub fn asset(self, guid: &str, pathname: &str, content: &[u8]) -> Self {
        self.raw_file(&format!("{guid}/asset"), content)
            .raw_file(&format!("{guid}/asset.meta"), meta_for(guid).as_bytes())
            .raw_file(&format!("{guid}/pathname"), pathname.as_bytes())
    }

    /// Adds an asset without a `.meta` sidecar.
    #[must_use]
    pub fn asset_without_meta(self, guid: &str, pathname: &str, content: &[u8]) -> Self {
        self.raw_file(&format!("{guid}/asset"), content)
            .raw_file(&format!("{guid}/pathname"), pathname.as_bytes())
    }

    /// Adds an asset with a `.meta` sidecar and a `preview.png` thumbnail.
    #[must_use]
    pub fn asset_with_preview(self, guid: &str, pathname: &str, content: &[u8], png: &[u8]) -> Self {
        self.asset(guid, pathname, content)
            .raw_file(&format!("{guid}/preview.png"), png)
    }

    /// Adds a folder asset: `.meta` and `pathname` but no `asset`.
    #[must_use]
    pub fn folder(self, guid: &str, pathname: &str) -> Self {
        let meta = format!("{}folderAsset: yes\n", meta_for(guid));
        self.raw_file(&format!("{guid}/asset.meta"), meta.as_bytes())
            .raw_file(&format!("{guid}/pathname"), pathname.as_bytes())
    }

    /// Returns the uncompressed tar stream.
    #[must_use]
    pub fn build_tar(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    /// Returns the gzip-compressed package.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        gzip(&self.build_tar())
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn meta_for(guid: &str) -> String {
    format!("fileFormatVersion: 2\nguid: {guid}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_paths(tar_bytes: Vec<u8>) -> Vec<String> {
        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_asset_layout() {
        let paths = entry_paths(
            PackageBuilder::new()
                .asset_with_preview("g1", "Assets/a.png", b"x", b"p")
                .build_tar(),
        );
        assert_eq!(
            paths,
            vec!["g1/asset", "g1/asset.meta", "g1/pathname", "g1/preview.png"]
        );
    }

    #[test]
    fn test_folder_has_no_asset() {
        let paths = entry_paths(PackageBuilder::new().folder("g1", "Assets/Dir").build_tar());
        assert_eq!(paths, vec!["g1/asset.meta", "g1/pathname"]);
    }

    #[test]
    fn test_gzip_round_trip() {
        let compressed = gzip(b"hello");
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "hello");
    }
}
