//! Read-only package preview.
//!
//! Runs the reading and assembly stages without a destination directory.
//! Asset content is buffered only up to the preview threshold, so extraction
//! limits do not apply and oversized assets are reported as truncated
//! instead of failing the pass.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use tempfile::TempDir;
use tracing::debug;
use tracing::info;

use crate::CancellationToken;
use crate::ExtractionError;
use crate::PreviewOptions;
use crate::Result;
use crate::classify::Category;
use crate::classify::category_for;
use crate::package::AssetAssembler;
use crate::package::ContentPolicy;
use crate::package::LateSidecars;
use crate::package::LogicalAsset;
use crate::package::PackageReader;

const PREVIEW_ROOT_PREFIX: &str = "upkx-preview-";
const EDITOR_DIR: &str = "Editor";

/// One asset as seen by a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    /// GUID directory name.
    pub guid: String,

    /// Project-relative path with `/` separators.
    pub path: String,

    /// Category the asset would be filed under.
    pub category: Category,

    /// Folder asset (no content).
    pub is_folder: bool,

    /// Declared asset size.
    pub size: u64,

    /// The package carries an `asset.meta` sidecar.
    pub has_meta: bool,

    /// Asset content, or its first bytes when truncated.
    pub content: Vec<u8>,

    /// `content` is a prefix of a larger asset.
    pub is_asset_data_truncated: bool,

    /// The package carries a `preview.png` thumbnail.
    pub has_preview_image: bool,

    /// Where the thumbnail was written, when images were materialized.
    pub preview_image_path: Option<PathBuf>,
}

impl PreviewEntry {
    /// Returns the content as text when it is valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Why a directory is recommended for pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PruneReason {
    /// Editor-only code, not needed in player builds.
    EditorOnly,
    /// Folder asset with nothing inside it.
    Empty,
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EditorOnly => write!(f, "editor-only"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// A directory the caller may want to leave out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PruneCandidate {
    /// Project-relative directory with `/` separators.
    pub path: String,

    /// Reason for the recommendation.
    pub reason: PruneReason,
}

/// Outcome of [`preview_package`].
#[derive(Debug, Clone)]
pub struct PreviewResult {
    /// Package that was previewed.
    pub package: PathBuf,

    /// Package file size in bytes.
    pub package_size: u64,

    /// Package modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,

    /// Assets in archive encounter order.
    pub entries: Vec<PreviewEntry>,

    /// Sum of declared asset sizes.
    pub total_asset_bytes: u64,

    /// Directories recommended for pruning, sorted by path.
    pub prune_candidates: Vec<PruneCandidate>,

    /// GUID directories dropped for lack of a `pathname`.
    pub orphaned_assets: usize,

    /// Temporary root holding materialized thumbnails. The caller owns it;
    /// see [`dispose`](Self::dispose).
    pub temp_root: Option<PathBuf>,
}

impl PreviewResult {
    /// Number of entries whose content was truncated.
    #[must_use]
    pub fn truncated_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.is_asset_data_truncated)
            .count()
    }

    /// Removes the temporary root, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be removed. The root is
    /// forgotten either way.
    pub fn dispose(&mut self) -> Result<()> {
        let Some(root) = self.temp_root.take() else {
            return Ok(());
        };
        for entry in &mut self.entries {
            entry.preview_image_path = None;
        }
        match fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExtractionError::io(&root, e)),
        }
    }
}

/// Previews a package without extracting it.
///
/// # Errors
///
/// Returns `ArchiveCorrupt`, `DecompressionBombSuspected`, `UnsafePath`,
/// an I/O error or `Cancelled`. Oversized assets are never an error.
///
/// # Examples
///
/// ```no_run
/// use upkx_core::CancellationToken;
/// use upkx_core::PreviewOptions;
/// use upkx_core::inspection::preview_package;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let preview = preview_package(
///     "Asset.unitypackage",
///     &PreviewOptions::default(),
///     &CancellationToken::new(),
/// )?;
/// for entry in &preview.entries {
///     println!("{} ({} bytes)", entry.path, entry.size);
/// }
/// # Ok(())
/// # }
/// ```
pub fn preview_package(
    package: impl AsRef<Path>,
    options: &PreviewOptions,
    cancel: &CancellationToken,
) -> Result<PreviewResult> {
    let package = package.as_ref();
    let metadata = fs::metadata(package).map_err(|e| ExtractionError::io(package, e))?;
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    let mut reader = PackageReader::open(package, cancel.clone())?;
    let mut assembler = AssetAssembler::new(
        reader.entries()?,
        ContentPolicy::Prefix(options.effective_preview_bytes()),
    );

    let mut images: Option<TempDir> = None;
    let mut entries = Vec::new();
    let mut folders = Vec::new();
    let mut total_asset_bytes = 0u64;

    for asset in &mut assembler {
        let asset = asset?;
        total_asset_bytes = total_asset_bytes.saturating_add(asset.size);

        let preview_image_path = match asset.preview_image.as_deref() {
            Some(png) if options.materialize_preview_images => {
                let root = image_root(&mut images, options.temp_dir.as_deref())?;
                Some(write_image(root, &asset.guid, png)?)
            }
            _ => None,
        };

        if asset.is_folder {
            folders.push(asset.path.as_str().to_string());
        }
        entries.push(preview_entry(asset, preview_image_path));
    }

    let mut late: HashMap<String, LateSidecars> = assembler
        .take_late_sidecars()
        .into_iter()
        .map(|late| (late.guid.clone(), late))
        .collect();
    if !late.is_empty() {
        for entry in &mut entries {
            if let Some(sidecars) = late.remove(&entry.guid) {
                attach_late_sidecars(entry, sidecars, options, &mut images)?;
            }
        }
    }

    let orphaned_assets = assembler.stats().orphaned.len();
    let prune_candidates = prune_candidates(&entries, &folders);
    let temp_root = images.map(TempDir::keep);

    info!(
        package = %package.display(),
        assets = entries.len(),
        bytes = total_asset_bytes,
        "preview completed"
    );

    Ok(PreviewResult {
        package: package.to_path_buf(),
        package_size: metadata.len(),
        modified,
        entries,
        total_asset_bytes,
        prune_candidates,
        orphaned_assets,
        temp_root,
    })
}

fn preview_entry(asset: LogicalAsset, preview_image_path: Option<PathBuf>) -> PreviewEntry {
    PreviewEntry {
        category: category_for(&asset.path),
        path: asset.path.as_str().to_string(),
        has_meta: asset.has_meta(),
        has_preview_image: asset.has_preview_image(),
        guid: asset.guid,
        is_folder: asset.is_folder,
        size: asset.size,
        content: asset.content,
        is_asset_data_truncated: asset.truncated,
        preview_image_path,
    }
}

fn attach_late_sidecars(
    entry: &mut PreviewEntry,
    sidecars: LateSidecars,
    options: &PreviewOptions,
    images: &mut Option<TempDir>,
) -> Result<()> {
    entry.has_meta |= sidecars.meta.is_some();
    if let Some(png) = sidecars.preview_image {
        entry.has_preview_image = true;
        if options.materialize_preview_images {
            let root = image_root(images, options.temp_dir.as_deref())?;
            entry.preview_image_path = Some(write_image(root, &entry.guid, &png)?);
        }
    }
    Ok(())
}

fn image_root<'a>(slot: &'a mut Option<TempDir>, temp_dir: Option<&Path>) -> Result<&'a Path> {
    match slot {
        Some(root) => Ok(root.path()),
        None => {
            let root = create_image_root(temp_dir)?;
            Ok(slot.insert(root).path())
        }
    }
}

fn create_image_root(temp_dir: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(PREVIEW_ROOT_PREFIX);
    let root = match temp_dir {
        Some(dir) => builder.tempdir_in(dir).map_err(|e| ExtractionError::io(dir, e))?,
        None => builder
            .tempdir()
            .map_err(|e| ExtractionError::io(std::env::temp_dir(), e))?,
    };
    debug!(root = %root.path().display(), "preview image root created");
    Ok(root)
}

fn write_image(root: &Path, guid: &str, png: &[u8]) -> Result<PathBuf> {
    let path = root.join(format!("{guid}.png"));
    fs::write(&path, png).map_err(|e| ExtractionError::io(&path, e))?;
    Ok(path)
}

/// Editor directories first, then empty folder assets not already listed.
fn prune_candidates(entries: &[PreviewEntry], folders: &[String]) -> Vec<PruneCandidate> {
    let mut candidates: BTreeMap<String, PruneReason> = BTreeMap::new();

    for entry in entries {
        if let Some(dir) = editor_root(&entry.path, entry.is_folder) {
            candidates.entry(dir).or_insert(PruneReason::EditorOnly);
        }
    }

    let occupied = content_dirs(entries);
    for folder in folders {
        if !occupied.contains(folder.as_str()) {
            candidates
                .entry(folder.clone())
                .or_insert(PruneReason::Empty);
        }
    }

    candidates
        .into_iter()
        .map(|(path, reason)| PruneCandidate { path, reason })
        .collect()
}

/// Every directory that has a non-folder asset somewhere beneath it.
fn content_dirs(entries: &[PreviewEntry]) -> HashSet<&str> {
    let mut dirs = HashSet::new();
    for entry in entries.iter().filter(|e| !e.is_folder) {
        let mut path = entry.path.as_str();
        while let Some((parent, _)) = path.rsplit_once('/') {
            if !dirs.insert(parent) {
                // Ancestors of a known directory are already present.
                break;
            }
            path = parent;
        }
    }
    dirs
}

/// Shortest ancestor of `path` ending in an `Editor` component. The path
/// itself counts only when it is a folder.
fn editor_root(path: &str, is_folder: bool) -> Option<String> {
    let components: Vec<&str> = path.split('/').collect();
    let searchable = if is_folder {
        components.len()
    } else {
        components.len().saturating_sub(1)
    };
    components[..searchable]
        .iter()
        .position(|c| *c == EDITOR_DIR)
        .map(|i| components[..=i].join("/"))
}
