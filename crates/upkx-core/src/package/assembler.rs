//! Streaming group-by of raw entries into logical assets.
//!
//! Entries are bucketed by GUID (the first path segment). A bucket holding a
//! `pathname` and an `asset` is released as soon as the stream moves on to a
//! different GUID. Anything still open at end of stream is released then:
//! pathname-only buckets become folder assets and buckets without a
//! `pathname` are orphaned.
//!
//! An `asset.meta` or `preview.png` that shows up after its GUID was
//! released is kept aside and handed out by
//! [`AssetAssembler::take_late_sidecars`]. A late `asset` or `pathname` is a
//! duplicate and fails the job.
//!
//! # Resource caveat
//!
//! Because `pathname` may arrive after `asset`, content is buffered before the
//! destination is known. In [`ContentPolicy::Full`] mode every buffered byte
//! (asset content, `asset.meta` and `preview.png`) is charged to the
//! package-size limit, so pathological archives that interleave many
//! incomplete GUIDs or carry oversized sidecars hit that limit rather than
//! exhausting memory. In [`ContentPolicy::Prefix`] mode each bucket holds at
//! most the prefix plus its capped sidecars.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::Read;

use tracing::debug;
use tracing::warn;

use super::asset::LogicalAsset;
use super::reader::EntrySource;
use super::reader::read_failure;
use crate::ExtractionError;
use crate::Result;
use crate::security::LimitEnforcer;
use crate::types::SafePath;

/// Size cap for `asset.meta`, `preview.png` and `pathname` entries.
pub const MAX_SIDECAR_BYTES: u64 = 16 * 1024 * 1024;

const PREALLOC_CAP: u64 = 8 * 1024 * 1024;

/// How `asset` content is buffered.
#[derive(Debug, Clone, Copy)]
pub enum ContentPolicy {
    /// Buffer the whole asset. Exceeding the asset or package limit fails
    /// the job.
    Full(LimitEnforcer),

    /// Keep at most this many bytes and flag the asset as truncated.
    /// Never fails on size.
    Prefix(usize),
}

/// Diagnostics collected while assembling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// File entries consumed.
    pub entries: u64,

    /// GUIDs that never received a `pathname`, in encounter order.
    pub orphaned: Vec<String>,

    /// Entries ignored (top-level files and unknown parts).
    pub ignored: u64,
}

/// Sidecars that arrived after their asset had already been yielded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LateSidecars {
    /// GUID directory name.
    pub guid: String,

    /// Encounter index of the asset the sidecars belong to.
    pub index: usize,

    /// Bytes of a late `asset.meta`.
    pub meta: Option<Vec<u8>>,

    /// Bytes of a late `preview.png`.
    pub preview_image: Option<Vec<u8>>,
}

/// What is remembered about a yielded asset.
#[derive(Debug, Clone, Copy)]
struct Released {
    index: usize,
    has_meta: bool,
    has_preview: bool,
}

#[derive(Debug)]
struct Bucket {
    index: usize,
    pathname: Option<SafePath>,
    content: Option<Vec<u8>>,
    size: u64,
    truncated: bool,
    meta: Option<Vec<u8>>,
    preview_image: Option<Vec<u8>>,
}

impl Bucket {
    const fn new(index: usize) -> Self {
        Self {
            index,
            pathname: None,
            content: None,
            size: 0,
            truncated: false,
            meta: None,
            preview_image: None,
        }
    }

    const fn is_complete(&self) -> bool {
        self.pathname.is_some() && self.content.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Asset,
    Meta,
    Preview,
    Pathname,
}

impl Part {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "asset" => Some(Self::Asset),
            "asset.meta" => Some(Self::Meta),
            "preview.png" => Some(Self::Preview),
            "pathname" => Some(Self::Pathname),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Meta => "asset.meta",
            Self::Preview => "preview.png",
            Self::Pathname => "pathname",
        }
    }
}

/// Iterator adapter turning raw entries into [`LogicalAsset`]s.
///
/// Yields assets as they complete, then the end-of-stream remainder in
/// encounter order. The first error ends the sequence.
#[derive(Debug)]
pub struct AssetAssembler<I> {
    entries: I,
    policy: ContentPolicy,
    open: HashMap<String, Bucket>,
    released: HashMap<String, Released>,
    late: HashMap<String, LateSidecars>,
    current: Option<String>,
    ready: VecDeque<LogicalAsset>,
    next_index: usize,
    buffered_total: u64,
    stats: AssemblyStats,
    finished: bool,
}

impl<I, E> AssetAssembler<I>
where
    I: Iterator<Item = Result<E>>,
    E: EntrySource,
{
    /// Wraps an entry sequence.
    pub fn new(entries: I, policy: ContentPolicy) -> Self {
        Self {
            entries,
            policy,
            open: HashMap::new(),
            released: HashMap::new(),
            late: HashMap::new(),
            current: None,
            ready: VecDeque::new(),
            next_index: 0,
            buffered_total: 0,
            stats: AssemblyStats::default(),
            finished: false,
        }
    }

    /// Diagnostics so far. Complete once the iterator returned `None`.
    #[must_use]
    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }

    /// Drains sidecars that arrived after their asset was yielded, in
    /// asset encounter order. Complete once the iterator returned `None`.
    pub fn take_late_sidecars(&mut self) -> Vec<LateSidecars> {
        let mut late: Vec<LateSidecars> = self.late.drain().map(|(_, late)| late).collect();
        late.sort_by_key(|late| late.index);
        late
    }

    /// Number of GUID buckets currently buffered.
    #[must_use]
    pub fn open_buckets(&self) -> usize {
        self.open.len()
    }

    fn accept(&mut self, mut entry: E) -> Result<()> {
        self.stats.entries += 1;

        let path = entry.path().to_string();
        let Some((guid, part_name)) = path.split_once('/') else {
            debug!(path = %path, "ignoring top-level package entry");
            self.stats.ignored += 1;
            return Ok(());
        };
        let Some(part) = Part::parse(part_name).filter(|_| !guid.is_empty()) else {
            debug!(path = %path, "ignoring unknown package entry");
            self.stats.ignored += 1;
            return Ok(());
        };

        if self.current.as_deref() != Some(guid) {
            self.release_current();
            self.current = Some(guid.to_string());
        }

        if let Some(released) = self.released.get(guid).copied() {
            return self.accept_late(&mut entry, guid, part, released);
        }

        if !self.open.contains_key(guid) {
            let bucket = Bucket::new(self.next_index);
            self.next_index += 1;
            self.open.insert(guid.to_string(), bucket);
        }

        let duplicate = self.open.get(guid).is_some_and(|bucket| match part {
            Part::Asset => bucket.content.is_some(),
            Part::Meta => bucket.meta.is_some(),
            Part::Preview => bucket.preview_image.is_some(),
            Part::Pathname => bucket.pathname.is_some(),
        });
        if duplicate {
            return Err(duplicate_part(guid, part));
        }

        match part {
            Part::Asset => {
                let (content, size, truncated) = self.read_content(&mut entry, guid)?;
                if let Some(bucket) = self.open.get_mut(guid) {
                    bucket.content = Some(content);
                    bucket.size = size;
                    bucket.truncated = truncated;
                }
            }
            Part::Meta => {
                let meta = read_sidecar(&mut entry, guid, part)?;
                self.charge_sidecar(meta.len() as u64)?;
                if let Some(bucket) = self.open.get_mut(guid) {
                    bucket.meta = Some(meta);
                }
            }
            Part::Preview => {
                let preview = read_sidecar(&mut entry, guid, part)?;
                self.charge_sidecar(preview.len() as u64)?;
                if let Some(bucket) = self.open.get_mut(guid) {
                    bucket.preview_image = Some(preview);
                }
            }
            Part::Pathname => {
                let raw = read_sidecar(&mut entry, guid, part)?;
                let pathname = decode_pathname(&raw, guid)?;
                if let Some(bucket) = self.open.get_mut(guid) {
                    bucket.pathname = Some(pathname);
                }
            }
        }

        Ok(())
    }

    fn accept_late(
        &mut self,
        entry: &mut E,
        guid: &str,
        part: Part,
        released: Released,
    ) -> Result<()> {
        let late = self.late.get(guid);
        let duplicate = match part {
            Part::Asset | Part::Pathname => true,
            Part::Meta => released.has_meta || late.is_some_and(|l| l.meta.is_some()),
            Part::Preview => {
                released.has_preview || late.is_some_and(|l| l.preview_image.is_some())
            }
        };
        if duplicate {
            return Err(duplicate_part(guid, part));
        }

        let data = read_sidecar(entry, guid, part)?;
        self.charge_sidecar(data.len() as u64)?;
        debug!(guid, part = part.name(), "sidecar arrived after its asset was released");

        let late = self
            .late
            .entry(guid.to_string())
            .or_insert_with(|| LateSidecars {
                guid: guid.to_string(),
                index: released.index,
                ..LateSidecars::default()
            });
        if part == Part::Meta {
            late.meta = Some(data);
        } else {
            late.preview_image = Some(data);
        }
        Ok(())
    }

    /// Adds sidecar bytes to the buffered total in [`ContentPolicy::Full`]
    /// mode.
    fn charge_sidecar(&mut self, len: u64) -> Result<()> {
        if let ContentPolicy::Full(gate) = self.policy {
            self.buffered_total = self.buffered_total.saturating_add(len);
            gate.check_package_bytes(self.buffered_total)?;
        }
        Ok(())
    }

    fn read_content(&mut self, entry: &mut E, guid: &str) -> Result<(Vec<u8>, u64, bool)> {
        let declared = entry.size();

        match self.policy {
            ContentPolicy::Full(gate) => {
                gate.check_asset_bytes(declared)?;
                gate.check_package_bytes(self.buffered_total.saturating_add(declared))?;

                let max = gate.limits().max_asset_bytes;
                let content = read_bounded(entry, max.saturating_add(1), declared)
                    .map_err(|e| read_failure(e, &format!("failed to read asset {guid}")))?;
                let actual = content.len() as u64;
                gate.check_asset_bytes(actual)?;

                self.buffered_total = self.buffered_total.saturating_add(actual);
                gate.check_package_bytes(self.buffered_total)?;

                Ok((content, actual, false))
            }
            ContentPolicy::Prefix(max) => {
                let max = max as u64;
                let content = read_bounded(entry, max, declared)
                    .map_err(|e| read_failure(e, &format!("failed to read asset {guid}")))?;
                let truncated = declared > max;
                Ok((content, declared, truncated))
            }
        }
    }

    fn release_current(&mut self) {
        let Some(guid) = self.current.take() else {
            return;
        };
        if self.open.get(&guid).is_some_and(Bucket::is_complete)
            && let Some(bucket) = self.open.remove(&guid)
            && let Some(asset) = into_asset(guid.clone(), bucket)
        {
            debug!(guid = %guid, path = %asset.path, "asset assembled");
            self.released.insert(
                guid,
                Released {
                    index: asset.index,
                    has_meta: asset.has_meta(),
                    has_preview: asset.has_preview_image(),
                },
            );
            self.ready.push_back(asset);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.release_current();

        let mut remaining: Vec<(String, Bucket)> = self.open.drain().collect();
        remaining.sort_by_key(|(_, bucket)| bucket.index);

        for (guid, bucket) in remaining {
            match into_asset(guid.clone(), bucket) {
                Some(asset) => {
                    debug!(guid = %guid, path = %asset.path, folder = asset.is_folder, "asset assembled at end of stream");
                    self.ready.push_back(asset);
                }
                None => {
                    let diagnostic = ExtractionError::AssetMissingPathname { guid: guid.clone() };
                    warn!(guid = %guid, "{diagnostic}, dropping");
                    self.stats.orphaned.push(guid);
                }
            }
        }
    }

    fn fail(&mut self, err: ExtractionError) -> Option<Result<LogicalAsset>> {
        self.finished = true;
        self.ready.clear();
        self.open.clear();
        self.late.clear();
        Some(Err(err))
    }
}

impl<I, E> Iterator for AssetAssembler<I>
where
    I: Iterator<Item = Result<E>>,
    E: EntrySource,
{
    type Item = Result<LogicalAsset>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(asset) = self.ready.pop_front() {
                return Some(Ok(asset));
            }
            if self.finished {
                return None;
            }

            match self.entries.next() {
                None => self.finish(),
                Some(Err(e)) => return self.fail(e),
                Some(Ok(entry)) => {
                    if let Err(e) = self.accept(entry) {
                        return self.fail(e);
                    }
                }
            }
        }
    }
}

fn into_asset(guid: String, bucket: Bucket) -> Option<LogicalAsset> {
    let path = bucket.pathname?;
    let is_folder = bucket.content.is_none();
    Some(LogicalAsset {
        guid,
        index: bucket.index,
        path,
        is_folder,
        content: bucket.content.unwrap_or_default(),
        size: bucket.size,
        truncated: bucket.truncated,
        meta: bucket.meta,
        preview_image: bucket.preview_image,
    })
}

fn duplicate_part(guid: &str, part: Part) -> ExtractionError {
    ExtractionError::ArchiveCorrupt(format!(
        "duplicate {} entry for asset {guid}",
        part.name()
    ))
}

fn read_bounded<R: Read>(reader: &mut R, max: u64, declared: u64) -> std::io::Result<Vec<u8>> {
    let capacity = usize::try_from(declared.min(max).min(PREALLOC_CAP)).unwrap_or(0);
    let mut buf = Vec::with_capacity(capacity);
    reader.take(max).read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_sidecar<E: EntrySource>(entry: &mut E, guid: &str, part: Part) -> Result<Vec<u8>> {
    let corrupt = |size: u64| {
        ExtractionError::ArchiveCorrupt(format!(
            "{} of asset {guid} is {size} bytes (cap {MAX_SIDECAR_BYTES})",
            part.name()
        ))
    };

    if entry.size() > MAX_SIDECAR_BYTES {
        return Err(corrupt(entry.size()));
    }

    let data = read_bounded(entry, MAX_SIDECAR_BYTES + 1, entry.size()).map_err(|e| {
        read_failure(e, &format!("failed to read {} of asset {guid}", part.name()))
    })?;
    if data.len() as u64 > MAX_SIDECAR_BYTES {
        return Err(corrupt(data.len() as u64));
    }
    Ok(data)
}

/// Decodes a `pathname` entry into a validated relative path.
///
/// Only the first line counts; Unity appends a second line to some
/// `pathname` files.
fn decode_pathname(raw: &[u8], guid: &str) -> Result<SafePath> {
    let text = std::str::from_utf8(raw).map_err(|_| {
        ExtractionError::ArchiveCorrupt(format!("pathname of asset {guid} is not valid UTF-8"))
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text.lines().next().unwrap_or_default().trim();
    SafePath::from_pathname(first_line)
}
