//! Staged, all-or-nothing commit of extracted files.
//!
//! Assets are written into a hidden staging directory first. Only a fully
//! successful job moves them into the output directory; any failure removes
//! the staging tree and every file this job already committed. Files the
//! commit replaced are parked in a backup directory and put back on
//! rollback.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::debug;
use tracing::warn;

use crate::ExtractionError;
use crate::Result;
use crate::disk::DiskSpaceAdvisor;
use crate::disk::classify_io_error;
use crate::types::DestDir;

/// Prefix of staging directory names.
pub const STAGING_PREFIX: &str = ".upkx-staging-";

/// Prefix of the directory holding files replaced by a commit.
pub const BACKUP_PREFIX: &str = ".upkx-backup-";

/// Something staged for commit, relative to both roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedItem {
    /// A regular file to move.
    File(PathBuf),
    /// A directory to create.
    Dir(PathBuf),
}

#[derive(Debug)]
struct Committed {
    target: PathBuf,
    /// Where the file previously at `target` was parked.
    backup: Option<PathBuf>,
}

/// Staging directory plus the bookkeeping needed to undo a commit.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    output: DestDir,
    backup: Option<TempDir>,
    committed: Vec<Committed>,
    created_dirs: Vec<PathBuf>,
}

impl StagingArea {
    /// Creates a staging directory under `temp_root`, or under the output
    /// directory when no root is given.
    pub fn create(output: &DestDir, temp_root: Option<&Path>) -> Result<Self> {
        let root = temp_root.unwrap_or_else(|| output.as_path());
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| ExtractionError::io(root, e))?;
        debug!(staging = %dir.path().display(), "staging directory created");

        Ok(Self {
            dir,
            output: output.clone(),
            backup: None,
            committed: Vec::new(),
            created_dirs: Vec::new(),
        })
    }

    /// Root of the staging tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Staging location of an output-relative path.
    #[must_use]
    pub fn stage_path(&self, relative: &Path) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Moves every staged item into the output directory.
    ///
    /// Existing files at the destination are replaced. On failure everything
    /// committed so far is removed and replaced files are restored before
    /// the error is returned. I/O failures go through `advisor` so a full
    /// volume is reported as such.
    pub fn commit(mut self, items: &[StagedItem], advisor: &dyn DiskSpaceAdvisor) -> Result<()> {
        for item in items {
            if let Err(e) = self.commit_item(item, advisor) {
                self.rollback();
                return Err(e);
            }
        }
        debug!(
            items = items.len(),
            replaced = self.committed.iter().filter(|c| c.backup.is_some()).count(),
            "staging committed"
        );
        if let Some(backup) = self.backup.take() {
            let path = backup.path().to_path_buf();
            if let Err(e) = backup.close() {
                warn!(backup = %path.display(), error = %e, "failed to remove backup directory");
            }
        }
        Ok(())
    }

    /// Removes the staging tree and anything already committed, restoring
    /// files the commit replaced.
    pub fn rollback(mut self) {
        let mut restore_failed = false;
        for entry in self.committed.drain(..).rev() {
            match fs::remove_file(&entry.target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.target.display(), error = %e, "failed to remove committed file");
                }
            }
            if let Some(backup) = entry.backup
                && let Err(e) = fs::rename(&backup, &entry.target)
            {
                warn!(
                    path = %entry.target.display(),
                    backup = %backup.display(),
                    error = %e,
                    "failed to restore replaced file"
                );
                restore_failed = true;
            }
        }
        for dir in self.created_dirs.drain(..).rev() {
            // Only empty directories go; anything else was not ours.
            let _ = fs::remove_dir(&dir);
        }

        if let Some(backup) = self.backup.take() {
            if restore_failed {
                let kept = backup.keep();
                warn!(backup = %kept.display(), "replaced files left in backup directory");
            } else {
                let path = backup.path().to_path_buf();
                if let Err(e) = backup.close() {
                    warn!(backup = %path.display(), error = %e, "failed to remove backup directory");
                }
            }
        }

        let staging = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(staging = %staging.display(), error = %e, "failed to remove staging directory");
        }
    }

    fn commit_item(&mut self, item: &StagedItem, advisor: &dyn DiskSpaceAdvisor) -> Result<()> {
        match item {
            StagedItem::Dir(relative) => {
                let target = self.output.join_path(relative);
                self.ensure_dir(&target, advisor)
            }
            StagedItem::File(relative) => {
                let source = self.dir.path().join(relative);
                let target = self.output.join_path(relative);
                if let Some(parent) = target.parent() {
                    self.ensure_dir(parent, advisor)?;
                }
                let backup = self.park_existing(&target, advisor)?;
                self.committed.push(Committed {
                    target: target.clone(),
                    backup,
                });
                move_file(&source, &target).map_err(|e| classify_io_error(advisor, &target, e))
            }
        }
    }

    /// Moves a non-directory at `target` into the backup directory.
    fn park_existing(
        &mut self,
        target: &Path,
        advisor: &dyn DiskSpaceAdvisor,
    ) -> Result<Option<PathBuf>> {
        match fs::symlink_metadata(target) {
            Ok(meta) if !meta.is_dir() => {}
            _ => return Ok(None),
        }

        let root = match &self.backup {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let output = self.output.as_path();
                let dir = tempfile::Builder::new()
                    .prefix(BACKUP_PREFIX)
                    .tempdir_in(output)
                    .map_err(|e| classify_io_error(advisor, output, e))?;
                let root = dir.path().to_path_buf();
                self.backup = Some(dir);
                root
            }
        };

        let backup = root.join(self.committed.len().to_string());
        fs::rename(target, &backup).map_err(|e| classify_io_error(advisor, target, e))?;
        debug!(path = %target.display(), "existing file parked for replacement");
        Ok(Some(backup))
    }

    fn ensure_dir(&mut self, dir: &Path, advisor: &dyn DiskSpaceAdvisor) -> Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(dir).map_err(|e| classify_io_error(advisor, dir, e))?;
        self.created_dirs.extend(missing.into_iter().rev());
        Ok(())
    }
}

fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(error = %rename_err, "rename failed, falling back to copy");
            if target.is_file() {
                fs::remove_file(target)?;
            }
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}
