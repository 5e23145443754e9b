//! Extraction orchestrator.
//!
//! Reading and assembly are sequential. Validated assets are handed to a
//! bounded pool of write workers through a channel whose capacity equals the
//! worker count, so the reader never runs far ahead of the disk. Workers
//! write into a staging tree; the orchestrating thread collects their
//! reports, drives progress callbacks and, once everything succeeded,
//! commits the staging tree into the output directory.
//!
//! `.meta` sidecars that the archive stores after their asset was already
//! dispatched are written by the orchestrating thread once the pool drained.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::atomic::StagedItem;
use super::atomic::StagingArea;
use super::stream::WrittenAsset;
use super::stream::meta_path;
use super::stream::write_asset;
use super::stream::write_late_meta;
use crate::CancellationToken;
use crate::ExtractionError;
use crate::ExtractionOptions;
use crate::ExtractionResult;
use crate::ProgressCallback;
use crate::Result;
use crate::ScanOptions;
use crate::classify::output_relative_path;
use crate::disk::DefaultDiskSpaceAdvisor;
use crate::disk::DiskSpaceAdvisor;
use crate::package::AssetAssembler;
use crate::package::ContentPolicy;
use crate::package::LateSidecars;
use crate::package::LogicalAsset;
use crate::package::PackageReader;
use crate::package::reader::EntrySource;
use crate::scan::MaliciousContentScanner;
use crate::scan::RuleSet;
use crate::security::LimitEnforcer;
use crate::security::PackageBudget;
use crate::types::DestDir;

/// Lifecycle of an extraction job.
///
/// `Init → Reading → Validating → Writing → Completed`. `Failed` and
/// `Cancelled` are reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    /// Options resolved, staging not yet created.
    Init,
    /// Pulling the next asset from the package.
    Reading,
    /// Applying limits to an assembled asset.
    Validating,
    /// Handing an asset to the write pool, or committing.
    Writing,
    /// Committed successfully.
    Completed,
    /// Aborted by an error; output rolled back.
    Failed,
    /// Aborted by cancellation; output rolled back.
    Cancelled,
}

impl ExtractionState {
    /// Returns `true` for `Completed`, `Failed` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Reading => "reading",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

struct WriteJob {
    asset: LogicalAsset,
    relative: PathBuf,
}

struct WriteReport {
    index: usize,
    relative: PathBuf,
    is_folder: bool,
    outcome: Result<WrittenAsset>,
}

#[derive(Default)]
struct Collected {
    written: Vec<(usize, PathBuf, bool, WrittenAsset)>,
    warnings: Vec<String>,
    orphaned: usize,
}

/// Extracts `.unitypackage` files.
///
/// # Examples
///
/// ```no_run
/// use upkx_core::ExtractionOptions;
/// use upkx_core::NoopProgress;
/// use upkx_core::extraction::Extractor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut extractor = Extractor::new(ExtractionOptions::default());
/// let result = extractor.extract("Asset.unitypackage", "out", &mut NoopProgress)?;
/// println!("{} files, {} bytes", result.total_files, result.total_bytes);
/// # Ok(())
/// # }
/// ```
pub struct Extractor {
    options: ExtractionOptions,
    cancel: CancellationToken,
    advisor: Box<dyn DiskSpaceAdvisor>,
    rules: RuleSet,
    state: ExtractionState,
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Creates an extractor with the default disk advisor and built-in scan
    /// rules.
    #[must_use]
    pub fn new(options: ExtractionOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
            advisor: Box::new(DefaultDiskSpaceAdvisor),
            rules: RuleSet::builtin(),
            state: ExtractionState::Init,
        }
    }

    /// Uses `cancel` for cooperative cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the disk-full advisor.
    #[must_use]
    pub fn with_disk_advisor(mut self, advisor: Box<dyn DiskSpaceAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    /// Replaces the rule set used by post-extraction scanning.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Token observed by this extractor.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current (or final) state.
    #[must_use]
    pub const fn state(&self) -> ExtractionState {
        self.state
    }

    /// Extracts `package` into `output_dir`, creating it if needed.
    ///
    /// Either every asset is committed or, on any error or cancellation,
    /// nothing from this job remains in `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: corrupt package, suspected bomb,
    /// breached limit, unsafe path, I/O failure or cancellation.
    pub fn extract(
        &mut self,
        package: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ExtractionResult> {
        let package = package.as_ref();
        let started = Instant::now();
        self.state = ExtractionState::Init;

        let output = match DestDir::create(output_dir.as_ref()) {
            Ok(output) => output,
            Err(e) => return Err(self.fail(e)),
        };
        let staging = match self.create_staging(&output) {
            Ok(staging) => staging,
            Err(e) => return Err(self.fail(e)),
        };

        let collected = match self.run(package, &staging, progress) {
            Ok(collected) => collected,
            Err(e) => {
                staging.rollback();
                return Err(self.fail(e));
            }
        };

        if let Err(e) = self.cancel.check() {
            staging.rollback();
            return Err(self.fail(e));
        }

        let mut written = collected.written;
        written.sort_by_key(|(index, ..)| *index);

        let mut items = Vec::with_capacity(written.len());
        let mut result = ExtractionResult {
            source: package.to_path_buf(),
            output_dir: output.as_path().to_path_buf(),
            warnings: collected.warnings,
            orphaned_assets: collected.orphaned,
            ..ExtractionResult::default()
        };

        for (_, relative, is_folder, asset) in &written {
            if *is_folder {
                items.push(StagedItem::Dir(relative.clone()));
                result.directories_created += 1;
            } else {
                items.push(StagedItem::File(relative.clone()));
                result.extracted_files.push(output.join_path(relative));
                result.total_bytes = result.total_bytes.saturating_add(asset.bytes);
            }
            if asset.meta_written {
                items.push(StagedItem::File(meta_path(relative)));
                result.meta_files_written += 1;
            }
        }
        result.total_files = result.extracted_files.len();

        self.transition(ExtractionState::Writing);
        if let Err(e) = staging.commit(&items, self.advisor.as_ref()) {
            return Err(self.fail(e));
        }

        if self.options.scan_after_extract {
            self.attach_scan(&mut result);
        }

        result.duration = started.elapsed();
        self.transition(ExtractionState::Completed);
        progress.on_complete();

        info!(
            package = %package.display(),
            output = %result.output_dir.display(),
            files = result.total_files,
            bytes = result.total_bytes,
            directories = result.directories_created,
            orphaned = result.orphaned_assets,
            "extraction completed"
        );
        Ok(result)
    }

    fn create_staging(&self, output: &DestDir) -> Result<StagingArea> {
        match &self.options.temp_dir {
            Some(dir) => {
                let root = DestDir::create(dir)?;
                StagingArea::create(output, Some(root.as_path()))
            }
            None => StagingArea::create(output, None),
        }
    }

    fn run(
        &mut self,
        package: &Path,
        staging: &StagingArea,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Collected> {
        let gate = LimitEnforcer::new(self.options.effective_limits());
        let workers = self.options.workers.get();

        transition(&mut self.state, ExtractionState::Reading);
        let mut reader = PackageReader::open(package, self.cancel.clone())?;
        let mut assembler = AssetAssembler::new(reader.entries()?, ContentPolicy::Full(gate));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("upkx-writer-{i}"))
            .build()
            .map_err(|e| ExtractionError::io(staging.path(), std::io::Error::other(e)))?;

        let (job_tx, job_rx) = crossbeam_channel::bounded::<WriteJob>(workers);
        let (report_tx, report_rx) = crossbeam_channel::unbounded::<WriteReport>();
        let abort = AtomicBool::new(false);
        let mut budget = PackageBudget::new();

        let advisor: &dyn DiskSpaceAdvisor = self.advisor.as_ref();
        let cancel = &self.cancel;
        let options = &self.options;
        let state = &mut self.state;
        let staging_root = staging.path();

        let outcome = pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let report_tx = report_tx.clone();
                let abort = &abort;
                scope.spawn(move |_| {
                    write_worker(
                        &job_rx,
                        &report_tx,
                        staging_root,
                        options.write_meta,
                        advisor,
                        cancel,
                        abort,
                    );
                });
            }
            drop(report_tx);
            drop(job_rx);

            let mut collected = Collected::default();
            let mut producer = Producer {
                options,
                cancel,
                state,
                gate: &gate,
                budget: &mut budget,
                progress: &mut *progress,
            };
            let produced = producer.run(&mut assembler, job_tx, &report_rx, &mut collected);
            if produced.is_err() {
                abort.store(true, Ordering::SeqCst);
            }

            // Workers exit once the job channel is closed and drained.
            let mut first_error = produced.err();
            for report in &report_rx {
                if let Err(e) = record(report, &mut collected, &mut *progress)
                    && first_error.is_none()
                {
                    abort.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(collected),
            }
        });

        let mut collected = outcome?;
        let late = assembler.take_late_sidecars();
        self.write_late_meta(late, staging.path(), &mut budget, &gate, &mut collected)?;

        let stats = assembler.stats();
        collected.orphaned = stats.orphaned.len();
        for guid in &stats.orphaned {
            collected.warnings.push(
                ExtractionError::AssetMissingPathname { guid: guid.clone() }.to_string(),
            );
        }
        Ok(collected)
    }

    /// Writes `.meta` sidecars that arrived after their asset was written
    /// and marks those assets as having one.
    fn write_late_meta(
        &self,
        late: Vec<LateSidecars>,
        staging_root: &Path,
        budget: &mut PackageBudget,
        gate: &LimitEnforcer,
        collected: &mut Collected,
    ) -> Result<()> {
        if !self.options.write_meta || late.iter().all(|l| l.meta.is_none()) {
            return Ok(());
        }

        let positions: HashMap<usize, usize> = collected
            .written
            .iter()
            .enumerate()
            .map(|(position, (index, ..))| (*index, position))
            .collect();

        for sidecars in late {
            let Some(meta) = sidecars.meta else {
                continue;
            };
            let Some(&position) = positions.get(&sidecars.index) else {
                debug!(guid = %sidecars.guid, "late meta for an asset that was not written");
                continue;
            };
            self.cancel.check()?;

            let (_, relative, _, written) = &mut collected.written[position];
            budget.charge(meta.len() as u64, gate)?;
            write_late_meta(&staging_root.join(&*relative), &meta, self.advisor.as_ref())?;
            written.meta_written = true;
            debug!(guid = %sidecars.guid, path = %relative.display(), "late meta written");
        }
        Ok(())
    }

    fn attach_scan(&self, result: &mut ExtractionResult) {
        let scan = MaliciousContentScanner::new(&self.rules, ScanOptions::default()).and_then(
            |scanner| scanner.scan_files(&result.source, &result.output_dir, &result.extracted_files),
        );
        match scan {
            Ok(scan) => result.scan = Some(scan),
            Err(e) => {
                warn!(error = %e, "post-extraction scan failed");
                result.warnings.push(format!("scan failed: {e}"));
            }
        }
    }

    fn transition(&mut self, next: ExtractionState) {
        transition(&mut self.state, next);
    }

    fn fail(&mut self, err: ExtractionError) -> ExtractionError {
        let state = if matches!(err, ExtractionError::Cancelled) {
            ExtractionState::Cancelled
        } else {
            ExtractionState::Failed
        };
        self.transition(state);
        warn!(error = %err, "extraction aborted, output rolled back");
        err
    }
}

/// Sequential half of the pipeline: reads, validates and dispatches.
struct Producer<'a> {
    options: &'a ExtractionOptions,
    cancel: &'a CancellationToken,
    state: &'a mut ExtractionState,
    gate: &'a LimitEnforcer,
    budget: &'a mut PackageBudget,
    progress: &'a mut dyn ProgressCallback,
}

impl Producer<'_> {
    fn run<I, E>(
        &mut self,
        assembler: &mut AssetAssembler<I>,
        job_tx: Sender<WriteJob>,
        report_rx: &Receiver<WriteReport>,
        collected: &mut Collected,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<E>>,
        E: EntrySource,
    {
        let organize = self.options.organize_by_categories;
        // Keyed case-insensitively: Windows and macOS volumes fold case.
        let mut destinations = HashSet::new();

        loop {
            transition(self.state, ExtractionState::Reading);
            self.cancel.check()?;
            let Some(asset) = assembler.next() else {
                break;
            };
            let asset = asset?;

            transition(self.state, ExtractionState::Validating);
            let meta_bytes = match asset.meta.as_ref() {
                Some(meta) if self.options.write_meta => meta.len() as u64,
                _ => 0,
            };
            self.budget
                .reserve_with_sidecars(asset.size, meta_bytes, self.gate)?;

            if asset.is_folder && organize {
                debug!(path = %asset.path, "folder asset not materialized in category layout");
                continue;
            }

            let relative = output_relative_path(&asset.path, organize);
            if !destinations.insert(relative.to_string_lossy().to_lowercase()) {
                let message = format!(
                    "skipped asset {} ({}): destination {} already used",
                    asset.guid,
                    asset.path,
                    relative.display()
                );
                warn!("{message}");
                collected.warnings.push(message);
                continue;
            }

            transition(self.state, ExtractionState::Writing);
            self.progress.on_asset_start(&relative, asset.index);
            if job_tx.send(WriteJob { asset, relative }).is_err() {
                break;
            }

            while let Ok(report) = report_rx.try_recv() {
                record(report, collected, self.progress)?;
            }
        }

        Ok(())
    }
}

fn transition(state: &mut ExtractionState, next: ExtractionState) {
    if *state != next {
        debug!(from = %*state, to = %next, "extraction state");
        *state = next;
    }
}

fn write_worker(
    jobs: &Receiver<WriteJob>,
    reports: &Sender<WriteReport>,
    staging_root: &Path,
    write_meta: bool,
    advisor: &dyn DiskSpaceAdvisor,
    cancel: &CancellationToken,
    abort: &AtomicBool,
) {
    for job in jobs {
        if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
            continue;
        }

        let target = staging_root.join(&job.relative);
        let outcome = write_asset(&job.asset, &target, write_meta, advisor);
        let report = WriteReport {
            index: job.asset.index,
            relative: job.relative,
            is_folder: job.asset.is_folder,
            outcome,
        };
        if reports.send(report).is_err() {
            break;
        }
    }
}

fn record(
    report: WriteReport,
    collected: &mut Collected,
    progress: &mut dyn ProgressCallback,
) -> Result<()> {
    let written = report.outcome?;
    progress.on_bytes_written(written.bytes);
    progress.on_asset_complete(&report.relative);
    collected
        .written
        .push((report.index, report.relative, report.is_folder, written));
    Ok(())
}
