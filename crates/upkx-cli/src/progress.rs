//! Progress spinner for extraction.

use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressState;
use indicatif::ProgressStyle;
use std::fmt::Write;
use std::path::Path;
use std::time::Duration;
use upkx_core::ProgressCallback;

/// CLI spinner implementing `ProgressCallback`.
///
/// The asset count is unknown until the archive is fully read, so this
/// shows a running count, bytes written, throughput and elapsed time
/// instead of a bar. Cleared on drop.
pub struct CliProgress {
    bar: ProgressBar,
    bytes_written: u64,
    assets_done: u64,
}

impl CliProgress {
    #[must_use]
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();

        // "⠋ Extracting 42 assets (15.2 MB, 5.1 MB/s, 3s) Scripts/Player.cs"
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(
                    "{spinner:.cyan} {prefix} {pos} assets ({bytes}, {bytes_per_sec}, {elapsed_short}) {wide_msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .with_key("bytes", |state: &ProgressState, w: &mut dyn Write| {
                    write!(w, "{}", humanize_bytes(state.len().unwrap_or(0))).unwrap_or(());
                })
                .with_key("bytes_per_sec", |state: &ProgressState, w: &mut dyn Write| {
                    let elapsed = state.elapsed().as_secs_f64();
                    let bytes = state.len().unwrap_or(0) as f64;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let per_sec = if elapsed > 0.0 {
                        (bytes / elapsed) as u64
                    } else {
                        0
                    };
                    write!(w, "{}/s", humanize_bytes(per_sec)).unwrap_or(());
                })
                .with_key("elapsed_short", |state: &ProgressState, w: &mut dyn Write| {
                    write!(w, "{}", humanize_duration(state.elapsed())).unwrap_or(());
                }),
        );

        bar.set_prefix(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            bar,
            bytes_written: 0,
            assets_done: 0,
        }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show() -> bool {
        Term::stderr().is_term()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_asset_start(&mut self, path: &Path, _index: usize) {
        self.bar.set_message(path.display().to_string());
    }

    // Bytes are tracked in the bar's length so `pos` can count assets.
    fn on_bytes_written(&mut self, bytes: u64) {
        self.bytes_written += bytes;
        self.bar.set_length(self.bytes_written);
    }

    fn on_asset_complete(&mut self, _path: &Path) {
        self.assets_done += 1;
        self.bar.set_position(self.assets_done);
    }

    fn on_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Converts bytes to human-readable format (KB, MB, GB, TB).
fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match bytes {
        b if b >= TB => format!("{:.1} TB", b as f64 / TB as f64),
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

fn humanize_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
