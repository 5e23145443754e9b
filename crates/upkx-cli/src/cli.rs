//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upkx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a .unitypackage into a project tree
    Extract(ExtractArgs),
    /// Inspect package contents without extracting
    Preview(PreviewArgs),
    /// Scan a package or an extracted directory for malicious content
    Scan(ScanArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Path to the .unitypackage file
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// Output directory (default: current directory)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Keep package paths instead of grouping by category
    #[arg(long)]
    pub flat: bool,

    /// Directory for the staging tree (default: inside the output directory)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Do not write .meta sidecars
    #[arg(long)]
    pub no_meta: bool,

    /// Maximum size of a single asset (K, M, G, T suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_asset_size: Option<u64>,

    /// Maximum total asset bytes (K, M, G, T suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_package_size: Option<u64>,

    /// Maximum number of assets
    #[arg(long)]
    pub max_assets: Option<u64>,

    /// Number of write workers (default: available parallelism, at most 16)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=16))]
    pub workers: Option<u16>,

    /// Scan extracted files for malicious content
    #[arg(long)]
    pub scan: bool,

    /// Scan rule set (JSON) used with --scan
    #[arg(long, value_name = "FILE", requires = "scan")]
    pub rules: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct PreviewArgs {
    /// Path to the .unitypackage file
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// Bytes of content kept per asset (K, M suffixes, at most 8M)
    #[arg(long, value_parser = parse_byte_size)]
    pub preview_bytes: Option<u64>,

    /// Write preview thumbnails to a temporary directory
    #[arg(long)]
    pub images: bool,

    /// Parent directory for the thumbnail directory
    #[arg(long, value_name = "DIR", requires = "images")]
    pub temp_dir: Option<PathBuf>,

    /// List every asset
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args)]
pub struct ScanArgs {
    /// Path to the .unitypackage file
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// Scan this extracted directory instead of the package contents
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Scan rule set (JSON)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Skip files larger than this (K, M, G suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_content_size: Option<u64>,

    /// Exit with an error when the package is judged malicious
    #[arg(long)]
    pub fail_on_malicious: bool,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Parse byte size with optional suffix (K, M, G, T)
#[allow(clippy::option_if_let_else)]
pub fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty byte size".to_string());
    }

    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('T') {
        (stripped, 1024_u64.pow(4))
    } else if let Some(stripped) = s.strip_suffix('G') {
        (stripped, 1024_u64.pow(3))
    } else if let Some(stripped) = s.strip_suffix('M') {
        (stripped, 1024_u64.pow(2))
    } else if let Some(stripped) = s.strip_suffix('K') {
        (stripped, 1024)
    } else {
        (s, 1)
    };

    num_str
        .parse::<u64>()
        .map_err(|_| format!("invalid byte size: {s}"))
        .and_then(|n| {
            n.checked_mul(multiplier)
                .ok_or_else(|| format!("byte size overflow: {s}"))
        })
}
