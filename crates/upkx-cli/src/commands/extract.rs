//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::error::add_package_context;
use crate::error::add_scan_context;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Context;
use anyhow::Result;
use std::env;
use tracing::debug;
use upkx_core::ExtractionLimits;
use upkx_core::ExtractionOptions;
use upkx_core::Extractor;
use upkx_core::NoopProgress;
use upkx_core::RuleSet;

pub fn execute(
    args: &ExtractArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<()> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };

    let options = build_options(args);
    debug!(?options, output = %output_dir.display(), "extracting");

    let mut extractor = Extractor::new(options);
    if let Some(path) = &args.rules {
        let rules = add_scan_context(RuleSet::load(path), &args.package)?;
        extractor = extractor.with_rules(rules);
    }

    let result = if show_progress && CliProgress::should_show() {
        let mut progress = CliProgress::new("Extracting");
        add_package_context(
            extractor.extract(&args.package, &output_dir, &mut progress),
            &args.package,
        )?
    } else {
        add_package_context(
            extractor.extract(&args.package, &output_dir, &mut NoopProgress),
            &args.package,
        )?
    };

    formatter.format_extraction_result(&result)?;

    Ok(())
}

fn build_options(args: &ExtractArgs) -> ExtractionOptions {
    let defaults = ExtractionLimits::default();
    let limits = ExtractionLimits {
        max_asset_bytes: args.max_asset_size.unwrap_or(defaults.max_asset_bytes),
        max_package_bytes: args.max_package_size.unwrap_or(defaults.max_package_bytes),
        max_assets: args.max_assets.unwrap_or(defaults.max_assets),
    };

    let mut options = ExtractionOptions::default()
        .with_organize_by_categories(!args.flat)
        .with_write_meta(!args.no_meta)
        .with_limits(limits)
        .with_scan_after_extract(args.scan);
    if let Some(dir) = &args.temp_dir {
        options = options.with_temp_dir(dir);
    }
    if let Some(workers) = args.workers {
        options = options.with_workers(usize::from(workers));
    }
    options
}
