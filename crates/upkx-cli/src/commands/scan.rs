//! Scan command implementation.

use crate::cli::ScanArgs;
use crate::error::add_scan_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use upkx_core::CancellationToken;
use upkx_core::MaliciousContentScanner;
use upkx_core::RuleSet;
use upkx_core::ScanOptions;

pub fn execute(args: &ScanArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let options = ScanOptions {
        max_content_bytes: args
            .max_content_size
            .unwrap_or(ScanOptions::DEFAULT_MAX_CONTENT_BYTES),
    };

    let rules = match &args.rules {
        Some(path) => add_scan_context(RuleSet::load(path), &args.package)?,
        None => RuleSet::builtin(),
    };
    let scanner = add_scan_context(MaliciousContentScanner::new(&rules, options), &args.package)?;

    let result = match &args.dir {
        Some(dir) => scanner.scan_directory(&args.package, dir),
        None => scanner.scan_package(&args.package, &CancellationToken::new()),
    };
    let result = add_scan_context(result, &args.package)?;

    formatter.format_scan_result(&result)?;

    if args.fail_on_malicious && result.is_malicious {
        bail!(
            "Package '{}' was judged malicious\n\
             HINT: Do not import this package into a project.",
            args.package.display()
        );
    }

    Ok(())
}
