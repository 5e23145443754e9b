//! Previews and scans a package, then extracts it if nothing malicious was
//! found.
//!
//! Usage: cargo run --example inspect_package -- <PACKAGE> <OUTPUT_DIR>

use std::env;
use std::process::ExitCode;

use upkx_core::ExtractionOptions;
use upkx_core::PreviewOptions;
use upkx_core::ScanOptions;
use upkx_core::extract_package;
use upkx_core::preview_package;
use upkx_core::scan_package;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let (Some(package), Some(output)) = (args.next(), args.next()) else {
        eprintln!("usage: inspect_package <PACKAGE> <OUTPUT_DIR>");
        return Ok(ExitCode::FAILURE);
    };

    let preview = preview_package(&package, &PreviewOptions::default())?;
    println!(
        "{} assets, {} bytes declared",
        preview.entries.len(),
        preview.total_asset_bytes
    );
    for candidate in &preview.prune_candidates {
        println!("  prune? {} ({})", candidate.path, candidate.reason);
    }

    let scan = scan_package(&package, ScanOptions::default())?;
    if scan.is_malicious {
        for threat in &scan.threats {
            println!("  {} [{}]: {}", threat.threat_type, threat.severity, threat.description);
        }
        println!("refusing to extract");
        return Ok(ExitCode::FAILURE);
    }

    let result = extract_package(&package, &output, &ExtractionOptions::default())?;
    println!("extracted {} files into {}", result.total_files, output);
    Ok(ExitCode::SUCCESS)
}
