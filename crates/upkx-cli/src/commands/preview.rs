//! Preview command implementation.

use crate::cli::PreviewArgs;
use crate::error::add_package_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use upkx_core::PreviewOptions;
use upkx_core::preview_package;

pub fn execute(args: &PreviewArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let mut options = PreviewOptions {
        materialize_preview_images: args.images,
        temp_dir: args.temp_dir.clone(),
        ..PreviewOptions::default()
    };
    if let Some(bytes) = args.preview_bytes {
        options.preview_bytes = usize::try_from(bytes).unwrap_or(PreviewOptions::HARD_CAP_BYTES);
    }

    let result = add_package_context(preview_package(&args.package, &options), &args.package)?;
    formatter.format_preview_result(&result, args.long)?;

    Ok(())
}
