//! Library shuffle command.

use tokio::runtime::Runtime;

use crate::config::{OrganizerConfig, Settings};
use crate::metadata::LoftyTagReader;
use crate::organizer::pipeline::{Organizer, RunSummary};
use crate::transcode::FfmpegEncoder;

/// Sort the library into the destination and print a summary.
///
/// Per-file failures are logged and counted but do not fail the command.
pub fn cmd_organize(
    rt: &Runtime,
    config: OrganizerConfig,
    settings: &Settings,
) -> anyhow::Result<()> {
    let encoder_config = settings.encoder();
    // A dry run never spawns ffmpeg, so it does not need one installed
    let encoder = if config.transcode && !config.dry_run {
        let encoder = FfmpegEncoder::locate(&encoder_config)?;
        match encoder.version() {
            Some(version) => tracing::info!("Using {}", version),
            None => tracing::info!("Using {}", encoder.program().display()),
        }
        encoder
    } else {
        FfmpegEncoder::new(&encoder_config)
    };

    if config.dry_run {
        println!("\n[DRY RUN MODE - No files will be written]\n");
    }

    let organizer = Organizer::new(config, LoftyTagReader, encoder);
    let summary = rt.block_on(organizer.run())?;

    print_summary(&summary, organizer.config().dry_run);
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!("\nProcessed {} files", summary.total());
    if dry_run {
        println!("  Planned:     {}", summary.planned());
    } else {
        println!("  Copied:      {}", summary.copied());
        println!("  Transcoded:  {}", summary.transcoded());
    }
    println!("  Skipped:     {}", summary.skipped());
    println!("  Failed:      {}", summary.failed());

    for (source, outcome) in summary.outcomes.iter().filter(|(_, o)| o.is_failure()) {
        eprintln!("  ERROR {}: {:?}", source.display(), outcome);
    }
}
