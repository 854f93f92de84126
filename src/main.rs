//! Crate Shuffle - sort a music library into Genre/Level folders.
//!
//! Every audio file under the library is classified from its embedded tags
//! and copied to `<destination>/<Genre>/<level>/`. With `--transcode`,
//! non-MP3 files are encoded to MP3 with ffmpeg on a bounded worker pool.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod organizer;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;
pub mod transcode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            // Usage errors exit with 1 like every other failure
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let default_directive = if args.verbose {
        "crate_shuffle=debug"
    } else {
        "crate_shuffle=info"
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    cli::run_command(&args)
}
