//! CLI argument definitions and dispatch.
//!
//! The tool has a single mode of operation; the flags select what a run does:
//! - `--transcode`: encode non-MP3 files to MP3 instead of copying them
//! - `--overwrite`: replace files already at the destination
//! - `--dryrun`: only log what would happen

mod organize;

use clap::Parser;
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use organize::cmd_organize;

use crate::config::{self, OrganizerConfig};

/// Sort a music library into Genre/Level folders, optionally transcoding to MP3
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory where all your music is
    #[arg(long, value_name = "DIR")]
    pub library: PathBuf,

    /// Directory where the music should go
    #[arg(long, value_name = "DIR")]
    pub destination: PathBuf,

    /// Transcode non-MP3 files to MP3
    #[arg(long)]
    pub transcode: bool,

    /// Overwrite files that already exist at the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Show what would be done without writing anything
    #[arg(long = "dryrun", alias = "dry-run")]
    pub dry_run: bool,

    /// Maximum number of transcodes running at once (default from config, else 3)
    #[arg(short, long, env = "CRATE_SHUFFLE_JOBS")]
    pub jobs: Option<usize>,

    /// Settings file (default: <config dir>/crate-shuffle/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log classification details
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the run configuration from the flags and the settings file.
    pub fn organizer_config(&self, settings: &config::Settings) -> OrganizerConfig {
        OrganizerConfig {
            transcode: self.transcode,
            overwrite: self.overwrite,
            dry_run: self.dry_run,
            max_concurrent_transcodes: self
                .jobs
                .unwrap_or(settings.transcode.max_concurrent),
            ..OrganizerConfig::new(self.library.clone(), self.destination.clone())
        }
    }
}

/// Run the shuffle described by `cli`.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let settings = config::load(cli.config.as_deref());
    let organizer_config = cli.organizer_config(&settings);
    organizer_config.validate()?;

    let rt = Runtime::new()?;
    cmd_organize(&rt, organizer_config, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "crate-shuffle",
            "--library",
            "/music",
            "--destination",
            "/sorted",
            "--transcode",
            "--overwrite",
            "--dryrun",
            "--jobs",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.library, PathBuf::from("/music"));
        assert_eq!(cli.destination, PathBuf::from("/sorted"));
        assert!(cli.transcode && cli.overwrite && cli.dry_run);
        assert_eq!(cli.jobs, Some(5));
    }

    #[test]
    fn test_flags_default_off() {
        let cli =
            Cli::try_parse_from(["crate-shuffle", "--library", "/a", "--destination", "/b"])
                .unwrap();
        assert!(!cli.transcode);
        assert!(!cli.overwrite);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_missing_library_is_error() {
        let err = Cli::try_parse_from(["crate-shuffle", "--destination", "/b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_organizer_config_uses_settings_default_jobs() {
        let cli =
            Cli::try_parse_from(["crate-shuffle", "--library", "/a", "--destination", "/b"])
                .unwrap();
        let mut settings = config::Settings::default();
        settings.transcode.max_concurrent = 6;

        let resolved = cli.organizer_config(&settings);

        assert_eq!(resolved.max_concurrent_transcodes, 6);
        assert_eq!(resolved.library, PathBuf::from("/a"));
    }
}
