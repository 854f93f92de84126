//! MP3 transcoding through an external encoder.
//!
//! This module shells out to `ffmpeg` to produce VBR MP3 files, then repairs
//! the tags ffmpeg writes (see [`crate::metadata::repair`]).
//!
//! Install ffmpeg:
//! - Windows: `winget install Gyan.FFmpeg`
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt install ffmpeg` or equivalent
//!
//! There is no timeout on the encoder; a hung process holds its permit until
//! it exits.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::EncoderConfig;
use crate::error::TranscodeError;
use crate::metadata::repair::{self, RepairReport};
use crate::organizer::is_target_format;

/// Common installation paths for ffmpeg, tried after the configured program
#[cfg(windows)]
const FFMPEG_PATHS: &[&str] = &[
    r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
    r"C:\ffmpeg\bin\ffmpeg.exe",
];

#[cfg(not(windows))]
const FFMPEG_PATHS: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
];

/// Produces an MP3 at `destination` from `source`.
///
/// Implementations must be callable from several threads at once for
/// different files.
pub trait Encoder: Send + Sync {
    fn encode(&self, source: &Path, destination: &Path) -> Result<(), TranscodeError>;
}

/// [`Encoder`] that runs the ffmpeg command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    quality: u8,
}

impl FfmpegEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            quality: config.quality,
        }
    }

    /// Find a working ffmpeg: the configured program first, then the common
    /// installation paths.
    pub fn locate(config: &EncoderConfig) -> Result<Self, TranscodeError> {
        std::iter::once(config.program.clone())
            .chain(FFMPEG_PATHS.iter().map(PathBuf::from))
            .find(|program| probe(program))
            .map(|program| Self {
                program,
                quality: config.quality,
            })
            .ok_or_else(|| {
                TranscodeError::EncoderNotFound(format!(
                    "{} (install ffmpeg or set [transcode] encoder in the config file)",
                    config.program.display()
                ))
            })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// ffmpeg version line (for the startup log)
    pub fn version(&self) -> Option<String> {
        Command::new(&self.program)
            .arg("-version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .and_then(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            })
    }

    /// Arguments passed to ffmpeg: quiet logging, no stdin, VBR quality,
    /// overwrite the output.
    pub fn args(&self, source: &Path, destination: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-q:a".into(),
            self.quality.to_string().into(),
            "-y".into(),
            destination.as_os_str().to_owned(),
        ]
    }
}

fn probe(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, source: &Path, destination: &Path) -> Result<(), TranscodeError> {
        let output = Command::new(&self.program)
            .args(self.args(source, destination))
            .output()
            .map_err(|e| TranscodeError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::EncoderFailed {
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Result of the tag repair that follows a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRepair {
    Repaired(RepairReport),
    /// The MP3 was produced but its tags could not be repaired
    Failed(String),
}

/// Transcode `source` to the MP3 at `destination` and repair its tags.
///
/// An encoder failure is returned as an error and skips the repair. A repair
/// failure leaves the encoded file in place and is reported in the
/// [`TagRepair`] result.
pub fn transcode<E: Encoder + ?Sized>(
    encoder: &E,
    source: &Path,
    destination: &Path,
) -> Result<TagRepair, TranscodeError> {
    if !is_target_format(destination) {
        return Err(TranscodeError::NotMp3(destination.to_path_buf()));
    }

    tracing::info!(
        "{} -> TRANSCODE -> {}",
        source
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        destination.display()
    );

    encoder.encode(source, destination)?;

    Ok(match repair::repair_mp3_tags(destination) {
        Ok(report) => TagRepair::Repaired(report),
        Err(e) => {
            tracing::warn!("{}", e);
            TagRepair::Failed(e.to_string())
        }
    })
}
