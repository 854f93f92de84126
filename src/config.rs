//! Configuration.
//!
//! Two layers:
//! - [`Settings`]: optional TOML file with encoder and concurrency defaults,
//!   stored in the OS-standard config directory:
//!   - Windows: %APPDATA%\crate-shuffle\config.toml
//!   - macOS: ~/Library/Application Support/crate-shuffle/config.toml
//!   - Linux: ~/.config/crate-shuffle/config.toml
//! - [`OrganizerConfig`] / [`EncoderConfig`]: the resolved values a run is
//!   constructed with, built from the settings plus command-line flags.
//!
//! ```toml
//! [transcode]
//! encoder = "ffmpeg"
//! quality = 1
//! max_concurrent = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Number of transcodes allowed to run at once unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 3;

/// Default ffmpeg VBR quality (`-q:a`), 0 is best.
pub const DEFAULT_QUALITY: u8 = 1;

/// Settings file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transcode: TranscodeSettings,
}

/// Encoder and concurrency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSettings {
    /// Encoder executable, looked up on PATH when not absolute
    pub encoder: PathBuf,

    /// VBR quality passed as `-q:a` (0-9)
    pub quality: u8,

    /// Maximum number of encoder processes running at once
    pub max_concurrent: usize,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            encoder: PathBuf::from("ffmpeg"),
            quality: DEFAULT_QUALITY,
            max_concurrent: DEFAULT_MAX_CONCURRENT_TRANSCODES,
        }
    }
}

impl Settings {
    pub fn encoder(&self) -> EncoderConfig {
        EncoderConfig {
            program: self.transcode.encoder.clone(),
            quality: self.transcode.quality,
        }
    }
}

/// How to invoke the external encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub program: PathBuf,
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Settings::default().encoder()
    }
}

/// Everything a run needs, fixed before the first file is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizerConfig {
    /// Source root to walk
    pub library: PathBuf,
    /// Root the genre/level tree is built under
    pub destination: PathBuf,
    /// Transcode non-MP3 files instead of copying them
    pub transcode: bool,
    /// Replace files that already exist at the destination
    pub overwrite: bool,
    /// Log what would happen without writing anything
    pub dry_run: bool,
    /// Size of the transcode permit pool
    pub max_concurrent_transcodes: usize,
}

impl OrganizerConfig {
    pub fn new(library: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            destination: destination.into(),
            transcode: false,
            overwrite: false,
            dry_run: false,
            max_concurrent_transcodes: DEFAULT_MAX_CONCURRENT_TRANSCODES,
        }
    }

    /// Pre-flight checks: both roots are existing directories, they are not
    /// the same directory, and at least one transcode may run.
    pub fn validate(&self) -> Result<()> {
        ensure_dir(&self.library, "library")?;
        ensure_dir(&self.destination, "destination")?;

        let library = self.library.canonicalize()?;
        let destination = self.destination.canonicalize()?;
        if library == destination {
            return Err(Error::config(format!(
                "library and destination are the same directory: {:?}",
                library
            )));
        }

        if self.max_concurrent_transcodes == 0 {
            return Err(Error::config("max_concurrent must be at least 1"));
        }

        Ok(())
    }
}

fn ensure_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::config(format!("{what} {:?} is not a directory", path)))
    }
}

// ============================================================================
// Settings File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crate-shuffle"))
}

/// Get the full path to the default settings file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// Returns defaults if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return usable settings.
pub fn load(path: Option<&Path>) -> Settings {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Settings::default();
    };

    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match parse(&contents) {
            Ok(settings) => {
                tracing::info!("Loaded config from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Settings::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Parse settings from TOML text
pub fn parse(contents: &str) -> std::result::Result<Settings, toml::de::Error> {
    toml::from_str(contents)
}

// ============================================================================
// Tests
// ============================================================================
