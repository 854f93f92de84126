//! Test utilities and fixtures for crate-shuffle tests.
//!
//! This module provides an in-memory tag reader, an instrumented encoder and
//! a throwaway library/destination pair to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{Library, RecordingEncoder, StaticTagReader};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let library = Library::with_files(&["a.flac"]);
//!     let encoder = RecordingEncoder::default();
//!     // ... run an Organizer, then inspect encoder.calls()
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::error::{Error, Result, TranscodeError};
use crate::metadata::{Container, MetadataView, TagBackend, TagReader};
use crate::transcode::Encoder;

/// Builds a [`MetadataView`] from `(key, values)` pairs.
///
/// ```ignore
/// let meta = view(TagBackend::Vorbis, &[("GENRE", &["Jazz"])]);
/// ```
pub fn view(backend: TagBackend, fields: &[(&str, &[&str])]) -> MetadataView {
    let mut view = MetadataView::new(backend);
    for (key, values) in fields {
        view.extend(*key, values.iter().copied());
    }
    view
}

/// [`TagReader`] serving canned views by file name.
///
/// Unsupported extensions fail like the real reader does; supported files
/// without a canned view get an empty view.
#[derive(Debug, Clone, Default)]
pub struct StaticTagReader {
    views: HashMap<String, MetadataView>,
}

impl StaticTagReader {
    pub fn with(mut self, file_name: &str, view: MetadataView) -> Self {
        self.views.insert(file_name.to_string(), view);
        self
    }
}

impl TagReader for StaticTagReader {
    fn read(&self, path: &Path) -> Result<MetadataView> {
        let container = Container::from_path(path).ok_or_else(|| Error::unsupported(path))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        Ok(self.views.get(name).cloned().unwrap_or_else(|| {
            MetadataView::new(match container {
                Container::Mpeg => TagBackend::Id3v2,
                _ => TagBackend::Vorbis,
            })
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum EncoderMode {
    /// Write a tagless but valid MP3
    #[default]
    SilentMp3,
    /// Write bytes that are not MP3
    Garbage,
    /// Exit non-zero without writing
    Fail,
    /// Panic inside the job
    Panic,
}

#[derive(Debug, Default)]
struct EncoderState {
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// [`Encoder`] that records its invocations and the highest number of
/// concurrent invocations seen. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingEncoder {
    state: Arc<EncoderState>,
    mode: EncoderMode,
    delay: Duration,
}

impl RecordingEncoder {
    /// An encoder that always exits non-zero.
    pub fn failing() -> Self {
        Self {
            mode: EncoderMode::Fail,
            ..Self::default()
        }
    }

    /// An encoder that panics on every call.
    pub fn panicking() -> Self {
        Self {
            mode: EncoderMode::Panic,
            ..Self::default()
        }
    }

    /// An encoder whose output is not a readable MP3.
    pub fn writing_garbage() -> Self {
        Self {
            mode: EncoderMode::Garbage,
            ..Self::default()
        }
    }

    /// An encoder that takes `delay` per file.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// `(source, destination)` of every call, in call order.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneous `encode` calls.
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

impl Encoder for RecordingEncoder {
    fn encode(&self, source: &Path, destination: &Path) -> std::result::Result<(), TranscodeError> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), destination.to_path_buf()));

        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = match self.mode {
            EncoderMode::SilentMp3 => write_silent_mp3(destination).map_err(|e| {
                TranscodeError::TagRepair {
                    path: destination.to_path_buf(),
                    message: e.to_string(),
                }
            }),
            EncoderMode::Garbage => std::fs::write(destination, b"not an mp3").map_err(|e| {
                TranscodeError::TagRepair {
                    path: destination.to_path_buf(),
                    message: e.to_string(),
                }
            }),
            EncoderMode::Fail => Err(TranscodeError::EncoderFailed {
                status: failed_status(),
                stderr: "simulated failure".to_string(),
            }),
            EncoderMode::Panic => panic!("encoder crashed on {:?}", source),
        };

        self.state.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(unix)]
fn failed_status() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

#[cfg(windows)]
fn failed_status() -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(1)
}

/// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, joint stereo, no padding.
const MPEG_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
const MPEG_FRAME_LEN: usize = 417;

/// Write a short run of silent MPEG frames with no tags.
pub fn write_silent_mp3(path: &Path) -> std::io::Result<()> {
    let mut frame = vec![0u8; MPEG_FRAME_LEN];
    frame[..4].copy_from_slice(&MPEG_FRAME_HEADER);
    std::fs::write(path, frame.repeat(32))
}

/// A temporary library directory and an empty destination directory.
pub struct Library {
    root: TempDir,
    destination: TempDir,
}

impl Library {
    /// Create the library with the given relative file paths. Each file
    /// contains its own relative path as bytes.
    pub fn with_files(files: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("Failed to create library dir");
        let destination = tempfile::tempdir().expect("Failed to create destination dir");

        for file in files {
            let path = root.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, file.as_bytes()).unwrap();
        }

        Self { root, destination }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn destination(&self) -> &Path {
        self.destination.path()
    }

    /// Every entry under the destination with its modification time and
    /// contents, sorted by path. Directories have empty contents.
    pub fn destination_snapshot(&self) -> Vec<(PathBuf, Option<SystemTime>, Vec<u8>)> {
        let mut entries: Vec<_> = walkdir::WalkDir::new(self.destination())
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| {
                let path = e.path().to_path_buf();
                let modified = e.metadata().ok().and_then(|m| m.modified().ok());
                let contents = if e.file_type().is_file() {
                    std::fs::read(&path).unwrap_or_default()
                } else {
                    Vec::new()
                };
                (path, modified, contents)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
