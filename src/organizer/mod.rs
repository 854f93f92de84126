//! Destination layout and file placement.
//!
//! Files land at `{destination}/{Genre}/{Level}/{filename}`, where the two
//! directory segments come from [`classify`](crate::classifier::classify).
//! When transcoding is requested the final extension of non-MP3 files is
//! swapped for `.mp3`.
//!
//! # Features
//! - Pure path resolution, usable for dry runs
//! - Directory preparation that refuses to clobber plain files
//! - Copy that leaves existing destinations alone unless asked to overwrite

pub mod pipeline;

use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::{Classification, UNKNOWN};
use crate::error::{Error, Result, ResultExt};

/// Extension every transcoded file ends up with.
pub const TARGET_EXTENSION: &str = "mp3";

/// A planned placement of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub needs_transcode: bool,
}

impl WorkItem {
    /// Plan the placement of `source` under `destination_root`.
    pub fn plan(
        source: &Path,
        classification: &Classification,
        destination_root: &Path,
        transcode: bool,
    ) -> Self {
        let needs_transcode = transcode && !is_target_format(source);
        let file_name = source
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new(""));

        Self {
            source: source.to_path_buf(),
            destination: resolve_path(destination_root, classification, file_name, transcode),
            needs_transcode,
        }
    }
}

/// Whether `path` already has the target extension (case-insensitive).
pub fn is_target_format(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(TARGET_EXTENSION))
}

/// Build `{root}/{genre}/{level}/{file_name}`.
///
/// With `transcode` set, a non-MP3 file name has its last extension replaced,
/// so `mp3_backup.wav` becomes `mp3_backup.mp3`.
pub fn resolve_path(
    destination_root: &Path,
    classification: &Classification,
    file_name: &Path,
    transcode: bool,
) -> PathBuf {
    let file_name = if transcode && !is_target_format(file_name) {
        file_name.with_extension(TARGET_EXTENSION)
    } else {
        file_name.to_path_buf()
    };

    destination_root
        .join(sanitize_segment(&classification.genre))
        .join(sanitize_segment(&classification.level))
        .join(file_name)
}

/// Make `value` safe to use as a single directory name.
///
/// Separators and characters Windows rejects become `_`; a segment that
/// would be empty or walk upwards becomes `Unknown`.
pub fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => UNKNOWN.to_string(),
        _ => cleaned,
    }
}

/// Create the genre and level directories above `destination`.
///
/// Fails with [`Error::DestinationConflict`] when one of them already exists
/// as a plain file.
pub fn prepare_destination(destination_root: &Path, destination: &Path) -> Result<()> {
    let Some(level_dir) = destination.parent() else {
        return Ok(());
    };

    if level_dir.is_dir() {
        return Ok(());
    }

    let mut dir = level_dir;
    while dir != destination_root {
        if dir.exists() && !dir.is_dir() {
            return Err(Error::destination_conflict(dir));
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }

    fs::create_dir_all(level_dir)
        .with_context(format!("Failed to create directory: {:?}", level_dir))
}

/// Whether `a` and `b` name the same existing file.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy `source` to `destination` byte for byte.
///
/// Returns `Ok(false)` without touching anything when the destination
/// exists and `overwrite` is off, or when it is the source file itself.
pub fn copy_file(source: &Path, destination: &Path, overwrite: bool) -> Result<bool> {
    if !overwrite && destination.exists() {
        return Ok(false);
    }
    // fs::copy onto itself truncates the file
    if is_same_file(source, destination) {
        return Ok(false);
    }

    fs::copy(source, destination)
        .with_context(format!("Failed to copy file to: {:?}", destination))?;
    Ok(true)
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Generate an arbitrary segment that might contain invalid characters
    fn arbitrary_segment() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 ./:*?\"<>|_\\\\-]{0,30}").unwrap()
    }

    proptest! {
        /// Sanitized segments never contain path separators
        #[test]
        fn sanitize_removes_path_separators(input in arbitrary_segment()) {
            let sanitized = sanitize_segment(&input);
            prop_assert!(!sanitized.contains('/'), "Found / in: {}", sanitized);
            prop_assert!(!sanitized.contains('\\'), "Found \\ in: {}", sanitized);
            prop_assert!(!sanitized.is_empty());
            prop_assert!(sanitized != "." && sanitized != "..");
        }

        /// Resolved paths are always exactly three components below the root
        #[test]
        fn destination_is_two_levels_deep(
            genre in arbitrary_segment(),
            level in arbitrary_segment(),
            stem in "[a-zA-Z0-9_]{1,20}",
            ext in prop::sample::select(vec!["mp3", "flac", "ogg", "opus"]),
            transcode in any::<bool>(),
        ) {
            let root = PathBuf::from("/music/library");
            let file_name = format!("{stem}.{ext}");
            let dest = resolve_path(
                &root,
                &Classification::new(genre, level),
                Path::new(&file_name),
                transcode,
            );

            let relative = dest.strip_prefix(&root).unwrap();
            prop_assert_eq!(relative.components().count(), 3);
            prop_assert_eq!(dest.extension().and_then(|e| e.to_str()) == Some("mp3"), transcode || ext == "mp3");
        }
    }
}
