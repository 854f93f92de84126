//! Repair of tag values mangled by the encoder.
//!
//! When ffmpeg copies tags from a Vorbis comment block into ID3v2 it
//! sometimes writes a value twice joined by a separator, e.g. `Rock;Rock`.
//! [`collapse_duplicated`] detects that shape and [`repair_id3v2`] applies it
//! to the handful of frames known to be affected.

use lofty::TextEncoding;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::id3::v2::{CommentFrame, Frame, Id3v2Tag};
use lofty::mpeg::MpegFile;
use lofty::tag::TagExt;
use std::fs::File;
use std::path::Path;

use crate::error::TranscodeError;

/// Text frames whose values are checked: title, album, the four performer
/// roles and genre.
const REPAIRED_TEXT_FRAMES: &[&str] = &["TIT2", "TALB", "TPE1", "TPE2", "TPE3", "TPE4", "TCON"];

/// Comment frame descriptions that are checked.
const REPAIRED_COMMENT_DESCRIPTIONS: &[&str] = &["", "Pur"];

/// Description of the user text frame ffmpeg stores free-text comments in.
const LEGACY_COMMENT_DESCRIPTION: &str = "comment";

/// Language of the promoted comment frame (unknown).
const PROMOTED_COMMENT_LANGUAGE: [u8; 3] = *b"XXX";

/// What [`repair_id3v2`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Number of frames whose value was collapsed
    pub frames_fixed: usize,
    /// Whether the `TXXX:comment` text was copied into a standard comment
    pub comment_promoted: bool,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        self.frames_fixed > 0 || self.comment_promoted
    }
}

/// Collapse a `X;X` value to `X`.
///
/// The value is split at its middle character; if the first half equals the
/// remainder after that character the first half is returned. Values shorter
/// than three characters never match, so a one-letter title stays intact.
pub fn collapse_duplicated(value: &str) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    let mid = chars.len() / 2;
    if mid == 0 {
        return None;
    }
    (chars[..mid] == chars[mid + 1..]).then(|| chars[..mid].iter().collect())
}

/// Fix the first value of an encoder tag list.
///
/// Returns a single-element list holding the collapsed value when the first
/// value is duplicated, otherwise the input unchanged.
pub fn fix_encoder_tag(values: &[String]) -> Vec<String> {
    match values.first().and_then(|first| collapse_duplicated(first)) {
        Some(fixed) => vec![fixed],
        None => values.to_vec(),
    }
}

/// Repair a NUL-separated multi-value text, returning the new text if it
/// changed.
fn repair_text(text: &str) -> Option<String> {
    let values: Vec<String> = text.split('\0').map(str::to_owned).collect();
    let fixed = fix_encoder_tag(&values);
    (fixed != values).then(|| fixed.join("\0"))
}

/// Repair the affected frames of `tag`.
///
/// Frames are moved into a fresh tag one by one, fixing values on the way.
/// If a `TXXX:comment` frame exists its (repaired) text is also stored in a
/// comment frame with language `XXX`. Comment frames in other languages are
/// kept as they are.
pub fn repair_id3v2(tag: Id3v2Tag) -> (Id3v2Tag, RepairReport) {
    let mut repaired = Id3v2Tag::default();
    let mut report = RepairReport::default();
    let mut legacy_comment = None;

    for mut frame in tag {
        let id = frame.id_str().to_owned();
        match &mut frame {
            Frame::Text(text) if REPAIRED_TEXT_FRAMES.contains(&id.as_str()) => {
                if let Some(fixed) = repair_text(&text.value) {
                    text.value = fixed.into();
                    report.frames_fixed += 1;
                }
            }
            Frame::Comment(comment)
                if REPAIRED_COMMENT_DESCRIPTIONS.contains(&&*comment.description) =>
            {
                if let Some(fixed) = repair_text(&comment.content) {
                    comment.content = fixed.into();
                    report.frames_fixed += 1;
                }
            }
            Frame::UserText(user)
                if user
                    .description
                    .eq_ignore_ascii_case(LEGACY_COMMENT_DESCRIPTION) =>
            {
                if let Some(fixed) = repair_text(&user.content) {
                    user.content = fixed.into();
                    report.frames_fixed += 1;
                }
                legacy_comment = user.content.split('\0').next().map(str::to_owned);
            }
            _ => {}
        }
        repaired.insert(frame);
    }

    if let Some(comment) = legacy_comment {
        repaired.insert(Frame::Comment(CommentFrame::new(
            TextEncoding::UTF8,
            PROMOTED_COMMENT_LANGUAGE,
            String::new(),
            comment,
        )));
        report.comment_promoted = true;
    }

    (repaired, report)
}

/// Read the ID3v2 tag of the MP3 at `path`, repair it and write it back.
///
/// A file without an ID3v2 tag has nothing to repair. The tag is only
/// rewritten when something changed.
pub fn repair_mp3_tags(path: &Path) -> Result<RepairReport, TranscodeError> {
    let repair_err = |message: String| TranscodeError::TagRepair {
        path: path.to_path_buf(),
        message,
    };

    let tag = {
        let mut file = File::open(path).map_err(|e| repair_err(e.to_string()))?;
        let mpeg = MpegFile::read_from(&mut file, ParseOptions::new().read_properties(false))
            .map_err(|e| repair_err(e.to_string()))?;
        mpeg.id3v2().cloned()
    };

    let Some(tag) = tag else {
        tracing::debug!("No ID3v2 tag in {:?}, nothing to repair", path);
        return Ok(RepairReport::default());
    };

    let (repaired, report) = repair_id3v2(tag);
    if report.changed() {
        repaired
            .save_to_path(path, WriteOptions::default())
            .map_err(|e| repair_err(e.to_string()))?;
        tracing::debug!(
            "Repaired {} tag frame(s) in {:?} (comment promoted: {})",
            report.frames_fixed,
            path,
            report.comment_promoted
        );
    }

    Ok(report)
}
