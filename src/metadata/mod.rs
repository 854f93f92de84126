//! Audio file tag reading.
//!
//! Uses the lofty crate to read the embedded tags of MP3 (ID3v2), FLAC and
//! Ogg (Vorbis comments) files and projects them into a [`MetadataView`]: an
//! ordered list of `key -> [values]` pairs that the classifier scans with a
//! fixed key priority per [`TagBackend`].
//!
//! # Key naming
//! - ID3v2: text frames by frame id (`TCON`, `TIT2`), comment frames as
//!   `COMM` (empty description) or `COMM:<description>`, user text frames as
//!   `TXXX:<description>`. Multi-valued text frames are split on NUL.
//! - Vorbis comments: field names upper-cased (`GENRE`, `COMMENT`).

pub mod repair;

use lofty::config::ParseOptions;
use lofty::file::AudioFile;
use lofty::flac::FlacFile;
use lofty::id3::v2::{Frame, Id3v2Tag};
use lofty::mpeg::MpegFile;
use lofty::ogg::{OpusFile, VorbisComments, VorbisFile};
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/// The tag dialect a [`MetadataView`] was read from.
///
/// Each backend carries its own canonical genre and comment key priority
/// lists, since ID3 frame ids and Vorbis field names share nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBackend {
    Id3v2,
    Vorbis,
}

impl TagBackend {
    /// Keys checked, in order, for the genre.
    pub fn genre_keys(self) -> &'static [&'static str] {
        match self {
            TagBackend::Id3v2 => &["TCON"],
            TagBackend::Vorbis => &["GENRE"],
        }
    }

    /// Keys checked, in order, for the free-text comment holding the level.
    ///
    /// `TCON` is the last resort for ID3 so that a level stored in the genre
    /// field is still picked up.
    pub fn comment_keys(self) -> &'static [&'static str] {
        match self {
            TagBackend::Id3v2 => &["COMM:Pur", "COMM", "TXXX:comment", "TCON"],
            TagBackend::Vorbis => &["DESCRIPTION", "COMMENT"],
        }
    }
}

/// Read-only projection of a file's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataView {
    backend: TagBackend,
    fields: Vec<(String, Vec<String>)>,
}

impl MetadataView {
    pub fn new(backend: TagBackend) -> Self {
        Self {
            backend,
            fields: Vec::new(),
        }
    }

    pub fn backend(&self) -> TagBackend {
        self.backend
    }

    /// Append a value to `key`, keeping first-seen key order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    /// Append several values to `key`. The key is recorded even when
    /// `values` is empty.
    pub fn extend<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        let index = match self.fields.iter().position(|(k, _)| *k == key) {
            Some(index) => index,
            None => {
                self.fields.push((key, Vec::new()));
                self.fields.len() - 1
            }
        };
        self.fields[index].1.extend(values.into_iter().map(Into::into));
    }

    /// All values stored under `key`, in tag order.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// First value of the first key in `keys` that holds a non-empty list.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find_map(|values| values.first())
            .map(String::as_str)
    }

    /// Project an ID3v2 tag. Only text, comment and user text frames carry
    /// anything the classifier looks at.
    pub fn from_id3v2(tag: &Id3v2Tag) -> Self {
        let mut view = Self::new(TagBackend::Id3v2);
        for frame in tag {
            match frame {
                Frame::Text(text) => view.extend(frame.id_str(), text.value.split('\0')),
                Frame::Comment(comment) => {
                    view.push(comment_key(&comment.description), &*comment.content);
                }
                Frame::UserText(user) => {
                    view.push(format!("TXXX:{}", user.description), &*user.content);
                }
                _ => {}
            }
        }
        view
    }

    /// Project a Vorbis comment block. Field names are case-insensitive, so
    /// they are stored upper-cased.
    pub fn from_vorbis_comments(comments: &VorbisComments) -> Self {
        let mut view = Self::new(TagBackend::Vorbis);
        for (key, value) in comments.items() {
            view.push(key.to_ascii_uppercase(), value);
        }
        view
    }
}

fn comment_key(description: &str) -> String {
    if description.is_empty() {
        "COMM".to_string()
    } else {
        format!("COMM:{description}")
    }
}

/// Reads a [`MetadataView`] from a file on disk.
///
/// The orchestrator only talks to this trait, so tests can substitute an
/// in-memory reader.
pub trait TagReader: Send + Sync {
    /// Read the tags of `path`.
    ///
    /// Returns [`Error::UnsupportedFormat`] for containers this reader does
    /// not handle and [`Error::Metadata`] when the file cannot be parsed.
    fn read(&self, path: &Path) -> Result<MetadataView>;
}

/// Container formats the lofty-backed reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mpeg,
    Flac,
    OggVorbis,
    OggOpus,
}

impl Container {
    /// Detect the container from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Some(Container::Mpeg),
            "flac" => Some(Container::Flac),
            "ogg" | "oga" => Some(Container::OggVorbis),
            "opus" => Some(Container::OggOpus),
            _ => None,
        }
    }
}

/// Production [`TagReader`] built on lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<MetadataView> {
        let container = Container::from_path(path).ok_or_else(|| Error::unsupported(path))?;

        let mut file = File::open(path)?;
        // Properties (duration, bitrate) are never used, skip decoding them
        let options = ParseOptions::new().read_properties(false);
        let lofty_err = |e: lofty::error::LoftyError| Error::metadata(path, e.to_string());

        let view = match container {
            Container::Mpeg => {
                let mpeg = MpegFile::read_from(&mut file, options).map_err(lofty_err)?;
                mpeg.id3v2()
                    .map(MetadataView::from_id3v2)
                    .unwrap_or_else(|| MetadataView::new(TagBackend::Id3v2))
            }
            Container::Flac => {
                let flac = FlacFile::read_from(&mut file, options).map_err(lofty_err)?;
                flac.vorbis_comments()
                    .map(MetadataView::from_vorbis_comments)
                    .unwrap_or_else(|| MetadataView::new(TagBackend::Vorbis))
            }
            Container::OggVorbis => {
                let ogg = VorbisFile::read_from(&mut file, options).map_err(lofty_err)?;
                MetadataView::from_vorbis_comments(ogg.vorbis_comments())
            }
            Container::OggOpus => {
                let opus = OpusFile::read_from(&mut file, options).map_err(lofty_err)?;
                MetadataView::from_vorbis_comments(opus.vorbis_comments())
            }
        };

        tracing::trace!("Read {} tag fields from {:?}", view.fields.len(), path);
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::Accessor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_container_from_path_is_case_insensitive() {
        assert_eq!(
            Container::from_path(Path::new("/a/Song.FLAC")),
            Some(Container::Flac)
        );
        assert_eq!(
            Container::from_path(Path::new("x.Mp3")),
            Some(Container::Mpeg)
        );
        assert_eq!(
            Container::from_path(Path::new("x.ogg")),
            Some(Container::OggVorbis)
        );
        assert_eq!(
            Container::from_path(Path::new("x.opus")),
            Some(Container::OggOpus)
        );
        assert_eq!(Container::from_path(Path::new("cover.jpg")), None);
        assert_eq!(Container::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_read_unsupported_extension() {
        let result = LoftyTagReader.read(Path::new("/music/cover.jpg"));
        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_read_garbage_flac_is_metadata_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".flac")
            .tempfile()
            .expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").unwrap();

        let result = LoftyTagReader.read(file.path());
        assert!(matches!(result, Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let result = LoftyTagReader.read(Path::new("non_existent_file.mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_push_keeps_values_under_one_key() {
        let mut view = MetadataView::new(TagBackend::Vorbis);
        view.push("GENRE", "Jazz");
        view.push("COMMENT", "l2");
        view.push("GENRE", "Blues");

        assert_eq!(
            view.get("GENRE"),
            Some(&["Jazz".to_string(), "Blues".to_string()][..])
        );
        assert!(view.contains("COMMENT"));
        assert!(!view.contains("DESCRIPTION"));
    }

    #[test]
    fn test_first_of_respects_priority() {
        let mut view = MetadataView::new(TagBackend::Vorbis);
        view.push("COMMENT", "from comment");
        view.push("DESCRIPTION", "from description");

        assert_eq!(
            view.first_of(TagBackend::Vorbis.comment_keys()),
            Some("from description")
        );
        assert_eq!(view.first_of(&["MISSING"]), None);
    }

    #[test]
    fn test_from_id3v2_names_frames() {
        let mut tag = Id3v2Tag::default();
        tag.set_genre("Jazz".to_string());
        tag.set_comment("l2, smooth".to_string());
        tag.insert_user_text("comment".to_string(), "l4".to_string());

        let view = MetadataView::from_id3v2(&tag);

        assert_eq!(view.backend(), TagBackend::Id3v2);
        assert_eq!(view.get("TCON"), Some(&["Jazz".to_string()][..]));
        assert_eq!(view.get("COMM"), Some(&["l2, smooth".to_string()][..]));
        assert_eq!(view.get("TXXX:comment"), Some(&["l4".to_string()][..]));
    }

    #[test]
    fn test_empty_text_file_not_audio() {
        let file = NamedTempFile::new().unwrap();
        // No extension at all
        assert!(matches!(
            LoftyTagReader.read(file.path()),
            Err(Error::UnsupportedFormat { .. })
        ));
    }
}
