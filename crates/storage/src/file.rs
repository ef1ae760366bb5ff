//! Audio formats and what a backend reports about a stored asset.

use crate::error::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Encoded audio formats the synthesis collaborator can return.
///
/// The format of a stored asset is decided by its file extension; nothing
/// sniffs the bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    #[default]
    Mp3,
    OggVorbis,
    Pcm,
}
impl AudioFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::OggVorbis => ".ogg",
            Self::Pcm => ".wav",
        }
    }

    /// Name used on the wire when requesting synthesis.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg_vorbis",
            Self::Pcm => "pcm",
        }
    }

    /// Detect the format from a path's extension, if it's an audio file at all.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "ogg" => Some(Self::OggVorbis),
            "wav" => Some(Self::Pcm),
            _ => None,
        }
    }
}
impl FromStr for AudioFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "ogg" | "ogg_vorbis" | "vorbis" => Ok(Self::OggVorbis),
            "pcm" | "wav" => Ok(Self::Pcm),
            other => exn::bail!(ErrorKind::UnsupportedFormat(other.to_string())),
        }
    }
}

/// An asset below an audio root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative to the audio root.
    pub path: PathBuf,
    pub size: u64,
    /// `None` for stray non-audio files.
    pub format: Option<AudioFormat>,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let format = AudioFormat::from_path(&path);
        Self { path, size, format }
    }

    /// Zero bytes: left behind by an interrupted write, never a usable asset.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("apple-0a1b2c3d4e5f6a7b.mp3", Some(AudioFormat::Mp3))]
    #[case("apple/SENTENCE.MP3", Some(AudioFormat::Mp3))]
    #[case("apple.ogg", Some(AudioFormat::OggVorbis))]
    #[case("apple.wav", Some(AudioFormat::Pcm))]
    #[case(".DS_Store", None)]
    #[case("notes.txt", None)]
    fn test_format_from_path(#[case] path: &str, #[case] expected: Option<AudioFormat>) {
        assert_eq!(AudioFormat::from_path(path), expected);
    }

    #[rstest]
    #[case("mp3", AudioFormat::Mp3)]
    #[case(".mp3", AudioFormat::Mp3)]
    #[case("ogg_vorbis", AudioFormat::OggVorbis)]
    #[case("wav", AudioFormat::Pcm)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: AudioFormat) {
        assert_eq!(input.parse::<AudioFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_str_invalid() {
        let err = "flac".parse::<AudioFormat>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(format) if format == "flac"));
    }

    #[test]
    fn test_file_info_detects_format() {
        let info = FileInfo::new("apple/hello-0a1b.ogg", 12);
        assert_eq!(info.format, Some(AudioFormat::OggVorbis));
        assert!(!info.is_empty());
        assert!(FileInfo::new("x.mp3", 0).is_empty());
    }
}
