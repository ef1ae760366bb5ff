//! Path validation for audio roots.
//!
//! Audio references come out of a hand-edited YAML store and a batch file that
//! may have been repaired heuristically, so every path handed to a backend is
//! checked here first: it must stay inside the audio root, and file names
//! recorded on entries must be a single path segment.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a path relative to an audio root.
///
/// `.` segments and repeated separators are dropped, `..` is resolved as long
/// as it never climbs above the root. Absolute paths are treated as relative
/// to the root. Null bytes and Windows prefixes are rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vocab_storage::validate_path;
/// assert!(validate_path("apple/an-apple-a-day-3f2a9c01d4e5b6a7.mp3").is_ok());
/// assert!(validate_path("apple/../banana.mp3").is_ok()); // (never leaves the root)
/// assert!(validate_path("../outside.mp3").is_err());
/// assert_eq!(validate_path("./apple//word.mp3/").unwrap(), Path::new("apple/word.mp3"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut segments: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(segment) => segments.push(segment),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    if segments.is_empty() {
        exn::bail!(invalid());
    }
    Ok(segments.into_iter().collect())
}

/// Validates a bare file name as recorded in `word_audio_file` or a card's
/// `audio_file`: exactly one normal path segment.
pub fn validate_file_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None)
            if segment == OsStr::new(name) && !name.contains('\0') && !name.contains('\\') =>
        {
            Ok(name)
        },
        _ => exn::bail!(ErrorKind::InvalidPath(PathBuf::from(name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("apple-3f2a9c01d4e5b6a7.mp3", "apple-3f2a9c01d4e5b6a7.mp3")]
    #[case("apple/sentence-3f2a9c01.mp3", "apple/sentence-3f2a9c01.mp3")]
    #[case("apple//sentence.mp3", "apple/sentence.mp3")]
    #[case("./apple/./sentence.mp3", "apple/sentence.mp3")]
    #[case("apple/sentence.mp3/", "apple/sentence.mp3")]
    #[case("/apple/word.mp3", "apple/word.mp3")]
    #[case("apple/../banana/word.mp3", "banana/word.mp3")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./")]
    #[case("//")]
    #[case("..")]
    #[case("../front/apple.mp3")]
    #[case("apple/../../word.mp3")]
    #[case("apple\0.mp3")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[rstest]
    #[case("apple-3f2a9c01d4e5b6a7.mp3", true)]
    #[case("ice cream.mp3", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("apple/word.mp3", false)]
    #[case("/word.mp3", false)]
    #[case("word.mp3/", false)]
    #[case("back\\slash.mp3", false)]
    fn test_file_names(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(validate_file_name(name).is_ok(), valid);
    }
}
