mod card;
mod entry;

pub use self::card::BackCard;
pub use self::entry::{EntryKey, VocabularyEntry};

/// Normalizes spoken text for comparison and content addressing: trimmed,
/// inner whitespace collapsed to single spaces, lower-cased.
///
/// ```
/// use vocab_records::models::normalize;
/// assert_eq!(normalize("  An  Apple\ta day "), "an apple a day");
/// ```
pub fn normalize(text: impl AsRef<str>) -> String {
    text.as_ref().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Apple", "apple")]
    #[case("  apple  ", "apple")]
    #[case("Ice  Cream", "ice cream")]
    #[case("ÉCOLE", "école")]
    #[case("", "")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }
}
