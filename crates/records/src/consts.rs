use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Two objects glued together inside an array: `[{...}{...}]`.
regex!(ADJACENT_OBJECTS, r"\}\s*\{");
// `[1, 2,]` and `{"a": 1,}`.
regex!(TRAILING_COMMA, r",\s*([}\]])");
// Line ends with a delimiter that belongs to the next (missing) line.
regex!(TRAILING_SEPARATOR, r"[,;]\s*$");

/// Curly quotes produced by word processors and chat tools.
pub(crate) const SMART_QUOTES: [(char, char); 6] = [
    ('\u{201C}', '"'),
    ('\u{201D}', '"'),
    ('\u{201E}', '"'),
    ('\u{2018}', '\''),
    ('\u{2019}', '\''),
    ('\u{201B}', '\''),
];

/// Batch fields a record cannot be merged without.
pub(crate) const REQUIRED_FIELDS: [&str; 4] = ["word", "rank", "freq", "back_cards"];
