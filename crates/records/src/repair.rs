//! Heuristic repair of malformed batch lines.
//!
//! Batch files are written by hand or by a language model, so a line that
//! fails to parse usually has one of a handful of defects: curly quotes,
//! trailing commas, cards glued together without a comma, a missing closing
//! brace. Each repair step is applied on top of the previous one and the line
//! is re-parsed after every step; the first parse that yields a JSON object
//! wins. The repairs never look at field names, so nothing here can leak
//! into validation.

use crate::consts::{ADJACENT_OBJECTS, SMART_QUOTES, TRAILING_COMMA, TRAILING_SEPARATOR};
use crate::error::{ErrorKind, Result};
use serde_json::Value;

type Step = fn(&str) -> String;

const STEPS: [Step; 7] = [
    strip_trailing_separator,
    straighten_quotes,
    separate_adjacent_objects,
    drop_trailing_commas,
    wrap_bare_members,
    balance,
    // Last resort: Python-style single-quoted strings. The structural fixes
    // run again because the swap changes what counts as a string.
    double_single_quotes,
];

/// Parses a batch line, repairing it if necessary.
///
/// The second half of the tuple is the repaired text, or `None` when the line
/// parsed as-is, so callers can tell corrections apart from clean lines.
///
/// ```
/// use vocab_records::repair;
/// let (value, repaired) = repair(r#"{"word": "apple", "rank": 1,"#).unwrap();
/// assert_eq!(value["word"], "apple");
/// assert_eq!(repaired.as_deref(), Some(r#"{"word": "apple", "rank": 1}"#));
/// ```
pub fn repair(line: &str) -> Result<(Value, Option<String>)> {
    let original_error = match parse_object(line) {
        Ok(value) => return Ok((value, None)),
        Err(e) => e,
    };
    let mut current = line.to_string();
    for step in STEPS {
        current = step(&current);
        if let Ok(value) = parse_object(&current) {
            return Ok((value, Some(current)));
        }
    }
    Err(exn::Exn::from(original_error))
}

fn parse_object(text: &str) -> std::result::Result<Value, ErrorKind> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ErrorKind::NotAnObject),
        Err(e) => Err(ErrorKind::Parse(e.to_string())),
    }
}

fn strip_trailing_separator(s: &str) -> String {
    TRAILING_SEPARATOR.replace(s.trim(), "").into_owned()
}

fn straighten_quotes(s: &str) -> String {
    s.chars().map(|c| SMART_QUOTES.iter().find(|(from, _)| *from == c).map_or(c, |(_, to)| *to)).collect()
}

fn separate_adjacent_objects(s: &str) -> String {
    ADJACENT_OBJECTS.replace_all(s, "},{").into_owned()
}

fn drop_trailing_commas(s: &str) -> String {
    TRAILING_COMMA.replace_all(s, "$1").into_owned()
}

fn double_single_quotes(s: &str) -> String {
    balance(&drop_trailing_commas(&s.replace('\'', "\"")))
}

/// `"word": "apple", ...}` lost its opening brace.
fn wrap_bare_members(s: &str) -> String {
    let trimmed = s.trim_start();
    if trimmed.starts_with('"') && !trimmed.starts_with('{') {
        format!("{{{trimmed}")
    } else {
        s.to_string()
    }
}

/// Balances braces and brackets outside of string literals: closes an
/// unterminated string, drops closers that match nothing, and appends the
/// closers for anything still open (in nesting order).
fn balance(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {},
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            },
            '{' => {
                open.push('}');
                out.push(c);
            },
            '[' => {
                open.push(']');
                out.push(c);
            },
            '}' | ']' if open.contains(&c) => {
                // Close anything left open inside, e.g. `{"a": [1, 2}`.
                while let Some(closer) = open.pop() {
                    trim_dangling_comma(&mut out);
                    out.push(closer);
                    if closer == c {
                        break;
                    }
                }
            },
            '}' | ']' => {},
            _ => out.push(c),
        }
    }
    if in_string {
        out.push('"');
    }
    while let Some(closer) = open.pop() {
        trim_dangling_comma(&mut out);
        out.push(closer);
    }
    out
}

fn trim_dangling_comma(out: &mut String) {
    let kept = out.trim_end().trim_end_matches(',').len();
    out.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_clean_line_is_not_a_correction() {
        let (value, repaired) = repair(r#"{"word": "apple"}"#).unwrap();
        assert_eq!(value["word"], "apple");
        assert!(repaired.is_none());
    }

    #[rstest]
    #[case::missing_closing_brace(r#"{"word": "apple", "rank": 1"#)]
    #[case::trailing_comma(r#"{"word": "apple", "rank": 1,}"#)]
    #[case::trailing_line_comma(r#"{"word": "apple", "rank": 1},"#)]
    #[case::smart_quotes("{\u{201C}word\u{201D}: \u{201C}apple\u{201D}, \"rank\": 1}")]
    #[case::single_quotes("{'word': 'apple', 'rank': 1}")]
    #[case::missing_opening_brace(r#""word": "apple", "rank": 1}"#)]
    #[case::stray_closer(r#"{"word": "apple", "rank": 1}}"#)]
    #[case::unterminated_string(r#"{"word": "apple", "rank": 1, "note": "half"#)]
    fn test_repairs(#[case] line: &str) {
        let (value, repaired) = repair(line).unwrap();
        assert_eq!(value["word"], "apple");
        assert!(repaired.is_some());
    }

    #[test]
    fn test_glued_cards() {
        let line = r#"{"word": "apple", "back_cards": [{"example_en": "A."}{"example_en": "B."}]}"#;
        let (value, _) = repair(line).unwrap();
        assert_eq!(value["back_cards"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_unclosed_array_inside_object() {
        let (value, _) = repair(r#"{"word": "apple", "back_cards": [{"example_en": "A."},"#).unwrap();
        assert_eq!(value["back_cards"][0]["example_en"], "A.");
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let (value, _) = repair(r#"{"word": "brace", "example_en": "Use { to open"#).unwrap();
        assert_eq!(value["example_en"], "Use { to open");
    }

    #[rstest]
    #[case("this is not json at all")]
    #[case("[1, 2, 3]")]
    #[case("42")]
    fn test_unfixable(#[case] line: &str) {
        assert!(repair(line).is_err());
    }

    #[test]
    fn test_unfixable_reports_original_error() {
        let err = repair("word: apple").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }
}
