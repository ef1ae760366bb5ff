//! Structural validation of batch records.
//!
//! Runs on the raw JSON object, before it is turned into a
//! [`VocabularyEntry`], so that the error can name the offending field.

use crate::consts::REQUIRED_FIELDS;
use crate::error::{ErrorKind, Result};
use crate::models::VocabularyEntry;
use exn::{OptionExt, ResultExt};
use serde_json::{Map, Value};

/// Validates a batch record and converts it into a [`VocabularyEntry`].
///
/// A record is valid iff it has every required field, the required strings
/// are non-empty, the rank is a positive integer, and it has at least one
/// back card carrying both a definition and an example.
pub fn validate(record: &Value) -> Result<VocabularyEntry> {
    let object = record.as_object().ok_or_raise(|| ErrorKind::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        let present = object.contains_key(field) || (field == "freq" && object.contains_key("frequency"));
        if !present {
            exn::bail!(ErrorKind::MissingField(field));
        }
    }
    non_empty_string(object, "word")?;
    match object.get("rank").and_then(Value::as_u64) {
        Some(rank) if rank > 0 && u32::try_from(rank).is_ok() => {},
        _ => exn::bail!(ErrorKind::InvalidField { field: "rank", value: display(object.get("rank")) }),
    }
    let frequency = object.get("freq").or_else(|| object.get("frequency"));
    if !frequency.is_some_and(Value::is_number) {
        exn::bail!(ErrorKind::InvalidField { field: "freq", value: display(frequency) });
    }
    let cards = match object.get("back_cards") {
        Some(Value::Array(cards)) => cards,
        other => exn::bail!(ErrorKind::InvalidField { field: "back_cards", value: display(other) }),
    };
    if cards.is_empty() {
        exn::bail!(ErrorKind::NoBackCards);
    }
    for (index, card) in cards.iter().enumerate() {
        let card = card.as_object().ok_or_raise(|| ErrorKind::IncompleteCard { index, field: "definition_en" })?;
        for field in ["definition_en", "example_en"] {
            if !card.get(field).and_then(Value::as_str).is_some_and(|s| !s.trim().is_empty()) {
                exn::bail!(ErrorKind::IncompleteCard { index, field });
            }
        }
    }
    serde_json::from_value(record.clone())
        .or_raise(|| ErrorKind::InvalidField { field: "record", value: display(object.get("word")) })
}

/// Returns `true` if [`validate`] would accept the record.
pub fn is_valid(record: &Value) -> bool {
    validate(record).is_ok()
}

fn non_empty_string(object: &Map<String, Value>, field: &'static str) -> Result<()> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        Some(Value::String(_)) => exn::bail!(ErrorKind::EmptyField(field)),
        other => exn::bail!(ErrorKind::InvalidField { field, value: display(other) }),
    }
}

fn display(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_else(|| "null".to_string())
}
