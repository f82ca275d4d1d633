//! Field normalization
//!
//! Pure, total functions turning raw source values into canonical types.
//! Unrecognized input yields a safe default; nothing here returns an error.
//!
//! # House precedence
//!
//! Raw house labels can match several alias sets ("Side venture" mentions both
//! a venture and a side alias), so aliases live in [`HOUSE_RULES`], an ordered
//! table evaluated top to bottom. The first matching rule wins. Unknown labels
//! resolve to `None`, never to a guessed house.

use serde_json::Value;

use crate::model::House;

/// Predicate over a cleaned (bracket-free, lowercase, trimmed) house label
pub type HousePredicate = fn(&str) -> bool;

/// Ordered alias rules; first match wins
pub const HOUSE_RULES: &[(HousePredicate, House)] = &[
    (is_builder_alias, House::Builder),
    (is_venture_alias, House::Venture),
    (is_karma_alias, House::Karma),
    (is_side_alias, House::Side),
];

fn is_builder_alias(label: &str) -> bool {
    matches!(label, "build" | "build!" | "builds")
        || ["build", "builder", "lifestyle", "smb"]
            .iter()
            .any(|alias| label.contains(alias))
}

fn is_venture_alias(label: &str) -> bool {
    ["venture", "adventure", "vc"]
        .iter()
        .any(|alias| label.contains(alias))
}

fn is_karma_alias(label: &str) -> bool {
    ["karma", "impact", "social"]
        .iter()
        .any(|alias| label.contains(alias))
}

fn is_side_alias(label: &str) -> bool {
    ["side", "hustle", "project"]
        .iter()
        .any(|alias| label.contains(alias))
}

/// Strip brackets and the word "house", lowercase, trim
fn clean_house_label(raw: &str) -> String {
    let without_brackets: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '{' | '}'))
        .collect();
    without_brackets
        .to_lowercase()
        .replace("house", "")
        .trim()
        .to_string()
}

/// Map a free-text house label onto the house taxonomy
///
/// # Examples
///
/// ```
/// use roster_common::model::House;
/// use roster_common::normalize::normalize_house;
///
/// assert_eq!(normalize_house("[BUILD house]"), Some(House::Builder));
/// assert_eq!(normalize_house("Karma House"), Some(House::Karma));
/// assert_eq!(normalize_house("mystery"), None);
/// ```
pub fn normalize_house(raw: &str) -> Option<House> {
    let label = clean_house_label(raw);
    if label.is_empty() {
        return None;
    }

    HOUSE_RULES
        .iter()
        .find(|(matches, _)| matches(&label))
        .map(|(_, house)| *house)
        .or_else(|| House::ALL.into_iter().find(|house| house.as_str() == label))
}

/// [`normalize_house`] over a JSON value; only strings can name a house
pub fn normalize_house_value(raw: Option<&Value>) -> Option<House> {
    match raw {
        Some(Value::String(label)) => normalize_house(label),
        _ => None,
    }
}

/// Coerce a loosely typed flag to a real boolean
///
/// `true`, `"true"`, `"1"` and `1` are true. Everything else, including
/// missing values and garbage, is false.
pub fn normalize_boolean(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => matches!(text.trim(), "true" | "1"),
        Some(Value::Number(number)) => number.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Like [`normalize_boolean`] but keeps "absent" distinguishable, so a
/// missing flag can fall back to the field's default instead of `false`
pub fn normalize_optional_boolean(raw: Option<&Value>) -> Option<bool> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.trim().is_empty() => None,
        value => Some(normalize_boolean(value)),
    }
}

/// Normalize progress to an integer percentage in [0, 100]
///
/// Values in [0, 1] are fractions and get scaled by 100; every other number is
/// already a percentage. Strings may carry a trailing `%`.
/// Missing, unparseable and non-finite input yields 0.
pub fn normalize_progress(raw: Option<&Value>) -> u8 {
    let value = match raw {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(value) if value.is_finite() => progress_from_f64(value),
        _ => 0,
    }
}

fn progress_from_f64(value: f64) -> u8 {
    let percent = if (0.0..=1.0).contains(&value) {
        value * 100.0
    } else {
        value
    };
    percent.round().clamp(0.0, 100.0) as u8
}

/// Trimmed text of a string, number or boolean value; blank is `None`
pub fn normalize_text(raw: Option<&Value>) -> Option<String> {
    let text = match raw? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
