//! Normalisation of labels, identifiers and unique-key values.
//!
//! Search keys are compared as exact strings, so both sides of a lookup must
//! pass through the same functions. Quantity values in particular round-trip
//! through string form and must compare equal whether written `5`, `5.0` or
//! `+5`.

use crate::Datatype;

/// Trim a term, mapping blank input to `None`.
#[must_use]
pub fn normalise_term(term: &str) -> Option<String> {
    let trimmed = term.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Normalise an entity label used as a search key.
///
/// Blank labels and the placeholders spreadsheets write for empty cells
/// (`nan`, `none`, any case) are treated as missing.
///
/// # Examples
///
/// ```
/// use wbk_core::normalise::normalise_label;
///
/// assert_eq!(normalise_label("  Colegio A "), Some("Colegio A".to_owned()));
/// assert_eq!(normalise_label("NaN"), None);
/// ```
#[must_use]
pub fn normalise_label(label: &str) -> Option<String> {
    let term = normalise_term(label)?;
    let lowered = term.to_ascii_lowercase();
    (lowered != "nan" && lowered != "none").then_some(term)
}

/// Normalise a value used in a (label, property, value) key.
///
/// Quantity values drop a leading `+` and integral amounts collapse to their
/// integer form; other datatypes are only trimmed.
///
/// # Examples
///
/// ```
/// use wbk_core::{Datatype, normalise::normalise_unique_value};
///
/// let quantity = Some(&Datatype::Quantity);
/// assert_eq!(normalise_unique_value("+5.0", quantity), Some("5".to_owned()));
/// assert_eq!(normalise_unique_value("5.50", quantity), Some("5.5".to_owned()));
/// assert_eq!(normalise_unique_value(" AB-12 ", None), Some("AB-12".to_owned()));
/// ```
#[must_use]
pub fn normalise_unique_value(value: &str, datatype: Option<&Datatype>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if datatype == Some(&Datatype::Quantity) {
        return normalise_term(&normalise_quantity(trimmed));
    }
    Some(trimmed.to_owned())
}

// Values beyond this magnitude are no longer exactly representable as
// integers in an `f64`, so they keep their float rendering.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn normalise_quantity(value: &str) -> String {
    let unsigned = value.trim_start_matches('+');
    let Ok(numeric) = unsigned.parse::<f64>() else {
        return unsigned.to_owned();
    };
    if !numeric.is_finite() {
        return unsigned.to_owned();
    }
    if numeric == 0.0 {
        return "0".to_owned();
    }
    if numeric.fract() == 0.0 && numeric.abs() <= MAX_EXACT_INTEGER {
        return format!("{numeric:.0}");
    }
    numeric.to_string()
}

/// Normalise an item identifier written as `Q42`, `q42` or `42`.
#[must_use]
pub fn normalise_item_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix(['Q', 'q'])
        .unwrap_or(trimmed);
    (!digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()))
        .then(|| format!("Q{digits}"))
}

/// Whether a string already is an item or property identifier.
///
/// # Examples
///
/// ```
/// use wbk_core::normalise::is_entity_id;
///
/// assert!(is_entity_id("Q42"));
/// assert!(is_entity_id("P31"));
/// assert!(!is_entity_id("Quito"));
/// ```
#[must_use]
pub fn is_entity_id(value: &str) -> bool {
    value
        .strip_prefix(['Q', 'P'])
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()))
}
