//! Conversion of resolved values into typed datavalues.

use thiserror::Error;
use wbk_core::{DataValue, Datatype, normalise::is_entity_id};

use crate::ResolvedValue;

const ENTITY_URI_PREFIX: &str = "http://www.wikidata.org/entity/";
const GREGORIAN_CALENDAR: &str = "Q1985727";
const EARTH: &str = "Q2";
const COORDINATE_PRECISION: f64 = 0.0001;
const MAX_TIME_PRECISION: u8 = 14;

/// Why a resolved value cannot become a datavalue of its datatype.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The value had the wrong number of components.
    #[error("{datatype} expects {expected} but got {found} value(s)")]
    Arity {
        /// Target datatype.
        datatype: Datatype,
        /// Accepted shapes.
        expected: &'static str,
        /// Components received.
        found: usize,
    },
    /// A quantity amount was not a decimal number.
    #[error("'{value}' is not a decimal amount")]
    Amount {
        /// Offending text.
        value: String,
    },
    /// A quantity unit was neither `1`, an entity id nor a URI.
    #[error("'{value}' is not a unit")]
    Unit {
        /// Offending text.
        value: String,
    },
    /// A time value was not a recognised date or timestamp.
    #[error("'{value}' is not a date")]
    Time {
        /// Offending text.
        value: String,
    },
    /// A time precision was not a number between 0 and 14.
    #[error("'{value}' is not a time precision")]
    Precision {
        /// Offending text.
        value: String,
    },
    /// A coordinate was not a latitude/longitude pair in range.
    #[error("'{value}' is not a coordinate")]
    Coordinate {
        /// Offending text.
        value: String,
    },
}

/// Convert a resolved value for a snak of `datatype`.
///
/// Entity references that are not ids become string values; callers treat
/// those as pending references.
pub fn to_datavalue(
    value: &ResolvedValue,
    datatype: &Datatype,
    language: &str,
) -> Result<DataValue, ConvertError> {
    let parts: Vec<&str> = match value {
        ResolvedValue::Scalar(text) => vec![text.as_str()],
        ResolvedValue::Tuple(parts) => parts.iter().map(String::as_str).collect(),
    };
    match datatype {
        Datatype::Quantity => quantity(&parts, datatype),
        Datatype::Time => time(&parts, datatype),
        Datatype::GlobeCoordinate => coordinate(&parts, datatype),
        Datatype::MonolingualText => match parts.as_slice() {
            [text] => Ok(DataValue::MonolingualText {
                text: (*text).to_owned(),
                language: language.to_owned(),
            }),
            [text, language] => Ok(DataValue::MonolingualText {
                text: (*text).to_owned(),
                language: (*language).to_owned(),
            }),
            _ => Err(arity(datatype, "text or (text, language)", parts.len())),
        },
        Datatype::WikibaseItem | Datatype::WikibaseProperty => match parts.as_slice() {
            [id] if is_entity_id(id) => Ok(DataValue::EntityId((*id).to_owned())),
            [label] => Ok(DataValue::String((*label).to_owned())),
            _ => Err(arity(datatype, "one entity", parts.len())),
        },
        Datatype::String
        | Datatype::ExternalId
        | Datatype::Url
        | Datatype::CommonsMedia
        | Datatype::Other(_) => match parts.as_slice() {
            [text] => Ok(DataValue::String((*text).to_owned())),
            _ => Err(arity(datatype, "one value", parts.len())),
        },
    }
}

fn arity(datatype: &Datatype, expected: &'static str, found: usize) -> ConvertError {
    ConvertError::Arity {
        datatype: datatype.clone(),
        expected,
        found,
    }
}

fn quantity(parts: &[&str], datatype: &Datatype) -> Result<DataValue, ConvertError> {
    let (amount, unit) = match parts {
        [amount] => (*amount, None),
        [amount, unit] => (*amount, Some(*unit)),
        _ => return Err(arity(datatype, "amount or (amount, unit)", parts.len())),
    };
    Ok(DataValue::Quantity {
        amount: signed_amount(amount)?,
        unit: unit_uri(unit)?,
    })
}

fn signed_amount(amount: &str) -> Result<String, ConvertError> {
    let amount = amount.trim();
    let (sign, unsigned) = match amount.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("+", amount.strip_prefix('+').unwrap_or(amount)),
    };
    let (integral, fractional) = unsigned.split_once('.').unwrap_or((unsigned, "0"));
    let digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    if !digits(integral) || !digits(fractional) {
        return Err(ConvertError::Amount {
            value: amount.to_owned(),
        });
    }
    Ok(format!("{sign}{unsigned}"))
}

fn unit_uri(unit: Option<&str>) -> Result<String, ConvertError> {
    match unit.map(str::trim) {
        None | Some("" | "1") => Ok("1".to_owned()),
        Some(id) if is_entity_id(id) => Ok(format!("{ENTITY_URI_PREFIX}{id}")),
        Some(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
            Ok(uri.to_owned())
        }
        Some(other) => Err(ConvertError::Unit {
            value: other.to_owned(),
        }),
    }
}

fn time(parts: &[&str], datatype: &Datatype) -> Result<DataValue, ConvertError> {
    let (raw, precision) = match parts {
        [raw] => (*raw, None),
        [raw, precision] => (*raw, Some(*precision)),
        _ => return Err(arity(datatype, "date or (date, precision)", parts.len())),
    };
    let (timestamp, implied) = timestamp(raw.trim())?;
    let precision = match precision {
        Some(text) => text
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|value| *value <= MAX_TIME_PRECISION)
            .ok_or_else(|| ConvertError::Precision {
                value: text.to_owned(),
            })?,
        None => implied,
    };
    Ok(DataValue::Time {
        time: timestamp,
        timezone: 0,
        before: 0,
        after: 0,
        precision,
        calendar_model: format!("{ENTITY_URI_PREFIX}{GREGORIAN_CALENDAR}"),
    })
}

/// Wikibase timestamp and implied precision for a date.
///
/// `YYYY` has year precision (9), `YYYY-MM` month (10), `YYYY-MM-DD` day
/// (11). Full timestamps are accepted with or without a leading sign.
fn timestamp(raw: &str) -> Result<(String, u8), ConvertError> {
    let invalid = || ConvertError::Time {
        value: raw.to_owned(),
    };
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ('-', rest),
        None => ('+', raw.strip_prefix('+').unwrap_or(raw)),
    };
    let (date, clock) = match unsigned.split_once('T') {
        Some((date, clock)) => (date, Some(clock)),
        None => (unsigned, None),
    };
    let fields: Vec<&str> = date.split('-').collect();
    let numeric = |field: &&str| !field.is_empty() && field.chars().all(|ch| ch.is_ascii_digit());
    if !fields.iter().all(numeric) {
        return Err(invalid());
    }
    let (year, month, day, precision) = match fields.as_slice() {
        [year] if year.len() >= 4 => (*year, "00", "00", 9),
        [year, month] if year.len() >= 4 && month.len() == 2 => (*year, *month, "00", 10),
        [year, month, day] if year.len() >= 4 && month.len() == 2 && day.len() == 2 => {
            (*year, *month, *day, 11)
        }
        _ => return Err(invalid()),
    };
    let in_range = |field: &str, max: u8| {
        field
            .parse::<u8>()
            .is_ok_and(|value| value <= max && (field == "00" || value >= 1))
    };
    if !in_range(month, 12) || !in_range(day, 31) || (month == "00" && day != "00") {
        return Err(invalid());
    }
    let clock = match clock {
        Some(clock) if is_clock(clock) => clock,
        Some(_) => return Err(invalid()),
        None => "00:00:00Z",
    };
    Ok((format!("{sign}{year}-{month}-{day}T{clock}"), precision))
}

fn is_clock(clock: &str) -> bool {
    let Some(time) = clock.strip_suffix('Z') else {
        return false;
    };
    let fields: Vec<&str> = time.split(':').collect();
    fields.len() == 3
        && fields
            .iter()
            .all(|field| field.len() == 2 && field.chars().all(|ch| ch.is_ascii_digit()))
}

fn coordinate(parts: &[&str], datatype: &Datatype) -> Result<DataValue, ConvertError> {
    let (latitude, longitude) = match parts {
        [pair] => pair.split_once(',').ok_or_else(|| ConvertError::Coordinate {
            value: (*pair).to_owned(),
        })?,
        [latitude, longitude] => (*latitude, *longitude),
        _ => {
            return Err(arity(
                datatype,
                "\"latitude,longitude\" or (latitude, longitude)",
                parts.len(),
            ));
        }
    };
    let invalid = || ConvertError::Coordinate {
        value: format!("{latitude},{longitude}"),
    };
    let latitude: f64 = latitude.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = longitude.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=360.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(DataValue::GlobeCoordinate {
        latitude,
        longitude,
        precision: Some(COORDINATE_PRECISION),
        globe: format!("{ENTITY_URI_PREFIX}{EARTH}"),
    })
}
