//! Value specifications.
//!
//! Configuration writes values as bare strings, single-key maps or lists.
//! The raw shape is accepted untagged and converted into the closed
//! [`ValueSpec`] sum so that resolvers match exhaustively.

use serde::{Deserialize, Serialize};

use super::{ConfigError, SnakMatcher};

/// Where a statement value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValueSpec", into = "RawValueSpec")]
pub enum ValueSpec {
    /// A bare string: a column name when the row has that column, otherwise
    /// a `{column}` template.
    Literal(String),
    /// `{column: name}`: the cell of a column.
    Column(String),
    /// `{value: literal}`: a static value.
    Static(String),
    /// `{label: template}`: a reference to another entity by label.
    Label(LabelRef),
    /// A list of specs resolved into an ordered tuple.
    Composite(Vec<ValueSpec>),
}

/// Reference to another entity by label, optionally narrowed by a snak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRef {
    /// Label template.
    pub label: String,
    /// Property value that disambiguates equal labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snak: Option<SnakMatcher>,
}

impl ValueSpec {
    /// A label reference without a snak matcher.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(LabelRef {
            label: label.into(),
            snak: None,
        })
    }

    /// Snak matchers nested anywhere in the spec.
    #[must_use]
    pub fn snak_matchers(&self) -> Vec<&SnakMatcher> {
        match self {
            Self::Label(LabelRef {
                snak: Some(matcher),
                ..
            }) => vec![matcher],
            Self::Composite(parts) => parts.iter().flat_map(Self::snak_matchers).collect(),
            Self::Literal(_) | Self::Column(_) | Self::Static(_) | Self::Label(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawValueSpec {
    Text(String),
    List(Vec<ValueSpec>),
    Map(RawValueMap),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawValueMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snak: Option<SnakMatcher>,
}

impl TryFrom<RawValueSpec> for ValueSpec {
    type Error = ConfigError;

    fn try_from(raw: RawValueSpec) -> Result<Self, Self::Error> {
        match raw {
            RawValueSpec::Text(text) => Ok(Self::Literal(text)),
            RawValueSpec::List(parts) => Ok(Self::Composite(parts)),
            RawValueSpec::Map(map) => map.try_into(),
        }
    }
}

impl TryFrom<RawValueMap> for ValueSpec {
    type Error = ConfigError;

    fn try_from(map: RawValueMap) -> Result<Self, Self::Error> {
        if let Some(column) = map.column {
            return Ok(Self::Column(column));
        }
        if let Some(value) = map.value {
            return static_text(value).map(Self::Static);
        }
        if let Some(label) = map.label {
            return Ok(Self::Label(LabelRef {
                label,
                snak: map.snak,
            }));
        }
        Err(ConfigError::InvalidValueSpec {
            reason: "a value map must have 'column', 'value', or 'label'".to_owned(),
        })
    }
}

fn static_text(value: serde_json::Value) -> Result<String, ConfigError> {
    match value {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(ConfigError::InvalidValueSpec {
            reason: format!("static value must be a string, number or boolean, got {other}"),
        }),
    }
}

impl From<ValueSpec> for RawValueSpec {
    fn from(spec: ValueSpec) -> Self {
        match spec {
            ValueSpec::Literal(text) => Self::Text(text),
            ValueSpec::Composite(parts) => Self::List(parts),
            ValueSpec::Column(column) => Self::Map(RawValueMap {
                column: Some(column),
                ..RawValueMap::default()
            }),
            ValueSpec::Static(value) => Self::Map(RawValueMap {
                value: Some(serde_json::Value::String(value)),
                ..RawValueMap::default()
            }),
            ValueSpec::Label(LabelRef { label, snak }) => Self::Map(RawValueMap {
                label: Some(label),
                snak,
                ..RawValueMap::default()
            }),
        }
    }
}
