//! Wikibase property datatypes.
//!
//! Datatypes drive how resolved row values become datavalues and whether a
//! value is treated as an entity reference. Unknown identifiers are kept
//! verbatim so that extension datatypes survive a round trip.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Datatype of a Wikibase property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Datatype {
    /// Reference to another item (`wikibase-item`).
    WikibaseItem,
    /// Reference to a property (`wikibase-property`).
    WikibaseProperty,
    /// Plain string.
    String,
    /// External identifier rendered as a string.
    ExternalId,
    /// URL rendered as a string.
    Url,
    /// Commons media file name.
    CommonsMedia,
    /// Quantity with an optional unit.
    Quantity,
    /// Point in time with a precision.
    Time,
    /// Latitude/longitude pair.
    GlobeCoordinate,
    /// Text tagged with a language.
    MonolingualText,
    /// Any datatype this crate does not model explicitly.
    Other(String),
}

impl Datatype {
    /// Wire identifier for the datatype.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::WikibaseItem => "wikibase-item",
            Self::WikibaseProperty => "wikibase-property",
            Self::String => "string",
            Self::ExternalId => "external-id",
            Self::Url => "url",
            Self::CommonsMedia => "commonsMedia",
            Self::Quantity => "quantity",
            Self::Time => "time",
            Self::GlobeCoordinate => "globe-coordinate",
            Self::MonolingualText => "monolingualtext",
            Self::Other(name) => name,
        }
    }

    /// Whether resolved values of this datatype name other entities.
    #[must_use]
    pub const fn is_entity_reference(&self) -> bool {
        matches!(self, Self::WikibaseItem | Self::WikibaseProperty)
    }
}

impl From<&str> for Datatype {
    fn from(value: &str) -> Self {
        match value {
            "wikibase-item" => Self::WikibaseItem,
            "wikibase-property" => Self::WikibaseProperty,
            "string" => Self::String,
            "external-id" => Self::ExternalId,
            "url" => Self::Url,
            "commonsMedia" => Self::CommonsMedia,
            "quantity" => Self::Quantity,
            "time" => Self::Time,
            "globe-coordinate" | "globecoordinate" => Self::GlobeCoordinate,
            "monolingualtext" => Self::MonolingualText,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for Datatype {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Datatype> for String {
    fn from(value: Datatype) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
