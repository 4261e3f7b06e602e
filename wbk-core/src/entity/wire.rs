//! Wikibase JSON representation of entity documents.
//!
//! The raw structs mirror the wire shape exactly and convert into the typed
//! model. Wikibase serialises empty maps as `[]`, so every map field accepts
//! either shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, de::IgnoredAny};
use thiserror::Error;

use super::{Claim, DataValue, Entity, EntityKind, Rank, Reference, Snak, SnakGroup, SnakValue};
use crate::Datatype;

const STATEMENT_TYPE: &str = "statement";

/// Errors raised when a wire document does not describe a valid entity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// A `value` snak carried no datavalue.
    #[error("value snak for {property} has no datavalue")]
    MissingDatavalue {
        /// Property of the offending snak.
        property: String,
    },
    /// The snak type was not `value`, `somevalue` or `novalue`.
    #[error("unknown snak type '{snaktype}' for {property}")]
    UnknownSnakType {
        /// Property of the offending snak.
        property: String,
        /// Type found on the wire.
        snaktype: String,
    },
    /// An entity reference carried neither an id nor a numeric id.
    #[error("entity reference has neither 'id' nor 'numeric-id'")]
    MissingEntityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawEntity {
    #[serde(rename = "type", default)]
    kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<Datatype>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    labels: BTreeMap<String, RawTerm>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    descriptions: BTreeMap<String, RawTerm>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    aliases: BTreeMap<String, Vec<RawTerm>>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    claims: BTreeMap<String, Vec<Claim>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTerm {
    language: String,
    value: String,
}

impl TryFrom<RawEntity> for Entity {
    type Error = WireError;

    fn try_from(raw: RawEntity) -> Result<Self, Self::Error> {
        let terms = |map: BTreeMap<String, RawTerm>| {
            map.into_iter()
                .map(|(language, term)| (language, term.value))
                .collect()
        };
        Ok(Self {
            id: raw.id,
            kind: raw.kind,
            datatype: raw.datatype,
            labels: terms(raw.labels),
            descriptions: terms(raw.descriptions),
            aliases: raw
                .aliases
                .into_iter()
                .map(|(language, values)| {
                    (
                        language,
                        values.into_iter().map(|term| term.value).collect(),
                    )
                })
                .collect(),
            claims: raw.claims,
        })
    }
}

impl From<Entity> for RawEntity {
    fn from(entity: Entity) -> Self {
        let terms = |map: BTreeMap<String, String>| {
            map.into_iter()
                .map(|(language, value)| {
                    let term = RawTerm {
                        language: language.clone(),
                        value,
                    };
                    (language, term)
                })
                .collect()
        };
        Self {
            kind: entity.kind,
            id: entity.id,
            datatype: entity.datatype,
            labels: terms(entity.labels),
            descriptions: terms(entity.descriptions),
            aliases: entity
                .aliases
                .into_iter()
                .map(|(language, values)| {
                    let terms = values
                        .into_iter()
                        .map(|value| RawTerm {
                            language: language.clone(),
                            value,
                        })
                        .collect();
                    (language, terms)
                })
                .collect(),
            claims: entity.claims,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawClaim {
    mainsnak: Snak,
    #[serde(rename = "type", default = "statement_type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    rank: Rank,
    #[serde(
        default,
        deserialize_with = "map_or_empty_list",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    qualifiers: BTreeMap<String, Vec<Snak>>,
    #[serde(
        rename = "qualifiers-order",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    qualifiers_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    references: Vec<RawReference>,
}

fn statement_type() -> String {
    STATEMENT_TYPE.to_owned()
}

impl TryFrom<RawClaim> for Claim {
    type Error = WireError;

    fn try_from(raw: RawClaim) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id,
            mainsnak: raw.mainsnak,
            qualifiers: SnakGroup::from_parts(raw.qualifiers, &raw.qualifiers_order),
            references: raw.references.into_iter().map(Reference::from).collect(),
            rank: raw.rank,
        })
    }
}

impl From<Claim> for RawClaim {
    fn from(claim: Claim) -> Self {
        let (qualifiers, qualifiers_order) = claim.qualifiers.into_parts();
        Self {
            mainsnak: claim.mainsnak,
            kind: statement_type(),
            id: claim.id,
            rank: claim.rank,
            qualifiers,
            qualifiers_order,
            references: claim.references.into_iter().map(RawReference::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    snaks: BTreeMap<String, Vec<Snak>>,
    #[serde(rename = "snaks-order", default)]
    snaks_order: Vec<String>,
}

impl From<RawReference> for Reference {
    fn from(raw: RawReference) -> Self {
        Self {
            hash: raw.hash,
            snaks: SnakGroup::from_parts(raw.snaks, &raw.snaks_order),
        }
    }
}

impl From<Reference> for RawReference {
    fn from(reference: Reference) -> Self {
        let (snaks, snaks_order) = reference.snaks.into_parts();
        Self {
            hash: reference.hash,
            snaks,
            snaks_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawSnak {
    snaktype: String,
    property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<Datatype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datavalue: Option<DataValue>,
}

impl TryFrom<RawSnak> for Snak {
    type Error = WireError;

    fn try_from(raw: RawSnak) -> Result<Self, Self::Error> {
        let value = match raw.snaktype.as_str() {
            "value" => {
                let Some(datavalue) = raw.datavalue else {
                    return Err(WireError::MissingDatavalue {
                        property: raw.property,
                    });
                };
                SnakValue::Value(datavalue)
            }
            "somevalue" => SnakValue::SomeValue,
            "novalue" => SnakValue::NoValue,
            _ => {
                return Err(WireError::UnknownSnakType {
                    property: raw.property,
                    snaktype: raw.snaktype,
                });
            }
        };
        Ok(Self {
            property: raw.property,
            datatype: raw.datatype,
            value,
        })
    }
}

impl From<Snak> for RawSnak {
    fn from(snak: Snak) -> Self {
        let (snaktype, datavalue) = match snak.value {
            SnakValue::Value(value) => ("value", Some(value)),
            SnakValue::SomeValue => ("somevalue", None),
            SnakValue::NoValue => ("novalue", None),
        };
        Self {
            snaktype: snaktype.to_owned(),
            property: snak.property,
            datatype: snak.datatype,
            datavalue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub(super) enum RawDataValue {
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "wikibase-entityid")]
    EntityId(RawEntityId),
    #[serde(rename = "quantity")]
    Quantity(RawQuantity),
    #[serde(rename = "time")]
    Time(RawTime),
    #[serde(rename = "globecoordinate")]
    GlobeCoordinate(RawGlobeCoordinate),
    #[serde(rename = "monolingualtext")]
    MonolingualText(RawMonolingualText),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawEntityId {
    #[serde(rename = "entity-type", default, skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
    #[serde(rename = "numeric-id", default, skip_serializing_if = "Option::is_none")]
    numeric_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawQuantity {
    amount: String,
    #[serde(default = "unitless")]
    unit: String,
}

fn unitless() -> String {
    "1".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawTime {
    time: String,
    #[serde(default)]
    timezone: i32,
    #[serde(default)]
    before: u32,
    #[serde(default)]
    after: u32,
    precision: u8,
    calendarmodel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawGlobeCoordinate {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(default)]
    precision: Option<f64>,
    globe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct RawMonolingualText {
    text: String,
    language: String,
}

impl TryFrom<RawDataValue> for DataValue {
    type Error = WireError;

    fn try_from(raw: RawDataValue) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawDataValue::String(value) => Self::String(value),
            RawDataValue::EntityId(reference) => Self::EntityId(reference.into_id()?),
            RawDataValue::Quantity(quantity) => Self::Quantity {
                amount: quantity.amount,
                unit: quantity.unit,
            },
            RawDataValue::Time(time) => Self::Time {
                time: time.time,
                timezone: time.timezone,
                before: time.before,
                after: time.after,
                precision: time.precision,
                calendar_model: time.calendarmodel,
            },
            RawDataValue::GlobeCoordinate(coordinate) => Self::GlobeCoordinate {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
                precision: coordinate.precision,
                globe: coordinate.globe,
            },
            RawDataValue::MonolingualText(text) => Self::MonolingualText {
                text: text.text,
                language: text.language,
            },
        })
    }
}

impl RawEntityId {
    fn into_id(self) -> Result<String, WireError> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let Some(numeric_id) = self.numeric_id else {
            return Err(WireError::MissingEntityId);
        };
        let prefix = match self.entity_type.as_deref() {
            Some("property") => 'P',
            _ => 'Q',
        };
        Ok(format!("{prefix}{numeric_id}"))
    }

    fn from_id(id: String) -> Self {
        let entity_type = if id.starts_with('P') {
            "property"
        } else {
            "item"
        };
        Self {
            entity_type: Some(entity_type.to_owned()),
            numeric_id: super::numeric_id(&id),
            id: Some(id),
        }
    }
}

impl From<DataValue> for RawDataValue {
    fn from(value: DataValue) -> Self {
        match value {
            DataValue::String(value) => Self::String(value),
            DataValue::EntityId(id) => Self::EntityId(RawEntityId::from_id(id)),
            DataValue::Quantity { amount, unit } => Self::Quantity(RawQuantity { amount, unit }),
            DataValue::Time {
                time,
                timezone,
                before,
                after,
                precision,
                calendar_model,
            } => Self::Time(RawTime {
                time,
                timezone,
                before,
                after,
                precision,
                calendarmodel: calendar_model,
            }),
            DataValue::GlobeCoordinate {
                latitude,
                longitude,
                precision,
                globe,
            } => Self::GlobeCoordinate(RawGlobeCoordinate {
                latitude,
                longitude,
                altitude: None,
                precision,
                globe,
            }),
            DataValue::MonolingualText { text, language } => {
                Self::MonolingualText(RawMonolingualText { text, language })
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrList<T> {
    Map(BTreeMap<String, T>),
    List(Vec<IgnoredAny>),
}

fn map_or_empty_list<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match MapOrList::<T>::deserialize(deserializer)? {
        MapOrList::Map(map) => map,
        MapOrList::List(_) => BTreeMap::new(),
    })
}
