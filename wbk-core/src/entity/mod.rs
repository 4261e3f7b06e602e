//! Typed Wikibase entity documents.
//!
//! Entities are held as structured values internally and only take the
//! Wikibase JSON shape at the serialisation boundary (see [`wire`]). Claims
//! are grouped by property identifier; qualifiers and reference snaks keep
//! their property order so that the `*-order` lists survive a round trip.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::Datatype;

pub mod compare;
mod wire;

pub use wire::WireError;

#[cfg(test)]
mod tests;

/// Kind of a Wikibase entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// An item (`Q` identifiers).
    #[default]
    Item,
    /// A property (`P` identifiers).
    Property,
}

/// A Wikibase entity document.
///
/// # Examples
///
/// ```
/// use wbk_core::{Claim, DataValue, Entity, Snak};
///
/// let mut school = Entity::item();
/// school.set_label("en", "Colegio A");
/// school.push_claim(Claim::new(Snak::value("P31", DataValue::EntityId("Q3914".into()))));
///
/// assert_eq!(school.label("en"), Some("Colegio A"));
/// assert_eq!(school.claims_for("P31").len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "wire::RawEntity", into = "wire::RawEntity")]
pub struct Entity {
    /// Persisted identifier, absent for entities that have not been created.
    pub id: Option<String>,
    /// Item or property.
    pub kind: EntityKind,
    /// Datatype of a property entity.
    pub datatype: Option<Datatype>,
    /// Labels keyed by language code.
    pub labels: BTreeMap<String, String>,
    /// Descriptions keyed by language code.
    pub descriptions: BTreeMap<String, String>,
    /// Aliases keyed by language code.
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Claims keyed by property identifier.
    pub claims: BTreeMap<String, Vec<Claim>>,
}

impl Entity {
    /// An empty item with no identifier.
    #[must_use]
    pub fn item() -> Self {
        Self::default()
    }

    /// An empty shell for an existing identifier.
    ///
    /// Search collaborators return shells for identifiers they cannot load so
    /// callers can still address the entity.
    #[must_use]
    pub fn shell(id: impl Into<String>, language: &str, label: impl Into<String>) -> Self {
        let id = id.into();
        let kind = if id.starts_with('P') {
            EntityKind::Property
        } else {
            EntityKind::Item
        };
        let mut entity = Self {
            id: Some(id),
            kind,
            ..Self::default()
        };
        entity.set_label(language, label);
        entity
    }

    /// Label in the requested language.
    #[must_use]
    pub fn label(&self, language: &str) -> Option<&str> {
        self.labels.get(language).map(String::as_str)
    }

    /// Description in the requested language.
    #[must_use]
    pub fn description(&self, language: &str) -> Option<&str> {
        self.descriptions.get(language).map(String::as_str)
    }

    /// Replace the label for a language.
    pub fn set_label(&mut self, language: &str, value: impl Into<String>) {
        self.labels.insert(language.to_owned(), value.into());
    }

    /// Replace the description for a language.
    pub fn set_description(&mut self, language: &str, value: impl Into<String>) {
        self.descriptions.insert(language.to_owned(), value.into());
    }

    /// Add an alias unless the language already lists it.
    pub fn add_alias(&mut self, language: &str, value: impl Into<String>) {
        let value = value.into();
        let aliases = self.aliases.entry(language.to_owned()).or_default();
        if !aliases.contains(&value) {
            aliases.push(value);
        }
    }

    /// Claims recorded for a property, empty when there are none.
    #[must_use]
    pub fn claims_for(&self, property: &str) -> &[Claim] {
        self.claims.get(property).map_or(&[], Vec::as_slice)
    }

    /// Whether any claim is recorded for the property.
    #[must_use]
    pub fn has_claims_for(&self, property: &str) -> bool {
        self.claims
            .get(property)
            .is_some_and(|claims| !claims.is_empty())
    }

    /// Append a claim to the list of its main snak property.
    pub fn push_claim(&mut self, claim: Claim) {
        self.claims
            .entry(claim.mainsnak.property.clone())
            .or_default()
            .push(claim);
    }

    /// Numeric part of the identifier (`Q42` → `42`).
    #[must_use]
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_deref().and_then(numeric_id)
    }

    /// Give every claim without an identifier a `{entity}${n}` GUID.
    ///
    /// Existing claim ids are left alone and never reused. Entities without
    /// an identifier are untouched.
    pub fn assign_claim_ids(&mut self) {
        let Some(entity_id) = self.id.clone() else {
            return;
        };
        let taken: BTreeSet<String> = self
            .claims
            .values()
            .flatten()
            .filter_map(|claim| claim.id.clone())
            .collect();
        let mut counter = 0_u64;
        for claim in self.claims.values_mut().flatten() {
            if claim.id.is_some() {
                continue;
            }
            let guid = loop {
                counter += 1;
                let candidate = format!("{entity_id}${counter:08x}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            claim.id = Some(guid);
        }
    }
}

/// Numeric part of a `Q`/`P` identifier.
#[must_use]
pub fn numeric_id(id: &str) -> Option<u64> {
    let digits = id.strip_prefix(['Q', 'P', 'q', 'p'])?;
    digits.parse().ok()
}

/// Statement rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Preferred over normal-rank statements.
    Preferred,
    /// Default rank.
    #[default]
    Normal,
    /// Kept for the record but not to be used.
    Deprecated,
}

/// A statement attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "wire::RawClaim", into = "wire::RawClaim")]
pub struct Claim {
    /// Persisted statement GUID (`Q1$…`), absent for new claims.
    pub id: Option<String>,
    /// Main property/value assertion.
    pub mainsnak: Snak,
    /// Qualifier snaks in property order.
    pub qualifiers: SnakGroup,
    /// Reference blocks citing the statement.
    pub references: Vec<Reference>,
    /// Statement rank.
    pub rank: Rank,
}

impl Claim {
    /// A normal-rank claim with no qualifiers or references.
    #[must_use]
    pub fn new(mainsnak: Snak) -> Self {
        Self {
            id: None,
            mainsnak,
            qualifiers: SnakGroup::default(),
            references: Vec::new(),
            rank: Rank::Normal,
        }
    }

    /// Property of the main snak.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.mainsnak.property
    }

    /// Attach qualifiers, replacing any present.
    #[must_use]
    pub fn with_qualifiers(mut self, qualifiers: SnakGroup) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// Attach a reference block.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Set the rank.
    #[must_use]
    pub const fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    /// Set the persisted identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A single property/value assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "wire::RawSnak", into = "wire::RawSnak")]
pub struct Snak {
    /// Property identifier.
    pub property: String,
    /// Datatype of the property, when known.
    pub datatype: Option<Datatype>,
    /// Asserted value.
    pub value: SnakValue,
}

impl Snak {
    /// A value snak without datatype information.
    #[must_use]
    pub fn value(property: impl Into<String>, value: DataValue) -> Self {
        Self {
            property: property.into(),
            datatype: None,
            value: SnakValue::Value(value),
        }
    }

    /// Attach the property datatype.
    #[must_use]
    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = Some(datatype);
        self
    }

    /// Datavalue of a value snak.
    #[must_use]
    pub const fn datavalue(&self) -> Option<&DataValue> {
        match &self.value {
            SnakValue::Value(value) => Some(value),
            SnakValue::SomeValue | SnakValue::NoValue => None,
        }
    }
}

/// Value carried by a snak.
#[derive(Debug, Clone, PartialEq)]
pub enum SnakValue {
    /// A concrete datavalue.
    Value(DataValue),
    /// Some unknown value.
    SomeValue,
    /// Explicitly no value.
    NoValue,
}

/// Typed Wikibase datavalue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "wire::RawDataValue", into = "wire::RawDataValue")]
pub enum DataValue {
    /// Plain string (also used by external identifiers, URLs and media).
    String(String),
    /// Reference to another entity by identifier.
    EntityId(String),
    /// Signed decimal amount with a unit (`"1"` when unitless).
    Quantity {
        /// Signed decimal amount such as `+5`.
        amount: String,
        /// Unit entity URI or `"1"`.
        unit: String,
    },
    /// Point in time.
    Time {
        /// Timestamp such as `+2020-01-01T00:00:00Z`.
        time: String,
        /// Timezone offset in minutes.
        timezone: i32,
        /// Uncertainty before the timestamp.
        before: u32,
        /// Uncertainty after the timestamp.
        after: u32,
        /// Precision code (9 year, 10 month, 11 day).
        precision: u8,
        /// Calendar model URI.
        calendar_model: String,
    },
    /// Geographic coordinate.
    GlobeCoordinate {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Precision in degrees.
        precision: Option<f64>,
        /// Globe URI.
        globe: String,
    },
    /// Text in a given language.
    MonolingualText {
        /// Text content.
        text: String,
        /// Language code.
        language: String,
    },
}

impl DataValue {
    /// Representative string used when comparing unique-key values.
    ///
    /// Structured values contribute their most identifying component: the
    /// amount of a quantity, the id of an entity reference, the text of a
    /// monolingual value.
    #[must_use]
    pub fn key_text(&self) -> String {
        match self {
            Self::String(value) | Self::EntityId(value) => value.clone(),
            Self::Quantity { amount, .. } => amount.clone(),
            Self::Time { time, .. } => time.clone(),
            Self::GlobeCoordinate {
                latitude,
                longitude,
                ..
            } => format!("{latitude},{longitude}"),
            Self::MonolingualText { text, .. } => text.clone(),
        }
    }
}

/// Ordered group of snaks keyed by property.
///
/// Used for claim qualifiers and reference blocks. Property order is the
/// insertion order and is what the `*-order` wire lists carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnakGroup {
    entries: Vec<(String, Vec<Snak>)>,
}

impl SnakGroup {
    /// Build a group from snaks, grouping by property in first-seen order.
    pub fn from_snaks<I>(snaks: I) -> Self
    where
        I: IntoIterator<Item = Snak>,
    {
        let mut group = Self::default();
        for snak in snaks {
            group.push(snak);
        }
        group
    }

    /// Append a snak to its property list, adding the property if new.
    pub fn push(&mut self, snak: Snak) {
        if let Some((_, snaks)) = self
            .entries
            .iter_mut()
            .find(|(property, _)| *property == snak.property)
        {
            snaks.push(snak);
        } else {
            self.entries.push((snak.property.clone(), vec![snak]));
        }
    }

    /// Snaks recorded for a property.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&[Snak]> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == property)
            .map(|(_, snaks)| snaks.as_slice())
    }

    /// Property identifiers in order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(property, _)| property.as_str())
    }

    /// Iterate over `(property, snaks)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Snak])> {
        self.entries
            .iter()
            .map(|(property, snaks)| (property.as_str(), snaks.as_slice()))
    }

    /// Number of distinct properties.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group holds no snaks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild a group from a wire map and its order list.
    ///
    /// Properties listed in `order` keep that position; properties missing
    /// from the list follow in key order and listed properties absent from
    /// the map are dropped, so the resulting order always matches the keys.
    #[must_use]
    pub fn from_parts(mut map: BTreeMap<String, Vec<Snak>>, order: &[String]) -> Self {
        let mut entries = Vec::with_capacity(map.len());
        for property in order {
            if let Some(snaks) = map.remove(property) {
                entries.push((property.clone(), snaks));
            }
        }
        entries.extend(map);
        Self { entries }
    }

    /// Split into a wire map and its order list.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, Vec<Snak>>, Vec<String>) {
        let order = self
            .entries
            .iter()
            .map(|(property, _)| property.clone())
            .collect();
        (self.entries.into_iter().collect(), order)
    }
}

/// A reference block citing a claim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    /// Hash assigned by the store, if persisted.
    pub hash: Option<String>,
    /// Reference snaks.
    pub snaks: SnakGroup,
}

impl Reference {
    /// A new, unpersisted reference block.
    #[must_use]
    pub const fn new(snaks: SnakGroup) -> Self {
        Self { hash: None, snaks }
    }
}
