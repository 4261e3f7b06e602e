//! Collaborator traits for finding and persisting entities.
//!
//! The mapping engine never talks to a store directly. It searches through
//! [`ItemSearch`] and [`PropertyLookup`] and writes through [`EntityWriter`];
//! [`WikibaseBackend`] bundles all three so a single handle can be passed
//! around. Ambiguity is reported as a [`SearchHit::Ambiguous`] value rather
//! than an error so callers decide per key whether to skip or abort.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::{Datatype, Entity, normalise::normalise_unique_value};

/// Boxed error returned by storage adapters.
pub type BackendError = Box<dyn StdError + Send + Sync + 'static>;

/// Several entities matched a key that should identify one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousMatch {
    /// Rendered search key, such as the label.
    pub key: String,
    /// Identifiers of every matching entity, lowest first.
    pub candidates: Vec<String>,
}

impl fmt::Display for AmbiguousMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Multiple items ([{}]) have the label '{}'",
            self.candidates.join(", "),
            self.key
        )
    }
}

/// Outcome of looking up one key.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    /// Exactly one entity matched, or the lowest id when ambiguity was
    /// tolerated.
    Found(Box<Entity>),
    /// No entity matched.
    NotFound,
    /// More than one entity matched.
    Ambiguous(AmbiguousMatch),
}

impl SearchHit {
    /// Classify the entities matching `key`.
    ///
    /// Candidates are ordered by numeric id so that tolerated ambiguity
    /// always resolves to the oldest entity.
    #[must_use]
    pub fn from_candidates(key: &str, mut candidates: Vec<Entity>, allow_ambiguous: bool) -> Self {
        candidates.sort_by_key(|entity| (entity.numeric_id(), entity.id.clone()));
        candidates.dedup_by(|a, b| a.id.is_some() && a.id == b.id);
        match candidates.len() {
            0 => Self::NotFound,
            1 => Self::found(candidates.remove(0)),
            _ if allow_ambiguous => Self::found(candidates.remove(0)),
            _ => Self::Ambiguous(AmbiguousMatch {
                key: key.to_owned(),
                candidates: candidates
                    .iter()
                    .filter_map(|entity| entity.id.clone())
                    .collect(),
            }),
        }
    }

    /// Wrap a single match.
    #[must_use]
    pub fn found(entity: Entity) -> Self {
        Self::Found(Box::new(entity))
    }

    /// Matched entity, if exactly one was selected.
    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Found(entity) => Some(entity),
            Self::NotFound | Self::Ambiguous(_) => None,
        }
    }

    /// Identifier of the matched entity.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.entity().and_then(|entity| entity.id.as_deref())
    }
}

/// Errors raised by search collaborators.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A key matched several entities where one was required.
    #[error("Ambiguous match: {0}")]
    Ambiguous(AmbiguousMatch),
    /// The underlying store failed.
    #[error("search backend failed during {operation}")]
    Backend {
        /// Operation being performed.
        operation: &'static str,
        /// Error reported by the store.
        #[source]
        source: BackendError,
    },
}

impl SearchError {
    /// Wrap a store failure.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BackendError>,
    {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Errors raised while persisting entities.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The underlying store failed.
    #[error("entity writer failed during {operation}")]
    Backend {
        /// Operation being performed.
        operation: &'static str,
        /// Error reported by the store.
        #[source]
        source: BackendError,
    },
    /// An entity could not be encoded for storage.
    #[error("failed to encode entity {id}")]
    Encode {
        /// Identifier of the entity, or `"new"`.
        id: String,
        /// Encoder failure.
        #[source]
        source: BackendError,
    },
    /// An update named no entity identifier.
    #[error("cannot update an entity without an identifier")]
    MissingId,
    /// An update named an entity the store does not hold.
    #[error("cannot update unknown entity {id}")]
    UnknownEntity {
        /// Identifier that was not found.
        id: String,
    },
}

impl SubmitError {
    /// Wrap a store failure.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BackendError>,
    {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Property identifier and datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Property identifier such as `P31`.
    pub id: String,
    /// Declared datatype.
    pub datatype: Datatype,
}

/// Lookup of items by their identifying keys.
///
/// Every requested key appears in the returned map. Labels are compared as
/// exact strings in the requested language; callers normalise them first.
pub trait ItemSearch {
    /// Find items by label.
    ///
    /// With `allow_ambiguous`, a label shared by several items resolves to the
    /// one with the lowest numeric id.
    fn find_items_by_labels(
        &self,
        labels: &[String],
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<String, SearchHit>, SearchError>;

    /// Find items by label and description.
    fn find_items_by_labels_and_descriptions(
        &self,
        pairs: &[(String, String)],
        language: &str,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError>;

    /// Find items by label and the value of one property.
    ///
    /// Values are compared after [`normalise_unique_value`] with `datatype`,
    /// so quantity amounts match regardless of sign or trailing zeros.
    fn find_items_by_label_and_snak(
        &self,
        keys: &[(String, String)],
        property_id: &str,
        datatype: Option<&Datatype>,
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError>;

    /// Load items by identifier.
    ///
    /// Identifiers are normalised (`q1` and `1` become `Q1`) and missing
    /// items come back as empty shells rather than being omitted.
    fn find_items_by_qids(
        &self,
        qids: &[String],
        language: &str,
    ) -> Result<BTreeMap<String, Entity>, SearchError>;
}

/// Lookup of properties by label or identifier.
pub trait PropertyLookup {
    /// Resolve each input to a property; unknown inputs are omitted.
    fn find_properties(
        &self,
        labels_or_ids: &[String],
        language: &str,
    ) -> Result<BTreeMap<String, PropertyInfo>, SearchError>;
}

/// Bulk persistence of entity documents.
pub trait EntityWriter {
    /// Create (`is_new`) or overwrite the given entities, returning their
    /// identifiers in input order.
    fn submit(&self, entities: Vec<Entity>, is_new: bool) -> Result<Vec<String>, SubmitError>;
}

/// Both search traits, as needed by resolution.
pub trait SearchBackend: ItemSearch + PropertyLookup {}

impl<T> SearchBackend for T where T: ItemSearch + PropertyLookup + ?Sized {}

/// Every collaborator the mapping processor needs.
pub trait WikibaseBackend: SearchBackend + EntityWriter {}

impl<T> WikibaseBackend for T where T: SearchBackend + EntityWriter + ?Sized {}

/// Turn any ambiguous hit into an error.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use wbk_core::{AmbiguousMatch, SearchHit, require_unambiguous};
///
/// let hits = BTreeMap::from([(
///     "Escuela Básica".to_owned(),
///     SearchHit::Ambiguous(AmbiguousMatch {
///         key: "Escuela Básica".into(),
///         candidates: vec!["Q1".into(), "Q2".into()],
///     }),
/// )]);
/// let err = require_unambiguous(hits).expect_err("ambiguous label");
/// assert_eq!(
///     err.to_string(),
///     "Ambiguous match: Multiple items ([Q1, Q2]) have the label 'Escuela Básica'"
/// );
/// ```
pub fn require_unambiguous<K>(
    hits: BTreeMap<K, SearchHit>,
) -> Result<BTreeMap<K, Option<Entity>>, SearchError>
where
    K: Ord,
{
    hits.into_iter()
        .map(|(key, hit)| match hit {
            SearchHit::Found(entity) => Ok((key, Some(*entity))),
            SearchHit::NotFound => Ok((key, None)),
            SearchHit::Ambiguous(ambiguous) => Err(SearchError::Ambiguous(ambiguous)),
        })
        .collect()
}

/// Whether an entity carries `value` for `property`, compared as a unique
/// key value.
#[must_use]
pub fn has_snak_value(
    entity: &Entity,
    property: &str,
    value: &str,
    datatype: Option<&Datatype>,
) -> bool {
    let Some(wanted) = normalise_unique_value(value, datatype) else {
        return false;
    };
    entity
        .claims_for(property)
        .iter()
        .filter_map(|claim| claim.mainsnak.datavalue())
        .any(|datavalue| {
            normalise_unique_value(&datavalue.key_text(), datatype).as_deref()
                == Some(wanted.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Claim, DataValue, Snak};
    use rstest::rstest;

    fn item(id: &str, label: &str) -> Entity {
        Entity::shell(id, "en", label)
    }

    #[rstest]
    fn single_candidate_is_found() {
        let hit = SearchHit::from_candidates("Colegio A", vec![item("Q7", "Colegio A")], false);
        assert_eq!(hit.id(), Some("Q7"));
    }

    #[rstest]
    #[case(false, None)]
    #[case(true, Some("Q2"))]
    fn ambiguity_is_reported_or_resolved_to_lowest_id(
        #[case] allow_ambiguous: bool,
        #[case] expected: Option<&str>,
    ) {
        let candidates = vec![item("Q10", "Escuela Básica"), item("Q2", "Escuela Básica")];
        let hit = SearchHit::from_candidates("Escuela Básica", candidates, allow_ambiguous);
        assert_eq!(hit.id(), expected);
        if !allow_ambiguous {
            let SearchHit::Ambiguous(ambiguous) = hit else {
                panic!("expected ambiguity");
            };
            assert_eq!(ambiguous.candidates, vec!["Q2", "Q10"]);
        }
    }

    #[rstest]
    fn require_unambiguous_keeps_misses() {
        let hits = BTreeMap::from([
            ("a".to_owned(), SearchHit::found(item("Q1", "a"))),
            ("b".to_owned(), SearchHit::NotFound),
        ]);
        let resolved = require_unambiguous(hits).expect("no ambiguity");
        assert!(resolved["a"].is_some());
        assert!(resolved["b"].is_none());
    }

    #[rstest]
    #[case("5", true)]
    #[case("+5.0", true)]
    #[case("6", false)]
    fn snak_values_compare_as_normalised_quantities(#[case] value: &str, #[case] matches: bool) {
        let mut entity = item("Q1", "Colegio A");
        entity.push_claim(Claim::new(Snak::value(
            "P1082",
            DataValue::Quantity {
                amount: "+5".into(),
                unit: "1".into(),
            },
        )));
        assert_eq!(
            has_snak_value(&entity, "P1082", value, Some(&Datatype::Quantity)),
            matches
        );
    }
}
