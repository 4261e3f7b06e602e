//! In-memory Wikibase backend used by unit and behaviour tests.
//!
//! [`MemoryBackend`] implements every collaborator trait over a map of
//! entities, records each submission, and counts search calls so tests can
//! assert on caching behaviour. Search semantics match the SQLite store.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::{
    Datatype, Entity, EntityKind, EntityWriter, ItemSearch, PropertyInfo, PropertyLookup,
    SearchError, SearchHit, SubmitError,
    normalise::{is_entity_id, normalise_item_id},
    search::has_snak_value,
};

/// One call to [`EntityWriter::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Whether the call created entities.
    pub is_new: bool,
    /// Entities as stored, identifiers assigned.
    pub entities: Vec<Entity>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entities: BTreeMap<String, Entity>,
    submissions: Vec<Submission>,
    calls: BTreeMap<&'static str, usize>,
    fail_searches: bool,
}

impl MemoryState {
    fn record(&mut self, operation: &'static str) -> Result<(), SearchError> {
        *self.calls.entry(operation).or_default() += 1;
        if self.fail_searches {
            return Err(SearchError::backend(operation, "search backend unavailable"));
        }
        Ok(())
    }

    fn next_id(&self, kind: EntityKind) -> String {
        let prefix = match kind {
            EntityKind::Item => 'Q',
            EntityKind::Property => 'P',
        };
        let next = self
            .entities
            .values()
            .filter(|entity| entity.kind == kind)
            .filter_map(Entity::numeric_id)
            .max()
            .unwrap_or(0)
            + 1;
        format!("{prefix}{next}")
    }

    fn store(&mut self, mut entity: Entity) -> String {
        let id = match entity.id.clone() {
            Some(id) => id,
            None => self.next_id(entity.kind),
        };
        entity.id = Some(id.clone());
        entity.assign_claim_ids();
        self.entities.insert(id.clone(), entity);
        id
    }

    fn items_labelled<'a>(
        &'a self,
        label: &'a str,
        language: &'a str,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .values()
            .filter(move |entity| entity.kind == EntityKind::Item)
            .filter(move |entity| entity.label(language) == Some(label))
    }
}

/// In-memory implementation of the search and writer traits.
///
/// The backend uses interior mutability so that it can be shared by
/// reference like a real store handle.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RefCell<MemoryState>,
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item with a label, returning its identifier.
    pub fn add_item(&self, language: &str, label: &str) -> String {
        let mut item = Entity::item();
        item.set_label(language, label);
        self.insert(item)
    }

    /// Seed a property with a label and datatype, returning its identifier.
    pub fn add_property(&self, language: &str, label: &str, datatype: Datatype) -> String {
        let mut property = Entity {
            kind: EntityKind::Property,
            datatype: Some(datatype),
            ..Entity::default()
        };
        property.set_label(language, label);
        self.insert(property)
    }

    /// Seed an entity as is, assigning an identifier when it has none.
    pub fn insert(&self, entity: Entity) -> String {
        self.state.borrow_mut().store(entity)
    }

    /// Stored copy of an entity.
    #[must_use]
    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.state.borrow().entities.get(id).cloned()
    }

    /// Number of stored entities of a kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.state
            .borrow()
            .entities
            .values()
            .filter(|entity| entity.kind == kind)
            .count()
    }

    /// Every submission so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.borrow().submissions.clone()
    }

    /// How many times a search operation was called.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .borrow()
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Make every subsequent search fail with a backend error.
    pub fn fail_searches(&self) {
        self.state.borrow_mut().fail_searches = true;
    }
}

impl ItemSearch for MemoryBackend {
    fn find_items_by_labels(
        &self,
        labels: &[String],
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<String, SearchHit>, SearchError> {
        let mut state = self.state.borrow_mut();
        state.record("find_items_by_labels")?;
        Ok(labels
            .iter()
            .map(|label| {
                let candidates = state.items_labelled(label, language).cloned().collect();
                let hit = SearchHit::from_candidates(label, candidates, allow_ambiguous);
                (label.clone(), hit)
            })
            .collect())
    }

    fn find_items_by_labels_and_descriptions(
        &self,
        pairs: &[(String, String)],
        language: &str,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError> {
        let mut state = self.state.borrow_mut();
        state.record("find_items_by_labels_and_descriptions")?;
        Ok(pairs
            .iter()
            .map(|(label, description)| {
                let candidates = state
                    .items_labelled(label, language)
                    .filter(|entity| entity.description(language) == Some(description.as_str()))
                    .cloned()
                    .collect();
                let hit = SearchHit::from_candidates(label, candidates, false);
                ((label.clone(), description.clone()), hit)
            })
            .collect())
    }

    fn find_items_by_label_and_snak(
        &self,
        keys: &[(String, String)],
        property_id: &str,
        datatype: Option<&Datatype>,
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError> {
        let mut state = self.state.borrow_mut();
        state.record("find_items_by_label_and_snak")?;
        Ok(keys
            .iter()
            .map(|(label, value)| {
                let candidates = state
                    .items_labelled(label, language)
                    .filter(|entity| has_snak_value(entity, property_id, value, datatype))
                    .cloned()
                    .collect();
                let hit = SearchHit::from_candidates(label, candidates, allow_ambiguous);
                ((label.clone(), value.clone()), hit)
            })
            .collect())
    }

    fn find_items_by_qids(
        &self,
        qids: &[String],
        _language: &str,
    ) -> Result<BTreeMap<String, Entity>, SearchError> {
        let mut state = self.state.borrow_mut();
        state.record("find_items_by_qids")?;
        Ok(qids
            .iter()
            .filter_map(|raw| normalise_item_id(raw))
            .map(|qid| {
                let entity = state.entities.get(&qid).cloned().unwrap_or_else(|| Entity {
                    id: Some(qid.clone()),
                    ..Entity::item()
                });
                (qid, entity)
            })
            .collect())
    }
}

impl PropertyLookup for MemoryBackend {
    fn find_properties(
        &self,
        labels_or_ids: &[String],
        language: &str,
    ) -> Result<BTreeMap<String, PropertyInfo>, SearchError> {
        let mut state = self.state.borrow_mut();
        state.record("find_properties")?;
        let mut found = BTreeMap::new();
        for input in labels_or_ids {
            let mut candidates: Vec<&Entity> = state
                .entities
                .values()
                .filter(|entity| entity.kind == EntityKind::Property)
                .filter(|entity| {
                    if is_entity_id(input) {
                        entity.id.as_deref() == Some(input.as_str())
                    } else {
                        entity.label(language) == Some(input.as_str())
                    }
                })
                .collect();
            candidates.sort_by_key(|entity| entity.numeric_id());
            if let Some(property) = candidates.first()
                && let Some(id) = property.id.clone()
            {
                let datatype = property.datatype.clone().unwrap_or(Datatype::String);
                found.insert(input.clone(), PropertyInfo { id, datatype });
            }
        }
        Ok(found)
    }
}

impl EntityWriter for MemoryBackend {
    fn submit(&self, entities: Vec<Entity>, is_new: bool) -> Result<Vec<String>, SubmitError> {
        let mut state = self.state.borrow_mut();
        let mut stored = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if is_new {
                entity.id = None;
            } else {
                let Some(id) = entity.id.as_deref() else {
                    return Err(SubmitError::MissingId);
                };
                if !state.entities.contains_key(id) {
                    return Err(SubmitError::UnknownEntity { id: id.to_owned() });
                }
            }
            let id = state.store(entity);
            if let Some(entity) = state.entities.get(&id) {
                stored.push(entity.clone());
            }
        }
        let ids = stored
            .iter()
            .filter_map(|entity| entity.id.clone())
            .collect();
        state.submissions.push(Submission {
            is_new,
            entities: stored,
        });
        Ok(ids)
    }
}
