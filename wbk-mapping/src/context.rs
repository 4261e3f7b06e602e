//! Per-run resolution caches.
//!
//! A [`ResolutionContext`] remembers every property, label and unique-key
//! lookup made during a run, including misses and ambiguities, so that the
//! search collaborator is asked about each key at most once. Caches are
//! filled in bulk before a chunk is resolved; point lookups fall back to
//! the collaborator and are counted separately.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use wbk_core::{
    AmbiguousMatch, Datatype, MappingRule, PropertyInfo, SearchBackend, SearchError, SearchHit,
    normalise::{is_entity_id, normalise_label, normalise_unique_value},
};

/// Errors raised by the resolution context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A property label or id matched nothing.
    #[error("Property not found: {property}")]
    PropertyNotFound {
        /// Label or id as written in the mapping.
        property: String,
    },
    /// A label reference matched several entities.
    #[error("Ambiguous match: {0}")]
    Ambiguous(AmbiguousMatch),
    /// The search collaborator failed.
    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheEntry {
    Resolved(String),
    Missing,
    Ambiguous(AmbiguousMatch),
}

impl CacheEntry {
    fn from_hit(hit: Option<&SearchHit>) -> Self {
        match hit {
            Some(SearchHit::Found(entity)) => entity
                .id
                .clone()
                .map_or(Self::Missing, Self::Resolved),
            Some(SearchHit::Ambiguous(ambiguous)) => Self::Ambiguous(ambiguous.clone()),
            Some(SearchHit::NotFound) | None => Self::Missing,
        }
    }

    fn to_result(&self) -> Result<Option<String>, ContextError> {
        match self {
            Self::Resolved(id) => Ok(Some(id.clone())),
            Self::Missing => Ok(None),
            Self::Ambiguous(ambiguous) => Err(ContextError::Ambiguous(ambiguous.clone())),
        }
    }
}

/// An entity lookup a row needs, rendered from its cells.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LookupKey {
    /// Item by label.
    Label(String),
    /// Item by label and the value of one property.
    UniqueKey {
        /// Item label.
        label: String,
        /// Property label or id.
        property: String,
        /// Property value as written.
        value: String,
    },
}

/// (label, property id, normalised value).
type UniqueKey = (String, String, String);

/// Cache effectiveness counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a cache.
    pub hits: usize,
    /// Point lookups forwarded to the search collaborator.
    pub fallbacks: usize,
}

/// Caches and collaborator handle shared by every rule of a run.
pub struct ResolutionContext<'b> {
    backend: &'b dyn SearchBackend,
    language: String,
    properties: BTreeMap<String, PropertyInfo>,
    missing_properties: BTreeSet<String>,
    labels: BTreeMap<String, CacheEntry>,
    unique_keys: BTreeMap<UniqueKey, CacheEntry>,
    pending: BTreeSet<String>,
    pending_count: usize,
    stats: CacheStats,
}

impl std::fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("language", &self.language)
            .field("properties", &self.properties.len())
            .field("labels", &self.labels.len())
            .field("unique_keys", &self.unique_keys.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'b> ResolutionContext<'b> {
    /// An empty context searching through `backend` in `language`.
    pub fn new(backend: &'b dyn SearchBackend, language: impl Into<String>) -> Self {
        Self {
            backend,
            language: language.into(),
            properties: BTreeMap::new(),
            missing_properties: BTreeSet::new(),
            labels: BTreeMap::new(),
            unique_keys: BTreeMap::new(),
            pending: BTreeSet::new(),
            pending_count: 0,
            stats: CacheStats::default(),
        }
    }

    /// Language used for label searches and monolingual values.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve every property the rule mentions.
    ///
    /// Unknown properties are looked up in one bulk call. The first property
    /// that cannot be found fails the rule.
    pub fn ensure_properties(&mut self, rule: &MappingRule) -> Result<(), ContextError> {
        let wanted: Vec<String> = rule
            .property_references()
            .into_iter()
            .filter(|property| !self.properties.contains_key(*property))
            .map(str::to_owned)
            .collect();
        if !wanted.is_empty() {
            let found = self.backend.find_properties(&wanted, &self.language)?;
            for property in &wanted {
                match found.get(property) {
                    Some(info) => {
                        self.missing_properties.remove(property);
                        self.properties.insert(property.clone(), info.clone());
                    }
                    None => {
                        self.missing_properties.insert(property.clone());
                    }
                }
            }
        }
        for property in rule.property_references() {
            if !self.properties.contains_key(property) {
                return Err(ContextError::PropertyNotFound {
                    property: property.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Bulk label to id resolution.
    ///
    /// Labels that are already entity ids, already cached or blank are
    /// skipped. Misses and ambiguities are remembered rather than raised.
    pub fn ensure_qids_for_labels<I, S>(&mut self, labels: I) -> Result<(), ContextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<String> = labels
            .into_iter()
            .filter_map(|label| normalise_label(label.as_ref()))
            .filter(|label| !is_entity_id(label) && !self.labels.contains_key(label))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let hits = self
            .backend
            .find_items_by_labels(&wanted, &self.language, false)?;
        for label in wanted {
            let entry = CacheEntry::from_hit(hits.get(&label));
            self.labels.insert(label, entry);
        }
        Ok(())
    }

    /// Bulk (label, value) to id resolution for one property.
    ///
    /// Quantity values are normalised so that `5`, `5.0` and `+5` share an
    /// entry.
    pub fn ensure_qids_for_unique_keys(
        &mut self,
        keys: &[(String, String)],
        property_id: &str,
        datatype: Option<&Datatype>,
    ) -> Result<(), ContextError> {
        let wanted: Vec<(String, String)> = keys
            .iter()
            .filter_map(|(label, value)| {
                Some((
                    normalise_label(label)?,
                    normalise_unique_value(value, datatype)?,
                ))
            })
            .filter(|(label, value)| {
                !self
                    .unique_keys
                    .contains_key(&(label.clone(), property_id.to_owned(), value.clone()))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let hits = self.backend.find_items_by_label_and_snak(
            &wanted,
            property_id,
            datatype,
            &self.language,
            false,
        )?;
        for (label, value) in wanted {
            let entry = CacheEntry::from_hit(hits.get(&(label.clone(), value.clone())));
            self.unique_keys
                .insert((label, property_id.to_owned(), value), entry);
        }
        Ok(())
    }

    /// Prime the caches for lookups rendered from a chunk.
    ///
    /// Label lookups go out in one call; unique-key lookups in one call per
    /// property. Unique keys naming an unknown property are left for the
    /// point lookup to report.
    pub fn ensure_lookups(&mut self, keys: &[LookupKey]) -> Result<(), ContextError> {
        let mut labels = Vec::new();
        let mut by_property: BTreeMap<&str, Vec<(String, String)>> = BTreeMap::new();
        for key in keys {
            match key {
                LookupKey::Label(label) => labels.push(label.as_str()),
                LookupKey::UniqueKey {
                    label,
                    property,
                    value,
                } => by_property
                    .entry(property.as_str())
                    .or_default()
                    .push((label.clone(), value.clone())),
            }
        }
        self.ensure_qids_for_labels(labels)?;
        for (property, pairs) in by_property {
            if let Some(info) = self.property_info(property)? {
                self.ensure_qids_for_unique_keys(&pairs, &info.id, Some(&info.datatype))?;
            }
        }
        Ok(())
    }

    /// Id and datatype of a property label or id.
    pub fn property_info(
        &mut self,
        label_or_id: &str,
    ) -> Result<Option<PropertyInfo>, ContextError> {
        if let Some(info) = self.properties.get(label_or_id) {
            self.stats.hits += 1;
            return Ok(Some(info.clone()));
        }
        if self.missing_properties.contains(label_or_id) {
            self.stats.hits += 1;
            return Ok(None);
        }
        self.stats.fallbacks += 1;
        let wanted = [label_or_id.to_owned()];
        let mut found = self.backend.find_properties(&wanted, &self.language)?;
        if let Some(info) = found.remove(label_or_id) {
            self.properties.insert(label_or_id.to_owned(), info.clone());
            Ok(Some(info))
        } else {
            self.missing_properties.insert(label_or_id.to_owned());
            Ok(None)
        }
    }

    /// Id of a property label or id, failing when it is unknown.
    pub fn property_id(&mut self, label_or_id: &str) -> Result<String, ContextError> {
        self.property_info(label_or_id)?
            .map(|info| info.id)
            .ok_or_else(|| ContextError::PropertyNotFound {
                property: label_or_id.to_owned(),
            })
    }

    /// Id of the single item labelled `label`.
    ///
    /// Returns `Ok(None)` for blank labels and misses and an error when
    /// several items share the label.
    pub fn qid_by_label(&mut self, label: &str) -> Result<Option<String>, ContextError> {
        let Some(label) = normalise_label(label) else {
            return Ok(None);
        };
        if let Some(entry) = self.labels.get(&label) {
            self.stats.hits += 1;
            return entry.to_result();
        }
        self.stats.fallbacks += 1;
        let wanted = [label];
        let hits = self
            .backend
            .find_items_by_labels(&wanted, &self.language, false)?;
        let [label] = wanted;
        let entry = CacheEntry::from_hit(hits.get(&label));
        let result = entry.to_result();
        self.labels.insert(label, entry);
        result
    }

    /// Id of the single item labelled `label` whose `property` carries
    /// `value`.
    pub fn qid_by_unique_key(
        &mut self,
        label: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<String>, ContextError> {
        let info = self
            .property_info(property)?
            .ok_or_else(|| ContextError::PropertyNotFound {
                property: property.to_owned(),
            })?;
        let (Some(label), Some(value)) = (
            normalise_label(label),
            normalise_unique_value(value, Some(&info.datatype)),
        ) else {
            return Ok(None);
        };
        let key = (label, info.id, value);
        if let Some(entry) = self.unique_keys.get(&key) {
            self.stats.hits += 1;
            return entry.to_result();
        }
        self.stats.fallbacks += 1;
        let (label, property_id, value) = key;
        let pair = (label, value);
        let hits = self.backend.find_items_by_label_and_snak(
            std::slice::from_ref(&pair),
            &property_id,
            Some(&info.datatype),
            &self.language,
            false,
        )?;
        let entry = CacheEntry::from_hit(hits.get(&pair));
        let result = entry.to_result();
        let (label, value) = pair;
        self.unique_keys.insert((label, property_id, value), entry);
        result
    }

    /// Teach the label cache about an entity created during the run.
    ///
    /// A cached miss becomes a hit. A label already resolved to another
    /// entity becomes ambiguous. A label never looked up stays uncached, as
    /// the store may hold other entities with it.
    pub fn learn_label(&mut self, label: &str, id: &str) {
        let Some(label) = normalise_label(label) else {
            return;
        };
        let entry = match self.labels.remove(&label) {
            None => return,
            Some(CacheEntry::Missing) => CacheEntry::Resolved(id.to_owned()),
            Some(CacheEntry::Resolved(existing)) if existing == id => {
                CacheEntry::Resolved(existing)
            }
            Some(CacheEntry::Resolved(existing)) => {
                let mut candidates = vec![existing, id.to_owned()];
                candidates.sort_by_key(|candidate| wbk_core::entity::numeric_id(candidate));
                CacheEntry::Ambiguous(AmbiguousMatch {
                    key: label.clone(),
                    candidates,
                })
            }
            Some(CacheEntry::Ambiguous(mut ambiguous)) => {
                if !ambiguous.candidates.iter().any(|candidate| candidate == id) {
                    ambiguous.candidates.push(id.to_owned());
                }
                CacheEntry::Ambiguous(ambiguous)
            }
        };
        self.labels.insert(label, entry);
    }

    /// Note a wikibase-item label that was written as a literal string.
    pub fn record_pending(&mut self, label: &str) {
        self.pending_count += 1;
        self.pending.insert(label.to_owned());
    }

    /// Distinct labels written as literals so far.
    #[must_use]
    pub const fn pending_references(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// Number of claims written with a literal label so far.
    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.pending_count
    }

    /// Cache counters so far.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Emit cache sizes and counters at debug level.
    pub fn log_stats(&self) {
        log::debug!(
            "resolution cache: {} properties, {} labels, {} unique keys, {} hits, {} fallbacks",
            self.properties.len(),
            self.labels.len(),
            self.unique_keys.len(),
            self.stats.hits,
            self.stats.fallbacks
        );
    }
}
