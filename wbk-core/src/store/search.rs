//! Item and property lookups over the term index.

use std::collections::BTreeMap;

use rusqlite::OptionalExtension;

use crate::{
    Datatype, Entity, EntityKind, ItemSearch, PropertyInfo, PropertyLookup, SearchError,
    SearchHit,
    normalise::{is_entity_id, normalise_item_id},
    search::has_snak_value,
};

use super::{SqliteWikibase, SqliteWikibaseError, kind_name};

fn decode_document(id: String, document: String) -> Result<Entity, SqliteWikibaseError> {
    let mut bytes = document.into_bytes();
    simd_json::serde::from_slice(&mut bytes)
        .map_err(|source| SqliteWikibaseError::Decode { id, source })
}

impl SqliteWikibase {
    /// Load a single stored entity.
    pub fn load(&self, id: &str) -> Result<Option<Entity>, SqliteWikibaseError> {
        let mut statement = self
            .connection
            .prepare_cached("SELECT document FROM entities WHERE id = ?1")
            .map_err(SqliteWikibaseError::query("prepare entity load"))?;
        let document: Option<String> = statement
            .query_row([id], |row| row.get(0))
            .optional()
            .map_err(SqliteWikibaseError::query("load entity"))?;
        document
            .map(|document| decode_document(id.to_owned(), document))
            .transpose()
    }

    /// Entities of `kind` carrying a term, lowest numeric id first.
    fn entities_with_term(
        &self,
        kind: EntityKind,
        language: &str,
        term: &str,
        value: &str,
    ) -> Result<Vec<Entity>, SqliteWikibaseError> {
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT DISTINCT entities.id, entities.document, entities.numeric_id
                FROM entity_terms AS terms
                JOIN entities ON entities.id = terms.entity_id
                WHERE terms.language = ?1 AND terms.kind = ?2 AND terms.value = ?3
                    AND entities.kind = ?4
                ORDER BY entities.numeric_id",
            )
            .map_err(SqliteWikibaseError::query("prepare term search"))?;
        let rows = statement
            .query_map((language, term, value, kind_name(kind)), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(SqliteWikibaseError::query("search terms"))?;

        let mut entities = Vec::new();
        for row in rows {
            let (id, document) = row.map_err(SqliteWikibaseError::query("read term match"))?;
            entities.push(decode_document(id, document)?);
        }
        Ok(entities)
    }

    fn items_labelled(
        &self,
        language: &str,
        label: &str,
    ) -> Result<Vec<Entity>, SqliteWikibaseError> {
        self.entities_with_term(EntityKind::Item, language, "label", label)
    }

    fn property_for(
        &self,
        input: &str,
        language: &str,
    ) -> Result<Option<PropertyInfo>, SqliteWikibaseError> {
        let property = if is_entity_id(input) {
            self.load(input)?
                .filter(|entity| entity.kind == EntityKind::Property)
        } else {
            self.entities_with_term(EntityKind::Property, language, "label", input)?
                .into_iter()
                .next()
        };
        Ok(property.and_then(|property| {
            let id = property.id?;
            let datatype = property.datatype.unwrap_or(Datatype::String);
            Some(PropertyInfo { id, datatype })
        }))
    }
}

impl ItemSearch for SqliteWikibase {
    fn find_items_by_labels(
        &self,
        labels: &[String],
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<String, SearchHit>, SearchError> {
        let mut hits = BTreeMap::new();
        for label in labels {
            let candidates = self
                .items_labelled(language, label)
                .map_err(|err| SearchError::backend("find_items_by_labels", err))?;
            let hit = SearchHit::from_candidates(label, candidates, allow_ambiguous);
            hits.insert(label.clone(), hit);
        }
        Ok(hits)
    }

    fn find_items_by_labels_and_descriptions(
        &self,
        pairs: &[(String, String)],
        language: &str,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError> {
        let mut hits = BTreeMap::new();
        for (label, description) in pairs {
            let candidates = self
                .items_labelled(language, label)
                .map_err(|err| SearchError::backend("find_items_by_labels_and_descriptions", err))?
                .into_iter()
                .filter(|entity| entity.description(language) == Some(description.as_str()))
                .collect();
            let hit = SearchHit::from_candidates(label, candidates, false);
            hits.insert((label.clone(), description.clone()), hit);
        }
        Ok(hits)
    }

    fn find_items_by_label_and_snak(
        &self,
        keys: &[(String, String)],
        property_id: &str,
        datatype: Option<&Datatype>,
        language: &str,
        allow_ambiguous: bool,
    ) -> Result<BTreeMap<(String, String), SearchHit>, SearchError> {
        let mut hits = BTreeMap::new();
        for (label, value) in keys {
            let candidates = self
                .items_labelled(language, label)
                .map_err(|err| SearchError::backend("find_items_by_label_and_snak", err))?
                .into_iter()
                .filter(|entity| has_snak_value(entity, property_id, value, datatype))
                .collect();
            let hit = SearchHit::from_candidates(label, candidates, allow_ambiguous);
            hits.insert((label.clone(), value.clone()), hit);
        }
        Ok(hits)
    }

    fn find_items_by_qids(
        &self,
        qids: &[String],
        _language: &str,
    ) -> Result<BTreeMap<String, Entity>, SearchError> {
        let mut found = BTreeMap::new();
        for qid in qids.iter().filter_map(|raw| normalise_item_id(raw)) {
            let entity = self
                .load(&qid)
                .map_err(|err| SearchError::backend("find_items_by_qids", err))?
                .unwrap_or_else(|| Entity {
                    id: Some(qid.clone()),
                    ..Entity::item()
                });
            found.insert(qid, entity);
        }
        Ok(found)
    }
}

impl PropertyLookup for SqliteWikibase {
    fn find_properties(
        &self,
        labels_or_ids: &[String],
        language: &str,
    ) -> Result<BTreeMap<String, PropertyInfo>, SearchError> {
        let mut found = BTreeMap::new();
        for input in labels_or_ids {
            let property = self
                .property_for(input, language)
                .map_err(|err| SearchError::backend("find_properties", err))?;
            if let Some(property) = property {
                found.insert(input.clone(), property);
            }
        }
        Ok(found)
    }
}
