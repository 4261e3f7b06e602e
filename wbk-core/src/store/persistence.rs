//! Document writes and term re-indexing.

use rusqlite::{OptionalExtension, Transaction};

use crate::{Entity, EntityWriter, SubmitError};

use super::{SqliteWikibase, SqliteWikibaseError, kind_name};

fn sqlite(operation: &'static str) -> impl Fn(rusqlite::Error) -> SubmitError {
    move |source| SubmitError::backend(operation, SqliteWikibaseError::Query { operation, source })
}

impl EntityWriter for SqliteWikibase {
    /// Create or overwrite entities in a single transaction.
    ///
    /// New entities receive the next free `Q` or `P` number for their kind;
    /// any identifier they carry is ignored. Updates must name an existing
    /// entity. Claims without a GUID are given one.
    fn submit(&self, entities: Vec<Entity>, is_new: bool) -> Result<Vec<String>, SubmitError> {
        let transaction = self
            .connection
            .unchecked_transaction()
            .map_err(sqlite("begin submit transaction"))?;

        let mut ids = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if is_new {
                assign_next_id(&transaction, &mut entity)?;
            } else {
                ensure_exists(&transaction, &entity)?;
            }
            entity.assign_claim_ids();
            let id = write_document(&transaction, &entity)?;
            reindex_terms(&transaction, &entity, &id)?;
            ids.push(id);
        }

        transaction
            .commit()
            .map_err(sqlite("commit submit transaction"))?;
        log::debug!(
            "stored {} {} entities",
            ids.len(),
            if is_new { "new" } else { "updated" }
        );
        Ok(ids)
    }
}

fn assign_next_id(transaction: &Transaction<'_>, entity: &mut Entity) -> Result<(), SubmitError> {
    let kind = kind_name(entity.kind);
    let next: i64 = transaction
        .query_row(
            "SELECT COALESCE(MAX(numeric_id), 0) + 1 FROM entities WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )
        .map_err(sqlite("allocate entity id"))?;
    let prefix = if kind == "property" { 'P' } else { 'Q' };
    entity.id = Some(format!("{prefix}{next}"));
    Ok(())
}

fn ensure_exists(transaction: &Transaction<'_>, entity: &Entity) -> Result<(), SubmitError> {
    let Some(id) = entity.id.as_deref() else {
        return Err(SubmitError::MissingId);
    };
    let exists = transaction
        .query_row("SELECT 1 FROM entities WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .map_err(sqlite("check entity exists"))?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(SubmitError::UnknownEntity { id: id.to_owned() })
    }
}

fn write_document(transaction: &Transaction<'_>, entity: &Entity) -> Result<String, SubmitError> {
    let id = entity.id.clone().ok_or(SubmitError::MissingId)?;
    let numeric_id = entity
        .numeric_id()
        .and_then(|numeric| i64::try_from(numeric).ok())
        .ok_or_else(|| SubmitError::Encode {
            id: id.clone(),
            source: "identifier has no numeric part".into(),
        })?;
    let document = serde_json::to_string(entity).map_err(|source| SubmitError::Encode {
        id: id.clone(),
        source: Box::new(source),
    })?;
    transaction
        .execute(
            "INSERT INTO entities (id, kind, numeric_id, document) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            (id.as_str(), kind_name(entity.kind), numeric_id, document),
        )
        .map_err(sqlite("write entity document"))?;
    Ok(id)
}

fn reindex_terms(
    transaction: &Transaction<'_>,
    entity: &Entity,
    id: &str,
) -> Result<(), SubmitError> {
    transaction
        .execute("DELETE FROM entity_terms WHERE entity_id = ?1", [id])
        .map_err(sqlite("clear entity terms"))?;
    let mut insert = transaction
        .prepare_cached(
            "INSERT INTO entity_terms (entity_id, language, kind, value) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqlite("prepare term insert"))?;

    let labels = entity
        .labels
        .iter()
        .map(|(language, value)| (language, "label", value));
    let descriptions = entity
        .descriptions
        .iter()
        .map(|(language, value)| (language, "description", value));
    let aliases = entity.aliases.iter().flat_map(|(language, values)| {
        values.iter().map(move |value| (language, "alias", value))
    });
    for (language, kind, value) in labels.chain(descriptions).chain(aliases) {
        insert
            .execute((id, language.as_str(), kind, value.as_str()))
            .map_err(sqlite("insert entity term"))?;
    }
    Ok(())
}
