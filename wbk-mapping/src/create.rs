//! Batched creation of entities for unmatched rows.

use std::mem;

use wbk_core::{Entity, EntityWriter, ItemDefinition, SubmitError, template::TemplateError};

use crate::{Row, terms::apply_terms};

/// An entity created by [`CreateStep::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Identifier assigned by the store.
    pub id: String,
    /// Label in the run language, if any.
    pub label: Option<String>,
}

/// Accumulates new entities and submits them as one batch.
#[derive(Debug, Default)]
pub struct CreateStep {
    language: String,
    batch: Vec<Entity>,
}

impl CreateStep {
    /// An empty step writing terms in `language`.
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            batch: Vec::new(),
        }
    }

    /// A fresh item with terms from the row and no claims.
    pub fn new_entity(&self, item: &ItemDefinition, row: &Row) -> Result<Entity, TemplateError> {
        let mut entity = Entity::item();
        apply_terms(&mut entity, item, row, &self.language)?;
        Ok(entity)
    }

    /// Queue an entity for creation.
    pub fn push(&mut self, entity: Entity) {
        self.batch.push(entity);
    }

    /// Number of queued entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Submit the queued entities as new and clear the batch.
    ///
    /// The batch is cleared even when the submission fails.
    pub fn submit(&mut self, writer: &dyn EntityWriter) -> Result<Vec<Created>, SubmitError> {
        if self.batch.is_empty() {
            return Ok(Vec::new());
        }
        let batch = mem::take(&mut self.batch);
        let labels: Vec<Option<String>> = batch
            .iter()
            .map(|entity| entity.label(&self.language).map(str::to_owned))
            .collect();
        let ids = writer.submit(batch, true)?;
        Ok(ids
            .into_iter()
            .zip(labels)
            .map(|(id, label)| Created { id, label })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wbk_core::test_support::MemoryBackend;

    #[rstest]
    fn submits_batch_once_and_clears() {
        let backend = MemoryBackend::new();
        let mut step = CreateStep::new("en");
        let item = ItemDefinition::labelled("name");
        for name in ["Colegio A", "Colegio B"] {
            let row = Row::new(1, [("name", name)]);
            let entity = step.new_entity(&item, &row).expect("render terms");
            step.push(entity);
        }
        assert_eq!(step.len(), 2);

        let created = step.submit(&backend).expect("submit");
        assert_eq!(
            created,
            vec![
                Created {
                    id: "Q1".into(),
                    label: Some("Colegio A".into()),
                },
                Created {
                    id: "Q2".into(),
                    label: Some("Colegio B".into()),
                },
            ]
        );
        assert!(step.is_empty());
        assert!(step.submit(&backend).expect("empty submit").is_empty());

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].is_new);
    }
}
