//! Labels, descriptions and aliases rendered from a row.

use wbk_core::{Entity, ItemDefinition, template::TemplateError};

use crate::{Row, resolve::render_text};

/// Set the entity's label, description and aliases in `language` from the
/// item definition.
///
/// Blank renderings are ignored so that an empty cell never erases a term.
pub fn apply_terms(
    entity: &mut Entity,
    item: &ItemDefinition,
    row: &Row,
    language: &str,
) -> Result<(), TemplateError> {
    let label = render_text(&item.label, row)?;
    if !label.trim().is_empty() {
        entity.set_label(language, label.trim());
    }
    if let Some(template) = &item.description {
        let description = render_text(template, row)?;
        if !description.trim().is_empty() {
            entity.set_description(language, description.trim());
        }
    }
    for template in &item.aliases {
        let alias = render_text(template, row)?;
        if !alias.trim().is_empty() {
            entity.add_alias(language, alias.trim());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn renders_terms_from_columns_and_templates() {
        let row = Row::new(
            1,
            [("name", "Colegio A"), ("district", "Los Andes"), ("short", "")],
        );
        let item = ItemDefinition {
            label: "name".into(),
            description: Some("School in {district}".into()),
            aliases: vec!["short".into(), "{name} ({district})".into()],
            snak: None,
        };
        let mut entity = Entity::item();
        apply_terms(&mut entity, &item, &row, "es").expect("render terms");

        assert_eq!(entity.label("es"), Some("Colegio A"));
        assert_eq!(entity.description("es"), Some("School in Los Andes"));
        assert_eq!(entity.aliases["es"], vec!["Colegio A (Los Andes)"]);
    }

    #[rstest]
    fn blank_terms_keep_existing_values() {
        let row = Row::new(1, [("name", "Colegio A"), ("note", "")]);
        let item = ItemDefinition {
            description: Some("note".into()),
            ..ItemDefinition::labelled("name")
        };
        let mut entity = Entity::item();
        entity.set_description("en", "Existing");
        apply_terms(&mut entity, &item, &row, "en").expect("render terms");
        assert_eq!(entity.description("en"), Some("Existing"));
    }
}
