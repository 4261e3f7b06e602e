//! Search keys identifying the target entity of a row.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use wbk_core::{
    ItemDefinition, PropertyInfo, SearchBackend, SearchError, SearchHit,
    normalise::{normalise_label, normalise_term, normalise_unique_value},
    template::TemplateError,
};

use crate::{Row, resolve::render_text};

/// Key a row is matched on, by search mode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SearchKey {
    /// Label only.
    Label(String),
    /// Label and description.
    LabelDescription {
        /// Item label.
        label: String,
        /// Item description.
        description: String,
    },
    /// Label and a normalised property value.
    LabelSnak {
        /// Item label.
        label: String,
        /// Normalised property value.
        value: String,
    },
}

impl SearchKey {
    /// Label part of the key.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Label(label)
            | Self::LabelDescription { label, .. }
            | Self::LabelSnak { label, .. } => label,
        }
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => f.write_str(label),
            Self::LabelDescription { label, description } => write!(f, "{label} ({description})"),
            Self::LabelSnak { label, value } => write!(f, "{label} [{value}]"),
        }
    }
}

/// Compute a row's search key.
///
/// Returns `Ok(None)` when the label is blank (including the `nan`/`none`
/// placeholders) or a snak-matched row has no value. `snak` carries the
/// resolved property of the item's snak matcher.
pub fn search_key(
    item: &ItemDefinition,
    snak: Option<&PropertyInfo>,
    row: &Row,
) -> Result<Option<SearchKey>, TemplateError> {
    let Some(label) = normalise_label(&render_text(&item.label, row)?) else {
        return Ok(None);
    };
    if let (Some(matcher), Some(info)) = (&item.snak, snak) {
        let value = render_text(&matcher.value, row)?;
        return Ok(normalise_unique_value(&value, Some(&info.datatype))
            .map(|value| SearchKey::LabelSnak { label, value }));
    }
    if let Some(template) = &item.description {
        let description = normalise_term(&render_text(template, row)?).unwrap_or_default();
        return Ok(Some(SearchKey::LabelDescription { label, description }));
    }
    Ok(Some(SearchKey::Label(label)))
}

/// Look every key up with one collaborator call per search mode.
pub fn search(
    backend: &dyn SearchBackend,
    keys: &BTreeSet<SearchKey>,
    snak: Option<&PropertyInfo>,
    language: &str,
) -> Result<BTreeMap<SearchKey, SearchHit>, SearchError> {
    let mut labels = Vec::new();
    let mut described = Vec::new();
    let mut valued = Vec::new();
    for key in keys {
        match key {
            SearchKey::Label(label) => labels.push(label.clone()),
            SearchKey::LabelDescription { label, description } => {
                described.push((label.clone(), description.clone()));
            }
            SearchKey::LabelSnak { label, value } => valued.push((label.clone(), value.clone())),
        }
    }

    let mut hits = BTreeMap::new();
    if !labels.is_empty() {
        for (label, hit) in backend.find_items_by_labels(&labels, language, false)? {
            hits.insert(SearchKey::Label(label), hit);
        }
    }
    if !described.is_empty() {
        for ((label, description), hit) in
            backend.find_items_by_labels_and_descriptions(&described, language)?
        {
            hits.insert(SearchKey::LabelDescription { label, description }, hit);
        }
    }
    if !valued.is_empty()
        && let Some(info) = snak
    {
        for ((label, value), hit) in backend.find_items_by_label_and_snak(
            &valued,
            &info.id,
            Some(&info.datatype),
            language,
            false,
        )? {
            hits.insert(SearchKey::LabelSnak { label, value }, hit);
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wbk_core::{Datatype, SnakMatcher};

    fn quantity() -> PropertyInfo {
        PropertyInfo {
            id: "P2".into(),
            datatype: Datatype::Quantity,
        }
    }

    #[rstest]
    #[case(ItemDefinition::labelled("name"), Some(SearchKey::Label("Colegio A".into())))]
    #[case(
        ItemDefinition { description: Some("School in {district}".into()), ..ItemDefinition::labelled("name") },
        Some(SearchKey::LabelDescription { label: "Colegio A".into(), description: "School in Los Andes".into() }),
    )]
    #[case(
        ItemDefinition {
            snak: Some(SnakMatcher { property: "student count".into(), value: "students".into() }),
            ..ItemDefinition::labelled("{name}")
        },
        Some(SearchKey::LabelSnak { label: "Colegio A".into(), value: "120".into() }),
    )]
    #[case(ItemDefinition::labelled("blank"), None)]
    #[case(ItemDefinition::labelled("placeholder"), None)]
    fn keys_follow_search_mode(#[case] item: ItemDefinition, #[case] expected: Option<SearchKey>) {
        let row = Row::new(
            1,
            [
                ("name", "Colegio A"),
                ("district", "Los Andes"),
                ("students", "+120.0"),
                ("blank", ""),
                ("placeholder", "NaN"),
            ],
        );
        let info = quantity();
        let key = search_key(&item, Some(&info), &row).expect("render key");
        assert_eq!(key, expected);
    }

    #[rstest]
    fn keys_display_their_parts() {
        let key = SearchKey::LabelSnak {
            label: "Colegio A".into(),
            value: "120".into(),
        };
        assert_eq!(key.to_string(), "Colegio A [120]");
        assert_eq!(key.label(), "Colegio A");
    }
}
