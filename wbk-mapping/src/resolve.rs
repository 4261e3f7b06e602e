//! Value resolution against a single row.
//!
//! A [`ValueSpec`] becomes either one string or an ordered tuple of strings.
//! Entity references are turned into ids through the [`ResolutionContext`];
//! references that do not resolve fall back to the text that named them.

use std::collections::BTreeSet;

use thiserror::Error;
use wbk_core::{
    AmbiguousMatch, Datatype, LabelRef, ValueSpec,
    normalise::is_entity_id,
    template::{self, TemplateError},
};

use crate::{
    Row,
    context::{ContextError, LookupKey, ResolutionContext},
};

/// Errors raised while resolving a value.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The statement has no value specification.
    #[error("No value specified for datatype {datatype}")]
    MissingValue {
        /// Datatype the value was needed for.
        datatype: Datatype,
    },
    /// A `{column: ...}` spec named a column the row does not have.
    #[error("row has no column '{column}'")]
    UnknownColumn {
        /// Missing column.
        column: String,
    },
    /// A template placeholder named a column the row does not have.
    #[error(transparent)]
    MissingPlaceholder(#[from] TemplateError),
    /// An entity reference could not be resolved.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ResolveError {
    /// The ambiguity behind this error, if any.
    #[must_use]
    pub const fn ambiguity(&self) -> Option<&AmbiguousMatch> {
        match self {
            Self::Context(ContextError::Ambiguous(ambiguous)) => Some(ambiguous),
            Self::MissingValue { .. }
            | Self::UnknownColumn { .. }
            | Self::MissingPlaceholder(_)
            | Self::Context(_) => None,
        }
    }
}

/// A resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// A single value.
    Scalar(String),
    /// An ordered tuple, such as (amount, unit) or (latitude, longitude).
    Tuple(Vec<String>),
}

impl ResolvedValue {
    /// Whether any component is blank.
    #[must_use]
    pub fn has_blank(&self) -> bool {
        match self {
            Self::Scalar(value) => value.trim().is_empty(),
            Self::Tuple(parts) => parts.is_empty() || parts.iter().any(|part| part.trim().is_empty()),
        }
    }
}

/// Render a bare string: a column name when the row has that column,
/// otherwise a template.
pub fn render_text(text: &str, row: &Row) -> Result<String, TemplateError> {
    match row.get(text) {
        Some(cell) => Ok(cell.to_owned()),
        None => row.render(text),
    }
}

/// Resolve `spec` against `row` for a value of `datatype`.
///
/// For `wikibase-item` values, a scalar that is not already an entity id is
/// looked up by label; a miss keeps the text. Label references are always
/// looked up. Nested lists are flattened into a single tuple.
pub fn resolve(
    spec: Option<&ValueSpec>,
    row: &Row,
    datatype: &Datatype,
    context: &mut ResolutionContext<'_>,
) -> Result<ResolvedValue, ResolveError> {
    let Some(spec) = spec else {
        return Err(ResolveError::MissingValue {
            datatype: datatype.clone(),
        });
    };
    let text = match spec {
        ValueSpec::Composite(_) => {
            let mut tuple = Vec::new();
            resolve_into(spec, row, context, &mut tuple)?;
            return Ok(ResolvedValue::Tuple(tuple));
        }
        ValueSpec::Label(reference) => {
            return resolve_label(reference, row, context).map(ResolvedValue::Scalar);
        }
        ValueSpec::Literal(text) => ScalarSpec::Literal(text).text(row)?,
        ValueSpec::Column(column) => ScalarSpec::Column(column).text(row)?,
        ValueSpec::Static(value) => value.clone(),
    };
    if *datatype == Datatype::WikibaseItem && !is_entity_id(&text) {
        let id = context.qid_by_label(&text)?;
        return Ok(ResolvedValue::Scalar(id.unwrap_or(text)));
    }
    Ok(ResolvedValue::Scalar(text))
}

fn resolve_into(
    spec: &ValueSpec,
    row: &Row,
    context: &mut ResolutionContext<'_>,
    tuple: &mut Vec<String>,
) -> Result<(), ResolveError> {
    match spec {
        ValueSpec::Composite(parts) => {
            for part in parts {
                resolve_into(part, row, context, tuple)?;
            }
        }
        ValueSpec::Label(reference) => tuple.push(resolve_label(reference, row, context)?),
        ValueSpec::Literal(text) => tuple.push(ScalarSpec::Literal(text).text(row)?),
        ValueSpec::Column(column) => tuple.push(ScalarSpec::Column(column).text(row)?),
        ValueSpec::Static(value) => tuple.push(value.clone()),
    }
    Ok(())
}

/// A single-valued spec: a bare string, a column or a static value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarSpec<'a> {
    /// Bare string.
    Literal(&'a str),
    /// Column reference.
    Column(&'a str),
    /// Static value.
    Static(&'a str),
}

impl<'a> ScalarSpec<'a> {
    /// The scalar view of `spec`, if it is one.
    #[must_use]
    pub fn of(spec: &'a ValueSpec) -> Option<Self> {
        match spec {
            ValueSpec::Literal(text) => Some(Self::Literal(text)),
            ValueSpec::Column(column) => Some(Self::Column(column)),
            ValueSpec::Static(value) => Some(Self::Static(value)),
            ValueSpec::Label(_) | ValueSpec::Composite(_) => None,
        }
    }

    /// Text of the scalar for a row.
    pub fn text(self, row: &Row) -> Result<String, ResolveError> {
        match self {
            Self::Literal(text) => Ok(render_text(text, row)?),
            Self::Column(column) => {
                row.get(column)
                    .map(str::to_owned)
                    .ok_or_else(|| ResolveError::UnknownColumn {
                        column: column.to_owned(),
                    })
            }
            Self::Static(value) => Ok(value.to_owned()),
        }
    }
}

fn resolve_label(
    reference: &LabelRef,
    row: &Row,
    context: &mut ResolutionContext<'_>,
) -> Result<String, ResolveError> {
    let label = row.render(&reference.label)?;
    if is_entity_id(&label) {
        return Ok(label);
    }
    let id = match &reference.snak {
        Some(snak) => {
            let value = render_text(&snak.value, row)?;
            context.qid_by_unique_key(&label, &snak.property, &value)?
        }
        None => context.qid_by_label(&label)?,
    };
    Ok(id.unwrap_or(label))
}

/// Columns a spec may read, used to project rows.
///
/// Bare strings contribute both themselves (they may name a column) and
/// their placeholders.
#[must_use]
pub fn extract_columns(spec: &ValueSpec) -> Vec<String> {
    let mut columns = Vec::new();
    collect_columns(spec, &mut columns);
    columns
}

fn collect_columns(spec: &ValueSpec, columns: &mut Vec<String>) {
    match spec {
        ValueSpec::Literal(text) => {
            columns.push(text.clone());
            columns.extend(template::placeholders(text).into_iter().map(str::to_owned));
        }
        ValueSpec::Column(column) => columns.push(column.clone()),
        ValueSpec::Static(_) => {}
        ValueSpec::Label(reference) => {
            columns.extend(placeholder_names(&reference.label));
            if let Some(snak) = &reference.snak {
                columns.push(snak.value.clone());
                columns.extend(placeholder_names(&snak.value));
            }
        }
        ValueSpec::Composite(parts) => {
            for part in parts {
                collect_columns(part, columns);
            }
        }
    }
}

fn placeholder_names(text: &str) -> impl Iterator<Item = String> + '_ {
    template::placeholders(text).into_iter().map(str::to_owned)
}

/// Columns a spec needs that `headers` lacks.
///
/// A bare string that is not a header is a template, so only its
/// placeholders must exist.
#[must_use]
pub fn missing_columns(spec: &ValueSpec, headers: &BTreeSet<String>) -> Vec<String> {
    let mut missing = Vec::new();
    collect_missing(spec, headers, &mut missing);
    missing
}

/// Placeholders of a bare string or template that `headers` lacks.
#[must_use]
pub fn missing_template_columns(text: &str, headers: &BTreeSet<String>) -> Vec<String> {
    if headers.contains(text) {
        return Vec::new();
    }
    placeholder_names(text)
        .filter(|column| !headers.contains(column))
        .collect()
}

fn collect_missing(spec: &ValueSpec, headers: &BTreeSet<String>, missing: &mut Vec<String>) {
    match spec {
        ValueSpec::Literal(text) => missing.extend(missing_template_columns(text, headers)),
        ValueSpec::Column(column) => {
            if !headers.contains(column) {
                missing.push(column.clone());
            }
        }
        ValueSpec::Static(_) => {}
        ValueSpec::Label(reference) => {
            missing.extend(
                placeholder_names(&reference.label).filter(|column| !headers.contains(column)),
            );
            if let Some(snak) = &reference.snak {
                missing.extend(missing_template_columns(&snak.value, headers));
            }
        }
        ValueSpec::Composite(parts) => {
            for part in parts {
                collect_missing(part, headers, missing);
            }
        }
    }
}

/// An entity lookup a spec will perform, before it is rendered for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLookup<'a> {
    /// A top-level scalar of a `wikibase-item` value, looked up by label.
    Scalar(ScalarSpec<'a>),
    /// An explicit label reference.
    Label(&'a LabelRef),
}

impl ItemLookup<'_> {
    /// Render the lookup for a row.
    ///
    /// Returns `None` when the row cannot render it or already names an
    /// entity id; resolution reports those cases itself.
    #[must_use]
    pub fn render(&self, row: &Row) -> Option<LookupKey> {
        match self {
            Self::Scalar(scalar) => {
                let text = scalar.text(row).ok()?;
                (!is_entity_id(&text)).then_some(LookupKey::Label(text))
            }
            Self::Label(reference) => {
                let label = row.render(&reference.label).ok()?;
                if is_entity_id(&label) {
                    return None;
                }
                Some(match &reference.snak {
                    Some(snak) => LookupKey::UniqueKey {
                        label,
                        property: snak.property.clone(),
                        value: render_text(&snak.value, row).ok()?,
                    },
                    None => LookupKey::Label(label),
                })
            }
        }
    }
}

/// Entity lookups `spec` performs when resolved for `datatype`.
#[must_use]
pub fn extract_item_lookups<'a>(spec: &'a ValueSpec, datatype: &Datatype) -> Vec<ItemLookup<'a>> {
    match spec {
        ValueSpec::Label(reference) => vec![ItemLookup::Label(reference)],
        ValueSpec::Composite(parts) => parts.iter().flat_map(label_lookups).collect(),
        ValueSpec::Literal(_) | ValueSpec::Column(_) | ValueSpec::Static(_) => ScalarSpec::of(spec)
            .filter(|_| *datatype == Datatype::WikibaseItem)
            .map(ItemLookup::Scalar)
            .into_iter()
            .collect(),
    }
}

fn label_lookups(spec: &ValueSpec) -> Vec<ItemLookup<'_>> {
    match spec {
        ValueSpec::Label(reference) => vec![ItemLookup::Label(reference)],
        ValueSpec::Composite(parts) => parts.iter().flat_map(label_lookups).collect(),
        ValueSpec::Literal(_) | ValueSpec::Column(_) | ValueSpec::Static(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use wbk_core::{SnakMatcher, test_support::MemoryBackend};

    #[fixture]
    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.add_item("en", "Los Andes");
        backend.add_item("en", "Escuela Básica");
        backend.add_item("en", "Escuela Básica");
        backend.add_property("en", "code", Datatype::ExternalId);
        backend
    }

    #[fixture]
    fn row() -> Row {
        Row::new(
            1,
            [
                ("name", "Colegio A"),
                ("district", "Los Andes"),
                ("count", "120"),
                ("unit", "Q11573"),
            ],
        )
    }

    fn resolve_with(
        backend: &MemoryBackend,
        spec: &ValueSpec,
        row: &Row,
        datatype: &Datatype,
    ) -> Result<ResolvedValue, ResolveError> {
        let mut context = ResolutionContext::new(backend, "en");
        resolve(Some(spec), row, datatype, &mut context)
    }

    #[rstest]
    #[case(ValueSpec::Literal("name".into()), "Colegio A")]
    #[case(ValueSpec::Literal("School {name} in {district}".into()), "School Colegio A in Los Andes")]
    #[case(ValueSpec::Column("count".into()), "120")]
    #[case(ValueSpec::Static("{name}".into()), "{name}")]
    fn resolves_scalars(backend: MemoryBackend, row: Row, #[case] spec: ValueSpec, #[case] expected: &str) {
        let value = resolve_with(&backend, &spec, &row, &Datatype::String).expect("resolve");
        assert_eq!(value, ResolvedValue::Scalar(expected.to_owned()));
    }

    #[rstest]
    fn item_scalars_resolve_by_label(backend: MemoryBackend, row: Row) {
        let spec = ValueSpec::Literal("district".into());
        let value = resolve_with(&backend, &spec, &row, &Datatype::WikibaseItem).expect("resolve");
        assert_eq!(value, ResolvedValue::Scalar("Q1".into()));

        let unresolved = ValueSpec::Literal("name".into());
        let value =
            resolve_with(&backend, &unresolved, &row, &Datatype::WikibaseItem).expect("resolve");
        assert_eq!(value, ResolvedValue::Scalar("Colegio A".into()));
    }

    #[rstest]
    fn ambiguous_label_references_fail(backend: MemoryBackend, row: Row) {
        let spec = ValueSpec::label("Escuela Básica");
        let err = resolve_with(&backend, &spec, &row, &Datatype::WikibaseItem)
            .expect_err("two items share the label");
        let ambiguous = err.ambiguity().expect("ambiguity");
        assert_eq!(ambiguous.candidates, vec!["Q2", "Q3"]);
    }

    #[rstest]
    fn composites_flatten(backend: MemoryBackend, row: Row) {
        let spec = ValueSpec::Composite(vec![
            ValueSpec::Column("count".into()),
            ValueSpec::Composite(vec![
                ValueSpec::label("Los Andes"),
                ValueSpec::Literal("unit".into()),
            ]),
        ]);
        let value = resolve_with(&backend, &spec, &row, &Datatype::Quantity).expect("resolve");
        assert_eq!(
            value,
            ResolvedValue::Tuple(vec!["120".into(), "Q1".into(), "Q11573".into()])
        );
    }

    #[rstest]
    fn reports_missing_columns(backend: MemoryBackend, row: Row) {
        let err = resolve_with(&backend, &ValueSpec::Column("code".into()), &row, &Datatype::String)
            .expect_err("no code column");
        assert!(matches!(err, ResolveError::UnknownColumn { column } if column == "code"));

        let err = resolve_with(
            &backend,
            &ValueSpec::Literal("{code}-{name}".into()),
            &row,
            &Datatype::String,
        )
        .expect_err("no code placeholder");
        assert!(matches!(err, ResolveError::MissingPlaceholder(_)));

        let mut context = ResolutionContext::new(&backend, "en");
        let err = resolve(None, &row, &Datatype::Quantity, &mut context).expect_err("no spec");
        assert_eq!(err.to_string(), "No value specified for datatype quantity");
    }

    #[rstest]
    fn resolution_is_deterministic(backend: MemoryBackend, row: Row) {
        let spec = ValueSpec::Composite(vec![
            ValueSpec::label("{district}"),
            ValueSpec::Literal("{name}".into()),
        ]);
        let mut context = ResolutionContext::new(&backend, "en");
        let first = resolve(Some(&spec), &row, &Datatype::String, &mut context).expect("first");
        let second = resolve(Some(&spec), &row, &Datatype::String, &mut context).expect("second");
        assert_eq!(first, second);
    }

    #[rstest]
    fn header_validation_treats_bare_strings_as_templates() {
        let headers: BTreeSet<String> = ["name".to_owned(), "district".to_owned()].into();
        let spec = ValueSpec::Composite(vec![
            ValueSpec::Literal("name".into()),
            ValueSpec::Literal("School in {district}".into()),
            ValueSpec::Literal("{code}".into()),
            ValueSpec::Column("count".into()),
            ValueSpec::Static("{ignored}".into()),
        ]);
        assert_eq!(missing_columns(&spec, &headers), vec!["code", "count"]);
    }

    #[rstest]
    fn lookups_render_per_row(row: Row) {
        let snak_ref = ValueSpec::Label(LabelRef {
            label: "{name}".into(),
            snak: Some(SnakMatcher {
                property: "code".into(),
                value: "count".into(),
            }),
        });
        let spec = ValueSpec::Composite(vec![snak_ref, ValueSpec::Literal("district".into())]);
        let lookups = extract_item_lookups(&spec, &Datatype::WikibaseItem);
        let keys: Vec<_> = lookups.iter().filter_map(|lookup| lookup.render(&row)).collect();
        assert_eq!(
            keys,
            vec![LookupKey::UniqueKey {
                label: "Colegio A".into(),
                property: "code".into(),
                value: "120".into(),
            }]
        );

        let scalar = ValueSpec::Literal("district".into());
        let lookups = extract_item_lookups(&scalar, &Datatype::WikibaseItem);
        assert_eq!(lookups[0].render(&row), Some(LookupKey::Label("Los Andes".into())));
        assert!(extract_item_lookups(&scalar, &Datatype::String).is_empty());
    }
}
