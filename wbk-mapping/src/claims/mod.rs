//! Claim construction from statement definitions.
//!
//! A statement definition and a row produce at most one claim. Soft
//! failures (an unknown property, a missing column, a value that does not
//! convert) skip the claim with a warning. Ambiguous entity references fail
//! the row and collaborator errors fail the rule, so both surface as
//! [`ClaimError`]. Entity labels that did not resolve are written as
//! strings and only counted as pending once their claim is applied.

use std::collections::BTreeMap;

use thiserror::Error;
use wbk_core::{
    AmbiguousMatch, Claim, DataValue, Datatype, Entity, Reference, Snak, SnakGroup,
    StatementDefinition,
};

use crate::{
    Row,
    context::{ContextError, ResolutionContext},
    resolve::{ResolveError, resolve},
};

mod convert;

pub use convert::{ConvertError, to_datavalue};

/// Errors that stop a row or a rule while building claims.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// An entity reference matched several entities; the row is skipped.
    #[error("Ambiguous match: {0}")]
    Ambiguous(AmbiguousMatch),
    /// The search collaborator failed; the rule is aborted.
    #[error("failed to resolve claim values")]
    Context {
        /// Underlying failure.
        #[source]
        source: ContextError,
    },
}

impl From<ContextError> for ClaimError {
    fn from(error: ContextError) -> Self {
        match error {
            ContextError::Ambiguous(ambiguous) => Self::Ambiguous(ambiguous),
            other => Self::Context { source: other },
        }
    }
}

/// Claims built for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltClaims {
    /// Claims in statement order.
    pub claims: Vec<Claim>,
    /// Statements that produced no claim.
    pub skipped: usize,
}

/// Build the claim for one statement.
///
/// Returns `Ok(None)` when the property is unknown, the value is blank or
/// does not resolve or convert. Non-normal ranks are applied; references
/// form a single reference block.
pub fn build_claim(
    statement: &StatementDefinition,
    row: &Row,
    context: &mut ResolutionContext<'_>,
) -> Result<Option<Claim>, ClaimError> {
    let Some(snak) = build_snak(statement, row, context)? else {
        return Ok(None);
    };

    let mut qualifiers = SnakGroup::default();
    for qualifier in &statement.qualifiers {
        if let Some(snak) = build_snak(qualifier, row, context)? {
            qualifiers.push(snak);
        }
    }
    let mut reference = SnakGroup::default();
    for source in &statement.references {
        if let Some(snak) = build_snak(source, row, context)? {
            reference.push(snak);
        }
    }

    let mut claim = Claim::new(snak)
        .with_qualifiers(qualifiers)
        .with_rank(statement.rank);
    if !reference.is_empty() {
        claim = claim.with_reference(Reference::new(reference));
    }
    Ok(Some(claim))
}

fn build_snak(
    definition: &StatementDefinition,
    row: &Row,
    context: &mut ResolutionContext<'_>,
) -> Result<Option<Snak>, ClaimError> {
    let Some(info) = context.property_info(&definition.property)? else {
        log::warn!(
            "line {}: skipping '{}': Property not found",
            row.line(),
            definition.property
        );
        return Ok(None);
    };
    let datatype = definition
        .datatype
        .clone()
        .unwrap_or_else(|| info.datatype.clone());

    let value = match resolve(definition.value.as_ref(), row, &datatype, context) {
        Ok(value) => value,
        Err(ResolveError::Context(err)) if !matches!(err, ContextError::PropertyNotFound { .. }) => {
            return Err(err.into());
        }
        Err(err) => {
            log::warn!(
                "line {}: skipping '{}': {err}",
                row.line(),
                definition.property
            );
            return Ok(None);
        }
    };
    if value.has_blank() {
        return Ok(None);
    }

    let datavalue = match to_datavalue(&value, &datatype, context.language()) {
        Ok(datavalue) => datavalue,
        Err(err) => {
            log::warn!(
                "line {}: skipping '{}': {err}",
                row.line(),
                definition.property
            );
            return Ok(None);
        }
    };
    Ok(Some(Snak::value(info.id, datavalue).with_datatype(datatype)))
}

/// Entity labels in `claim` that were written as strings because they did
/// not resolve.
pub fn pending_labels(claim: &Claim) -> impl Iterator<Item = &str> {
    let qualifiers = claim.qualifiers.iter().flat_map(|(_, snaks)| snaks);
    let references = claim
        .references
        .iter()
        .flat_map(|reference| reference.snaks.iter().flat_map(|(_, snaks)| snaks));
    std::iter::once(&claim.mainsnak)
        .chain(qualifiers)
        .chain(references)
        .filter(|snak| snak.datatype == Some(Datatype::WikibaseItem))
        .filter_map(|snak| match snak.datavalue() {
            Some(DataValue::String(label)) => Some(label.as_str()),
            _ => None,
        })
}

/// Count the unresolved labels of claims that were written to an entity.
pub fn record_pending<'c, I>(claims: I, context: &mut ResolutionContext<'_>)
where
    I: IntoIterator<Item = &'c Claim>,
{
    for claim in claims {
        for label in pending_labels(claim) {
            context.record_pending(label);
        }
    }
}

/// Build every claim of a row before anything is mutated.
///
/// An error leaves no partial result, so a failing row changes nothing.
pub fn build_claims(
    statements: &[StatementDefinition],
    row: &Row,
    context: &mut ResolutionContext<'_>,
) -> Result<BuiltClaims, ClaimError> {
    let mut built = BuiltClaims::default();
    for statement in statements {
        match build_claim(statement, row, context)? {
            Some(claim) => built.claims.push(claim),
            None => built.skipped += 1,
        }
    }
    Ok(built)
}

/// Build a row's claims and write them onto `entity`.
///
/// Each property that received claims has its list replaced by this row's
/// claims for it; other properties are untouched. Returns what was built.
pub fn apply_statements(
    entity: &mut Entity,
    row: &Row,
    statements: &[StatementDefinition],
    context: &mut ResolutionContext<'_>,
) -> Result<BuiltClaims, ClaimError> {
    let built = build_claims(statements, row, context)?;
    let mut by_property: BTreeMap<String, Vec<Claim>> = BTreeMap::new();
    for claim in &built.claims {
        by_property
            .entry(claim.property().to_owned())
            .or_default()
            .push(claim.clone());
    }
    entity.claims.extend(by_property);
    record_pending(&built.claims, context);
    Ok(built)
}
