//! Structural claim comparison and merging.
//!
//! Equality here is value-level: claim ids, ranks, reference hashes and snak
//! datatypes never take part. Snak groups are equal when they cover the same
//! set of properties and each property carries the same sequence of values;
//! the property order itself is not significant.

use super::{Claim, Reference, Snak, SnakGroup};

/// Whether two snaks assert the same value for the same property.
#[must_use]
pub fn snaks_equal(left: &Snak, right: &Snak) -> bool {
    left.property == right.property && left.value == right.value
}

/// Whether two snak groups hold the same values per property.
///
/// # Examples
///
/// ```
/// use wbk_core::{DataValue, Snak, SnakGroup, snak_groups_equal};
///
/// let a = SnakGroup::from_snaks([
///     Snak::value("P585", DataValue::String("2020".into())),
///     Snak::value("P248", DataValue::EntityId("Q1".into())),
/// ]);
/// let b = SnakGroup::from_snaks([
///     Snak::value("P248", DataValue::EntityId("Q1".into())),
///     Snak::value("P585", DataValue::String("2020".into())),
/// ]);
/// assert!(snak_groups_equal(&a, &b));
/// ```
#[must_use]
pub fn snak_groups_equal(left: &SnakGroup, right: &SnakGroup) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().all(|(property, snaks)| {
        right.get(property).is_some_and(|other| {
            other.len() == snaks.len()
                && snaks
                    .iter()
                    .zip(other)
                    .all(|(lhs, rhs)| snaks_equal(lhs, rhs))
        })
    })
}

/// Whether two claims share their main snak value.
#[must_use]
pub fn same_main_value(left: &Claim, right: &Claim) -> bool {
    snaks_equal(&left.mainsnak, &right.mainsnak)
}

/// Whether two claims are the same statement: equal main value and equal
/// qualifiers.
#[must_use]
pub fn claims_equal(left: &Claim, right: &Claim) -> bool {
    same_main_value(left, right) && snak_groups_equal(&left.qualifiers, &right.qualifiers)
}

/// Merge reference blocks into a claim, skipping blocks already present.
///
/// Returns the number of blocks added.
pub fn merge_references<'a, I>(target: &mut Claim, incoming: I) -> usize
where
    I: IntoIterator<Item = &'a Reference>,
{
    let mut added = 0;
    for reference in incoming {
        let known = target
            .references
            .iter()
            .any(|existing| snak_groups_equal(&existing.snaks, &reference.snaks));
        if !known {
            target.references.push(Reference::new(reference.snaks.clone()));
            added += 1;
        }
    }
    added
}

/// Merge qualifier values into a claim.
///
/// Values are de-duplicated per property and existing values are never
/// removed. Returns the number of snaks added.
pub fn merge_qualifiers(target: &mut Claim, incoming: &SnakGroup) -> usize {
    let mut added = 0;
    for (property, snaks) in incoming.iter() {
        for snak in snaks {
            let known = target
                .qualifiers
                .get(property)
                .is_some_and(|existing| existing.iter().any(|other| snaks_equal(other, snak)));
            if !known {
                target.qualifiers.push(snak.clone());
                added += 1;
            }
        }
    }
    added
}
