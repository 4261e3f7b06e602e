//! Update strategies for entities that already exist.
//!
//! Each [`UpdateAction`] maps to an [`UpdateStrategy`] that folds a row's
//! freshly built claims into a working copy of the target entity. Working
//! copies live in a [`WorkingSet`] for one chunk, so several rows hitting
//! the same entity accumulate their changes and the entity is submitted
//! once, and only when something changed.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;

use wbk_core::{
    Claim, Entity, UpdateAction, claims_equal, merge_qualifiers, merge_references,
    same_main_value,
};

#[cfg(test)]
mod tests;

/// Claim-level outcome of applying a strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyTally {
    /// Claims added to the entity.
    pub appended: usize,
    /// Existing claims overwritten in place.
    pub replaced: usize,
    /// Existing claims that absorbed qualifiers or references.
    pub merged: usize,
    /// Claims skipped because their property was already populated.
    pub kept: usize,
}

impl AddAssign for StrategyTally {
    fn add_assign(&mut self, other: Self) {
        self.appended += other.appended;
        self.replaced += other.replaced;
        self.merged += other.merged;
        self.kept += other.kept;
    }
}

/// Working copy of an existing entity during one chunk.
#[derive(Debug, Clone)]
pub struct WorkingEntity {
    entity: Entity,
    original: Entity,
    original_properties: BTreeSet<String>,
    cleared: bool,
}

impl WorkingEntity {
    /// Start working on an entity as fetched from the store.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        let original_properties = entity
            .claims
            .iter()
            .filter(|(_, claims)| !claims.is_empty())
            .map(|(property, _)| property.clone())
            .collect();
        Self {
            original: entity.clone(),
            entity,
            original_properties,
            cleared: false,
        }
    }

    /// Current state of the entity.
    #[must_use]
    pub const fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Mutable access for term updates.
    pub const fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    /// Whether the property had claims when the entity was fetched.
    #[must_use]
    pub fn had_claims_for(&self, property: &str) -> bool {
        self.original_properties.contains(property)
    }

    /// Whether anything differs from the fetched entity.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.entity != self.original
    }

    /// Finished entity.
    #[must_use]
    pub fn into_entity(self) -> Entity {
        self.entity
    }
}

/// A claim-merging policy.
pub trait UpdateStrategy {
    /// Action this strategy implements.
    fn action(&self) -> UpdateAction;

    /// Whether `claim` would be written to `target` rather than skipped.
    fn admits(&self, _target: &WorkingEntity, _claim: &Claim) -> bool {
        true
    }

    /// Fold a row's claims into the working entity.
    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally;
}

/// Strategy implementing `action`.
#[must_use]
pub fn strategy_for(action: UpdateAction) -> Box<dyn UpdateStrategy> {
    match action {
        UpdateAction::ReplaceAll => Box::new(ReplaceAll),
        UpdateAction::AppendOrReplace => Box::new(AppendOrReplace),
        UpdateAction::ForceAppend => Box::new(ForceAppend),
        UpdateAction::Keep => Box::new(Keep),
        UpdateAction::MergeRefsOrAppend => Box::new(MergeRefsOrAppend),
        UpdateAction::MergeQualifiersOrAppend => Box::new(MergeQualifiersOrAppend),
    }
}

/// Clear every claim on first touch, then append.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceAll;

impl UpdateStrategy for ReplaceAll {
    fn action(&self) -> UpdateAction {
        UpdateAction::ReplaceAll
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        if !target.cleared {
            target.entity.claims.clear();
            target.cleared = true;
        }
        let mut tally = StrategyTally::default();
        for claim in claims {
            target.entity.push_claim(claim);
            tally.appended += 1;
        }
        tally
    }
}

/// Replace equal claims in place, keeping their ids; append the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOrReplace;

impl UpdateStrategy for AppendOrReplace {
    fn action(&self) -> UpdateAction {
        UpdateAction::AppendOrReplace
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        let mut tally = StrategyTally::default();
        for mut claim in claims {
            let existing = target
                .entity
                .claims
                .get_mut(claim.property())
                .and_then(|list| list.iter_mut().find(|other| claims_equal(other, &claim)));
            if let Some(existing) = existing {
                claim.id = existing.id.take();
                *existing = claim;
                tally.replaced += 1;
            } else {
                target.entity.push_claim(claim);
                tally.appended += 1;
            }
        }
        tally
    }
}

/// Append every claim, duplicates included.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceAppend;

impl UpdateStrategy for ForceAppend {
    fn action(&self) -> UpdateAction {
        UpdateAction::ForceAppend
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        let appended = claims.len();
        for claim in claims {
            target.entity.push_claim(claim);
        }
        StrategyTally {
            appended,
            ..StrategyTally::default()
        }
    }
}

/// Leave properties that already had claims untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keep;

impl UpdateStrategy for Keep {
    fn action(&self) -> UpdateAction {
        UpdateAction::Keep
    }

    fn admits(&self, target: &WorkingEntity, claim: &Claim) -> bool {
        !target.had_claims_for(claim.property())
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        let mut tally = StrategyTally::default();
        for claim in claims {
            if self.admits(target, &claim) {
                target.entity.push_claim(claim);
                tally.appended += 1;
            } else {
                tally.kept += 1;
            }
        }
        tally
    }
}

/// Merge references into equal claims; append the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeRefsOrAppend;

impl UpdateStrategy for MergeRefsOrAppend {
    fn action(&self) -> UpdateAction {
        UpdateAction::MergeRefsOrAppend
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        let mut tally = StrategyTally::default();
        for claim in claims {
            let existing = target
                .entity
                .claims
                .get_mut(claim.property())
                .and_then(|list| list.iter_mut().find(|other| claims_equal(other, &claim)));
            if let Some(existing) = existing {
                merge_references(existing, &claim.references);
                tally.merged += 1;
            } else {
                target.entity.push_claim(claim);
                tally.appended += 1;
            }
        }
        tally
    }
}

/// Merge qualifiers and references into claims with the same value; append
/// the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeQualifiersOrAppend;

impl UpdateStrategy for MergeQualifiersOrAppend {
    fn action(&self) -> UpdateAction {
        UpdateAction::MergeQualifiersOrAppend
    }

    fn apply(&self, target: &mut WorkingEntity, claims: Vec<Claim>) -> StrategyTally {
        let mut tally = StrategyTally::default();
        for claim in claims {
            let existing = target
                .entity
                .claims
                .get_mut(claim.property())
                .and_then(|list| list.iter_mut().find(|other| same_main_value(other, &claim)));
            if let Some(existing) = existing {
                merge_qualifiers(existing, &claim.qualifiers);
                merge_references(existing, &claim.references);
                tally.merged += 1;
            } else {
                target.entity.push_claim(claim);
                tally.appended += 1;
            }
        }
        tally
    }
}

/// Working copies for one chunk, keyed by entity id in first-touch order.
#[derive(Debug, Default)]
pub struct WorkingSet {
    order: Vec<String>,
    entries: BTreeMap<String, WorkingEntity>,
}

impl WorkingSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Working copy for `id`, created from `fetch` on first touch.
    pub fn get_or_insert_with<F>(&mut self, id: &str, fetch: F) -> &mut WorkingEntity
    where
        F: FnOnce() -> Entity,
    {
        if !self.entries.contains_key(id) {
            self.order.push(id.to_owned());
        }
        self.entries
            .entry(id.to_owned())
            .or_insert_with(|| WorkingEntity::new(fetch()))
    }

    /// Number of distinct entities touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entity was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into modified entities, in first-touch order, and the number of
    /// untouched ones.
    #[must_use]
    pub fn into_modified(mut self) -> (Vec<Entity>, usize) {
        let mut modified = Vec::new();
        let mut unchanged = 0;
        for id in self.order {
            let Some(working) = self.entries.remove(&id) else {
                continue;
            };
            if working.is_modified() {
                modified.push(working.into_entity());
            } else {
                unchanged += 1;
            }
        }
        (modified, unchanged)
    }
}
