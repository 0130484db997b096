//! Pure membership diff.
//!
//! `to_add = desired - current`, `to_remove = current - desired`. No I/O;
//! [`crate::membership`] applies the result against the store.

use std::collections::BTreeSet;

use serde::Serialize;

use staffdesk_core::ClaimMatch;

use crate::Claim;

/// Additions and removals needed to turn current membership into desired
/// membership. The two sets are always disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipDelta<M: Ord> {
    pub to_add: BTreeSet<M>,
    pub to_remove: BTreeSet<M>,
}

impl<M: Ord + Clone> MembershipDelta<M> {
    pub fn empty() -> Self {
        Self {
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// `current - to_remove + to_add`.
    pub fn apply_to(&self, current: &BTreeSet<M>) -> BTreeSet<M> {
        current
            .difference(&self.to_remove)
            .cloned()
            .chain(self.to_add.iter().cloned())
            .collect()
    }
}

pub fn reconcile<M: Ord + Clone>(current: &BTreeSet<M>, desired: &BTreeSet<M>) -> MembershipDelta<M> {
    MembershipDelta {
        to_add: desired.difference(current).cloned().collect(),
        to_remove: current.difference(desired).cloned().collect(),
    }
}

/// Diff claims selected by type.
///
/// Only claims whose type is in `managed` take part: claims of other types are
/// left alone. Desired types are granted as `(type, granted_value)`.
///
/// - [`ClaimMatch::ByType`]: a type counts as held whatever its value;
///   removals carry the stored values so the store can match them.
/// - [`ClaimMatch::ByTypeAndValue`]: a held claim of a desired type with a
///   different value is removed and the granted value added.
pub fn reconcile_claims(
    current: &BTreeSet<Claim>,
    desired_types: &BTreeSet<String>,
    managed: &BTreeSet<String>,
    granted_value: &str,
    strategy: ClaimMatch,
) -> MembershipDelta<Claim> {
    let in_scope: BTreeSet<Claim> = current
        .iter()
        .filter(|c| managed.contains(&c.claim_type))
        .cloned()
        .collect();

    match strategy {
        ClaimMatch::ByType => {
            let held_types: BTreeSet<&str> =
                in_scope.iter().map(|c| c.claim_type.as_str()).collect();

            let to_add = desired_types
                .iter()
                .filter(|t| !held_types.contains(t.as_str()))
                .map(|t| Claim::new(t.clone(), granted_value))
                .collect();
            let to_remove = in_scope
                .iter()
                .filter(|c| !desired_types.contains(&c.claim_type))
                .cloned()
                .collect();

            MembershipDelta { to_add, to_remove }
        }
        ClaimMatch::ByTypeAndValue => {
            let desired: BTreeSet<Claim> = desired_types
                .iter()
                .map(|t| Claim::new(t.clone(), granted_value))
                .collect();
            reconcile(&in_scope, &desired)
        }
    }
}
