use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use staffdesk_core::UserId;

use crate::{Claim, Role};

/// A fully loaded identity for authorization decisions.
///
/// Built fresh from the identity store for every request; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub roles: BTreeSet<Role>,
    pub claims: BTreeSet<Claim>,
}

impl Identity {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            roles: BTreeSet::new(),
            claims: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_claim(mut self, claim_type: &str, value: &str) -> Self {
        self.claims.insert(Claim::new(claim_type, value));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    /// True iff a claim of `claim_type` carries exactly `value`.
    ///
    /// Empty values never match: a blank claim counts as absent.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        !value.is_empty()
            && self
                .claims
                .iter()
                .any(|c| c.is_type(claim_type) && c.value == value)
    }

    pub fn has_claim_type(&self, claim_type: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.is_type(claim_type) && !c.value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_lookup_is_exact_on_value() {
        let identity = Identity::new(UserId::new("u1"))
            .with_role("Admin")
            .with_claim("Edit Role", "true");

        assert!(identity.has_role("Admin"));
        assert!(!identity.has_role("admin"));
        assert!(identity.has_claim("Edit Role", "true"));
        assert!(!identity.has_claim("Edit Role", "True"));
        assert!(!identity.has_claim("Delete Role", "true"));
    }

    #[test]
    fn blank_claim_counts_as_absent() {
        let identity = Identity::new(UserId::new("u1")).with_claim("Edit Role", "");
        assert!(!identity.has_claim_type("Edit Role"));
        assert!(!identity.has_claim("Edit Role", ""));
    }
}
