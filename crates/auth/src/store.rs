//! Identity store contract.
//!
//! Persistent storage of users, roles, and claims lives outside this crate.
//! Implementations own the atomicity of each individual batch call; nothing
//! here spans two calls.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use staffdesk_core::{StoreFault, UserId};

use crate::{Claim, Identity, Role};

/// Store-side handle for a user, as returned by [`IdentityStore::find_by_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub user_name: String,
}

/// One human-readable reason a mutation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreErrorDetail {
    pub code: String,
    pub description: String,
}

impl StoreErrorDetail {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Outcome of a batch mutation: success, or the store's per-item errors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationResult {
    errors: Vec<StoreErrorDetail>,
}

impl MutationResult {
    pub fn success() -> Self {
        Self::default()
    }

    /// A rejection. An empty error list is still a rejection; a placeholder
    /// description is recorded so it never reads as success.
    pub fn failed(errors: Vec<StoreErrorDetail>) -> Self {
        if errors.is_empty() {
            return Self {
                errors: vec![StoreErrorDetail::new("Unknown", "The operation failed.")],
            };
        }
        Self { errors }
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[StoreErrorDetail] {
        &self.errors
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.description.clone()).collect()
    }
}

/// Identity store interface consumed by the gate and the reconciler.
///
/// Every method is potentially blocking I/O. `Err(StoreFault)` is reserved for
/// the store being unreachable or broken; a rejected mutation is an `Ok`
/// [`MutationResult`] carrying errors.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreFault>;

    async fn roles_of(&self, user: &UserRecord) -> Result<BTreeSet<Role>, StoreFault>;

    async fn claims_of(&self, user: &UserRecord) -> Result<BTreeSet<Claim>, StoreFault>;

    async fn is_in_role(&self, user: &UserRecord, role: &Role) -> Result<bool, StoreFault>;

    async fn role_exists(&self, role: &Role) -> Result<bool, StoreFault>;

    async fn add_to_roles(
        &self,
        user: &UserRecord,
        roles: &BTreeSet<Role>,
    ) -> Result<MutationResult, StoreFault>;

    async fn remove_from_roles(
        &self,
        user: &UserRecord,
        roles: &BTreeSet<Role>,
    ) -> Result<MutationResult, StoreFault>;

    async fn add_claims(
        &self,
        user: &UserRecord,
        claims: &BTreeSet<Claim>,
    ) -> Result<MutationResult, StoreFault>;

    async fn remove_claims(
        &self,
        user: &UserRecord,
        claims: &BTreeSet<Claim>,
    ) -> Result<MutationResult, StoreFault>;

    /// Load a user together with its current roles and claims.
    async fn load_identity(&self, id: &UserId) -> Result<Option<Identity>, StoreFault> {
        let Some(user) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let roles = self.roles_of(&user).await?;
        let claims = self.claims_of(&user).await?;
        Ok(Some(Identity {
            id: user.id,
            roles,
            claims,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_without_details_is_still_a_failure() {
        let result = MutationResult::failed(vec![]);
        assert!(!result.succeeded());
        assert_eq!(result.descriptions(), vec!["The operation failed."]);
    }

    #[test]
    fn descriptions_are_verbatim() {
        let result = MutationResult::failed(vec![StoreErrorDetail::new(
            "UserNotInRole",
            "User is not in role 'Intern'.",
        )]);
        assert_eq!(result.descriptions(), vec!["User is not in role 'Intern'."]);
    }
}
