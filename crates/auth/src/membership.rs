//! Membership reconciliation against the identity store.
//!
//! Each side of a delta becomes at most one batch call; empty sides are
//! skipped, never sent. Additions and removals are independent: a rejected
//! additions batch does not stop the removals batch, and roles and claims do
//! not wait on each other. Nothing is rolled back. The report succeeds only
//! if every attempted batch succeeded.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use staffdesk_core::{AccessConfig, AccessError, AccessResult, StoreFault, UserId};

use crate::reconcile::{MembershipDelta, reconcile, reconcile_claims};
use crate::store::{IdentityStore, MutationResult, UserRecord};
use crate::{Claim, Role};

/// What happened to one side (additions or removals) of a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "errors", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Nothing to send; the store was not called.
    Skipped,
    Applied,
    /// The store rejected the batch; descriptions are the store's own.
    Rejected(Vec<String>),
}

impl BatchOutcome {
    fn from_result(result: MutationResult) -> Self {
        if result.succeeded() {
            Self::Applied
        } else {
            Self::Rejected(result.descriptions())
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::Rejected(errors) => errors,
            _ => &[],
        }
    }
}

/// Result of reconciling one kind of membership (roles or claims).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideReport<M: Ord> {
    pub delta: MembershipDelta<M>,
    pub added: BatchOutcome,
    pub removed: BatchOutcome,
}

impl<M: Ord> SideReport<M> {
    pub fn succeeded(&self) -> bool {
        self.added.is_ok() && self.removed.is_ok()
    }

    pub fn errors(&self) -> Vec<String> {
        self.added
            .errors()
            .iter()
            .chain(self.removed.errors())
            .cloned()
            .collect()
    }
}

/// Aggregated result of a reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub user_id: UserId,
    pub roles: Option<SideReport<Role>>,
    pub claims: Option<SideReport<Claim>>,
}

impl ReconcileReport {
    pub fn succeeded(&self) -> bool {
        self.roles.as_ref().is_none_or(SideReport::succeeded)
            && self.claims.as_ref().is_none_or(SideReport::succeeded)
    }

    /// Every store error description, roles first, additions before removals.
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(roles) = &self.roles {
            errors.extend(roles.errors());
        }
        if let Some(claims) = &self.claims {
            errors.extend(claims.errors());
        }
        errors
    }

    /// `Err(StoreOperationFailed)` carrying the store messages when any batch
    /// was rejected.
    pub fn into_result(self) -> AccessResult<Self> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(AccessError::StoreOperationFailed(self.errors()))
        }
    }
}

/// One row of the "users in role" form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSelection {
    pub user_id: UserId,
    pub selected: bool,
}

impl MemberSelection {
    pub fn new(user_id: UserId, selected: bool) -> Self {
        Self { user_id, selected }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "errors", rename_all = "snake_case")]
pub enum MemberChange {
    Unchanged,
    Added,
    Removed,
    UserNotFound,
    Rejected(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberOutcome {
    pub user_id: UserId,
    pub change: MemberChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMembersReport {
    pub role: Role,
    pub members: Vec<MemberOutcome>,
}

impl RoleMembersReport {
    pub fn succeeded(&self) -> bool {
        self.members
            .iter()
            .all(|m| !matches!(m.change, MemberChange::Rejected(_) | MemberChange::UserNotFound))
    }
}

/// Applies administrator-submitted membership to the identity store.
pub struct MembershipReconciler<S: ?Sized> {
    store: Arc<S>,
    config: Arc<AccessConfig>,
}

impl<S: ?Sized> Clone for MembershipReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> MembershipReconciler<S>
where
    S: IdentityStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: Arc<AccessConfig>) -> Self {
        Self { store, config }
    }

    /// Reconcile both roles and claims of `user_id`.
    ///
    /// `desired_claim_types` must all be in the configured claims catalog;
    /// otherwise nothing is sent to the store.
    pub async fn reconcile_user(
        &self,
        user_id: &UserId,
        desired_roles: &[String],
        desired_claim_types: &[String],
    ) -> AccessResult<ReconcileReport> {
        let desired_claims = self.validate_claim_types(desired_claim_types)?;
        let user = self.find(user_id).await?;

        let roles = self.apply_roles(&user, desired_roles).await?;
        let claims = self.apply_claims(&user, &desired_claims).await?;

        Ok(self.finish(ReconcileReport {
            user_id: user.id,
            roles: Some(roles),
            claims: Some(claims),
        }))
    }

    pub async fn reconcile_roles(
        &self,
        user_id: &UserId,
        desired_roles: &[String],
    ) -> AccessResult<ReconcileReport> {
        let user = self.find(user_id).await?;
        let roles = self.apply_roles(&user, desired_roles).await?;

        Ok(self.finish(ReconcileReport {
            user_id: user.id,
            roles: Some(roles),
            claims: None,
        }))
    }

    pub async fn reconcile_claims(
        &self,
        user_id: &UserId,
        desired_claim_types: &[String],
    ) -> AccessResult<ReconcileReport> {
        let desired_claims = self.validate_claim_types(desired_claim_types)?;
        let user = self.find(user_id).await?;
        let claims = self.apply_claims(&user, &desired_claims).await?;

        Ok(self.finish(ReconcileReport {
            user_id: user.id,
            roles: None,
            claims: Some(claims),
        }))
    }

    /// Set membership of one role across several users.
    ///
    /// Users whose membership already matches their selection cause no store
    /// mutation. Unknown users are reported and skipped.
    pub async fn reconcile_role_members(
        &self,
        role: &str,
        selections: &[MemberSelection],
    ) -> AccessResult<RoleMembersReport> {
        let role = Role::from(role);
        if !self.store.role_exists(&role).await? {
            return Err(AccessError::NotFound);
        }

        let single: BTreeSet<Role> = BTreeSet::from([role.clone()]);
        let mut members = Vec::with_capacity(selections.len());

        for selection in selections {
            let change = match self.store.find_by_id(&selection.user_id).await? {
                None => MemberChange::UserNotFound,
                Some(user) => {
                    let in_role = self.store.is_in_role(&user, &role).await?;
                    match (selection.selected, in_role) {
                        (true, false) => member_change(
                            self.store.add_to_roles(&user, &single).await?,
                            MemberChange::Added,
                        ),
                        (false, true) => member_change(
                            self.store.remove_from_roles(&user, &single).await?,
                            MemberChange::Removed,
                        ),
                        _ => MemberChange::Unchanged,
                    }
                }
            };
            members.push(MemberOutcome {
                user_id: selection.user_id.clone(),
                change,
            });
        }

        let report = RoleMembersReport { role, members };
        if report.succeeded() {
            tracing::info!(role = %report.role, users = report.members.len(), "role membership reconciled");
        } else {
            tracing::warn!(role = %report.role, "role membership reconciled with failures");
        }
        Ok(report)
    }

    fn validate_claim_types(&self, desired: &[String]) -> AccessResult<BTreeSet<String>> {
        let unknown: Vec<&str> = desired
            .iter()
            .map(String::as_str)
            .filter(|t| !self.config.is_catalogued(t))
            .collect();
        if !unknown.is_empty() {
            return Err(AccessError::validation(format!(
                "unknown claim types: {}",
                unknown.join(", ")
            )));
        }
        Ok(desired.iter().cloned().collect())
    }

    async fn find(&self, user_id: &UserId) -> AccessResult<UserRecord> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AccessError::NotFound)
    }

    async fn apply_roles(
        &self,
        user: &UserRecord,
        desired: &[String],
    ) -> Result<SideReport<Role>, StoreFault> {
        let current = self.store.roles_of(user).await?;
        let desired: BTreeSet<Role> = desired.iter().map(|r| Role::from(r.as_str())).collect();
        let delta = reconcile(&current, &desired);

        let added = if delta.to_add.is_empty() {
            BatchOutcome::Skipped
        } else {
            BatchOutcome::from_result(self.store.add_to_roles(user, &delta.to_add).await?)
        };
        let removed = if delta.to_remove.is_empty() {
            BatchOutcome::Skipped
        } else {
            BatchOutcome::from_result(self.store.remove_from_roles(user, &delta.to_remove).await?)
        };

        Ok(SideReport {
            delta,
            added,
            removed,
        })
    }

    async fn apply_claims(
        &self,
        user: &UserRecord,
        desired_types: &BTreeSet<String>,
    ) -> Result<SideReport<Claim>, StoreFault> {
        let current = self.store.claims_of(user).await?;
        let managed: BTreeSet<String> = self.config.claims_catalog.iter().cloned().collect();
        let delta = reconcile_claims(
            &current,
            desired_types,
            &managed,
            &self.config.granted_claim_value,
            self.config.claim_match,
        );

        let added = if delta.to_add.is_empty() {
            BatchOutcome::Skipped
        } else {
            BatchOutcome::from_result(self.store.add_claims(user, &delta.to_add).await?)
        };
        let removed = if delta.to_remove.is_empty() {
            BatchOutcome::Skipped
        } else {
            BatchOutcome::from_result(self.store.remove_claims(user, &delta.to_remove).await?)
        };

        Ok(SideReport {
            delta,
            added,
            removed,
        })
    }

    fn finish(&self, report: ReconcileReport) -> ReconcileReport {
        if report.succeeded() {
            tracing::info!(
                user_id = %report.user_id,
                roles_added = report.roles.as_ref().map_or(0, |r| r.delta.to_add.len()),
                roles_removed = report.roles.as_ref().map_or(0, |r| r.delta.to_remove.len()),
                claims_added = report.claims.as_ref().map_or(0, |c| c.delta.to_add.len()),
                claims_removed = report.claims.as_ref().map_or(0, |c| c.delta.to_remove.len()),
                "membership reconciled"
            );
        } else {
            tracing::warn!(
                user_id = %report.user_id,
                errors = ?report.errors(),
                "membership reconciled with rejected batches"
            );
        }
        report
    }
}

fn member_change(result: MutationResult, on_success: MemberChange) -> MemberChange {
    if result.succeeded() {
        on_success
    } else {
        MemberChange::Rejected(result.descriptions())
    }
}
