use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use staffdesk_auth::{Claim, IdentityStore, MutationResult, Role, StoreErrorDetail, UserRecord};
use staffdesk_core::{StoreFault, UserId};

/// A call received by [`InMemoryIdentityStore`], recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FindById(UserId),
    RolesOf(UserId),
    ClaimsOf(UserId),
    IsInRole(UserId, Role),
    RoleExists(Role),
    AddToRoles(UserId, BTreeSet<Role>),
    RemoveFromRoles(UserId, BTreeSet<Role>),
    AddClaims(UserId, BTreeSet<Claim>),
    RemoveClaims(UserId, BTreeSet<Claim>),
}

impl StoreCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddToRoles(..) | Self::RemoveFromRoles(..) | Self::AddClaims(..) | Self::RemoveClaims(..)
        )
    }
}

#[derive(Debug, Clone)]
struct UserEntry {
    record: UserRecord,
    roles: BTreeSet<Role>,
    claims: BTreeSet<Claim>,
}

/// In-memory identity store.
///
/// Intended for tests/dev. Each batch is atomic: it is validated in full and
/// either applied entirely or rejected with one error per offending item.
/// Empty batches are rejected.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<UserId, UserEntry>>,
    roles: RwLock<BTreeSet<Role>>,
    calls: Mutex<Vec<StoreCall>>,
    unavailable: AtomicBool,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding (bypasses the batch API and is not recorded)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_role(&self, name: &str) -> Result<(), StoreFault> {
        self.roles
            .write()
            .map_err(|_| poisoned())?
            .insert(Role::from(name));
        Ok(())
    }

    pub fn create_user(&self, id: UserId, user_name: &str) -> Result<UserRecord, StoreFault> {
        let record = UserRecord {
            id: id.clone(),
            user_name: user_name.to_string(),
        };
        self.users.write().map_err(|_| poisoned())?.insert(
            id,
            UserEntry {
                record: record.clone(),
                roles: BTreeSet::new(),
                claims: BTreeSet::new(),
            },
        );
        Ok(record)
    }

    /// Register a user under a freshly generated ID.
    pub fn register_user(&self, user_name: &str) -> Result<UserRecord, StoreFault> {
        self.create_user(UserId::generate(), user_name)
    }

    pub fn seed_role(&self, user: &UserId, role: &str) -> Result<(), StoreFault> {
        self.with_entry(user, |entry| {
            entry.roles.insert(Role::from(role));
        })
    }

    pub fn seed_claim(&self, user: &UserId, claim_type: &str, value: &str) -> Result<(), StoreFault> {
        self.with_entry(user, |entry| {
            entry.claims.insert(Claim::new(claim_type, value));
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection / fault injection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// While set, every trait call fails with [`StoreFault::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn snapshot(&self, user: &UserId) -> Option<(BTreeSet<Role>, BTreeSet<Claim>)> {
        let users = self.users.read().ok()?;
        users
            .get(user)
            .map(|e| (e.roles.clone(), e.claims.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn enter(&self, call: StoreCall) -> Result<(), StoreFault> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreFault::unavailable("in-memory store marked unavailable"));
        }
        Ok(())
    }

    fn with_entry<F>(&self, user: &UserId, f: F) -> Result<(), StoreFault>
    where
        F: FnOnce(&mut UserEntry),
    {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let entry = users
            .get_mut(user)
            .ok_or_else(|| StoreFault::corrupt(format!("unknown user {user}")))?;
        f(entry);
        Ok(())
    }

    /// Validate a batch against the user's entry and apply it only when every
    /// item passes.
    fn mutate<T, V, A>(
        &self,
        user: &UserRecord,
        items: &BTreeSet<T>,
        validate: V,
        apply: A,
    ) -> Result<MutationResult, StoreFault>
    where
        V: Fn(&UserEntry, &T) -> Option<StoreErrorDetail>,
        A: Fn(&mut UserEntry, &T),
    {
        if items.is_empty() {
            return Ok(MutationResult::failed(vec![StoreErrorDetail::new(
                "EmptyBatch",
                "No items were supplied.",
            )]));
        }

        let mut users = self.users.write().map_err(|_| poisoned())?;
        let Some(entry) = users.get_mut(&user.id) else {
            return Ok(MutationResult::failed(vec![StoreErrorDetail::new(
                "UserNotFound",
                format!("User '{}' does not exist.", user.id),
            )]));
        };

        let errors: Vec<StoreErrorDetail> =
            items.iter().filter_map(|item| validate(entry, item)).collect();
        if !errors.is_empty() {
            tracing::debug!(user_id = %user.id, rejected = errors.len(), "batch rejected");
            return Ok(MutationResult::failed(errors));
        }

        for item in items {
            apply(entry, item);
        }
        Ok(MutationResult::success())
    }

    fn read_entry<R>(&self, user: &UserRecord, f: impl FnOnce(&UserEntry) -> R) -> Result<R, StoreFault> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let entry = users
            .get(&user.id)
            .ok_or_else(|| StoreFault::corrupt(format!("unknown user {}", user.id)))?;
        Ok(f(entry))
    }
}

fn poisoned() -> StoreFault {
    StoreFault::unavailable("lock poisoned")
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreFault> {
        self.enter(StoreCall::FindById(id.clone()))?;
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(id).map(|e| e.record.clone()))
    }

    async fn roles_of(&self, user: &UserRecord) -> Result<BTreeSet<Role>, StoreFault> {
        self.enter(StoreCall::RolesOf(user.id.clone()))?;
        self.read_entry(user, |e| e.roles.clone())
    }

    async fn claims_of(&self, user: &UserRecord) -> Result<BTreeSet<Claim>, StoreFault> {
        self.enter(StoreCall::ClaimsOf(user.id.clone()))?;
        self.read_entry(user, |e| e.claims.clone())
    }

    async fn is_in_role(&self, user: &UserRecord, role: &Role) -> Result<bool, StoreFault> {
        self.enter(StoreCall::IsInRole(user.id.clone(), role.clone()))?;
        self.read_entry(user, |e| e.roles.contains(role))
    }

    async fn role_exists(&self, role: &Role) -> Result<bool, StoreFault> {
        self.enter(StoreCall::RoleExists(role.clone()))?;
        Ok(self.roles.read().map_err(|_| poisoned())?.contains(role))
    }

    async fn add_to_roles(
        &self,
        user: &UserRecord,
        roles: &BTreeSet<Role>,
    ) -> Result<MutationResult, StoreFault> {
        self.enter(StoreCall::AddToRoles(user.id.clone(), roles.clone()))?;
        let known = self.roles.read().map_err(|_| poisoned())?.clone();
        self.mutate(
            user,
            roles,
            |entry, role| {
                if !known.contains(role) {
                    Some(StoreErrorDetail::new(
                        "RoleNotFound",
                        format!("Role {role} does not exist."),
                    ))
                } else if entry.roles.contains(role) {
                    Some(StoreErrorDetail::new(
                        "UserAlreadyInRole",
                        format!("User already in role '{role}'."),
                    ))
                } else {
                    None
                }
            },
            |entry, role| {
                entry.roles.insert(role.clone());
            },
        )
    }

    async fn remove_from_roles(
        &self,
        user: &UserRecord,
        roles: &BTreeSet<Role>,
    ) -> Result<MutationResult, StoreFault> {
        self.enter(StoreCall::RemoveFromRoles(user.id.clone(), roles.clone()))?;
        self.mutate(
            user,
            roles,
            |entry, role| {
                (!entry.roles.contains(role)).then(|| {
                    StoreErrorDetail::new("UserNotInRole", format!("User is not in role '{role}'."))
                })
            },
            |entry, role| {
                entry.roles.remove(role);
            },
        )
    }

    async fn add_claims(
        &self,
        user: &UserRecord,
        claims: &BTreeSet<Claim>,
    ) -> Result<MutationResult, StoreFault> {
        self.enter(StoreCall::AddClaims(user.id.clone(), claims.clone()))?;
        self.mutate(
            user,
            claims,
            |entry, claim| {
                entry.claims.contains(claim).then(|| {
                    StoreErrorDetail::new("DuplicateClaim", format!("User already has claim '{claim}'."))
                })
            },
            |entry, claim| {
                entry.claims.insert(claim.clone());
            },
        )
    }

    async fn remove_claims(
        &self,
        user: &UserRecord,
        claims: &BTreeSet<Claim>,
    ) -> Result<MutationResult, StoreFault> {
        self.enter(StoreCall::RemoveClaims(user.id.clone(), claims.clone()))?;
        self.mutate(
            user,
            claims,
            |entry, claim| {
                (!entry.claims.contains(claim)).then(|| {
                    StoreErrorDetail::new("ClaimNotFound", format!("User does not have claim '{claim}'."))
                })
            },
            |entry, claim| {
                entry.claims.remove(claim);
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user() -> (InMemoryIdentityStore, UserRecord) {
        let store = InMemoryIdentityStore::new();
        store.create_role("Admin").unwrap();
        store.create_role("Manager").unwrap();
        let user = store.create_user(UserId::new("u1"), "alice").unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn batches_are_all_or_nothing() {
        let (store, user) = store_with_user();
        store.seed_role(&user.id, "Admin").unwrap();

        let batch = BTreeSet::from([Role::from("Admin"), Role::from("Manager")]);
        let result = store.add_to_roles(&user, &batch).await.unwrap();

        assert!(!result.succeeded());
        assert_eq!(result.descriptions(), vec!["User already in role 'Admin'."]);
        let (roles, _) = store.snapshot(&user.id).unwrap();
        assert_eq!(roles, BTreeSet::from([Role::from("Admin")]));
    }

    #[tokio::test]
    async fn empty_batches_are_rejected() {
        let (store, user) = store_with_user();
        let result = store.remove_from_roles(&user, &BTreeSet::new()).await.unwrap();
        assert!(!result.succeeded());
        assert_eq!(result.errors()[0].code, "EmptyBatch");
    }

    #[tokio::test]
    async fn unknown_roles_are_rejected() {
        let (store, user) = store_with_user();
        let result = store
            .add_to_roles(&user, &BTreeSet::from([Role::from("Ghost")]))
            .await
            .unwrap();
        assert_eq!(result.descriptions(), vec!["Role Ghost does not exist."]);
    }

    #[tokio::test]
    async fn claims_round_trip() {
        let (store, user) = store_with_user();
        let claims = BTreeSet::from([Claim::new("Edit Role", "true")]);

        assert!(store.add_claims(&user, &claims).await.unwrap().succeeded());
        assert!(!store.add_claims(&user, &claims).await.unwrap().succeeded());
        assert_eq!(store.claims_of(&user).await.unwrap(), claims);
        assert!(store.remove_claims(&user, &claims).await.unwrap().succeeded());
        assert!(store.claims_of(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_faults() {
        let (store, user) = store_with_user();
        store.set_unavailable(true);
        assert!(matches!(
            store.find_by_id(&user.id).await,
            Err(StoreFault::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.find_by_id(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let (store, user) = store_with_user();
        store.find_by_id(&user.id).await.unwrap();
        store.roles_of(&user).await.unwrap();

        assert_eq!(
            store.calls(),
            vec![StoreCall::FindById(user.id.clone()), StoreCall::RolesOf(user.id.clone())]
        );
        assert!(store.mutations().is_empty());
    }
}
