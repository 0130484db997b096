//! Access gate: the integration point for the routing layer.
//!
//! Resolves a policy by name, reloads the acting identity from the store, and
//! returns Allow / Deny / PolicyNotFound. A missing policy is a server
//! misconfiguration: it is logged loudly and never allows.

use std::sync::Arc;

use staffdesk_core::{AccessError, AccessResult, StoreFault, UserId};

use crate::policy::{Decision, PolicyRegistry};
use crate::requirement::{EvaluationContext, RouteValues};
use crate::store::IdentityStore;

/// What the routing layer hands the gate for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub acting_user: UserId,
    pub route: RouteValues,
}

impl RequestContext {
    pub fn new(acting_user: UserId, route: RouteValues) -> Self {
        Self { acting_user, route }
    }
}

#[derive(Debug, Clone)]
pub enum GateOutcome {
    Allow(Decision),
    Deny(Decision),
    /// The requested policy is not registered (configuration fault).
    PolicyNotFound(String),
}

impl GateOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Allow(d) | Self::Deny(d) => Some(d),
            Self::PolicyNotFound(_) => None,
        }
    }

    /// Map to the shared error taxonomy: denial becomes
    /// [`AccessError::Forbidden`], a missing policy
    /// [`AccessError::PolicyNotFound`].
    pub fn into_result(self) -> AccessResult<Decision> {
        match self {
            Self::Allow(d) => Ok(d),
            Self::Deny(d) => Err(AccessError::Forbidden(d.policy)),
            Self::PolicyNotFound(name) => Err(AccessError::PolicyNotFound(name)),
        }
    }
}

pub struct AccessGate<S: ?Sized> {
    registry: Arc<PolicyRegistry>,
    store: Arc<S>,
}

impl<S: ?Sized> Clone for AccessGate<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AccessGate<S>
where
    S: IdentityStore + ?Sized,
{
    pub fn new(registry: Arc<PolicyRegistry>, store: Arc<S>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Decide whether `request` may pass `policy`.
    ///
    /// The acting identity's roles and claims are read from the store on every
    /// call. Only store faults are errors.
    pub async fn authorize(
        &self,
        policy: &str,
        request: &RequestContext,
    ) -> Result<GateOutcome, StoreFault> {
        if !self.registry.contains(policy) {
            tracing::error!(
                policy,
                user_id = %request.acting_user,
                "authorization policy is not registered; denying request"
            );
            return Ok(GateOutcome::PolicyNotFound(policy.to_string()));
        }

        let Some(identity) = self.store.load_identity(&request.acting_user).await? else {
            tracing::debug!(
                policy,
                user_id = %request.acting_user,
                "acting identity not found in store; denying"
            );
            return Ok(GateOutcome::Deny(Decision::unknown_identity(
                policy,
                request.acting_user.clone(),
            )));
        };

        let ctx = EvaluationContext::new(identity, request.route.clone());
        let Some(decision) = self.registry.decide(policy, ctx) else {
            return Ok(GateOutcome::PolicyNotFound(policy.to_string()));
        };

        if decision.allowed() {
            tracing::debug!(policy, user_id = %decision.user_id, "authorization granted");
            Ok(GateOutcome::Allow(decision))
        } else {
            tracing::debug!(
                policy,
                user_id = %decision.user_id,
                outcomes = ?decision.outcomes,
                "authorization denied"
            );
            Ok(GateOutcome::Deny(decision))
        }
    }

    /// [`AccessGate::authorize`] folded into [`AccessError`].
    pub async fn require(&self, policy: &str, request: &RequestContext) -> AccessResult<Decision> {
        self.authorize(policy, request).await?.into_result()
    }
}
