//! Named policies and the registry that evaluates them.
//!
//! The registry is built once at startup and is immutable afterwards; share
//! it behind an `Arc`. There is no global lookup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use staffdesk_core::{AccessConfig, ConfigError, UserId};

use crate::requirement::{EvaluationContext, Requirement, RequirementOutcome};
use crate::requirements::{AnyOf, RequireClaim, RequireRole, SelfEditExclusion};

/// Policy names registered by [`PolicyRegistry::site_defaults`].
pub mod names {
    pub const ADMIN_ROLE: &str = "AdminRolePolicy";
    pub const DELETE_ROLE: &str = "DeleteRolePolicy";
    pub const EDIT_ROLE_CLAIM: &str = "EditRoleClaimPolicy";
    pub const EDIT_ROLE: &str = "EditRolePolicy";
}

/// Decision state machine: `Pending -> {Succeeded | Pending}`.
///
/// There is no explicit failure state. A decision still `Pending` after every
/// requirement has run is a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Pending,
    Succeeded,
}

/// Auditable record of one policy evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub policy: String,
    pub user_id: UserId,
    pub state: DecisionState,
    pub outcomes: Vec<RequirementOutcome>,
    pub evaluated_at: DateTime<Utc>,
}

impl Decision {
    pub fn allowed(&self) -> bool {
        self.state == DecisionState::Succeeded
    }

    /// Decision for an acting identity the store no longer knows.
    pub(crate) fn unknown_identity(policy: &str, user_id: UserId) -> Self {
        Self {
            policy: policy.to_string(),
            user_id,
            state: DecisionState::Pending,
            outcomes: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }
}

/// A named, ordered list of requirements. All must succeed.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    requirements: Vec<Arc<dyn Requirement>>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
        }
    }

    pub fn require(mut self, requirement: impl Requirement + 'static) -> Self {
        self.requirements.push(Arc::new(requirement));
        self
    }

    pub fn require_shared(mut self, requirement: Arc<dyn Requirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn require_role(self, role: &str) -> Self {
        self.require(RequireRole::new(role.to_string()))
    }

    pub fn require_claim(self, claim_type: &str, value: &str) -> Self {
        self.require(RequireClaim::new(claim_type).with_value(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &self.requirements
    }

    /// Run every requirement in registration order, recording each verdict.
    ///
    /// All requirements run even after one abstains, so the decision record
    /// is complete.
    fn evaluate(&self, ctx: &mut EvaluationContext) -> DecisionState {
        ctx.reset();
        let mut all_succeeded = true;
        for requirement in &self.requirements {
            let verdict = requirement.evaluate(ctx);
            all_succeeded &= verdict.is_success();
            ctx.record(requirement.name(), verdict);
        }

        if all_succeeded && !self.requirements.is_empty() {
            DecisionState::Succeeded
        } else {
            DecisionState::Pending
        }
    }
}

#[derive(Debug, Default)]
pub struct PolicyRegistryBuilder {
    policies: Vec<Policy>,
}

impl PolicyRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicatePolicy`] when two policies share a name.
    /// - [`ConfigError::EmptyPolicy`] when a policy has no requirements.
    pub fn build(self) -> Result<PolicyRegistry, ConfigError> {
        let mut policies = HashMap::with_capacity(self.policies.len());
        for policy in self.policies {
            if policy.requirements.is_empty() {
                return Err(ConfigError::EmptyPolicy(policy.name));
            }
            if policies.contains_key(&policy.name) {
                return Err(ConfigError::DuplicatePolicy(policy.name));
            }
            policies.insert(policy.name.clone(), policy);
        }
        Ok(PolicyRegistry { policies })
    }
}

/// Immutable map of policy name to policy.
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::new()
    }

    /// The site's policy set.
    ///
    /// | policy | requirements |
    /// |---|---|
    /// | `AdminRolePolicy` | role `admin_role` |
    /// | `DeleteRolePolicy` | claim `delete_claim_type` = granted value |
    /// | `EditRoleClaimPolicy` | claim `edit_claim_type` = granted value |
    /// | `EditRolePolicy` | self-edit exclusion, or `super_admin_role` when configured |
    pub fn site_defaults(config: &AccessConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let self_edit = SelfEditExclusion::new(
            config.admin_role.clone(),
            config.edit_claim_type.clone(),
            config.granted_claim_value.clone(),
            config.target_route_key.clone(),
        );
        let edit_role = match &config.super_admin_role {
            Some(super_admin) => Policy::new(names::EDIT_ROLE).require(AnyOf::new(vec![
                Arc::new(self_edit),
                Arc::new(RequireRole::new(super_admin.clone())),
            ])),
            None => Policy::new(names::EDIT_ROLE).require(self_edit),
        };

        Self::builder()
            .add(Policy::new(names::ADMIN_ROLE).require_role(&config.admin_role))
            .add(
                Policy::new(names::DELETE_ROLE)
                    .require_claim(&config.delete_claim_type, &config.granted_claim_value),
            )
            .add(
                Policy::new(names::EDIT_ROLE_CLAIM)
                    .require_claim(&config.edit_claim_type, &config.granted_claim_value),
            )
            .add(edit_role)
            .build()
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Evaluate `name` against `ctx`. `None` when the policy is not
    /// registered; callers must treat that as a configuration fault.
    pub fn evaluate(&self, name: &str, ctx: &mut EvaluationContext) -> Option<DecisionState> {
        self.policies.get(name).map(|policy| policy.evaluate(ctx))
    }

    /// Evaluate and consume the context into a [`Decision`] record.
    pub fn decide(&self, name: &str, mut ctx: EvaluationContext) -> Option<Decision> {
        let state = self.evaluate(name, &mut ctx)?;
        let (identity, outcomes) = ctx.into_parts();
        Some(Decision {
            policy: name.to_string(),
            user_id: identity.id,
            state,
            outcomes,
            evaluated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use staffdesk_core::UserId;

    use super::*;
    use crate::requirement::{RouteValues, Verdict};
    use crate::Identity;

    fn registry() -> PolicyRegistry {
        PolicyRegistry::site_defaults(&AccessConfig::default()).unwrap()
    }

    fn editing(identity: Identity, target: &str) -> EvaluationContext {
        EvaluationContext::new(identity, RouteValues::new().with("id", target))
    }

    fn admin_u1() -> Identity {
        Identity::new(UserId::new("U1"))
            .with_role("Admin")
            .with_claim("Edit Role", "true")
    }

    #[test]
    fn defaults_register_site_policies() {
        assert_eq!(
            registry().names(),
            vec![
                names::ADMIN_ROLE,
                names::DELETE_ROLE,
                names::EDIT_ROLE_CLAIM,
                names::EDIT_ROLE
            ]
        );
    }

    #[test]
    fn self_edit_denied_other_edit_allowed() {
        let registry = registry();

        let own = registry.decide(names::EDIT_ROLE, editing(admin_u1(), "U1")).unwrap();
        assert_eq!(own.state, DecisionState::Pending);
        assert!(!own.allowed());

        let other = registry.decide(names::EDIT_ROLE, editing(admin_u1(), "U2")).unwrap();
        assert_eq!(other.state, DecisionState::Succeeded);
        assert_eq!(other.outcomes.len(), 1);
        assert_eq!(other.outcomes[0].verdict, Verdict::Succeed);
    }

    #[test]
    fn unknown_policy_is_none() {
        let mut ctx = editing(admin_u1(), "U2");
        assert_eq!(registry().evaluate("NoSuchPolicy", &mut ctx), None);
    }

    #[test]
    fn requirements_are_anded_and_all_recorded() {
        let registry = PolicyRegistry::builder()
            .add(
                Policy::new("AdminAndDelete")
                    .require_role("Admin")
                    .require_claim("Delete Role", "true"),
            )
            .build()
            .unwrap();

        let decision = registry
            .decide("AdminAndDelete", editing(admin_u1(), "U2"))
            .unwrap();
        assert_eq!(decision.state, DecisionState::Pending);
        assert_eq!(
            decision
                .outcomes
                .iter()
                .map(|o| o.verdict)
                .collect::<Vec<_>>(),
            vec![Verdict::Succeed, Verdict::Abstain]
        );
    }

    #[test]
    fn builder_rejects_duplicates_and_empty_policies() {
        let dup = PolicyRegistry::builder()
            .add(Policy::new("P").require_role("Admin"))
            .add(Policy::new("P").require_role("Manager"))
            .build();
        assert_eq!(dup.unwrap_err(), ConfigError::DuplicatePolicy("P".into()));

        let empty = PolicyRegistry::builder().add(Policy::new("Nothing")).build();
        assert_eq!(empty.unwrap_err(), ConfigError::EmptyPolicy("Nothing".into()));
    }

    #[test]
    fn super_admin_branch_is_configurable() {
        let sup = Identity::new(UserId::new("U1")).with_role("Super Admin");

        let with_branch = registry();
        assert!(with_branch
            .decide(names::EDIT_ROLE, editing(sup.clone(), "U1"))
            .unwrap()
            .allowed());

        let config = AccessConfig {
            super_admin_role: None,
            ..AccessConfig::default()
        };
        let without = PolicyRegistry::site_defaults(&config).unwrap();
        assert!(!without
            .decide(names::EDIT_ROLE, editing(sup, "U1"))
            .unwrap()
            .allowed());
    }

    #[test]
    fn decision_serializes_for_audit() {
        let decision = registry()
            .decide(names::ADMIN_ROLE, editing(admin_u1(), "U2"))
            .unwrap();
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["policy"], "AdminRolePolicy");
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["outcomes"][0]["verdict"], "succeed");
    }
}
