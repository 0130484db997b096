//! Built-in requirements.

use std::sync::Arc;

use crate::requirement::{EvaluationContext, Requirement, Verdict};
use crate::Role;

/// Succeeds iff the identity holds `role`.
#[derive(Debug, Clone)]
pub struct RequireRole {
    role: Role,
}

impl RequireRole {
    pub fn new(role: impl Into<Role>) -> Self {
        Self { role: role.into() }
    }
}

impl Requirement for RequireRole {
    fn name(&self) -> String {
        format!("RequireRole({})", self.role)
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Verdict {
        Verdict::succeed_if(ctx.identity().has_role(self.role.as_str()))
    }
}

/// Succeeds iff the identity holds a claim of `claim_type` whose value is one
/// of `allowed` (any non-blank value when `allowed` is empty).
#[derive(Debug, Clone)]
pub struct RequireClaim {
    claim_type: String,
    allowed: Vec<String>,
}

impl RequireClaim {
    pub fn new(claim_type: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            allowed: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.allowed.push(value.into());
        self
    }
}

impl Requirement for RequireClaim {
    fn name(&self) -> String {
        if self.allowed.is_empty() {
            format!("RequireClaim({})", self.claim_type)
        } else {
            format!("RequireClaim({} in [{}])", self.claim_type, self.allowed.join(", "))
        }
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Verdict {
        let identity = ctx.identity();
        let held = if self.allowed.is_empty() {
            identity.has_claim_type(&self.claim_type)
        } else {
            self.allowed
                .iter()
                .any(|v| identity.has_claim(&self.claim_type, v))
        };
        Verdict::succeed_if(held)
    }
}

/// Lets an administrator manage roles and claims of *other* users only.
///
/// Succeeds iff all of:
/// - the identity holds the administrative role;
/// - the identity holds the edit claim with the granted value;
/// - the identity's own ID differs (case-insensitively) from the target ID in
///   the route.
///
/// Abstains when the route has no target (list views): pair it with a plain
/// role policy where a stronger guarantee is needed.
#[derive(Debug, Clone)]
pub struct SelfEditExclusion {
    admin_role: Role,
    claim_type: String,
    claim_value: String,
    route_key: String,
}

impl SelfEditExclusion {
    pub fn new(
        admin_role: impl Into<Role>,
        claim_type: impl Into<String>,
        claim_value: impl Into<String>,
        route_key: impl Into<String>,
    ) -> Self {
        Self {
            admin_role: admin_role.into(),
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
            route_key: route_key.into(),
        }
    }
}

impl Requirement for SelfEditExclusion {
    fn name(&self) -> String {
        "SelfEditExclusion".to_string()
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Verdict {
        let Some(target) = ctx.route().get(&self.route_key) else {
            return Verdict::Abstain;
        };

        let identity = ctx.identity();
        if identity.id.is_empty() {
            return Verdict::Abstain;
        }

        Verdict::succeed_if(
            identity.has_role(self.admin_role.as_str())
                && identity.has_claim(&self.claim_type, &self.claim_value)
                && !identity.id.matches(target),
        )
    }
}

/// Several handlers serving one requirement: succeeds iff any inner
/// requirement succeeds. Empty never succeeds.
#[derive(Debug, Clone)]
pub struct AnyOf {
    inner: Vec<Arc<dyn Requirement>>,
}

impl AnyOf {
    pub fn new(inner: Vec<Arc<dyn Requirement>>) -> Self {
        Self { inner }
    }
}

impl Requirement for AnyOf {
    fn name(&self) -> String {
        let names: Vec<String> = self.inner.iter().map(|r| r.name()).collect();
        format!("AnyOf({})", names.join(" | "))
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Verdict {
        Verdict::succeed_if(self.inner.iter().any(|r| r.evaluate(ctx).is_success()))
    }
}
