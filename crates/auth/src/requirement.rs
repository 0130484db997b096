//! Requirement contract and per-request evaluation context.
//!
//! A requirement can only succeed or abstain. It has no way to force a
//! failure: denial is simply "not every requirement succeeded". This keeps
//! composition monotonic and fail-closed.

use std::collections::BTreeMap;

use serde::Serialize;

use staffdesk_core::{AccessError, AccessResult};
use staffdesk_idcodec::Protector;

use crate::Identity;

/// Result of running one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Succeed,
    Abstain,
}

impl Verdict {
    pub fn succeed_if(condition: bool) -> Self {
        if condition { Self::Succeed } else { Self::Abstain }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeed)
    }
}

/// A single composable authorization rule.
///
/// Implementations are immutable and stateless across evaluations. They must
/// not assume they are the only requirement of a policy.
pub trait Requirement: Send + Sync + core::fmt::Debug {
    /// Label used in decision records and logs.
    fn name(&self) -> String;

    fn evaluate(&self, ctx: &EvaluationContext) -> Verdict;
}

/// Route parameters of the current request.
///
/// Values that identify resources must already be decoded (see
/// [`RouteValues::decode_with`]); requirements never see opaque tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteValues(BTreeMap<String, String>);

impl RouteValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The value for `key`, treating blank values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Replace the opaque token stored under `key` with the decoded id.
    ///
    /// A missing or undecodable token yields [`AccessError::InvalidToken`],
    /// which callers render as "not found".
    pub fn decode_with(&mut self, key: &str, protector: &Protector) -> AccessResult<u64> {
        let token = self.get(key).ok_or(AccessError::InvalidToken)?;
        let id = protector.decode(token)?;
        self.0.insert(key.to_string(), id.to_string());
        Ok(id)
    }
}

/// Outcome of one requirement within a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementOutcome {
    pub requirement: String,
    pub verdict: Verdict,
}

/// Per-request evaluation state.
///
/// Holds the acting identity, the route values, and the verdict accumulator.
/// Only the policy registry records verdicts; requirements get a shared
/// borrow.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    identity: Identity,
    route: RouteValues,
    outcomes: Vec<RequirementOutcome>,
}

impl EvaluationContext {
    pub fn new(identity: Identity, route: RouteValues) -> Self {
        Self {
            identity,
            route,
            outcomes: Vec::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn route(&self) -> &RouteValues {
        &self.route
    }

    pub fn outcomes(&self) -> &[RequirementOutcome] {
        &self.outcomes
    }

    pub(crate) fn record(&mut self, requirement: String, verdict: Verdict) {
        self.outcomes.push(RequirementOutcome {
            requirement,
            verdict,
        });
    }

    pub(crate) fn reset(&mut self) {
        self.outcomes.clear();
    }

    pub(crate) fn into_parts(self) -> (Identity, Vec<RequirementOutcome>) {
        (self.identity, self.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use staffdesk_idcodec::{IdCodec, MasterKey};

    use super::*;

    #[test]
    fn blank_route_values_are_absent() {
        let route = RouteValues::new().with("id", "  ").with("page", "2");
        assert_eq!(route.get("id"), None);
        assert_eq!(route.get("page"), Some("2"));
        assert_eq!(route.get("missing"), None);
    }

    #[test]
    fn decode_with_replaces_token() {
        let protector = IdCodec::new(MasterKey::from_bytes([1; 32]))
            .protector("EmployeeIdRouteValue")
            .unwrap();
        let token = protector.encode(31).unwrap();

        let mut route = RouteValues::new().with("id", token);
        assert_eq!(route.decode_with("id", &protector), Ok(31));
        assert_eq!(route.get("id"), Some("31"));
    }

    #[test]
    fn decode_with_rejects_garbage_and_missing() {
        let protector = IdCodec::new(MasterKey::from_bytes([1; 32]))
            .protector("EmployeeIdRouteValue")
            .unwrap();

        let mut route = RouteValues::new().with("id", "12");
        assert_eq!(
            route.decode_with("id", &protector),
            Err(AccessError::InvalidToken)
        );
        assert_eq!(
            RouteValues::new().decode_with("id", &protector),
            Err(AccessError::InvalidToken)
        );
    }
}
