//! `staffdesk-auth`: authorization decisions and membership reconciliation.
//!
//! This crate is decoupled from HTTP and storage: identity data comes from an
//! [`IdentityStore`] implementation supplied by the caller.

pub mod claims;
pub mod gate;
pub mod identity;
pub mod membership;
pub mod policy;
pub mod reconcile;
pub mod requirement;
pub mod requirements;
pub mod roles;
pub mod store;

pub use claims::Claim;
pub use gate::{AccessGate, GateOutcome, RequestContext};
pub use identity::Identity;
pub use membership::{
    BatchOutcome, MemberChange, MemberSelection, MembershipReconciler, ReconcileReport,
    RoleMembersReport, SideReport,
};
pub use policy::{Decision, DecisionState, Policy, PolicyRegistry, PolicyRegistryBuilder};
pub use reconcile::{MembershipDelta, reconcile, reconcile_claims};
pub use requirement::{EvaluationContext, Requirement, RouteValues, Verdict};
pub use requirements::{AnyOf, RequireClaim, RequireRole, SelfEditExclusion};
pub use roles::Role;
pub use store::{IdentityStore, MutationResult, StoreErrorDetail, UserRecord};
