//! Infrastructure layer: identity store adapters.

pub mod identity_store;
