//! Identity store adapters.
//!
//! The contract lives in `staffdesk_auth::store`; this module provides
//! implementations of it.

pub mod in_memory;

pub use in_memory::{InMemoryIdentityStore, StoreCall};
