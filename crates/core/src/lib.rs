//! `staffdesk-core`: foundation types shared by the access-control crates.
//!
//! This crate contains **no I/O**: error taxonomy, identifiers, configuration.

pub mod config;
pub mod error;
pub mod id;

pub use config::{AccessConfig, ClaimMatch, ConfigError};
pub use error::{AccessError, AccessResult, StoreFault};
pub use id::UserId;
