//! `staffdesk-idcodec`: reversible, tamper-evident obfuscation of numeric IDs.
//!
//! Internal integer primary keys never appear in URLs. Outbound links carry
//! an opaque token minted under a purpose; inbound tokens are decoded (and
//! authenticated) before any store lookup happens.
//!
//! ```ignore
//! let codec = IdCodec::new(MasterKey::generate());
//! let employees = codec.protector(purposes::EMPLOYEE_ID_ROUTE_VALUE)?;
//! let token = employees.encode(42)?;
//! assert_eq!(employees.decode(&token)?, 42);
//! ```

pub mod codec;
pub mod error;
pub mod key;
pub mod purpose;

pub use codec::{IdCodec, Protector};
pub use error::CodecError;
pub use key::MasterKey;
pub use purpose::{Purpose, purposes};
