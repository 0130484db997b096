//! Purpose strings scope tokens to a single use.
//!
//! A token minted for one purpose never decodes under another, so an
//! employee-route token cannot be replayed where, say, a document token is
//! expected.

use crate::error::CodecError;

/// Well-known purposes used by the site.
pub mod purposes {
    /// Employee IDs carried in route values.
    pub const EMPLOYEE_ID_ROUTE_VALUE: &str = "EmployeeIdRouteValue";
}

const MAX_PURPOSE_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Purpose(String);

impl Purpose {
    /// Validate and wrap a purpose name.
    ///
    /// Purposes are configuration, not user input: non-empty printable ASCII,
    /// at most 128 bytes.
    pub fn new(name: impl Into<String>) -> Result<Self, CodecError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CodecError::InvalidPurpose("empty".to_string()));
        }
        if name.len() > MAX_PURPOSE_LEN {
            return Err(CodecError::InvalidPurpose(format!(
                "longer than {MAX_PURPOSE_LEN} bytes"
            )));
        }
        if !name.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(CodecError::InvalidPurpose(
                "must be printable ASCII".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl core::fmt::Display for Purpose {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Purpose {
    type Error = CodecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
