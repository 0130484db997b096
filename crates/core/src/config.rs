//! Process-wide access-control configuration.
//!
//! Built once at startup and passed by reference into the policy registry and
//! the membership reconciler. Nothing here is mutated after initialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error (startup-time only).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("malformed configuration document: {0}")]
    Malformed(String),

    #[error("duplicate policy name '{0}'")]
    DuplicatePolicy(String),

    #[error("policy '{0}' has no requirements")]
    EmptyPolicy(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// How claim membership is compared during reconciliation.
///
/// Administrators select claim *types*; a claim is formally a `(type, value)`
/// pair. `ByType` treats "type present" as membership regardless of the stored
/// value. `ByTypeAndValue` requires the stored value to equal the granted
/// value, so a held claim with a different value is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimMatch {
    #[default]
    ByType,
    ByTypeAndValue,
}

impl core::str::FromStr for ClaimMatch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "by_type" | "type" => Ok(Self::ByType),
            "by_type_and_value" | "type_and_value" => Ok(Self::ByTypeAndValue),
            other => Err(ConfigError::invalid(
                "STAFFDESK_CLAIM_MATCH",
                format!("expected by_type or by_type_and_value, got '{other}'"),
            )),
        }
    }
}

/// Access-control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Role that marks an identity as an administrator.
    pub admin_role: String,

    /// Role that may edit any administrator, including itself. `None` disables
    /// the super-admin branch of the edit policy.
    pub super_admin_role: Option<String>,

    /// Claim type authorizing edits of roles and claims.
    pub edit_claim_type: String,

    /// Claim type authorizing role deletion.
    pub delete_claim_type: String,

    /// Claim value that counts as granted.
    pub granted_claim_value: String,

    /// Claim comparison strategy used by the reconciler.
    pub claim_match: ClaimMatch,

    /// Route parameter carrying the target resource identifier.
    pub target_route_key: String,

    /// Claim types an administrator may assign.
    pub claims_catalog: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_role: "Admin".to_string(),
            super_admin_role: Some("Super Admin".to_string()),
            edit_claim_type: "Edit Role".to_string(),
            delete_claim_type: "Delete Role".to_string(),
            granted_claim_value: "true".to_string(),
            claim_match: ClaimMatch::ByType,
            target_route_key: "id".to_string(),
            claims_catalog: vec![
                "Create Role".to_string(),
                "Edit Role".to_string(),
                "Delete Role".to_string(),
            ],
        }
    }
}

impl AccessConfig {
    /// Load configuration from `STAFFDESK_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AccessConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = non_empty(&lookup, "STAFFDESK_ADMIN_ROLE") {
            config.admin_role = v;
        }
        if let Some(v) = lookup("STAFFDESK_SUPER_ADMIN_ROLE") {
            // Explicitly empty disables the super-admin branch.
            let v = v.trim().to_string();
            config.super_admin_role = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_EDIT_CLAIM") {
            config.edit_claim_type = v;
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_DELETE_CLAIM") {
            config.delete_claim_type = v;
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_GRANTED_CLAIM_VALUE") {
            config.granted_claim_value = v;
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_CLAIM_MATCH") {
            config.claim_match = v.parse()?;
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_TARGET_ROUTE_KEY") {
            config.target_route_key = v;
        }
        if let Some(v) = non_empty(&lookup, "STAFFDESK_CLAIMS_CATALOG") {
            config.claims_catalog = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json_str(doc: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(doc).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_role.trim().is_empty() {
            return Err(ConfigError::invalid("admin_role", "must not be empty"));
        }
        if self.edit_claim_type.trim().is_empty() {
            return Err(ConfigError::invalid("edit_claim_type", "must not be empty"));
        }
        if self.granted_claim_value.is_empty() {
            return Err(ConfigError::invalid("granted_claim_value", "must not be empty"));
        }
        if self.target_route_key.trim().is_empty() {
            return Err(ConfigError::invalid("target_route_key", "must not be empty"));
        }
        Ok(())
    }

    /// Whether `claim_type` is one an administrator may assign.
    pub fn is_catalogued(&self, claim_type: &str) -> bool {
        self.claims_catalog.iter().any(|c| c == claim_type)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_site() {
        let config = AccessConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AccessConfig::default());
        assert_eq!(config.admin_role, "Admin");
        assert_eq!(config.claim_match, ClaimMatch::ByType);
        assert!(config.is_catalogued("Edit Role"));
    }

    #[test]
    fn env_overrides_apply() {
        let config = AccessConfig::from_lookup(lookup_from(&[
            ("STAFFDESK_ADMIN_ROLE", "Administrators"),
            ("STAFFDESK_SUPER_ADMIN_ROLE", ""),
            ("STAFFDESK_CLAIM_MATCH", "by_type_and_value"),
            ("STAFFDESK_CLAIMS_CATALOG", "Edit Role, Audit ,"),
        ]))
        .unwrap();

        assert_eq!(config.admin_role, "Administrators");
        assert_eq!(config.super_admin_role, None);
        assert_eq!(config.claim_match, ClaimMatch::ByTypeAndValue);
        assert_eq!(config.claims_catalog, vec!["Edit Role", "Audit"]);
    }

    #[test]
    fn unknown_claim_match_is_rejected() {
        let err = AccessConfig::from_lookup(lookup_from(&[("STAFFDESK_CLAIM_MATCH", "fuzzy")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn json_document_fills_defaults() {
        let config =
            AccessConfig::from_json_str(r#"{ "claim_match": "by_type_and_value" }"#).unwrap();
        assert_eq!(config.claim_match, ClaimMatch::ByTypeAndValue);
        assert_eq!(config.edit_claim_type, "Edit Role");

        assert!(matches!(
            AccessConfig::from_json_str(r#"{ "admin_role": "" }"#),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AccessConfig::from_json_str("not json"),
            Err(ConfigError::Malformed(_))
        ));
    }
}
