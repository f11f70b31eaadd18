//! Claim names and the claims payload carried by a token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim names used in the payload.
pub mod names {
    /// Issuer
    pub const ISS: &str = "iss";
    /// Unique token id
    pub const JTI: &str = "jti";
    /// Issued-at, epoch seconds
    pub const IAT: &str = "iat";
    /// Expiry, epoch seconds
    pub const EXP: &str = "exp";
    /// Subject user uuid
    pub const SUB: &str = "sub";
    /// Account uuid
    pub const ACCT: &str = "acct";
    /// Tenant domain
    pub const CANVAS_DOMAIN: &str = "canvas_domain";
    /// Masquerading (real) user uuid
    pub const MASQ_SUB: &str = "masq_sub";
    /// Masquerading user's shard id
    pub const MASQ_SHARD: &str = "masq_shard";
    /// Subject global id, diagnostics only
    pub const DEBUG_USER_GLOBAL_ID: &str = "debug_user_global_id";
    /// Masquerading user global id, diagnostics only
    pub const DEBUG_MASQ_GLOBAL_ID: &str = "debug_masq_global_id";
    /// Deployment region hint
    pub const REGION: &str = "region";
    /// Calling client id
    pub const CLIENT_ID: &str = "client_id";
    /// Internal-service flag
    pub const INSTRUCTURE_SERVICE: &str = "instructure_service";
    /// Acting tenant's shard id
    pub const CANVAS_SHARD_ID: &str = "canvas_shard_id";
}

/// Claims payload. Only claims that were set are present; there are no
/// null-valued entries in a payload built by this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub(crate) fn set_opt<V: Into<Value>>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    /// Raw claim value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim value if it is a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Claim value if it is an integer.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Whether the claim is present at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Names of the claims present.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of claims present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no claims are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_opt_skips_none() {
        let mut claims = Claims::new();
        claims.set(names::SUB, "user");
        claims.set_opt::<String>(names::REGION, None);
        claims.set_opt(names::CANVAS_SHARD_ID, Some(3));

        assert_eq!(claims.len(), 2);
        assert!(!claims.contains(names::REGION));
        assert_eq!(claims.get_i64(names::CANVAS_SHARD_ID), Some(3));
        assert_eq!(claims.get_str(names::SUB), Some("user"));
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let mut claims = Claims::new();
        claims.set(names::ACCT, "acct");
        claims.set(names::INSTRUCTURE_SERVICE, true);

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({"acct": "acct", "instructure_service": true}));
    }

    #[test]
    fn test_typed_getters_do_not_coerce() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "masq_shard": "5",
            "sub": 42
        }))
        .unwrap();

        assert_eq!(claims.get_i64(names::MASQ_SHARD), None);
        assert_eq!(claims.get_str(names::SUB), None);
        assert!(claims.contains(names::SUB));
    }
}
