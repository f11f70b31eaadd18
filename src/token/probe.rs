//! Unauthenticated look inside a compact JWS.
//!
//! Nothing here checks a signature. [`UnverifiedEnvelope`] deliberately
//! exposes only routing metadata (issuer, key id, algorithm) and never the
//! identity claims, so it cannot stand in for a verified [`Token`].
//!
//! [`Token`]: crate::token::Token

use crate::config;
use crate::error::TokenError;
use crate::token::claims::names;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

/// Header and issuer of a compact JWS, read without verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedEnvelope {
    algorithm: String,
    key_id: Option<String>,
    issuer: Option<String>,
}

impl UnverifiedEnvelope {
    /// Parse the three-segment envelope. Any `alg`, including `none`, is accepted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if `input` is not header.payload.signature with
    /// base64url JSON objects in the first two segments.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        let mut segments = input.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::invalid_token("JWS must have three segments"));
        };

        let header = decode_object(header, "header")?;
        let payload = decode_object(payload, "payload")?;
        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| TokenError::invalid_token_caused_by("JWS signature is not base64url", e))?;

        let algorithm = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| TokenError::invalid_token("JWS header has no alg"))?
            .to_string();

        Ok(Self {
            algorithm,
            key_id: header.get("kid").and_then(Value::as_str).map(str::to_string),
            issuer: payload.get(names::ISS).and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Declared `alg` header.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Declared `kid` header.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Unverified `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }
}

/// Whether `input` looks like a token from a trusted issuer.
///
/// Shape and issuer plausibility only: no signature check, no decryption,
/// no expiry check. Never errors.
#[must_use]
pub fn is_token(input: &str) -> bool {
    UnverifiedEnvelope::parse(input)
        .ok()
        .and_then(|envelope| {
            envelope
                .issuer()
                .map(|issuer| config::current().trusts_issuer(issuer))
        })
        .unwrap_or(false)
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>, TokenError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        TokenError::invalid_token_caused_by(format!("JWS {} is not base64url", what), e)
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        TokenError::invalid_token_caused_by(format!("JWS {} is not a JSON object", what), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::DEFAULT_ISSUER;

    fn unsigned(header: &str, payload: &str) -> String {
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_parse_unsigned_envelope() {
        let input = unsigned(r#"{"alg":"none","kid":"k1"}"#, r#"{"iss":"bridge","sub":"x"}"#);
        let envelope = UnverifiedEnvelope::parse(&input).unwrap();

        assert_eq!(envelope.algorithm(), "none");
        assert_eq!(envelope.key_id(), Some("k1"));
        assert_eq!(envelope.issuer(), Some("bridge"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "asdf1234stuff", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(UnverifiedEnvelope::parse(input).is_err(), "{input}");
        }
        let array_payload = unsigned(r#"{"alg":"none"}"#, "[1,2]");
        assert!(UnverifiedEnvelope::parse(&array_payload).is_err());
        let no_alg = unsigned("{}", r#"{"iss":"x"}"#);
        assert!(UnverifiedEnvelope::parse(&no_alg).is_err());
    }

    #[test]
    fn test_is_token_checks_issuer() {
        let ours = unsigned(r#"{"alg":"none"}"#, &format!(r#"{{"iss":"{}"}}"#, DEFAULT_ISSUER));
        let theirs = unsigned(r#"{"alg":"none"}"#, r#"{"iss":"bridge"}"#);
        let anonymous = unsigned(r#"{"alg":"none"}"#, r#"{"sub":"x"}"#);

        assert!(is_token(&ours));
        assert!(!is_token(&theirs));
        assert!(!is_token(&anonymous));
        assert!(!is_token("asdf1234stuff"));

        let trusted = crate::config::with_config(
            crate::config::Config::options().with_issuers(["bridge"]),
            || is_token(&theirs),
        )
        .unwrap();
        assert!(trusted);
    }
}
