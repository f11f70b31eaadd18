//! Access tokens: claims, construction, wire format and verification.

pub mod builder;
pub mod claims;
pub mod codec;
pub mod probe;
pub mod trust;

pub use builder::UserTokenBuilder;
pub use claims::Claims;
pub use probe::UnverifiedEnvelope;
pub use trust::VerificationKey;

use claims::names;
use serde_json::Value;

/// Issuer identifier of tokens produced by this crate. Always trusted.
pub const DEFAULT_ISSUER: &str = "instructure:inst_access";

/// Lifetime of a freshly built token.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// An immutable identity assertion.
///
/// Only built through [`Token::for_user`] or recovered from a verified
/// string with [`Token::from_token_string`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    claims: Claims,
}

impl Token {
    /// Issuer identifier of tokens produced by this crate.
    pub const DEFAULT_ISSUER: &'static str = DEFAULT_ISSUER;

    /// Start building a token for a user in an account.
    ///
    /// Both uuids are mandatory; blank values fail at `build()` with
    /// `InvalidArgument`.
    pub fn for_user(
        user_uuid: impl Into<String>,
        account_uuid: impl Into<String>,
    ) -> UserTokenBuilder {
        UserTokenBuilder::new(user_uuid.into(), account_uuid.into())
    }

    /// Cheap, unauthenticated check that `input` looks like one of our
    /// tokens. Never use the result for authorization.
    #[must_use]
    pub fn is_token(input: &str) -> bool {
        probe::is_token(input)
    }

    pub(crate) fn from_claims(claims: Claims) -> Self {
        Token { claims }
    }

    /// Full claims payload.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Subject (`sub`).
    #[must_use]
    pub fn user_uuid(&self) -> Option<&str> {
        self.claims.get_str(names::SUB)
    }

    /// Account the subject belongs to (`acct`).
    #[must_use]
    pub fn account_uuid(&self) -> Option<&str> {
        self.claims.get_str(names::ACCT)
    }

    /// Domain the request originated from.
    #[must_use]
    pub fn canvas_domain(&self) -> Option<&str> {
        self.claims.get_str(names::CANVAS_DOMAIN)
    }

    /// The real user behind a masquerading session.
    #[must_use]
    pub fn masquerading_user_uuid(&self) -> Option<&str> {
        self.claims.get_str(names::MASQ_SUB)
    }

    /// Shard of the masquerading user.
    #[must_use]
    pub fn masquerading_user_shard_id(&self) -> Option<i64> {
        self.claims.get_i64(names::MASQ_SHARD)
    }

    /// Region of the issuing deployment.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.claims.get_str(names::REGION)
    }

    /// OAuth client the token was issued for.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.claims.get_str(names::CLIENT_ID)
    }

    /// True only when the flag claim is exactly boolean `true`.
    #[must_use]
    pub fn is_instructure_service(&self) -> bool {
        matches!(self.claims.get(names::INSTRUCTURE_SERVICE), Some(Value::Bool(true)))
    }

    /// Shard of the subject.
    #[must_use]
    pub fn canvas_shard_id(&self) -> Option<i64> {
        self.claims.get_i64(names::CANVAS_SHARD_ID)
    }

    /// Token id.
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        self.claims.get_str(names::JTI)
    }

    /// Issuer (`iss`).
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.get_str(names::ISS)
    }

    /// Issue time in seconds since the epoch.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.get_i64(names::IAT)
    }

    /// Expiry time in seconds since the epoch.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get_i64(names::EXP)
    }

    /// Expired when `exp` is at or before now; a token without `exp` counts as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .map_or(true, |exp| exp <= chrono::Utc::now().timestamp())
    }
}
