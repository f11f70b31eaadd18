//! Fluent construction of user tokens.

use crate::error::TokenError;
use crate::token::claims::{names, Claims};
use crate::token::{Token, DEFAULT_ISSUER, TOKEN_LIFETIME_SECS};

/// Builder returned by [`Token::for_user`].
#[derive(Debug, Clone)]
#[must_use = "call build() to produce the token"]
pub struct UserTokenBuilder {
    user_uuid: String,
    account_uuid: String,
    canvas_domain: Option<String>,
    real_user_uuid: Option<String>,
    real_user_shard_id: Option<i64>,
    user_global_id: Option<u64>,
    real_user_global_id: Option<u64>,
    region: Option<String>,
    client_id: Option<String>,
    instructure_service: Option<bool>,
    canvas_shard_id: Option<i64>,
    issuer: Option<String>,
}

impl UserTokenBuilder {
    pub(crate) fn new(user_uuid: String, account_uuid: String) -> Self {
        UserTokenBuilder {
            user_uuid,
            account_uuid,
            canvas_domain: None,
            real_user_uuid: None,
            real_user_shard_id: None,
            user_global_id: None,
            real_user_global_id: None,
            region: None,
            client_id: None,
            instructure_service: None,
            canvas_shard_id: None,
            issuer: None,
        }
    }

    /// Domain the request originated from.
    pub fn canvas_domain(mut self, domain: impl Into<String>) -> Self {
        self.canvas_domain = Some(domain.into());
        self
    }

    /// The user actually acting while masquerading as the subject.
    pub fn real_user_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.real_user_uuid = Some(uuid.into());
        self
    }

    /// Shard of the real user.
    pub fn real_user_shard_id(mut self, shard_id: i64) -> Self {
        self.real_user_shard_id = Some(shard_id);
        self
    }

    /// Recorded as a decimal string for debugging only.
    pub fn user_global_id(mut self, global_id: u64) -> Self {
        self.user_global_id = Some(global_id);
        self
    }

    /// Recorded as a decimal string for debugging only.
    pub fn real_user_global_id(mut self, global_id: u64) -> Self {
        self.real_user_global_id = Some(global_id);
        self
    }

    /// Region of the issuing deployment.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// OAuth client the token is issued for.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Mark the token as issued to an internal service.
    pub fn instructure_service(mut self, flag: bool) -> Self {
        self.instructure_service = Some(flag);
        self
    }

    /// Shard of the subject.
    pub fn canvas_shard_id(mut self, shard_id: i64) -> Self {
        self.canvas_shard_id = Some(shard_id);
        self
    }

    /// Replace the default `iss` claim. Only for simulating other trusted
    /// issuers in tests and interop setups.
    #[cfg(any(test, feature = "issuer-override"))]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Assemble the claims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the user or account uuid is blank.
    pub fn build(self) -> Result<Token, TokenError> {
        if self.user_uuid.trim().is_empty() || self.account_uuid.trim().is_empty() {
            return Err(TokenError::invalid_argument(
                "Must provide user uuid and account uuid",
            ));
        }

        let now = chrono::Utc::now().timestamp();

        let mut claims = Claims::new();
        claims.set(names::ISS, self.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string()));
        claims.set(names::JTI, uuid::Uuid::new_v4().to_string());
        claims.set(names::IAT, now);
        claims.set(names::EXP, now + TOKEN_LIFETIME_SECS);
        claims.set(names::SUB, self.user_uuid);
        claims.set(names::ACCT, self.account_uuid);
        claims.set_opt(names::CANVAS_DOMAIN, self.canvas_domain);
        claims.set_opt(names::MASQ_SUB, self.real_user_uuid);
        claims.set_opt(names::MASQ_SHARD, self.real_user_shard_id);
        claims.set_opt(
            names::DEBUG_USER_GLOBAL_ID,
            self.user_global_id.map(|id| id.to_string()),
        );
        claims.set_opt(
            names::DEBUG_MASQ_GLOBAL_ID,
            self.real_user_global_id.map(|id| id.to_string()),
        );
        claims.set_opt(names::REGION, self.region);
        claims.set_opt(names::CLIENT_ID, self.client_id);
        claims.set_opt(names::INSTRUCTURE_SERVICE, self.instructure_service);
        claims.set_opt(names::CANVAS_SHARD_ID, self.canvas_shard_id);

        Ok(Token::from_claims(claims))
    }
}
