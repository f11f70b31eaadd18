//! Error types for token issuing and verification.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Boxed underlying cause carried by [`TokenError::InvalidToken`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by token construction, serialization and verification.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TokenError {
    /// Mandatory identity input was missing.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The active configuration lacks the key capability the operation needs.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed envelope, bad signature, or no usable key for the issuer.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// What was wrong with the token
        reason: String,
        /// Underlying parse or crypto failure
        #[source]
        source: Option<BoxedCause>,
    },

    /// The `exp` claim is at or before the current time.
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
}

impl TokenError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        TokenError::InvalidArgument(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        TokenError::ConfigError(msg.into())
    }

    /// Create an invalid token error without an underlying cause.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        TokenError::InvalidToken {
            reason: reason.into(),
            source: None,
        }
    }

    /// Invalid token error that keeps the failure that caused it.
    pub fn invalid_token_caused_by<E>(reason: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TokenError::InvalidToken {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create an expiry error from an `exp` claim value.
    pub fn expired_at(exp: i64) -> Self {
        TokenError::TokenExpired {
            expired_at: DateTime::from_timestamp(exp, 0).unwrap_or_else(Utc::now),
        }
    }

    /// Stable code for logs and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            TokenError::InvalidArgument(_) => INVALID_ARGUMENT,
            TokenError::ConfigError(_) => CONFIG_ERROR,
            TokenError::InvalidToken { .. } => INVALID_TOKEN,
            TokenError::TokenExpired { .. } => TOKEN_EXPIRED,
        }
    }

    /// True when the caller presented a token that must be treated as unauthenticated.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            TokenError::InvalidToken { .. } | TokenError::TokenExpired { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        TokenError::invalid_token_caused_by("JWS rejected", err)
    }
}

/// Code for [`TokenError::InvalidArgument`].
pub const INVALID_ARGUMENT: &str = "INST_ACCESS_INVALID_ARGUMENT";
/// Code for [`TokenError::ConfigError`].
pub const CONFIG_ERROR: &str = "INST_ACCESS_CONFIG_ERROR";
/// Code for [`TokenError::InvalidToken`].
pub const INVALID_TOKEN: &str = "INST_ACCESS_INVALID_TOKEN";
/// Code for [`TokenError::TokenExpired`].
pub const TOKEN_EXPIRED: &str = "INST_ACCESS_TOKEN_EXPIRED";
