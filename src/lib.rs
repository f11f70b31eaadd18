//! Service-to-service identity tokens.
//!
//! A [`Token`] asserts which user (and account) a request acts for. It is
//! signed as a JWS with the configured RSA key and, for transport, nested
//! inside a JWE encrypted to the receiving side's RSA key.
//!
//! Keys and trusted issuers come from a [`Config`], resolved per call from
//! the innermost [`with_config`] scope on the current thread, then the
//! process-wide default installed with [`config::init`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod jwe;
pub mod keys;
pub mod metrics;
pub mod token;

// Re-exports for convenience
pub use config::{with_config, Config, ConfigOptions};
pub use error::TokenError;
pub use token::{Token, UserTokenBuilder};

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;
