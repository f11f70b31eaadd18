//! Prometheus metrics for token issuing and verification.

use crate::error::TokenError;
use crate::token::Token;
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec};

/// `format` label for signed-only tokens.
pub const FORMAT_JWS: &str = "jws";
/// `format` label for encrypted tokens.
pub const FORMAT_JWE: &str = "jwe";

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inst_access_tokens_issued_total",
        "Total number of tokens serialized",
        &["format"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Token verifications counter.
pub static TOKEN_VERIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inst_access_token_verifications_total",
        "Total number of token verifications",
        &["outcome"]
    )
    .expect("Failed to register token_verifications metric")
});

/// Record a serialized token.
pub fn record_issued(format: &str) {
    TOKENS_ISSUED.with_label_values(&[format]).inc();
}

/// Record a verification outcome, labelled `ok` or with the error code.
pub fn record_verification(result: &Result<Token, TokenError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    TOKEN_VERIFICATIONS.with_label_values(&[outcome]).inc();
}
