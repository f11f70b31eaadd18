//! Token strings: sign (and encrypt) outbound, decrypt and verify inbound.

use crate::config::{self, Config};
use crate::error::TokenError;
use crate::jwe;
use crate::metrics;
use crate::token::claims::Claims;
use crate::token::probe::UnverifiedEnvelope;
use crate::token::trust::VerificationKey;
use crate::token::Token;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header};
use std::borrow::Cow;
use tracing::{debug, instrument, warn};

/// Algorithm used when signing with the configured RSA key.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

impl Token {
    /// Signed but unencrypted compact JWS.
    ///
    /// Only for tests and local development: anyone holding the string can
    /// read the claims.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` without a private signing key.
    #[instrument(skip_all)]
    pub fn to_unencrypted_token_string(&self) -> Result<String, TokenError> {
        let jws = self.sign(&config::current())?;
        metrics::record_issued(metrics::FORMAT_JWS);
        Ok(jws)
    }

    /// Signed JWS nested inside a JWE encrypted to the configured
    /// encryption key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` without a private signing key or without an
    /// encryption key.
    #[instrument(skip_all)]
    pub fn to_token_string(&self) -> Result<String, TokenError> {
        let config = config::current();
        let jws = self.sign(&config)?;
        let jwe = jwe::encrypt(jws.as_bytes(), config.require_encryption_key()?)?;
        metrics::record_issued(metrics::FORMAT_JWE);
        Ok(jwe)
    }

    fn sign(&self, config: &Config) -> Result<String, TokenError> {
        let key = config
            .private_signing_key()?
            .encoding_key()
            .ok_or_else(|| TokenError::config("Private signing key needed to produce tokens"))?;

        encode(&Header::new(SIGNING_ALGORITHM), &self.claims, key)
            .map_err(|e| TokenError::config(format!("JWS signing failed: {}", e)))
    }

    /// Recover a token from an encrypted or signed-only string.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if no signing key is configured, or decryption is
    ///   needed and no private encryption key is configured
    /// - `InvalidToken` for malformed input, untrusted issuers, unresolvable
    ///   keys and bad signatures
    /// - `TokenExpired` if `exp` is at or before now
    #[instrument(skip_all)]
    pub fn from_token_string(input: &str) -> Result<Token, TokenError> {
        let result = verify(input, &config::current());
        metrics::record_verification(&result);

        match &result {
            Ok(token) => debug!(issuer = token.issuer(), jti = token.jti(), "Verified token"),
            Err(e) => warn!(code = e.code(), "Rejected token"),
        }
        result
    }
}

fn verify(input: &str, config: &Config) -> Result<Token, TokenError> {
    config.verification_key()?;

    let signed: Cow<'_, str> = if jwe::peek_header(input).is_some() {
        let plaintext = jwe::decrypt(input, config.require_encryption_key()?)?;
        String::from_utf8(plaintext)
            .map_err(|e| TokenError::invalid_token_caused_by("Decrypted JWS is not UTF-8", e))?
            .into()
    } else {
        input.trim().into()
    };

    let header = decode_header(&signed)
        .map_err(|e| TokenError::invalid_token_caused_by("Malformed JWS header", e))?;
    let envelope = UnverifiedEnvelope::parse(&signed)?;

    let decision = VerificationKey::resolve(config, envelope.issuer(), header.kid.as_deref())?;
    let (key, validation) = decision.prepare(config, header.alg)?;

    let data = decode::<Claims>(&signed, &key, &validation)
        .map_err(|e| TokenError::invalid_token_caused_by("Signature verification failed", e))?;

    let token = Token::from_claims(data.claims);
    let exp = token
        .expires_at()
        .ok_or_else(|| TokenError::invalid_token("Token has no integer exp claim"))?;
    if token.is_expired() {
        return Err(TokenError::expired_at(exp));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::with_config;

    const SIGNING_PRIVATE: &str = include_str!("../../tests/fixtures/signing_private.pem");
    const SIGNING_PUBLIC: &str = include_str!("../../tests/fixtures/signing_public.pem");
    const ENCRYPTION_PRIVATE: &str = include_str!("../../tests/fixtures/encryption_private.pem");
    const ENCRYPTION_PUBLIC: &str = include_str!("../../tests/fixtures/encryption_public.pem");

    fn a_token() -> Token {
        Token::for_user("user-uuid", "acct-uuid").build().unwrap()
    }

    #[test]
    fn test_round_trip_unencrypted() {
        let options = Config::options().with_signing_key(SIGNING_PRIVATE);
        let decoded = with_config(options, || {
            let jws = a_token().to_unencrypted_token_string().unwrap();
            Token::from_token_string(&jws)
        })
        .unwrap()
        .unwrap();

        assert_eq!(decoded.user_uuid(), Some("user-uuid"));
        assert_eq!(decoded.account_uuid(), Some("acct-uuid"));
    }

    #[test]
    fn test_round_trip_encrypted() {
        let options = Config::options()
            .with_signing_key(SIGNING_PRIVATE)
            .with_encryption_key(ENCRYPTION_PRIVATE);
        let token = a_token();

        let decoded = with_config(options, || {
            let jwe = token.to_token_string().unwrap();
            assert_eq!(jwe.split('.').count(), 5);
            Token::from_token_string(&jwe)
        })
        .unwrap()
        .unwrap();

        assert_eq!(decoded, token);
    }

    #[test]
    fn test_unconfigured_fails_with_config_error() {
        let token = a_token();
        assert!(matches!(token.to_token_string(), Err(TokenError::ConfigError(_))));
        assert!(matches!(
            token.to_unencrypted_token_string(),
            Err(TokenError::ConfigError(_))
        ));
        assert!(matches!(
            Token::from_token_string("a.b.c"),
            Err(TokenError::ConfigError(_))
        ));
    }

    #[test]
    fn test_public_signing_key_cannot_sign() {
        let options = Config::options()
            .with_signing_key(SIGNING_PUBLIC)
            .with_encryption_key(ENCRYPTION_PUBLIC);
        let result = with_config(options, || a_token().to_token_string()).unwrap();
        assert!(matches!(result, Err(TokenError::ConfigError(_))));
    }

    #[test]
    fn test_decrypting_needs_private_encryption_key() {
        let jwe = with_config(
            Config::options()
                .with_signing_key(SIGNING_PRIVATE)
                .with_encryption_key(ENCRYPTION_PUBLIC),
            || a_token().to_token_string(),
        )
        .unwrap()
        .unwrap();

        let without_private = with_config(
            Config::options()
                .with_signing_key(SIGNING_PUBLIC)
                .with_encryption_key(ENCRYPTION_PUBLIC),
            || Token::from_token_string(&jwe),
        )
        .unwrap();
        assert!(matches!(without_private, Err(TokenError::ConfigError(_))));

        let without_any = with_config(
            Config::options().with_signing_key(SIGNING_PUBLIC),
            || Token::from_token_string(&jwe),
        )
        .unwrap();
        assert!(matches!(without_any, Err(TokenError::ConfigError(_))));
    }

    #[test]
    fn test_header_uses_rs256() {
        let jws = with_config(Config::options().with_signing_key(SIGNING_PRIVATE), || {
            a_token().to_unencrypted_token_string()
        })
        .unwrap()
        .unwrap();

        assert_eq!(decode_header(&jws).unwrap().alg, Algorithm::RS256);
    }

    #[test]
    fn test_garbage_is_invalid_token() {
        let options = Config::options().with_signing_key(SIGNING_PUBLIC);
        for input in ["", "asdf1234stuff", "a.b.c", "a.b.c.d.e"] {
            let result = with_config(options.clone(), || Token::from_token_string(input)).unwrap();
            assert!(
                matches!(result, Err(TokenError::InvalidToken { .. })),
                "{input}: {result:?}"
            );
        }
    }
}
