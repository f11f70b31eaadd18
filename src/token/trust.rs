//! Which key verifies a token, decided from its unverified issuer and key id.

use crate::config::Config;
use crate::error::TokenError;
use crate::token::DEFAULT_ISSUER;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

/// Algorithms accepted for the configured RSA signing key.
const SIGNING_KEY_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verification key decision, made once per inbound token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationKey {
    /// The configured signing key (default issuer, or a trusted issuer when
    /// no key set is configured).
    ConfiguredSigningKey,
    /// The key set entry with this key id.
    KeySetEntry(String),
}

impl VerificationKey {
    /// Decide the verification key for a token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the issuer is missing or untrusted, or if a
    /// key set is configured but holds no entry for the token's key id.
    pub fn resolve(
        config: &Config,
        issuer: Option<&str>,
        kid: Option<&str>,
    ) -> Result<Self, TokenError> {
        let issuer = issuer.ok_or_else(|| TokenError::invalid_token("Token has no issuer"))?;

        if issuer == DEFAULT_ISSUER {
            return Ok(VerificationKey::ConfiguredSigningKey);
        }
        if !config.trusts_issuer(issuer) {
            return Err(TokenError::invalid_token(format!("Untrusted issuer: {}", issuer)));
        }

        let Some(jwks) = config.service_jwks() else {
            return Ok(VerificationKey::ConfiguredSigningKey);
        };
        let kid = kid.ok_or_else(|| {
            TokenError::invalid_token(format!("Token from {} has no key id", issuer))
        })?;
        if jwks.find(kid).is_none() {
            return Err(TokenError::invalid_token(format!(
                "No key {} in service key set for issuer {}",
                kid, issuer
            )));
        }

        Ok(VerificationKey::KeySetEntry(kid.to_string()))
    }

    /// Materialize the decoding key and the validation rules for `alg`.
    pub(crate) fn prepare(
        &self,
        config: &Config,
        alg: Algorithm,
    ) -> Result<(DecodingKey, Validation), TokenError> {
        let key = match self {
            VerificationKey::ConfiguredSigningKey => {
                if !SIGNING_KEY_ALGORITHMS.contains(&alg) {
                    return Err(TokenError::invalid_token(format!(
                        "Algorithm {:?} not accepted for the signing key",
                        alg
                    )));
                }
                config.verification_key()?.decoding_key().clone()
            }
            VerificationKey::KeySetEntry(kid) => {
                let jwk = config
                    .service_jwks()
                    .and_then(|set| set.find(kid))
                    .ok_or_else(|| TokenError::invalid_token(format!("No key {} in service key set", kid)))?;

                if let Some(declared) = &jwk.common.key_algorithm {
                    if !same_algorithm(declared, alg) {
                        return Err(TokenError::invalid_token(format!(
                            "Algorithm {:?} does not match key {}",
                            alg, kid
                        )));
                    }
                }

                DecodingKey::from_jwk(jwk)
                    .map_err(|e| TokenError::invalid_token_caused_by(format!("Unusable key {}", kid), e))?
            }
        };

        // Freshness is enforced by the caller with exact `exp <= now` semantics.
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok((key, validation))
    }
}

/// JWK `alg` and JWS `alg` share the same registered names.
fn same_algorithm(declared: &jsonwebtoken::jwk::KeyAlgorithm, alg: Algorithm) -> bool {
    match (serde_json::to_value(declared), serde_json::to_value(alg)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
