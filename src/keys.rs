//! RSA key material for signing and encryption.
//!
//! A key always carries its public half; the private half is optional and
//! required for signing and decryption.

use crate::error::TokenError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Asymmetric key parsed from PEM: public-only or private+public.
#[derive(Clone)]
pub struct RsaKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
    decoding_key: DecodingKey,
    encoding_key: Option<EncodingKey>,
}

impl RsaKey {
    /// Parse a PEM document.
    ///
    /// Accepts PKCS#8 (`PRIVATE KEY`) and PKCS#1 (`RSA PRIVATE KEY`) private
    /// keys, and SPKI (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) public keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document is not an RSA key.
    pub fn from_pem(pem: &str) -> Result<Self, TokenError> {
        let pem = pem.trim();

        if let Some(private) = parse_private(pem) {
            return Self::from_private(private);
        }

        let public = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| TokenError::config(format!("Invalid RSA key PEM: {}", e)))?;

        Self::from_public(public)
    }

    /// Build from a private key; the public half is derived from it.
    pub fn from_private(private: RsaPrivateKey) -> Result<Self, TokenError> {
        let der = private
            .to_pkcs1_der()
            .map_err(|e| TokenError::config(format!("Failed to encode private key: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let mut key = Self::from_public(RsaPublicKey::from(&private))?;
        key.private = Some(private);
        key.encoding_key = Some(encoding_key);
        Ok(key)
    }

    /// Build a verification/encryption-only key.
    pub fn from_public(public: RsaPublicKey) -> Result<Self, TokenError> {
        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| TokenError::config(format!("Invalid RSA public key: {}", e)))?;

        Ok(Self {
            public,
            private: None,
            decoding_key,
            encoding_key: None,
        })
    }

    /// Whether the private half is present.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.private.is_some()
    }

    /// Public half, always present.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Private half, if configured.
    #[must_use]
    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.private.as_ref()
    }

    /// Key for verifying JWS signatures.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Key for producing JWS signatures, if the private half is present.
    #[must_use]
    pub fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding_key.as_ref()
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("bits", &self.bits())
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

fn parse_private(pem: &str) -> Option<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .ok()
        .or_else(|| RsaPrivateKey::from_pkcs1_pem(pem).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PKCS8: &str = include_str!("../tests/fixtures/signing_private.pem");
    const PRIVATE_PKCS1: &str = include_str!("../tests/fixtures/signing_private_pkcs1.pem");
    const PUBLIC_SPKI: &str = include_str!("../tests/fixtures/signing_public.pem");
    const PUBLIC_PKCS1: &str = include_str!("../tests/fixtures/signing_public_pkcs1.pem");

    #[test]
    fn test_private_pem_formats() {
        for pem in [PRIVATE_PKCS8, PRIVATE_PKCS1] {
            let key = RsaKey::from_pem(pem).unwrap();
            assert!(key.is_private());
            assert!(key.encoding_key().is_some());
            assert_eq!(key.bits(), 2048);
        }
    }

    #[test]
    fn test_public_pem_formats() {
        for pem in [PUBLIC_SPKI, PUBLIC_PKCS1] {
            let key = RsaKey::from_pem(pem).unwrap();
            assert!(!key.is_private());
            assert!(key.encoding_key().is_none());
            assert!(key.private_key().is_none());
        }
    }

    #[test]
    fn test_public_half_matches_private() {
        let private = RsaKey::from_pem(PRIVATE_PKCS8).unwrap();
        let public = RsaKey::from_pem(PUBLIC_SPKI).unwrap();
        assert_eq!(private.public_key(), public.public_key());
    }

    #[test]
    fn test_garbage_pem_is_config_error() {
        let err = RsaKey::from_pem("-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----")
            .unwrap_err();
        assert!(matches!(err, TokenError::ConfigError(_)));
        assert!(matches!(RsaKey::from_pem(""), Err(TokenError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = RsaKey::from_pem(PRIVATE_PKCS8).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("private: true"));
        assert!(!debug.contains("MII"));
    }
}
