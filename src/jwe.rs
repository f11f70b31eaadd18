//! Compact JWE envelope (RFC 7516) with `RSA-OAEP` key wrapping and
//! `A128CBC-HS256` content encryption (RFC 7518 §5.2.3).

use crate::error::TokenError;
use crate::keys::RsaKey;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use ring::hmac;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Key management algorithm.
pub const ALG_RSA_OAEP: &str = "RSA-OAEP";
/// Content encryption algorithm.
pub const ENC_A128CBC_HS256: &str = "A128CBC-HS256";
/// Content type marking a nested JWT payload.
pub const CTY_JWT: &str = "JWT";

const CEK_LEN: usize = 32;
const MAC_KEY_LEN: usize = 16;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// JWE protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    /// Key management algorithm
    pub alg: String,
    /// Content encryption algorithm
    pub enc: String,
    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JweHeader {
    fn nested_jwt() -> Self {
        Self {
            alg: ALG_RSA_OAEP.to_string(),
            enc: ENC_A128CBC_HS256.to_string(),
            cty: Some(CTY_JWT.to_string()),
        }
    }
}

/// The five segments of a compact JWE, still base64url-encoded.
#[derive(Debug, Clone, Copy)]
struct CompactParts<'a> {
    protected: &'a str,
    encrypted_key: &'a str,
    iv: &'a str,
    ciphertext: &'a str,
    tag: &'a str,
}

impl<'a> CompactParts<'a> {
    fn split(input: &'a str) -> Option<Self> {
        let mut parts = input.split('.');
        let compact = Self {
            protected: parts.next()?,
            encrypted_key: parts.next()?,
            iv: parts.next()?,
            ciphertext: parts.next()?,
            tag: parts.next()?,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(compact)
    }
}

/// Parse the protected header of `input` if it has the shape of a compact JWE.
///
/// Returns `None` for anything that is not five segments with a JSON header
/// carrying `enc`, so callers can fall through to the JWS path.
#[must_use]
pub fn peek_header(input: &str) -> Option<JweHeader> {
    let parts = CompactParts::split(input.trim())?;
    decode_header(parts.protected).ok()
}

/// Encrypt `plaintext` to the public half of `key`.
///
/// # Errors
///
/// Returns `ConfigError` if RSA key wrapping fails (for example a key too
/// small for OAEP).
pub fn encrypt(plaintext: &[u8], key: &RsaKey) -> Result<String, TokenError> {
    let mut rng = rand::thread_rng();

    let mut cek = Zeroizing::new([0u8; CEK_LEN]);
    rng.fill_bytes(&mut cek[..]);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let header = serde_json::to_vec(&JweHeader::nested_jwt())
        .map_err(|e| TokenError::config(format!("Failed to encode JWE header: {}", e)))?;
    let protected = URL_SAFE_NO_PAD.encode(header);

    let encrypted_key = key
        .public_key()
        .encrypt(&mut rng, Oaep::new::<sha1::Sha1>(), &cek[..])
        .map_err(|e| TokenError::config(format!("RSA-OAEP key wrapping failed: {}", e)))?;

    let (mac_key, enc_key) = cek.split_at(MAC_KEY_LEN);
    let ciphertext = Aes128CbcEnc::new_from_slices(enc_key, &iv)
        .map_err(|e| TokenError::config(format!("Invalid content key: {}", e)))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = authentication_tag(mac_key, protected.as_bytes(), &iv, &ciphertext);

    Ok(format!(
        "{}.{}.{}.{}.{}",
        protected,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Decrypt a compact JWE with the private half of `key`.
///
/// # Errors
///
/// Returns `ConfigError` if `key` has no private half, and `InvalidToken`
/// for malformed input, unsupported algorithms, a failed key unwrap or a
/// tag mismatch.
pub fn decrypt(input: &str, key: &RsaKey) -> Result<Vec<u8>, TokenError> {
    let private = key
        .private_key()
        .ok_or_else(|| TokenError::config("Private encryption key needed to decrypt tokens"))?;

    let parts = CompactParts::split(input.trim())
        .ok_or_else(|| TokenError::invalid_token("JWE must have five segments"))?;

    let header = decode_header(parts.protected)?;
    if header.alg != ALG_RSA_OAEP || header.enc != ENC_A128CBC_HS256 {
        return Err(TokenError::invalid_token(format!(
            "Unsupported JWE algorithms: alg={} enc={}",
            header.alg, header.enc
        )));
    }

    let encrypted_key = decode_segment(parts.encrypted_key, "encrypted key")?;
    let iv = decode_segment(parts.iv, "IV")?;
    let ciphertext = decode_segment(parts.ciphertext, "ciphertext")?;
    let tag = decode_segment(parts.tag, "tag")?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(TokenError::invalid_token("JWE IV or tag has the wrong length"));
    }

    let cek = Zeroizing::new(
        private
            .decrypt(Oaep::new::<sha1::Sha1>(), &encrypted_key)
            .map_err(|e| TokenError::invalid_token_caused_by("JWE key unwrap failed", e))?,
    );
    if cek.len() != CEK_LEN {
        return Err(TokenError::invalid_token("JWE content key has the wrong length"));
    }

    let (mac_key, enc_key) = cek.split_at(MAC_KEY_LEN);
    let expected = authentication_tag(mac_key, parts.protected.as_bytes(), &iv, &ciphertext);
    if !bool::from(expected.as_slice().ct_eq(&tag)) {
        return Err(TokenError::invalid_token("JWE authentication tag mismatch"));
    }

    Aes128CbcDec::new_from_slices(enc_key, &iv)
        .map_err(|e| TokenError::invalid_token(format!("Invalid content key: {}", e)))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| TokenError::invalid_token("JWE content padding is invalid"))
}

/// HMAC-SHA-256 over `AAD || IV || ciphertext || AL`, truncated to 128 bits.
fn authentication_tag(mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let aad_bits = (aad.len() as u64) * 8;

    let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(aad);
    ctx.update(iv);
    ctx.update(ciphertext);
    ctx.update(&aad_bits.to_be_bytes());

    ctx.sign().as_ref()[..TAG_LEN].to_vec()
}

fn decode_header(segment: &str) -> Result<JweHeader, TokenError> {
    let bytes = decode_segment(segment, "protected header")?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::invalid_token_caused_by("JWE header is not valid JSON", e))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::invalid_token_caused_by(format!("JWE {} is not base64url", what), e))
}
