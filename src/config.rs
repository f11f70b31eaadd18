//! Token configuration and its scoping rules.
//!
//! A [`Config`] is an immutable value. The active one is resolved per call:
//! the innermost scope entered on the current thread wins, then the
//! process-wide default installed with [`init`], then an empty configuration
//! that can neither sign nor verify.

use crate::error::TokenError;
use crate::keys::RsaKey;
use crate::token::DEFAULT_ISSUER;
use jsonwebtoken::jwk::JwkSet;
use once_cell::sync::{Lazy, OnceCell};
use std::cell::RefCell;
use std::env;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable holding the signing key PEM (or `@path`).
pub const ENV_SIGNING_KEY: &str = "INST_ACCESS_SIGNING_KEY";
/// Environment variable holding the encryption key PEM (or `@path`).
pub const ENV_ENCRYPTION_KEY: &str = "INST_ACCESS_ENCRYPTION_KEY";
/// Environment variable holding comma-separated trusted issuers.
pub const ENV_ISSUERS: &str = "INST_ACCESS_ISSUERS";
/// Environment variable holding a JWK Set JSON document (or `@path`).
pub const ENV_SERVICE_JWKS: &str = "INST_ACCESS_SERVICE_JWKS";

thread_local! {
    static SCOPES: RefCell<Vec<Arc<Config>>> = const { RefCell::new(Vec::new()) };
}

static PROCESS_CONFIG: OnceCell<Arc<Config>> = OnceCell::new();
static EMPTY_CONFIG: Lazy<Arc<Config>> = Lazy::new(|| Arc::new(Config::default()));

/// Keys and trust settings read by every token operation.
#[derive(Debug, Clone, Default)]
pub struct Config {
    signing_key: Option<RsaKey>,
    encryption_key: Option<RsaKey>,
    issuers: Vec<String>,
    service_jwks: Option<JwkSet>,
}

impl Config {
    /// Start an options overlay on top of the defaults.
    #[must_use]
    pub fn options() -> ConfigOptions {
        ConfigOptions::default()
    }

    /// Load configuration from environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but holds invalid material.
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();

        let mut options = ConfigOptions::default();

        if let Some(pem) = read_env_value(ENV_SIGNING_KEY)? {
            options = options.with_signing_key(pem);
        }
        if let Some(pem) = read_env_value(ENV_ENCRYPTION_KEY)? {
            options = options.with_encryption_key(pem);
        }
        if let Ok(issuers) = env::var(ENV_ISSUERS) {
            options = options.with_issuers(
                issuers
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(json) = read_env_value(ENV_SERVICE_JWKS)? {
            let jwks: JwkSet = serde_json::from_str(&json)
                .map_err(|e| TokenError::config(format!("Invalid {}: {}", ENV_SERVICE_JWKS, e)))?;
            options = options.with_service_jwks(jwks);
        }

        options.build()
    }

    /// Signing key, if one is configured.
    #[must_use]
    pub fn signing_key(&self) -> Option<&RsaKey> {
        self.signing_key.as_ref()
    }

    /// Encryption key, if one is configured.
    #[must_use]
    pub fn encryption_key(&self) -> Option<&RsaKey> {
        self.encryption_key.as_ref()
    }

    /// Additionally trusted issuers, in configured order.
    #[must_use]
    pub fn issuers(&self) -> &[String] {
        &self.issuers
    }

    /// Key set for verifying tokens from non-default issuers.
    #[must_use]
    pub fn service_jwks(&self) -> Option<&JwkSet> {
        self.service_jwks.as_ref()
    }

    /// Whether `issuer` is the default issuer or one of the configured ones.
    #[must_use]
    pub fn trusts_issuer(&self, issuer: &str) -> bool {
        issuer == DEFAULT_ISSUER || self.issuers.iter().any(|i| i == issuer)
    }

    /// Signing key for verification; any configured key will do.
    pub(crate) fn verification_key(&self) -> Result<&RsaKey, TokenError> {
        self.signing_key
            .as_ref()
            .ok_or_else(|| TokenError::config("Signing key needed to verify tokens"))
    }

    /// Signing key with its private half, required to produce tokens.
    pub(crate) fn private_signing_key(&self) -> Result<&RsaKey, TokenError> {
        match &self.signing_key {
            Some(key) if key.is_private() => Ok(key),
            Some(_) => Err(TokenError::config(
                "Private signing key needed to produce tokens",
            )),
            None => Err(TokenError::config("Signing key needed to produce tokens")),
        }
    }

    pub(crate) fn require_encryption_key(&self) -> Result<&RsaKey, TokenError> {
        self.encryption_key
            .as_ref()
            .ok_or_else(|| TokenError::config("Encryption key needed to encrypt or decrypt tokens"))
    }

    /// Make this configuration active on the current thread until the guard drops.
    #[must_use = "the configuration is only active while the guard is alive"]
    pub fn enter(self) -> ConfigGuard {
        ConfigGuard::push(Arc::new(self))
    }

    /// Run `f` with this configuration active, restoring the previous one
    /// afterwards even if `f` panics.
    pub fn scope<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }
}

/// Overlay of configuration inputs applied onto the defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    signing_key: Option<String>,
    encryption_key: Option<String>,
    issuers: Vec<String>,
    service_jwks: Option<JwkSet>,
}

impl ConfigOptions {
    /// Set the signing key PEM (public-only or private).
    #[must_use]
    pub fn with_signing_key(mut self, pem: impl Into<String>) -> Self {
        self.signing_key = Some(pem.into());
        self
    }

    /// Set the encryption key PEM (public-only or private).
    #[must_use]
    pub fn with_encryption_key(mut self, pem: impl Into<String>) -> Self {
        self.encryption_key = Some(pem.into());
        self
    }

    /// Set the additionally trusted issuers.
    #[must_use]
    pub fn with_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the key set used for non-default issuers.
    #[must_use]
    pub fn with_service_jwks(mut self, jwks: JwkSet) -> Self {
        self.service_jwks = Some(jwks);
        self
    }

    /// Parse key material and produce a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a PEM document is not an RSA key.
    pub fn build(self) -> Result<Config, TokenError> {
        let signing_key = self
            .signing_key
            .as_deref()
            .map(RsaKey::from_pem)
            .transpose()
            .map_err(|e| TokenError::config(format!("signing key: {}", e)))?;
        let encryption_key = self
            .encryption_key
            .as_deref()
            .map(RsaKey::from_pem)
            .transpose()
            .map_err(|e| TokenError::config(format!("encryption key: {}", e)))?;

        Ok(Config {
            signing_key,
            encryption_key,
            issuers: self.issuers,
            service_jwks: self.service_jwks,
        })
    }
}

/// Restores the previously active configuration when dropped.
///
/// Scopes are per thread, so the guard cannot be sent elsewhere.
#[derive(Debug)]
pub struct ConfigGuard {
    depth: usize,
    _thread_bound: PhantomData<Rc<()>>,
}

impl ConfigGuard {
    fn push(config: Arc<Config>) -> Self {
        let depth = SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            let depth = scopes.len();
            scopes.push(config);
            depth
        });
        debug!(depth, "Entered token config scope");

        Self {
            depth,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        // Truncating also discards scopes whose guards were leaked.
        let _ = SCOPES.try_with(|scopes| scopes.borrow_mut().truncate(self.depth));
    }
}

/// Run `f` with `options` overlaid onto the defaults, then restore the
/// previous configuration whether `f` returns, errors or panics.
///
/// # Errors
///
/// Returns `ConfigError` if the options hold invalid key material; `f` is
/// not run in that case.
pub fn with_config<R>(options: ConfigOptions, f: impl FnOnce() -> R) -> Result<R, TokenError> {
    let config = options.build()?;
    Ok(config.scope(f))
}

/// Install the process-wide default configuration. Can only be done once.
///
/// # Errors
///
/// Returns `ConfigError` if a process-wide configuration is already installed.
pub fn init(config: Config) -> Result<(), TokenError> {
    let signing = config.signing_key().map(RsaKey::is_private);
    let encryption = config.encryption_key().map(RsaKey::is_private);
    let issuers = config.issuers().len();

    PROCESS_CONFIG
        .set(Arc::new(config))
        .map_err(|_| TokenError::config("Process-wide token configuration already installed"))?;

    info!(
        signing_key_private = ?signing,
        encryption_key_private = ?encryption,
        issuers,
        "Installed token configuration"
    );
    Ok(())
}

/// The configuration active for the calling thread.
#[must_use]
pub fn current() -> Arc<Config> {
    SCOPES
        .with(|scopes| scopes.borrow().last().cloned())
        .or_else(|| PROCESS_CONFIG.get().cloned())
        .unwrap_or_else(|| Arc::clone(&EMPTY_CONFIG))
}

/// Read an environment variable, following `@path` indirection to a file.
fn read_env_value(name: &str) -> Result<Option<String>, TokenError> {
    match env::var(name) {
        Ok(value) => match value.strip_prefix('@') {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|e| TokenError::config(format!("Invalid {}: {}: {}", name, path, e))),
            None => Ok(Some(value)),
        },
        Err(_) => Ok(None),
    }
}
