//! API access token

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::ProviderError;

/// Environment variable consulted when no token is configured
pub const ACCESS_TOKEN_ENV: &str = "MZCLOUD_ACCESS_TOKEN";

/// Bearer token used to authenticate against the cloud API
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
}

impl AccessToken {
    /// Wrap a raw token, rejecting blank values
    pub fn new(raw: impl Into<String>) -> Result<Self, ProviderError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ProviderError::AuthError(
                "access token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret: SecretString::from(raw),
        })
    }

    /// Read the token from `MZCLOUD_ACCESS_TOKEN`
    pub fn from_env() -> Result<Self, ProviderError> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(raw) => Self::new(raw),
            Err(_) => Err(ProviderError::AuthError(format!(
                "no access token configured and {} is not set",
                ACCESS_TOKEN_ENV
            ))),
        }
    }

    /// Resolve a configured token, falling back to the environment
    pub fn resolve(configured: Option<&str>) -> Result<Self, ProviderError> {
        match configured {
            Some(raw) if !raw.trim().is_empty() => Self::new(raw),
            _ => Self::from_env(),
        }
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret.expose_secret())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}
