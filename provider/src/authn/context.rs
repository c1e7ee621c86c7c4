//! Per-call authenticated context

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::authn::access_token::AccessToken;
use crate::errors::ProviderError;

/// Credential and cancellation scope for one reconcile operation
#[derive(Debug, Clone)]
pub struct CallContext {
    token: AccessToken,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(token: AccessToken, cancel: CancellationToken) -> Self {
        Self { token, cancel }
    }

    /// Context that is only cancelled when dropped by the caller
    pub fn detached(token: AccessToken) -> Self {
        Self::new(token, CancellationToken::new())
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a future, aborting it if the context is cancelled first
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled(what.to_string())),
            result = fut => result,
        }
    }
}
