//! Runtime configuration options

use std::time::Duration;

use crate::http::client::DEFAULT_REQUEST_TIMEOUT;
use crate::reconcile::poller::PollOptions;
use crate::storage::settings::Settings;

/// Main provider options
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Cloud API base URL
    pub backend_base_url: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Convergence budgets per operation
    pub timeouts: Timeouts,

    /// Poller options
    pub poll: PollOptions,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            backend_base_url: "https://cloud.materialize.com".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            timeouts: Timeouts::default(),
            poll: PollOptions::default(),
        }
    }
}

impl From<&Settings> for ProviderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            backend_base_url: settings.api.base_url.clone(),
            request_timeout: Duration::from_secs(settings.api.request_timeout_secs),
            timeouts: Timeouts {
                create: Duration::from_secs(settings.timeouts.create_secs),
                update: Duration::from_secs(settings.timeouts.update_secs),
                delete: Duration::from_secs(settings.timeouts.delete_secs),
            },
            poll: PollOptions {
                backoff: settings.polling.to_cooldown(),
            },
        }
    }
}

/// How long each operation may wait for convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(20 * 60),
            update: Duration::from_secs(20 * 60),
            delete: Duration::from_secs(20 * 60),
        }
    }
}
