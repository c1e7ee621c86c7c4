//! Utility functions

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Version information for the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub profile: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        profile: option_env!("BUILD_PROFILE").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Cooldown options for exponential backoff
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,

    /// Fraction of the delay added as random jitter (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Calculate exponential backoff delay
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let delay_secs = options.base_delay.as_secs_f64() * options.multiplier.powi(exponent);
    let capped_delay = delay_secs.min(options.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped_delay.max(0.0))
}

/// Exponential backoff with random jitter so concurrent pollers spread out
pub fn calc_jittered_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay = calc_exp_backoff(options, attempt);
    let jitter_range = delay.as_secs_f64() * options.jitter_factor.clamp(0.0, 1.0);
    if jitter_range <= 0.0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0.0..jitter_range);
    delay + Duration::from_secs_f64(jitter)
}
