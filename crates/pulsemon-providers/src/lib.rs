//! Upstream monitoring providers.
//!
//! Each provider knows how to call one external API and normalize the
//! response into a [`ProviderSnapshot`] plus a set of [`MetricPoint`]s. The
//! shared [`MonitoringProvider::fetch`] wraps the provider-specific
//! [`MonitoringProvider::do_fetch`] with bounded retries and exponential
//! backoff, and tracks the provider's self-reported health.

pub mod axiom;
pub mod error;
pub mod http;
pub mod neon;
pub mod vercel;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use pulsemon_common::types::{FetchResult, ProviderStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use pulsemon_common::types::{MetricPoint, ProviderSnapshot};

/// Retries after the first attempt, so three attempts in total.
pub const MAX_RETRIES: u32 = 2;
pub const BASE_DELAY_MS: u64 = 1000;

/// Delay before retry number `attempt + 1`: `1000ms * 2^attempt`.
///
/// # Examples
///
/// ```
/// use pulsemon_providers::backoff_delay;
/// use std::time::Duration;
///
/// assert_eq!(backoff_delay(0), Duration::from_millis(1000));
/// assert_eq!(backoff_delay(1), Duration::from_millis(2000));
/// ```
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt)))
}

/// Consecutive-error counter shared by every provider.
#[derive(Debug, Default)]
pub struct ProviderHealth {
    consecutive_errors: AtomicU32,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// Returns the updated error count.
    pub fn record_failure(&self) -> u32 {
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus::from_consecutive_errors(self.consecutive_errors())
    }
}

/// One external system polled by the ingestion pipeline.
#[async_trait]
pub trait MonitoringProvider: Send + Sync {
    /// Stable identifier, also the primary key in provider tables (e.g. `"vercel"`).
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Minimum seconds between two upstream fetches.
    fn min_interval_secs(&self) -> u64;

    fn metric_keys(&self) -> &[&'static str];

    fn health(&self) -> &ProviderHealth;

    /// Calls the upstream API once.
    async fn do_fetch(&self) -> error::Result<FetchResult>;

    /// Runs [`Self::do_fetch`] up to `1 + MAX_RETRIES` times.
    ///
    /// Returns `None` once every attempt has failed. Errors never propagate
    /// past this point.
    async fn fetch(&self) -> Option<FetchResult> {
        let mut attempt = 0;
        loop {
            match self.do_fetch().await {
                Ok(result) => {
                    self.health().record_success();
                    return Some(result);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        provider_id = %self.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let errors = self.health().record_failure();
                    tracing::error!(
                        provider_id = %self.id(),
                        consecutive_errors = errors,
                        "[{}] fetch failed after {} attempts: {}",
                        self.id(),
                        MAX_RETRIES + 1,
                        e
                    );
                    return None;
                }
            }
        }
    }

    fn status(&self) -> ProviderStatus {
        self.health().status()
    }
}

/// Upstream API settings for all built-in providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Per-request timeout applied to every upstream call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub vercel: vercel::VercelConfig,
    #[serde(default)]
    pub neon: neon::NeonConfig,
    #[serde(default)]
    pub axiom: axiom::AxiomConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            vercel: vercel::VercelConfig::default(),
            neon: neon::NeonConfig::default(),
            axiom: axiom::AxiomConfig::default(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Builds the Vercel, Neon and Axiom providers in that order.
///
/// Missing credentials are not an error here; they surface on each fetch
/// through the retry contract.
pub fn build_default_providers(
    config: &ProvidersConfig,
) -> error::Result<Vec<Arc<dyn MonitoringProvider>>> {
    let client = http::build_client(config.request_timeout_secs)?;
    Ok(vec![
        Arc::new(vercel::VercelProvider::new(
            config.vercel.clone(),
            client.clone(),
        )),
        Arc::new(neon::NeonProvider::new(config.neon.clone(), client.clone())),
        Arc::new(axiom::AxiomProvider::new(config.axiom.clone(), client)),
    ])
}

/// Rounds to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
