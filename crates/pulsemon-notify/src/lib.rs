//! Outbound alert notifications.
//!
//! Delivery is fire-and-forget: [`deliver`] logs transport failures and
//! never retries, so a broken webhook cannot affect alert rule state.

pub mod error;
pub mod slack;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use pulsemon_common::types::AlertNotice;

pub use slack::{SlackConfig, SlackWebhookChannel};

/// A destination for alert notices.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers one notice. A channel with no destination configured
    /// returns `Ok(())` without sending.
    async fn send(&self, notice: &AlertNotice) -> error::Result<()>;

    /// Returns the channel type name (e.g., `"slack"`).
    fn channel_name(&self) -> &str;
}

/// Sends `notice` and logs any failure instead of returning it.
pub async fn deliver(channel: &dyn NotificationChannel, notice: &AlertNotice) {
    if let Err(e) = channel.send(notice).await {
        tracing::error!(
            channel = channel.channel_name(),
            kind = %notice.kind,
            error = %e,
            "Failed to send alert notification"
        );
    }
}
