use crate::error::{NotifyError, Result};
use crate::NotificationChannel;
use async_trait::async_trait;
use pulsemon_common::types::{AlertEventType, AlertNotice};
use serde::{Deserialize, Serialize};

const MAX_BODY_LENGTH: usize = 512;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming-webhook URL. Notifications are skipped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Channel used when a rule does not name one.
    #[serde(default)]
    pub default_channel: Option<String>,
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'static str,
    text: &'a str,
    fields: Vec<SlackField<'a>>,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct SlackField<'a> {
    title: &'a str,
    value: &'a str,
    short: bool,
}

/// `danger` for fired alerts, `good` for resolutions.
pub fn attachment_color(kind: AlertEventType) -> &'static str {
    match kind {
        AlertEventType::Fired => "danger",
        AlertEventType::Resolved => "good",
    }
}

pub struct SlackWebhookChannel {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackWebhookChannel {
    pub fn new(config: SlackConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url().is_some()
    }

    fn webhook_url(&self) -> Option<&str> {
        self.config
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }

    fn render_payload(&self, notice: &AlertNotice) -> Result<String> {
        let channel = notice
            .channel
            .as_deref()
            .or(self.config.default_channel.as_deref())
            .filter(|c| !c.is_empty());
        let payload = SlackPayload {
            channel,
            attachments: vec![SlackAttachment {
                color: attachment_color(notice.kind),
                text: &notice.text,
                fields: notice
                    .fields
                    .iter()
                    .map(|f| SlackField {
                        title: &f.title,
                        value: &f.value,
                        short: f.short,
                    })
                    .collect(),
                ts: notice.timestamp.timestamp(),
            }],
        };
        Ok(serde_json::to_string(&payload)?)
    }
}

#[async_trait]
impl NotificationChannel for SlackWebhookChannel {
    async fn send(&self, notice: &AlertNotice) -> Result<()> {
        let Some(url) = self.webhook_url() else {
            tracing::warn!(
                kind = %notice.kind,
                "Slack webhook URL not configured, skipping notification"
            );
            return Ok(());
        };

        let body = self.render_payload(notice)?;
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::ApiError {
                service: "slack".to_string(),
                status: status.as_u16(),
                body: truncate(&text, MAX_BODY_LENGTH),
            });
        }

        tracing::debug!(kind = %notice.kind, "Slack notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
