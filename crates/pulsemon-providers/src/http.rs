use crate::error::{ProviderError, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Shared client with rustls and a hard per-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Sends the request and decodes a JSON object body. Non-2xx maps to
/// [`ProviderError::HttpError`], any other top-level JSON value to
/// [`ProviderError::InvalidResponse`].
pub async fn send_json(provider: &str, request: RequestBuilder) -> Result<serde_json::Value> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::HttpError {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }

    match serde_json::from_str::<serde_json::Value>(&body)? {
        value @ serde_json::Value::Object(_) => Ok(value),
        other => Err(ProviderError::InvalidResponse {
            provider: provider.to_string(),
            message: format!("expected a JSON object, got {}", truncate(&other.to_string(), 128)),
        }),
    }
}

/// Field deserializer that maps an explicit JSON `null` to `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
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
