//! Discord webhook platform implementation

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::PlatformError;
use crate::platforms::http::{build_client, error_from_response, map_transport_error};
use crate::platforms::retry::{with_retry, RetryPolicy};
use crate::platforms::Platform;
use crate::types::{ImageRef, PlatformId};

/// Webhook message content limit
pub const DISCORD_CHAR_LIMIT: usize = 2000;

#[derive(Deserialize)]
struct WebhookMessage {
    id: String,
}

pub struct DiscordClient {
    http: reqwest::Client,
    webhook_url: SecretString,
    retry: RetryPolicy,
}

impl DiscordClient {
    pub fn new(webhook_url: &str, timeout: Duration, retry: RetryPolicy) -> reqwest::Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            webhook_url: SecretString::from(webhook_url.trim().to_string()),
            retry,
        })
    }

    /// Webhook URL with `wait=true` so Discord answers with the created message
    fn execute_url(&self) -> String {
        let base = self.webhook_url.expose_secret();
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}wait=true", base, separator)
    }

    async fn publish_once(&self, text: &str, image: Option<&ImageRef>) -> Result<String, PlatformError> {
        let request = self.http.post(self.execute_url());

        let request = match image {
            None => request.json(&json!({ "content": text })),
            Some(ImageRef::Url(url)) => request.json(&json!({
                "content": text,
                "embeds": [{ "image": { "url": url } }],
            })),
            Some(ImageRef::Inline { data, mime_type }) => {
                let file = Part::bytes(data.clone())
                    .file_name(format!("image.{}", mime_type.extension()))
                    .mime_str(mime_type.as_str())
                    .map_err(|e| PlatformError::Posting(format!("Invalid attachment: {}", e)))?;
                let form = Form::new()
                    .text("payload_json", json!({ "content": text }).to_string())
                    .part("files[0]", file);
                request.multipart(form)
            }
        };

        tracing::debug!("Posting to Discord: {} characters", text.chars().count());

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error("discord", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("discord", response).await);
        }

        let message: WebhookMessage = response.json().await.map_err(|e| {
            PlatformError::Posting(format!(
                "Discord accepted the message but returned no id: {}",
                e.without_url()
            ))
        })?;

        tracing::debug!("Posted to Discord: message {}", message.id);
        Ok(message.id)
    }
}

#[async_trait]
impl Platform for DiscordClient {
    fn id(&self) -> PlatformId {
        PlatformId::Discord
    }

    async fn publish(
        &self,
        text: &str,
        image: Option<&ImageRef>,
    ) -> std::result::Result<String, PlatformError> {
        self.validate_content(text)?;
        with_retry(&self.retry, "discord", || self.publish_once(text, image)).await
    }

    fn character_limit(&self) -> Option<usize> {
        Some(DISCORD_CHAR_LIMIT)
    }

    async fn health_check(&self) -> bool {
        match self.http.get(self.webhook_url.expose_secret()).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::warn!("Discord health check failed: {}", map_transport_error("discord", e));
                false
            }
        }
    }
}
