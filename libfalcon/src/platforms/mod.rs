//! Platform abstraction and implementations
//!
//! Every destination the dispatcher can deliver to implements [`Platform`].
//! A platform receives already-rendered text plus an optional image and
//! returns its own post identifier. Transport concerns (authentication,
//! uploads, retries) stay behind this trait.
//!
//! # Examples
//!
//! ```no_run
//! use libfalcon::platforms::{discord::DiscordClient, Platform};
//! use libfalcon::platforms::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let discord = DiscordClient::new(
//!     "https://discord.com/api/webhooks/1/token",
//!     Duration::from_secs(30),
//!     RetryPolicy::default(),
//! )?;
//!
//! if let Some(limit) = discord.character_limit() {
//!     println!("Discord has a {} character limit", limit);
//! }
//!
//! let message_id = discord.publish("Hello from Falcon", None).await?;
//! println!("Posted: {}", message_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::{ImageRef, PlatformId};

pub mod bluesky;
pub mod discord;
pub mod http;
pub mod retry;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

#[cfg(test)]
pub(crate) mod test_support;

/// Unified interface over messaging platforms
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which platform this capability delivers to
    fn id(&self) -> PlatformId;

    /// Lowercase platform name used in logs
    fn name(&self) -> &str {
        self.id().as_str()
    }

    /// Publish rendered text, optionally with an image
    ///
    /// Returns the platform-specific post identifier (a Discord message id,
    /// a Bluesky `at://` URI).
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] describing why the platform did not accept
    /// the message. Implementations never panic on transport failures.
    async fn publish(
        &self,
        text: &str,
        image: Option<&ImageRef>,
    ) -> std::result::Result<String, PlatformError>;

    /// Maximum post length in characters, or `None` when unlimited
    fn character_limit(&self) -> Option<usize> {
        None
    }

    /// Length of `content` as the platform counts it against `character_limit`
    fn content_length(&self, content: &str) -> usize {
        content.chars().count()
    }

    /// Check content against platform rules before any network traffic
    fn validate_content(&self, content: &str) -> std::result::Result<(), PlatformError> {
        if content.trim().is_empty() {
            return Err(PlatformError::Rejected(
                "Content cannot be empty".to_string(),
            ));
        }

        if let Some(limit) = self.character_limit() {
            let length = self.content_length(content);
            if length > limit {
                return Err(PlatformError::Rejected(format!(
                    "Content exceeds {} character limit ({} characters)",
                    limit, length
                )));
            }
        }

        Ok(())
    }

    /// Lightweight reachability/credential probe used by `/health`
    async fn health_check(&self) -> bool {
        true
    }
}
