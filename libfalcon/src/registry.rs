//! Target registry: which platforms are configured and how to reach them
//!
//! The registry is built once at startup and shared read-only (behind an
//! `Arc`) by every dispatch.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::platforms::bluesky::BlueskyClient;
use crate::platforms::discord::DiscordClient;
use crate::platforms::retry::RetryPolicy;
use crate::platforms::Platform;
use crate::types::PlatformId;

#[derive(Default, Clone)]
pub struct TargetRegistry {
    /// Kept in canonical `PlatformId` order
    targets: Vec<(PlatformId, Arc<dyn Platform>)>,
}

impl TargetRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build platform clients for every platform with complete credentials
    ///
    /// No network traffic happens here; sessions are established lazily.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.dispatch.request_timeout;
        let retry = RetryPolicy::with_attempts(config.dispatch.retry_attempts);
        let mut builder = Self::builder();

        if config.bluesky.is_configured() {
            let handle = config.bluesky.handle.as_deref().unwrap_or_default();
            let password = config.bluesky.app_password.as_deref().unwrap_or_default();
            builder = builder.register(BlueskyClient::new(
                &config.bluesky.service,
                handle,
                password,
                timeout,
                retry,
            )?);
        }

        if config.discord.is_configured() {
            let webhook_url = config.discord.webhook_url.as_deref().unwrap_or_default();
            builder = builder.register(DiscordClient::new(webhook_url, timeout, retry)?);
        }

        let registry = builder.build();
        if registry.is_empty() {
            warn!("No publishers configured");
        } else {
            info!(
                "Configured publishers: {}",
                registry
                    .configured_targets()
                    .iter()
                    .map(PlatformId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(registry)
    }

    /// Configured platforms in canonical order
    pub fn configured_targets(&self) -> Vec<PlatformId> {
        self.targets.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_configured(&self, platform: PlatformId) -> bool {
        self.targets.iter().any(|(id, _)| *id == platform)
    }

    /// Publishing capability for `platform`
    pub fn capability(
        &self,
        platform: PlatformId,
    ) -> std::result::Result<Arc<dyn Platform>, PlatformError> {
        self.targets
            .iter()
            .find(|(id, _)| *id == platform)
            .map(|(_, capability)| capability.clone())
            .ok_or_else(|| PlatformError::NotConfigured(platform.to_string()))
    }

    /// Configured flag for every known platform
    pub fn status(&self) -> Vec<(PlatformId, bool)> {
        PlatformId::ALL
            .into_iter()
            .map(|id| (id, self.is_configured(id)))
            .collect()
    }

    /// Run every configured platform's health check concurrently
    pub async fn health_check_all(&self) -> Vec<(PlatformId, bool)> {
        let checks = self.targets.iter().map(|(id, capability)| {
            let capability = capability.clone();
            let id = *id;
            async move { (id, capability.health_check().await) }
        });
        join_all(checks).await
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.configured_targets())
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    targets: Vec<(PlatformId, Arc<dyn Platform>)>,
}

impl RegistryBuilder {
    pub fn register(self, platform: impl Platform + 'static) -> Self {
        self.register_arc(Arc::new(platform))
    }

    /// Register a shared capability; a later registration for the same
    /// platform replaces the earlier one
    pub fn register_arc(mut self, platform: Arc<dyn Platform>) -> Self {
        let id = platform.id();
        if let Some(slot) = self.targets.iter_mut().find(|(existing, _)| *existing == id) {
            warn!("Replacing previously registered {} capability", id);
            slot.1 = platform;
        } else {
            self.targets.push((id, platform));
        }
        self
    }

    pub fn build(mut self) -> TargetRegistry {
        self.targets.sort_by_key(|(id, _)| *id);
        TargetRegistry {
            targets: self.targets,
        }
    }
}
