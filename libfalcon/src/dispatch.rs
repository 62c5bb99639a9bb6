//! Dispatch engine
//!
//! Validates a [`PublishRequest`], resolves which configured platforms it
//! goes to, renders the text once, publishes to every target concurrently and
//! aggregates one [`PlatformResult`] per target.
//!
//! A failure on one target never prevents delivery to the others: each
//! target runs in its own task, so even a panicking platform client only
//! produces an `internal` failure entry for itself.
//!
//! # Examples
//!
//! ```no_run
//! use libfalcon::{Config, Dispatcher, PublishRequest};
//!
//! # async fn example() -> libfalcon::Result<()> {
//! let config = Config::load()?;
//! let dispatcher = Dispatcher::from_config(&config)?;
//!
//! let request = PublishRequest::new("Markets open in 5 minutes").with_targets(["discord"]);
//! let result = dispatcher.dispatch(request).await?;
//!
//! for (platform, outcome) in &result.per_target {
//!     println!("{}: {:?}", platform, outcome);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

use crate::config::{Config, DispatchConfig};
use crate::error::{ErrorKind, PlatformError, Result, ValidationError};
use crate::platforms::Platform;
use crate::registry::TargetRegistry;
use crate::render::{self, MessageMetadata};
use crate::types::{DispatchResult, ImageRef, PlatformId, PlatformResult, PublishRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Upper bound on platforms contacted at once
    pub max_concurrency: usize,
    /// Per-target deadline; an expired target reports `timeout`
    pub publish_timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            publish_timeout: None,
        }
    }
}

impl From<&DispatchConfig> for DispatchOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            publish_timeout: config.publish_timeout,
        }
    }
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub text: String,
    pub image: Option<ImageRef>,
    pub metadata: MessageMetadata,
    /// Explicit targets, deduplicated, in request order
    pub targets: Option<Vec<PlatformId>>,
}

pub struct Dispatcher {
    registry: Arc<TargetRegistry>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self::with_options(registry, DispatchOptions::default())
    }

    pub fn with_options(registry: Arc<TargetRegistry>, options: DispatchOptions) -> Self {
        Self { registry, options }
    }

    /// Registry and options built from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = TargetRegistry::from_config(config)?;
        Ok(Self::with_options(
            Arc::new(registry),
            DispatchOptions::from(&config.dispatch),
        ))
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Check request shape. Performs no I/O.
    pub fn validate(&self, request: PublishRequest) -> std::result::Result<ValidatedRequest, ValidationError> {
        if request.text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        let image = match (request.image_url, request.image_data) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingImageFields),
            (Some(url), None) => Some(ImageRef::Url(url)),
            (None, Some(data)) => Some(ImageRef::inline(data)),
            (None, None) => None,
        };

        // An empty explicit list means "no preference", same as omitting it
        let targets = match request.targets {
            Some(names) if !names.is_empty() => {
                let mut ids = Vec::with_capacity(names.len());
                for name in &names {
                    let id: PlatformId = name.parse()?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Some(ids)
            }
            _ => None,
        };

        Ok(ValidatedRequest {
            text: request.text,
            image,
            metadata: MessageMetadata::classify(request.metadata.as_ref()),
            targets,
        })
    }

    /// Targets a request will be delivered to
    ///
    /// Explicit targets keep request order and are narrowed to configured
    /// platforms; without explicit targets every configured platform is used.
    pub fn resolve_targets(
        &self,
        requested: Option<&[PlatformId]>,
    ) -> std::result::Result<Vec<PlatformId>, ValidationError> {
        let resolved: Vec<PlatformId> = match requested {
            Some(explicit) => explicit
                .iter()
                .copied()
                .filter(|id| {
                    let configured = self.registry.is_configured(*id);
                    if !configured {
                        warn!("Skipping {}: not configured", id);
                    }
                    configured
                })
                .collect(),
            None => self.registry.configured_targets(),
        };

        if resolved.is_empty() {
            return Err(ValidationError::NoTargetsConfigured);
        }

        debug!(
            "Resolved targets: {}",
            resolved
                .iter()
                .map(PlatformId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(resolved)
    }

    /// Validate, render and publish to every resolved target
    ///
    /// # Errors
    ///
    /// Only request-level problems are errors. Per-target failures are
    /// reported inside the returned [`DispatchResult`].
    pub async fn dispatch(
        &self,
        request: PublishRequest,
    ) -> std::result::Result<DispatchResult, ValidationError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("dispatch", %request_id);

        async move {
            let validated = self.validate(request)?;
            let targets = self.resolve_targets(validated.targets.as_deref())?;
            let text: Arc<str> = Arc::from(render::render(&validated.text, &validated.metadata)?);
            let image = validated.image.map(Arc::new);

            let results = self.publish_all(&targets, text, image).await;
            let result = aggregate(results);

            info!(
                "Dispatch finished: {}/{} targets succeeded",
                result.success_count(),
                result.per_target.len()
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn publish_all(
        &self,
        targets: &[PlatformId],
        text: Arc<str>,
        image: Option<Arc<ImageRef>>,
    ) -> Vec<(PlatformId, PlatformResult)> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let timeout = self.options.publish_timeout;

        let handles = targets.iter().map(|&id| {
            let capability = self.registry.capability(id);
            let semaphore = semaphore.clone();
            let text = text.clone();
            let image = image.clone();

            tokio::spawn(
                async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return PlatformResult::failure(
                                ErrorKind::Internal,
                                "dispatch was shut down before publishing",
                            )
                        }
                    };

                    match capability {
                        Ok(capability) => {
                            publish_one(id, capability, &text, image.as_deref(), timeout).await
                        }
                        Err(e) => PlatformResult::from_error(&e),
                    }
                }
                .in_current_span(),
            )
        });

        let joined = join_all(handles).await;

        targets
            .iter()
            .zip(joined)
            .map(|(&id, outcome)| {
                let result = outcome.unwrap_or_else(|e| {
                    let message = if e.is_panic() {
                        format!("{} publisher panicked", id)
                    } else {
                        format!("{} publish task was cancelled", id)
                    };
                    warn!("{}", message);
                    PlatformResult::failure(ErrorKind::Internal, message)
                });
                (id, result)
            })
            .collect()
    }
}

async fn publish_one(
    id: PlatformId,
    capability: Arc<dyn Platform>,
    text: &str,
    image: Option<&ImageRef>,
    timeout: Option<Duration>,
) -> PlatformResult {
    info!("Posting to platform: {}", id);

    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, capability.publish(text, image))
            .await
            .unwrap_or_else(|_| {
                Err(PlatformError::Timeout(format!(
                    "{} did not respond within {}",
                    id,
                    humantime::format_duration(limit)
                )))
            }),
        None => capability.publish(text, image).await,
    };

    match outcome {
        Ok(post_id) => {
            info!("Successfully posted to {}: {}", id, post_id);
            PlatformResult::success(post_id)
        }
        Err(e) => {
            warn!("Failed to post to {}: {}", id, e);
            PlatformResult::from_error(&e)
        }
    }
}

/// Merge per-target outcomes, preserving their order
///
/// Overall success requires at least one target and every target to have
/// succeeded.
pub fn aggregate(results: Vec<(PlatformId, PlatformResult)>) -> DispatchResult {
    let overall_success =
        !results.is_empty() && results.iter().all(|(_, result)| result.is_success());
    DispatchResult {
        overall_success,
        per_target: results,
    }
}
