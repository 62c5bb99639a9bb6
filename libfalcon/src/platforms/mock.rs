//! Mock platform implementation for testing
//!
//! A configurable stand-in for a real platform that can succeed, fail with
//! any [`PlatformError`], panic, or stall. It records every call so tests can
//! assert on invocation counts, received text and peak concurrency without
//! network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::Platform;
use crate::types::{ImageRef, PlatformId};

/// What a mock publish does once its delay has elapsed
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Succeed,
    Fail(PlatformError),
    /// Panic inside `publish`, simulating a crashing capability
    Panic,
}

/// Shared counters, cloned into tests before the mock is handed away
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    publish_calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    published: Arc<Mutex<Vec<(String, Option<ImageRef>)>>>,
}

impl MockRecorder {
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `publish` calls seen
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Text (and image) of every publish call, in call order
    pub fn published(&self) -> Vec<(String, Option<ImageRef>)> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn enter(&self, text: &str, image: Option<&ImageRef>) {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((text.to_string(), image.cloned()));
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub id: PlatformId,
    pub outcome: MockOutcome,
    /// Delay before completing publish (simulates network latency)
    pub delay: Duration,
    pub character_limit: Option<usize>,
    pub healthy: bool,
    pub recorder: MockRecorder,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            id: PlatformId::Discord,
            outcome: MockOutcome::Succeed,
            delay: Duration::ZERO,
            character_limit: None,
            healthy: true,
            recorder: MockRecorder::default(),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A mock that always succeeds
    pub fn success(id: PlatformId) -> Self {
        Self::new(MockConfig {
            id,
            ..Default::default()
        })
    }

    /// A mock that always fails with `error`
    pub fn failure(id: PlatformId, error: PlatformError) -> Self {
        Self::new(MockConfig {
            id,
            outcome: MockOutcome::Fail(error),
            ..Default::default()
        })
    }

    /// A mock whose publish panics
    pub fn panicking(id: PlatformId) -> Self {
        Self::new(MockConfig {
            id,
            outcome: MockOutcome::Panic,
            ..Default::default()
        })
    }

    /// A mock that succeeds after `delay`
    pub fn with_delay(id: PlatformId, delay: Duration) -> Self {
        Self::new(MockConfig {
            id,
            delay,
            ..Default::default()
        })
    }

    /// Handle onto this mock's call records
    pub fn recorder(&self) -> MockRecorder {
        self.config.recorder.clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn id(&self) -> PlatformId {
        self.config.id
    }

    async fn publish(
        &self,
        text: &str,
        image: Option<&ImageRef>,
    ) -> std::result::Result<String, PlatformError> {
        let recorder = &self.config.recorder;
        recorder.enter(text, image);

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
        recorder.leave();

        match &self.config.outcome {
            MockOutcome::Succeed => Ok(format!(
                "{}-post-{}",
                self.config.id,
                recorder.publish_calls()
            )),
            MockOutcome::Fail(error) => Err(error.clone()),
            MockOutcome::Panic => panic!("mock {} publish panicked", self.config.id),
        }
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }

    async fn health_check(&self) -> bool {
        self.config.healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let platform = MockPlatform::success(PlatformId::Bluesky);
        let recorder = platform.recorder();

        let id = platform.publish("Test content", None).await.unwrap();
        assert_eq!(id, "bluesky-post-1");
        assert_eq!(recorder.publish_calls(), 1);
        assert_eq!(recorder.published()[0].0, "Test content");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let platform = MockPlatform::failure(
            PlatformId::Discord,
            PlatformError::RateLimit("slow down".to_string()),
        );

        let result = platform.publish("Test content", None).await;
        assert!(matches!(result, Err(PlatformError::RateLimit(_))));
        assert_eq!(platform.recorder().publish_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_records_image() {
        let platform = MockPlatform::success(PlatformId::Discord);
        let image = ImageRef::Url("https://example.com/chart.png".to_string());

        platform.publish("chart", Some(&image)).await.unwrap();
        assert_eq!(platform.recorder().published()[0].1, Some(image));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_delay() {
        let platform = MockPlatform::with_delay(PlatformId::Discord, Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        platform.publish("Test content", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_mock_health() {
        let platform = MockPlatform::new(MockConfig {
            healthy: false,
            ..Default::default()
        });
        assert!(!platform.health_check().await);
    }
}
