//! Filter recommendations and publish them on a polling interval

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::RecommendationsConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::recommendations::{
    format_recommendation, format_volume, MetricsSource, PostedTickers, Recommendation,
    RecommendationSource, TickerMetrics,
};
use crate::types::{PlatformId, PublishRequest};

const DEFAULT_POST_DELAY: Duration = Duration::from_secs(2);

/// Thresholds a recommendation must clear before it is published
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterPolicy {
    pub min_rvol: f64,
    pub min_volume: u64,
    /// When false no metrics are looked up and every unposted ticker passes
    pub check_metrics: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_rvol: 2.0,
            min_volume: 1_000_000,
            check_metrics: true,
        }
    }
}

impl From<&RecommendationsConfig> for FilterPolicy {
    fn from(config: &RecommendationsConfig) -> Self {
        Self {
            min_rvol: config.min_rvol,
            min_volume: config.min_volume,
            check_metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingTicker,
    AlreadyPosted,
    MetricsUnavailable,
    /// Metrics were found but relative volume is missing or too low
    LowRvol(TickerMetrics),
    /// Metrics were found but volume is missing or too low
    LowVolume(TickerMetrics),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTicker => write!(f, "missing ticker"),
            SkipReason::AlreadyPosted => write!(f, "already posted"),
            SkipReason::MetricsUnavailable => write!(f, "could not fetch metrics"),
            SkipReason::LowRvol(metrics) => match metrics.rvol {
                Some(rvol) => write!(f, "RVOL {:.2} below threshold", rvol),
                None => write!(f, "RVOL N/A"),
            },
            SkipReason::LowVolume(metrics) => match metrics.volume {
                Some(volume) => write!(f, "volume {} below threshold", format_volume(volume)),
                None => write!(f, "volume N/A"),
            },
        }
    }
}

/// Outcome of filtering one recommendation
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Publish, with the metrics that were checked (if any)
    Post(Option<TickerMetrics>),
    Skip(SkipReason),
}

impl Verdict {
    pub fn should_post(&self) -> bool {
        matches!(self, Verdict::Post(_))
    }

    /// Metrics looked up while filtering, whether or not the item passed
    pub fn metrics(&self) -> Option<TickerMetrics> {
        match self {
            Verdict::Post(metrics) => *metrics,
            Verdict::Skip(SkipReason::LowRvol(metrics) | SkipReason::LowVolume(metrics)) => {
                Some(*metrics)
            }
            Verdict::Skip(_) => None,
        }
    }

    /// Status tag used by dry runs
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Post(Some(_)) => "PASS",
            Verdict::Post(None) => "N/A",
            Verdict::Skip(_) => "SKIP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub posted: usize,
    pub total: usize,
}

/// A recommendation as it would be published, without publishing it
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub item: Recommendation,
    pub verdict: Verdict,
    pub message: String,
}

pub struct RecommendationsScheduler {
    source: Arc<dyn RecommendationSource>,
    dispatcher: Arc<Dispatcher>,
    policy: FilterPolicy,
    metrics: Option<Arc<dyn MetricsSource>>,
    tracker: Option<PostedTickers>,
    poll_interval: Duration,
    post_delay: Duration,
    target: PlatformId,
}

impl RecommendationsScheduler {
    pub fn new(
        source: Arc<dyn RecommendationSource>,
        dispatcher: Arc<Dispatcher>,
        policy: FilterPolicy,
    ) -> Self {
        Self {
            source,
            dispatcher,
            policy,
            metrics: None,
            tracker: None,
            poll_interval: Duration::from_secs(300),
            post_delay: DEFAULT_POST_DELAY,
            target: PlatformId::Discord,
        }
    }

    /// Metrics are only consulted when the policy enables checking
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_tracker(mut self, tracker: PostedTickers) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn tracker(&self) -> Option<&PostedTickers> {
        self.tracker.as_ref()
    }

    /// Decide whether `item` should be published
    pub async fn evaluate(&self, item: &Recommendation) -> Result<Verdict> {
        let Some(ticker) = item.ticker() else {
            return Ok(Verdict::Skip(SkipReason::MissingTicker));
        };

        if let Some(tracker) = &self.tracker {
            if tracker.is_posted(ticker).await? {
                debug!("{}: Already posted, skipping", ticker);
                return Ok(Verdict::Skip(SkipReason::AlreadyPosted));
            }
        }

        let source = match (&self.metrics, self.policy.check_metrics) {
            (Some(source), true) => source,
            _ => return Ok(Verdict::Post(None)),
        };

        let Some(metrics) = source.metrics(ticker).await else {
            warn!("{}: Could not fetch metrics, skipping", ticker);
            return Ok(Verdict::Skip(SkipReason::MetricsUnavailable));
        };

        match metrics.rvol {
            Some(rvol) if rvol >= self.policy.min_rvol => {}
            rvol => {
                info!("{}: RVOL {:?} < {}, skipping", ticker, rvol, self.policy.min_rvol);
                return Ok(Verdict::Skip(SkipReason::LowRvol(metrics)));
            }
        }

        match metrics.volume {
            Some(volume) if volume >= self.policy.min_volume => {}
            volume => {
                info!(
                    "{}: Volume {} < {}, skipping",
                    ticker,
                    volume.map(format_volume).unwrap_or_else(|| "N/A".to_string()),
                    format_volume(self.policy.min_volume)
                );
                return Ok(Verdict::Skip(SkipReason::LowVolume(metrics)));
            }
        }

        info!(
            "{}: PASS - RVOL {:.2}, Vol {}",
            ticker,
            metrics.rvol.unwrap_or_default(),
            format_volume(metrics.volume.unwrap_or_default())
        );
        Ok(Verdict::Post(Some(metrics)))
    }

    /// Fetch once and report what each item would do, publishing nothing
    pub async fn preview(&self) -> Result<Vec<PreviewEntry>> {
        let items = self.source.fetch().await?;
        let mut entries = Vec::with_capacity(items.len());

        for item in items {
            let verdict = self.evaluate(&item).await?;
            let message = format_recommendation(&item, verdict.metrics().as_ref());
            entries.push(PreviewEntry {
                item,
                verdict,
                message,
            });
        }

        Ok(entries)
    }

    /// Fetch, filter and publish one batch
    pub async fn run_once(&self) -> Result<RunSummary> {
        let items = self.source.fetch().await?;
        let total = items.len();
        let mut posted = 0;

        for item in &items {
            let metrics = match self.evaluate(item).await? {
                Verdict::Post(metrics) => metrics,
                Verdict::Skip(reason) => {
                    debug!("Skipping {}: {}", item.ticker().unwrap_or("???"), reason);
                    continue;
                }
            };
            // evaluate only passes items with a ticker
            let ticker = item.ticker().unwrap_or_default();

            let message = format_recommendation(item, metrics.as_ref());
            let request = PublishRequest::new(message).with_targets([self.target.as_str()]);
            let result = self.dispatcher.dispatch(request).await?;

            if result.overall_success {
                posted += 1;
                info!("Posted {} to {}", ticker, self.target.display_name());
                if let Some(tracker) = &self.tracker {
                    tracker
                        .mark_posted(
                            ticker,
                            metrics.and_then(|m| m.rvol),
                            item.optional("theme").as_deref(),
                            item.optional("sector").as_deref(),
                        )
                        .await?;
                }
            } else {
                for (platform, outcome) in &result.per_target {
                    error!("Failed to post {} to {}: {:?}", ticker, platform, outcome);
                }
            }

            if !self.post_delay.is_zero() {
                tokio::time::sleep(self.post_delay).await;
            }
        }

        info!(
            "Posted {}/{} recommendations (RVOL >= {}, Vol >= {})",
            posted,
            total,
            self.policy.min_rvol,
            format_volume(self.policy.min_volume)
        );
        Ok(RunSummary { posted, total })
    }

    /// Poll every `poll_interval` until `shutdown` resolves
    ///
    /// A failed poll is logged and the loop carries on.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Starting recommendations polling (interval: {}, min_rvol: {}, min_vol: {})",
            humantime::format_duration(self.poll_interval),
            self.policy.min_rvol,
            format_volume(self.policy.min_volume)
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_once() => {
                    if let Err(e) = result {
                        error!("Error in recommendations poll: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Recommendations scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FalconError, PlatformError, ValidationError};
    use crate::platforms::mock::{MockPlatform, MockRecorder};
    use crate::registry::TargetRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        items: Vec<Recommendation>,
        fetches: AtomicUsize,
    }

    impl StaticSource {
        fn new(value: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                items: crate::recommendations::recommendations_from_value(value),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RecommendationSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<Recommendation>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    struct FixedMetrics(HashMap<&'static str, TickerMetrics>);

    #[async_trait]
    impl MetricsSource for FixedMetrics {
        async fn metrics(&self, ticker: &str) -> Option<TickerMetrics> {
            self.0.get(ticker).copied()
        }
    }

    fn metrics(rvol: f64, volume: u64) -> TickerMetrics {
        TickerMetrics {
            rvol: Some(rvol),
            volume: Some(volume),
        }
    }

    fn dispatcher_with(platform: MockPlatform) -> (Arc<Dispatcher>, MockRecorder) {
        let recorder = platform.recorder();
        let registry = TargetRegistry::builder().register(platform).build();
        (Arc::new(Dispatcher::new(Arc::new(registry))), recorder)
    }

    fn feed() -> serde_json::Value {
        json!([
            {"ticker": "AAPL", "company": "Apple", "theme": "AI", "sector": "Technology"},
            {"ticker": "LOW", "company": "Sleepy Corp"},
            {"ticker": "THIN", "company": "Thin Volume Inc"},
            {"ticker": "GONE"},
            {"company": "No ticker"}
        ])
    }

    fn fixed_metrics() -> Arc<FixedMetrics> {
        Arc::new(FixedMetrics(HashMap::from([
            ("AAPL", metrics(2.5, 5_000_000)),
            ("LOW", metrics(1.1, 5_000_000)),
            ("THIN", metrics(3.0, 40_000)),
        ])))
    }

    #[tokio::test]
    async fn test_run_once_filters_and_tracks() {
        let (dispatcher, recorder) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let tracker = PostedTickers::open(":memory:").await.unwrap();

        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(feed()),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_metrics(fixed_metrics())
        .with_tracker(tracker.clone())
        .with_post_delay(Duration::ZERO);

        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary, RunSummary { posted: 1, total: 5 });

        let published = recorder.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].0.starts_with("**$AAPL** - Apple"));
        assert!(published[0].0.contains("🔥 RVOL: 2.50"));

        let history = tracker.list().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ticker, "AAPL");
        assert_eq!(history[0].rvol, Some(2.5));
        assert_eq!(history[0].sector.as_deref(), Some("Technology"));

        // Second pass finds nothing new
        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary.posted, 0);
        assert_eq!(recorder.publish_calls(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_reasons() {
        let (dispatcher, _) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(json!([])),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_metrics(fixed_metrics());

        let item = |v| -> Recommendation { serde_json::from_value(v).unwrap() };

        assert_eq!(
            scheduler.evaluate(&item(json!({"ticker": "LOW"}))).await.unwrap(),
            Verdict::Skip(SkipReason::LowRvol(metrics(1.1, 5_000_000)))
        );
        assert_eq!(
            scheduler.evaluate(&item(json!({"ticker": "THIN"}))).await.unwrap(),
            Verdict::Skip(SkipReason::LowVolume(metrics(3.0, 40_000)))
        );
        assert_eq!(
            scheduler.evaluate(&item(json!({"ticker": "GONE"}))).await.unwrap(),
            Verdict::Skip(SkipReason::MetricsUnavailable)
        );
        assert_eq!(
            scheduler.evaluate(&item(json!({"ticker": ""}))).await.unwrap(),
            Verdict::Skip(SkipReason::MissingTicker)
        );
        assert_eq!(
            scheduler.evaluate(&item(json!({"ticker": "AAPL"}))).await.unwrap(),
            Verdict::Post(Some(metrics(2.5, 5_000_000)))
        );
    }

    #[tokio::test]
    async fn test_metrics_check_disabled_posts_everything_with_ticker() {
        let (dispatcher, recorder) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let policy = FilterPolicy {
            check_metrics: false,
            ..Default::default()
        };

        let scheduler = RecommendationsScheduler::new(StaticSource::new(feed()), dispatcher, policy)
            .with_metrics(fixed_metrics())
            .with_post_delay(Duration::ZERO);

        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary, RunSummary { posted: 4, total: 5 });
        assert_eq!(recorder.publish_calls(), 4);
        assert!(!recorder.published()[0].0.contains("RVOL"));
    }

    #[tokio::test]
    async fn test_failed_post_is_not_tracked() {
        let (dispatcher, _) = dispatcher_with(MockPlatform::failure(
            PlatformId::Discord,
            PlatformError::Authentication("bad webhook".to_string()),
        ));
        let tracker = PostedTickers::open(":memory:").await.unwrap();

        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(feed()),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_metrics(fixed_metrics())
        .with_tracker(tracker.clone())
        .with_post_delay(Duration::ZERO);

        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary.posted, 0);
        assert_eq!(tracker.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_once_without_discord_is_validation_error() {
        let (dispatcher, _) = dispatcher_with(MockPlatform::success(PlatformId::Bluesky));
        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(feed()),
            dispatcher,
            FilterPolicy {
                check_metrics: false,
                ..Default::default()
            },
        )
        .with_post_delay(Duration::ZERO);

        assert!(matches!(
            scheduler.run_once().await,
            Err(FalconError::Validation(ValidationError::NoTargetsConfigured))
        ));
    }

    #[tokio::test]
    async fn test_preview_publishes_nothing() {
        let (dispatcher, recorder) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(feed()),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_metrics(fixed_metrics());

        let entries = scheduler.preview().await.unwrap();
        let labels: Vec<&str> = entries.iter().map(|e| e.verdict.label()).collect();
        assert_eq!(labels, vec!["PASS", "SKIP", "SKIP", "SKIP", "SKIP"]);
        assert!(entries[0].message.contains("RVOL: 2.50"));
        assert_eq!(recorder.publish_calls(), 0);
    }

    #[tokio::test]
    async fn test_preview_shows_metrics_that_caused_a_skip() {
        let (dispatcher, _) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let scheduler = RecommendationsScheduler::new(
            StaticSource::new(feed()),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_metrics(fixed_metrics());

        let entries = scheduler.preview().await.unwrap();

        assert_eq!(entries[1].verdict.label(), "SKIP");
        assert!(entries[1].message.contains("RVOL: 1.10"));
        assert!(entries[2].message.contains("RVOL: 3.00"));
        assert!(entries[2].message.contains("40.0K"));
        // Nothing was looked up for these
        assert_eq!(entries[3].verdict.metrics(), None);
        assert!(!entries[3].message.contains("RVOL"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let (dispatcher, _) = dispatcher_with(MockPlatform::success(PlatformId::Discord));
        let source = StaticSource::new(json!([]));
        let scheduler = RecommendationsScheduler::new(
            source.clone(),
            dispatcher,
            FilterPolicy::default(),
        )
        .with_poll_interval(Duration::from_secs(60));

        let shutdown = tokio::time::sleep(Duration::from_secs(150));
        scheduler.run(shutdown).await;

        // Polls at t=0, 60 and 120
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
