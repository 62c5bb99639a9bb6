//! Relative volume and volume lookups scraped from Finviz quote pages

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FalconError, Result};

pub const FINVIZ_QUOTE_URL: &str = "https://finviz.com/quote.ashx";

const RVOL_PATTERN: &str = r"Rel Volume</td><td[^>]*><b[^>]*>([0-9.]+)</b>";
const VOLUME_PATTERN: &str = r">Volume</td><td[^>]*><b[^>]*>([0-9,]+)</b>";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickerMetrics {
    pub rvol: Option<f64>,
    pub volume: Option<u64>,
}

/// Source of per-ticker trading metrics
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// `None` when nothing could be determined for the ticker
    async fn metrics(&self, ticker: &str) -> Option<TickerMetrics>;
}

pub struct FinvizChecker {
    http: reqwest::Client,
    base_url: String,
    rvol_re: Regex,
    volume_re: Regex,
}

impl FinvizChecker {
    pub fn new() -> Result<Self> {
        Self::with_base_url(FINVIZ_QUOTE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| FalconError::InvalidInput(e.to_string()))
        };

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            rvol_re: compile(RVOL_PATTERN)?,
            volume_re: compile(VOLUME_PATTERN)?,
        })
    }

    /// Pull metrics out of a quote page
    pub fn parse(&self, html: &str) -> Option<TickerMetrics> {
        let rvol = self
            .rvol_re
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());

        let volume = self
            .volume_re
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok());

        if rvol.is_none() && volume.is_none() {
            None
        } else {
            Some(TickerMetrics { rvol, volume })
        }
    }

    async fn fetch_page(&self, ticker: &str) -> reqwest::Result<String> {
        self.http
            .get(&self.base_url)
            .query(&[("t", ticker)])
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl MetricsSource for FinvizChecker {
    async fn metrics(&self, ticker: &str) -> Option<TickerMetrics> {
        let html = match self.fetch_page(ticker).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Error fetching metrics for {}: {}", ticker, e);
                return None;
            }
        };

        let metrics = self.parse(&html);
        match metrics {
            Some(m) => {
                if m.rvol.is_none() {
                    warn!("RVOL not found for {}", ticker);
                }
                if m.volume.is_none() {
                    warn!("Volume not found for {}", ticker);
                }
                debug!("{} metrics: RVOL={:?}, Vol={:?}", ticker, m.rvol, m.volume);
            }
            None => warn!("No metrics found for {}", ticker),
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::test_support::spawn_stub;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    const QUOTE_PAGE: &str = r#"<table><tr>
<td class="snapshot-td2">Rel Volume</td><td class="snapshot-td2" align="left"><b>2.45</b></td>
<td class="snapshot-td2">Avg Volume</td><td class="snapshot-td2"><b>10.2M</b></td>
<td class="snapshot-td2">Volume</td><td class="snapshot-td2" align="left"><b><span>x</span></b></td>
</tr><tr>
<td class="snapshot-td2">Volume</td><td class="snapshot-td2" align="left"><b style="x">3,456,789</b></td>
</tr></table>"#;

    #[test]
    fn test_parse_quote_page() {
        let checker = FinvizChecker::new().unwrap();
        let metrics = checker.parse(QUOTE_PAGE).unwrap();
        assert_eq!(metrics.rvol, Some(2.45));
        assert_eq!(metrics.volume, Some(3_456_789));
    }

    #[test]
    fn test_parse_partial_and_missing() {
        let checker = FinvizChecker::new().unwrap();

        let only_rvol = r#"Rel Volume</td><td><b>0.80</b>"#;
        assert_eq!(
            checker.parse(only_rvol),
            Some(TickerMetrics {
                rvol: Some(0.8),
                volume: None
            })
        );

        assert_eq!(checker.parse("<html>blocked</html>"), None);
    }

    #[tokio::test]
    async fn test_metrics_from_stub() {
        let router = Router::new().route(
            "/quote.ashx",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                if q.get("t").map(String::as_str) == Some("AAPL") {
                    QUOTE_PAGE.to_string()
                } else {
                    String::new()
                }
            }),
        );
        let base = spawn_stub(router).await;
        let checker = FinvizChecker::with_base_url(&format!("{}/quote.ashx", base)).unwrap();

        let metrics = checker.metrics("AAPL").await.unwrap();
        assert_eq!(metrics.rvol, Some(2.45));
        assert!(checker.metrics("ZZZZ").await.is_none());
    }

    #[tokio::test]
    async fn test_metrics_unreachable_is_none() {
        let checker = FinvizChecker::with_base_url("http://127.0.0.1:9/quote.ashx").unwrap();
        assert!(checker.metrics("AAPL").await.is_none());
    }
}
