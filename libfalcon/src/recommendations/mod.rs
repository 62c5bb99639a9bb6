//! Stock recommendations feed
//!
//! Polls a recommendations endpoint, filters candidates on relative volume
//! and volume scraped from Finviz, skips tickers that were already
//! announced, and publishes one formatted card per ticker through the
//! dispatch engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod fetcher;
pub mod format;
pub mod metrics;
pub mod scheduler;
pub mod tracker;

pub use fetcher::{RecommendationSource, RecommendationsFetcher};
pub use format::{format_recommendation, format_volume};
pub use metrics::{FinvizChecker, MetricsSource, TickerMetrics};
pub use scheduler::{
    FilterPolicy, PreviewEntry, RecommendationsScheduler, RunSummary, SkipReason, Verdict,
};
pub use tracker::{PostedTicker, PostedTickers};

/// One recommendation as served by the endpoint
///
/// The endpoint schema is loose (prices may be strings or numbers), so the
/// raw JSON object is kept and fields are read as display text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recommendation {
    fields: Map<String, Value>,
}

impl Recommendation {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Ticker symbol, if present and non-blank
    pub fn ticker(&self) -> Option<&str> {
        self.fields
            .get("ticker")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Field rendered as text; missing or null fields are empty
    pub fn text(&self, key: &str) -> String {
        self.text_or(key, "")
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        match self.fields.get(key) {
            None | Some(Value::Null) => default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Field as an owned string, `None` when missing, null or blank
    pub fn optional(&self, key: &str) -> Option<String> {
        Some(self.text(key)).filter(|s| !s.trim().is_empty())
    }
}

impl From<Map<String, Value>> for Recommendation {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Extract recommendation items from an endpoint response
///
/// Accepts a bare list, an object wrapping a `recommendations` list, or a
/// single recommendation object. Non-object entries are dropped.
pub fn recommendations_from_value(value: Value) -> Vec<Recommendation> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("recommendations") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None if object.is_empty() => Vec::new(),
            None => vec![Value::Object(object)],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(Recommendation::new(fields)),
            other => {
                tracing::debug!("Ignoring non-object recommendation entry: {}", other);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_list() {
        let items = recommendations_from_value(json!([
            {"ticker": "AAPL"},
            {"ticker": "MSFT"},
            "garbage"
        ]));
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].ticker(), Some("MSFT"));
    }

    #[test]
    fn test_extract_from_wrapper_object() {
        let items = recommendations_from_value(json!({
            "generated_at": "2025-01-01",
            "recommendations": [{"ticker": "NVDA"}]
        }));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ticker(), Some("NVDA"));
    }

    #[test]
    fn test_extract_single_object() {
        let items = recommendations_from_value(json!({"ticker": "TSLA", "company": "Tesla"}));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text("company"), "Tesla");
    }

    #[test]
    fn test_extract_empty_inputs() {
        assert!(recommendations_from_value(Value::Null).is_empty());
        assert!(recommendations_from_value(json!({})).is_empty());
        assert!(recommendations_from_value(json!([])).is_empty());
        assert!(recommendations_from_value(json!("text")).is_empty());
    }

    #[test]
    fn test_field_rendering() {
        let item: Recommendation = serde_json::from_value(json!({
            "ticker": "  ",
            "target_price": 123.5,
            "stop_loss": "95",
            "earnings_date": null
        }))
        .unwrap();

        assert_eq!(item.ticker(), None);
        assert_eq!(item.text("target_price"), "123.5");
        assert_eq!(item.text("stop_loss"), "95");
        assert_eq!(item.text_or("earnings_date", "TBD"), "TBD");
        assert_eq!(item.text_or("company", "Unknown"), "Unknown");
        assert_eq!(item.optional("earnings_date"), None);
        assert_eq!(item.optional("stop_loss"), Some("95".to_string()));
    }
}
