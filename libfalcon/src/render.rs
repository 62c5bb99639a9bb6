//! Message rendering
//!
//! Produces the single piece of text that every platform receives. When a
//! request carries super-signal alert metadata the text is formatted as an
//! alert (risk marker, price, flags, hashtags); otherwise the request text is
//! passed through unchanged. Rendering is pure and deterministic.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{RenderError, ValidationError};

/// `source` value that marks metadata as a stock alert
pub const SUPER_SIGNAL_SOURCE: &str = "super-signal";

/// Metadata attached to a request, classified once at validation time
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageMetadata {
    #[default]
    None,
    Alert(AlertMetadata),
    /// Present but not an alert (or a malformed alert); ignored by rendering
    Unrecognized(Value),
}

impl MessageMetadata {
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => MessageMetadata::None,
            Some(value) => match AlertMetadata::parse(value) {
                Ok(Some(alert)) => MessageMetadata::Alert(alert),
                Ok(None) => MessageMetadata::Unrecognized(value.clone()),
                Err(e) => {
                    debug!("Ignoring alert metadata: {}", e);
                    MessageMetadata::Unrecognized(value.clone())
                }
            },
        }
    }
}

/// Alert vs. plain signal, controls the header suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    #[default]
    Alert,
    Signal,
    #[serde(other)]
    Other,
}

impl SignalType {
    fn header_suffix(&self) -> &'static str {
        match self {
            SignalType::Alert => " Alert",
            SignalType::Signal => " Signal",
            SignalType::Other => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertMetadata {
    pub ticker: String,
    pub risk_count: u32,
    pub risk_flags: Vec<String>,
    pub price: Option<f64>,
    pub signal_type: SignalType,
}

/// Both key spellings are accepted; snake_case wins when both are present.
#[derive(Deserialize)]
struct RawAlertMetadata {
    ticker: Option<String>,
    #[serde(default)]
    risk_count: Option<u32>,
    #[serde(default, rename = "riskCount")]
    risk_count_camel: Option<u32>,
    #[serde(default)]
    risk_flags: Option<Vec<String>>,
    #[serde(default, rename = "riskFlags")]
    risk_flags_camel: Option<Vec<String>>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    signal_type: Option<SignalType>,
    #[serde(default, rename = "signalType")]
    signal_type_camel: Option<SignalType>,
}

impl AlertMetadata {
    /// Parse super-signal metadata.
    ///
    /// Returns `Ok(None)` when the value is not tagged as a super-signal
    /// payload, and an error when it is tagged but malformed.
    pub fn parse(value: &Value) -> std::result::Result<Option<Self>, RenderError> {
        if value.get("source").and_then(Value::as_str) != Some(SUPER_SIGNAL_SOURCE) {
            return Ok(None);
        }

        let raw: RawAlertMetadata = serde_json::from_value(value.clone())?;

        let ticker = raw
            .ticker
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RenderError::MissingTicker)?;

        if let Some(price) = raw.price {
            if !price.is_finite() || price < 0.0 {
                return Err(RenderError::InvalidPrice(price));
            }
        }

        let risk_flags = raw
            .risk_flags
            .or(raw.risk_flags_camel)
            .unwrap_or_default();
        let risk_count = raw
            .risk_count
            .or(raw.risk_count_camel)
            .unwrap_or_else(|| u32::try_from(risk_flags.len()).unwrap_or(u32::MAX));

        Ok(Some(Self {
            ticker,
            risk_count,
            risk_flags,
            price: raw.price,
            signal_type: raw
                .signal_type
                .or(raw.signal_type_camel)
                .unwrap_or_default(),
        }))
    }
}

/// Severity bucket for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Informational,
    Caution,
    HighAlert,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskTier {
    pub min_count: u32,
    pub level: RiskLevel,
    pub marker: &'static str,
}

/// Thresholds and decorations applied to alerts
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
    /// Highest threshold first; the first tier whose minimum is met wins.
    pub tiers: &'static [RiskTier],
    pub hashtags: &'static [&'static str],
}

const DEFAULT_TIERS: [RiskTier; 3] = [
    RiskTier {
        min_count: 3,
        level: RiskLevel::HighAlert,
        marker: "\u{1F6A8}",
    },
    RiskTier {
        min_count: 1,
        level: RiskLevel::Caution,
        marker: "\u{26A0}\u{FE0F}",
    },
    RiskTier {
        min_count: 0,
        level: RiskLevel::Informational,
        marker: "\u{1F4CA}",
    },
];

impl AlertPolicy {
    pub const DEFAULT: AlertPolicy = AlertPolicy {
        tiers: &DEFAULT_TIERS,
        hashtags: &["#stocks", "#trading"],
    };

    pub fn tier_for(&self, risk_count: u32) -> RiskTier {
        self.tiers
            .iter()
            .find(|tier| risk_count >= tier.min_count)
            .or_else(|| self.tiers.last())
            .copied()
            .unwrap_or(DEFAULT_TIERS[DEFAULT_TIERS.len() - 1])
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Render the outgoing text with the default alert policy
pub fn render(text: &str, metadata: &MessageMetadata) -> Result<String, ValidationError> {
    render_with_policy(text, metadata, &AlertPolicy::DEFAULT)
}

pub fn render_with_policy(
    text: &str,
    metadata: &MessageMetadata,
    policy: &AlertPolicy,
) -> Result<String, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    match metadata {
        MessageMetadata::Alert(alert) => Ok(render_alert(text, alert, policy)),
        MessageMetadata::None | MessageMetadata::Unrecognized(_) => Ok(text.to_string()),
    }
}

fn render_alert(text: &str, alert: &AlertMetadata, policy: &AlertPolicy) -> String {
    let tier = policy.tier_for(alert.risk_count);
    let mut lines = vec![
        format!(
            "{} ${}{}",
            tier.marker,
            alert.ticker,
            alert.signal_type.header_suffix()
        ),
        String::new(),
    ];

    if let Some(price) = alert.price {
        lines.push(format!("Price: ${:.2}", price));
    }

    if alert.risk_count > 0 {
        lines.push(format!("Risk flags: {}", alert.risk_count));
    }

    if !alert.risk_flags.is_empty() {
        lines.push(String::new());
        for flag in &alert.risk_flags {
            lines.push(format!("\u{2022} {}", flag));
        }
    }

    // The generic "$TICKER alert" placeholder adds nothing beyond the header
    let placeholder = format!("${} alert", alert.ticker);
    if !text.trim().eq_ignore_ascii_case(&placeholder) {
        lines.push(String::new());
        lines.push(text.to_string());
    }

    let mut tags = vec![format!("#{}", alert.ticker)];
    tags.extend(policy.hashtags.iter().map(|tag| tag.to_string()));
    lines.push(String::new());
    lines.push(tags.join(" "));

    lines.join("\n")
}
