//! Discord card layout for a single recommendation

use crate::recommendations::{Recommendation, TickerMetrics};

/// Human readable volume: `1.23M`, `12.3K`, or the raw count
pub fn format_volume(volume: u64) -> String {
    if volume >= 1_000_000 {
        format!("{:.2}M", volume as f64 / 1_000_000.0)
    } else if volume >= 1_000 {
        format!("{:.1}K", volume as f64 / 1_000.0)
    } else {
        volume.to_string()
    }
}

pub fn format_recommendation(item: &Recommendation, metrics: Option<&TickerMetrics>) -> String {
    let mut lines = vec![
        format!(
            "**${}** - {}",
            item.text_or("ticker", "???"),
            item.text_or("company", "Unknown")
        ),
        format!(
            "Sector: {} | Theme: {} | Risk: {}",
            item.text("sector"),
            item.text("theme"),
            item.text("risk_level")
        ),
    ];

    if let Some(line) = metrics.and_then(metrics_line) {
        lines.push(line);
    }

    lines.push(String::new());
    lines.push(format!("Entry: {}", item.text("entry_price_range")));
    lines.push(format!(
        "Target: {} | Stop: {}",
        item.text("target_price"),
        item.text("stop_loss")
    ));

    if let Some(earnings) = item.optional("earnings_date") {
        lines.push(format!("Earnings: {}", earnings));
    }

    if let Some(reasoning) = item.optional("reasoning") {
        lines.push(format!("\n_{}_", reasoning));
    }

    lines.join("\n")
}

fn metrics_line(metrics: &TickerMetrics) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(rvol) = metrics.rvol {
        let marker = if rvol >= 2.0 { "🔥" } else { "📊" };
        parts.push(format!("{} RVOL: {:.2}", marker, rvol));
    }
    if let Some(volume) = metrics.volume {
        let marker = if volume >= 1_000_000 { "📈" } else { "📉" };
        parts.push(format!("{} Vol: {}", marker, format_volume(volume)));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Recommendation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(1_234_567), "1.23M");
        assert_eq!(format_volume(1_000_000), "1.00M");
        assert_eq!(format_volume(12_345), "12.3K");
        assert_eq!(format_volume(999), "999");
        assert_eq!(format_volume(0), "0");
    }

    #[test]
    fn test_full_card() {
        let rec = item(json!({
            "ticker": "AAPL",
            "company": "Apple Inc.",
            "sector": "Technology",
            "theme": "AI",
            "risk_level": "Medium",
            "entry_price_range": "$180-185",
            "target_price": 210,
            "stop_loss": "$172",
            "earnings_date": "2025-01-30",
            "reasoning": "Breakout on volume"
        }));
        let metrics = TickerMetrics {
            rvol: Some(2.5),
            volume: Some(4_500_000),
        };

        let card = format_recommendation(&rec, Some(&metrics));
        assert_eq!(
            card,
            "**$AAPL** - Apple Inc.\n\
             Sector: Technology | Theme: AI | Risk: Medium\n\
             🔥 RVOL: 2.50 | 📈 Vol: 4.50M\n\
             \n\
             Entry: $180-185\n\
             Target: 210 | Stop: $172\n\
             Earnings: 2025-01-30\n\
             \n\
             _Breakout on volume_"
        );
    }

    #[test]
    fn test_minimal_card_defaults() {
        let card = format_recommendation(&item(json!({})), None);
        assert_eq!(
            card,
            "**$???** - Unknown\nSector:  | Theme:  | Risk: \n\nEntry: \nTarget:  | Stop: "
        );
    }

    #[test]
    fn test_quiet_metrics_markers() {
        let rec = item(json!({"ticker": "F"}));
        let metrics = TickerMetrics {
            rvol: Some(1.2),
            volume: Some(800),
        };
        let card = format_recommendation(&rec, Some(&metrics));
        assert!(card.contains("📊 RVOL: 1.20 | 📉 Vol: 800"));

        let only_volume = TickerMetrics {
            rvol: None,
            volume: Some(2_000_000),
        };
        let card = format_recommendation(&rec, Some(&only_volume));
        assert!(card.contains("\n📈 Vol: 2.00M\n"));
        assert!(!card.contains("RVOL"));

        let card = format_recommendation(&rec, Some(&TickerMetrics::default()));
        assert!(!card.contains("Vol:"));
    }
}
