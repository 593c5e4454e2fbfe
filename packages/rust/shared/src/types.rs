//! Core domain types for ScoutAI research responses and chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScoutError};

// ---------------------------------------------------------------------------
// RawResponse (input boundary)
// ---------------------------------------------------------------------------

/// One data point of a forecast series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub value: f64,
}

/// The `forecast` object of a research response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Chart title. Upstream sometimes leaks JSON or boilerplate into it.
    pub title: String,
    /// Unit of measurement (e.g. `USD`, `Million Users`).
    pub unit: String,
    /// Data points in upstream order.
    pub series: Vec<ForecastPoint>,
    /// Optional named scenarios (e.g. "base case", "bull case").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<String>>,
}

/// Payload returned by the research service.
///
/// Callers own it; the normalizer only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Free-form narrative: prose mixed with JSON fragments, citations and headings.
    pub summary: String,
    pub competitors: Vec<String>,
    pub forecast: Forecast,
    pub sources: Vec<String>,
}

impl RawResponse {
    /// Decode a JSON payload and check it against the response schema.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json)
            .map_err(|e| ScoutError::parse(format!("invalid research payload: {e}")))?;
        raw.validate()?;
        Ok(raw)
    }

    /// Check the invariants the normalizer relies on.
    ///
    /// Every forecast value must be finite and non-negative. An empty series
    /// is allowed; it simply means there is nothing to chart.
    pub fn validate(&self) -> Result<()> {
        for (idx, point) in self.forecast.series.iter().enumerate() {
            if !point.value.is_finite() {
                return Err(ScoutError::validation(format!(
                    "forecast.series[{idx}].value is not a finite number"
                )));
            }
            if point.value < 0.0 {
                return Err(ScoutError::validation(format!(
                    "forecast.series[{idx}].value must be >= 0 (got {})",
                    point.value
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Document (output boundary)
// ---------------------------------------------------------------------------

/// Chart-ready forecast data, passed through from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    /// Title with JSON and boilerplate artifacts stripped.
    pub title: String,
    pub unit: String,
    /// Upstream series, verbatim: never sorted, rounded or renumbered.
    pub points: Vec<ForecastPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<String>,
}

/// Structured result of normalizing one research response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Markdown body: header, summary, competitors, forecast pointer, sources.
    pub narrative: String,
    /// Forecast prose lifted out of the narrative, shown below the chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_summary: Option<String>,
    /// Absent when the payload had no forecast points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_series: Option<ForecastSeries>,
    /// Canonical (deduplicated) source list in first-seen order, each entry
    /// rendered as a markdown link when a URL is recoverable.
    pub sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the chat transcript.
///
/// Assistant messages carry the fields of the [`Document`] they were built
/// from. Records are immutable once pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// UUID v7, so ids sort by creation time.
    pub id: Uuid,
    pub role: Role,
    /// Markdown for assistant messages, plain text for user messages.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            timestamp: Utc::now(),
            forecast: None,
            forecast_summary: None,
            sources: Vec::new(),
        }
    }

    /// A message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    /// An assistant turn built from a normalized document.
    pub fn assistant(doc: Document) -> Self {
        let mut msg = Self::new(Role::Assistant, doc.narrative);
        msg.forecast = doc.forecast_series;
        msg.forecast_summary = doc.forecast_summary;
        msg.sources = doc.sources;
        msg
    }

    /// The inline error bubble shown when the research call fails upstream.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, format!("❌ **Error:** {}", text.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/json")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    #[test]
    fn research_fixture_validates() {
        let raw = RawResponse::from_json(&fixture("research_response.fixture.json"))
            .expect("fixture should parse");
        assert_eq!(raw.forecast.series.len(), 5);
        assert_eq!(raw.forecast.series[0].year, 2025);
        assert!(raw.summary.contains("Summary of the 5-year forecast"));
        assert_eq!(raw.forecast.scenarios.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn scenarios_are_optional() {
        let json = r#"{
            "summary": "s",
            "competitors": [],
            "forecast": {"title": "t", "unit": "USD", "series": []},
            "sources": []
        }"#;
        let raw = RawResponse::from_json(json).expect("parse");
        assert!(raw.forecast.scenarios.is_none());
        assert!(raw.forecast.series.is_empty());
    }

    #[test]
    fn negative_value_is_rejected() {
        let json = r#"{
            "summary": "s",
            "competitors": [],
            "forecast": {"title": "t", "unit": "USD",
                         "series": [{"year": 2024, "value": 10}, {"year": 2025, "value": -1}]},
            "sources": []
        }"#;
        let err = RawResponse::from_json(json).unwrap_err();
        assert!(matches!(err, ScoutError::Validation { .. }));
        assert!(err.to_string().contains("series[1]"));
    }

    #[test]
    fn fractional_year_is_a_parse_error() {
        let json = r#"{
            "summary": "s",
            "competitors": [],
            "forecast": {"title": "t", "unit": "USD", "series": [{"year": 2024.5, "value": 1}]},
            "sources": []
        }"#;
        let err = RawResponse::from_json(json).unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));
    }

    #[test]
    fn document_uses_camel_case_and_skips_absent_fields() {
        let doc = Document {
            narrative: "body".into(),
            forecast_summary: Some("grows".into()),
            forecast_series: None,
            sources: vec![],
        };
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["forecastSummary"], "grows");
        assert!(json.get("forecastSeries").is_none());
    }

    #[test]
    fn assistant_message_carries_document_fields() {
        let doc = Document {
            narrative: "## Summary".into(),
            forecast_summary: Some("Summary of the forecast".into()),
            forecast_series: Some(ForecastSeries {
                title: "Revenue".into(),
                unit: "USD".into(),
                points: vec![ForecastPoint {
                    year: 2025,
                    value: 1000.0,
                }],
                scenarios: vec![],
            }),
            sources: vec!["https://a.com".into()],
        };
        let msg = Message::assistant(doc);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "## Summary");
        assert_eq!(msg.forecast.as_ref().map(|f| f.points.len()), Some(1));
        assert_eq!(msg.sources, vec!["https://a.com".to_string()]);
    }

    #[test]
    fn user_message_serializes_role() {
        let first = Message::user("an idea about bikes");
        let second = Message::user("another idea");
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.get_version_num(), 7);
        let json = serde_json::to_string(&first).expect("serialize");
        assert!(json.contains(r#""role":"user""#));
    }
}
