//! Chat transcript for one research session.
//!
//! The transcript is the sole owner of its messages. Each research response
//! is normalized once, on arrival, and stored on an immutable assistant
//! message; nothing is cached across turns.

use tracing::{info, instrument, warn};

use scoutai_narrative::Normalizer;
use scoutai_shared::{Message, RawResponse, Result};

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Ordered message history for a chat session.
#[derive(Debug, Default)]
pub struct Transcript {
    normalizer: Normalizer,
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript that normalizes with `normalizer`.
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            messages: Vec::new(),
        }
    }

    /// Record the user's startup idea.
    pub fn push_user(&mut self, idea: impl Into<String>) -> &Message {
        self.push(Message::user(idea))
    }

    /// Normalize a validated response and record it as an assistant turn.
    #[instrument(skip_all, fields(turn = self.messages.len()))]
    pub fn record_response(&mut self, raw: &RawResponse) -> &Message {
        let doc = self.normalizer.normalize(raw);
        info!(
            sources = doc.sources.len(),
            has_chart = doc.forecast_series.is_some(),
            "recorded research response"
        );
        self.push(Message::assistant(doc))
    }

    /// Decode and validate a JSON payload, then record it.
    ///
    /// On failure nothing is recorded; the caller decides whether to show
    /// the error with [`Transcript::record_error`].
    pub fn record_payload(&mut self, json: &str) -> Result<&Message> {
        let raw = RawResponse::from_json(json)?;
        Ok(self.record_response(&raw))
    }

    /// Record the inline error bubble shown for an upstream failure.
    pub fn record_error(&mut self, text: impl Into<String>) -> &Message {
        let text = text.into();
        warn!(error = %text, "research request failed");
        self.push(Message::error(text))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, msg: Message) -> &Message {
        self.messages.push(msg);
        &self.messages[self.messages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutai_shared::{Role, ScoutError};

    const PAYLOAD: &str = r#"{
        "summary": "Demand is rising [1].\n\nSummary of the 5-year forecast\nSteady growth.",
        "competitors": ["Acme"],
        "forecast": {"title": "Revenue", "unit": "USD",
                     "series": [{"year": 2025, "value": 10}, {"year": 2026, "value": 20}]},
        "sources": ["https://a.com", "https://a.com."]
    }"#;

    #[test]
    fn records_user_and_assistant_turns_in_order() {
        let mut transcript = Transcript::default();
        transcript.push_user("Mobile bike repair subscriptions");
        let msg = transcript.record_payload(PAYLOAD).expect("valid payload");

        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.contains("[[1]](#source-1)"));
        assert_eq!(msg.forecast_summary.as_deref(), Some("Summary of the 5-year forecast\nSteady growth."));
        assert_eq!(msg.forecast.as_ref().map(|f| f.points.len()), Some(2));
        assert_eq!(msg.sources, vec!["[https://a.com](https://a.com)".to_string()]);

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].role, Role::User);
    }

    #[test]
    fn invalid_payload_records_nothing() {
        let mut transcript = Transcript::default();
        let err = transcript.record_payload("not json").unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));
        assert!(transcript.is_empty());
    }

    #[test]
    fn error_bubble_is_an_assistant_message() {
        let mut transcript = Transcript::default();
        transcript.record_error("API error: 500");
        let last = transcript.last().expect("message");
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.contains("API error: 500"));
        assert!(last.forecast.is_none());
    }

    #[test]
    fn responses_are_normalized_independently() {
        let mut transcript = Transcript::default();
        let raw = RawResponse::from_json(PAYLOAD).expect("valid payload");
        let first = transcript.record_response(&raw).content.clone();
        let second = transcript.record_response(&raw).content.clone();
        assert_eq!(first, second);
        assert_ne!(transcript.messages()[0].id, transcript.messages()[1].id);
    }
}
