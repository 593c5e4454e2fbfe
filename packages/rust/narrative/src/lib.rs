//! Research narrative normalization.
//!
//! Turns the free-form `summary` of a research response into a displayable
//! markdown [`Document`]: embedded JSON and boilerplate stripped, the forecast
//! summary lifted out for display below the chart, citations linked to a
//! deduplicated source list.
//!
//! Everything here is a pure function of its input. Unrecognized text shapes
//! pass through rather than erroring, since the upstream format is not fixed.

mod cleanup;
mod extract;
mod sources;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use scoutai_shared::{Document, ForecastSeries, NormalizeOptions, RawResponse, Result, ScoutError};

pub use cleanup::linkify_citations;
pub use sources::{dedupe, render_entry, render_sources, source_key};

/// Title used when sanitizing leaves nothing behind.
const DEFAULT_FORECAST_TITLE: &str = "Market Forecast";

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// A configured normalizer. Cheap to share; holds only compiled rules.
#[derive(Debug, Clone)]
pub struct Normalizer {
    options: NormalizeOptions,
    subheadings: Option<Regex>,
}

impl Normalizer {
    /// Build a normalizer, compiling the built-in and configured subheading titles.
    pub fn new(options: NormalizeOptions) -> Result<Self> {
        let titles = cleanup::BUILTIN_SUBHEADINGS
            .iter()
            .copied()
            .chain(options.extra_subheadings.iter().map(String::as_str));
        let subheadings = cleanup::subheading_matcher(titles)
            .map_err(|e| ScoutError::config(format!("invalid subheading rule: {e}")))?;

        Ok(Self {
            options,
            subheadings,
        })
    }

    /// Normalize one research response into a [`Document`].
    ///
    /// When the forecast has no points, no forecast summary is extracted and
    /// no forecast section is emitted; forecast prose stays in the narrative.
    #[instrument(skip_all, fields(summary_len = raw.summary.len(), sources = raw.sources.len()))]
    pub fn normalize(&self, raw: &RawResponse) -> Document {
        let has_series = !raw.forecast.series.is_empty();
        let (body, forecast_summary) = self.clean_summary(&raw.summary, has_series);

        let forecast_series = has_series.then(|| ForecastSeries {
            title: sanitize_title(&raw.forecast.title),
            unit: raw.forecast.unit.clone(),
            points: raw.forecast.series.clone(),
            scenarios: raw.forecast.scenarios.clone().unwrap_or_default(),
        });

        let sources: Vec<String> = dedupe(&raw.sources)
            .iter()
            .map(|s| render_entry(s))
            .collect();
        let narrative =
            self.assemble(&body, &raw.competitors, forecast_series.as_ref(), &sources);

        debug!(
            narrative_len = narrative.len(),
            has_forecast_summary = forecast_summary.is_some(),
            sources = sources.len(),
            "normalized research response"
        );

        Document {
            narrative,
            forecast_summary,
            forecast_series,
            sources,
        }
    }

    /// Run the cleanup passes over the summary prose.
    fn clean_summary(&self, summary: &str, extract_forecast: bool) -> (String, Option<String>) {
        let mut body = cleanup::strip_artifacts(summary);
        body = cleanup::strip_sources_section(&body);
        body = cleanup::strip_citation_lines(&body);

        let mut forecast_summary = None;
        if extract_forecast {
            let (rest, lifted) = extract::extract_forecast_summary(&body);
            body = rest;
            forecast_summary = lifted
                .map(|s| cleanup::tidy(&linkify_citations(&s)))
                .filter(|s| !s.is_empty());
        }

        body = cleanup::promote_subheadings(&body, self.subheadings.as_ref());
        body = cleanup::bulletize_orphan_lists(&body);
        body = linkify_citations(&body);

        (cleanup::tidy(&body), forecast_summary)
    }

    /// Lay out the final markdown: header, summary, competitors, forecast
    /// pointer, sources. Empty sections are omitted. `sources` are already
    /// rendered entries.
    fn assemble(
        &self,
        body: &str,
        competitors: &[String],
        forecast: Option<&ForecastSeries>,
        sources: &[String],
    ) -> String {
        let mut blocks = vec![self.decorate("📊", "**Market Research Analysis**")];

        if !body.is_empty() {
            blocks.push(self.section("📝", "Summary"));
            blocks.push(body.to_string());
        }

        let names: Vec<&str> = competitors
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if !names.is_empty() {
            blocks.push(self.section("🏢", "Competitors"));
            blocks.push(
                names
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| format!("{}. {name}", idx + 1))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        if let Some(forecast) = forecast {
            blocks.push(self.section("📈", "Market Forecast"));
            // The series itself is drawn by the chart, never restated as text.
            let pointer = if forecast.unit.trim().is_empty() {
                format!("**{}**", forecast.title)
            } else {
                format!("**{}** ({})", forecast.title, forecast.unit.trim())
            };
            blocks.push(pointer);
            blocks.push("*See the interactive chart below for visualization.*".to_string());
        }

        if !sources.is_empty() {
            blocks.push(self.section("📚", "Sources & Citations"));
            blocks.push(sources::number_entries(sources));
        }

        let mut narrative = blocks.join("\n\n");
        narrative.push('\n');
        narrative
    }

    fn section(&self, emoji: &str, title: &str) -> String {
        format!("## {}", self.decorate(emoji, title))
    }

    fn decorate(&self, emoji: &str, text: &str) -> String {
        if self.options.emoji {
            format!("{emoji} {text}")
        } else {
            text.to_string()
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        DEFAULT_NORMALIZER.clone()
    }
}

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(|| {
    Normalizer::new(NormalizeOptions::default()).expect("built-in subheadings compile")
});

/// Normalize with default options.
pub fn normalize(raw: &RawResponse) -> Document {
    DEFAULT_NORMALIZER.normalize(raw)
}

// ---------------------------------------------------------------------------
// Title sanitization
// ---------------------------------------------------------------------------

/// Strip JSON and boilerplate that upstream leaks into the forecast title.
pub fn sanitize_title(title: &str) -> String {
    static CHART_DATA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(cleanup::CHART_DATA_MARKER).expect("valid regex"));
    static FORECAST_JSON_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)Forecast\s+JSON[^:]*:?\s*").expect("valid regex"));

    let cleaned = CHART_DATA_RE.replace_all(title, "");
    let cleaned = FORECAST_JSON_RE.replace_all(&cleaned, "");
    let cleaned = strip_objects(&cleaned);
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        DEFAULT_FORECAST_TITLE.to_string()
    } else {
        cleaned
    }
}

/// Remove every brace-balanced object. An unclosed `{` drops the rest.
fn strip_objects(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let Some(len) = cleanup::balanced_object_len(&rest[open..]) else {
            return out;
        };
        rest = &rest[open + len..];
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
