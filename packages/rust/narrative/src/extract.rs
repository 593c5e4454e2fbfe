//! Section extraction by ordered (start, terminator) rules.
//!
//! The `regex` crate has no lookahead, so a section is located in two steps:
//! find the start phrase, then find the earliest terminator after it. The
//! section ends just before the terminator, or at end of text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Terminators for the specific forecast-summary rules.
const STRICT_END: &str =
    r"(?i)Key\s+milestones|Strategic\s+implications|Strategic\s+Recommendations|##|(?m:^#[ \t])";

/// Terminators for the looser fallback rules.
const LOOSE_END: &str = r"(?i)Key\s+milestones|Strategic|##|(?m:^#[ \t])";

/// Emoji decorating a heading, with any variation selectors.
pub(crate) const HEADING_EMOJI: &str = r"(?:[\p{Extended_Pictographic}\x{FE0F}][ \t]*)*";

/// Start phrases may carry a markdown heading prefix (hashes, emoji, a
/// section number) and bold markers. All of it is part of the section so no
/// heading fragment is left behind.
static HEADING_PREFIX: LazyLock<String> = LazyLock::new(|| {
    format!(r"(?:^[ \t]*#{{1,6}}[ \t]*{HEADING_EMOJI}(?:\d+[.)][ \t]*)?)?(?:\*\*)?")
});

const DETAILED_ASSUMPTIONS: &str = r"Detailed\s+discussion\s+of\s+growth\s+assumptions";

/// One extraction rule: a start phrase, an optional phrase the section must
/// reach before its terminator, and the terminator set.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub name: &'static str,
    start: Regex,
    through: Option<Regex>,
    terminator: Regex,
}

impl ExtractionRule {
    pub(crate) fn new(
        name: &'static str,
        start: &str,
        through: Option<&str>,
        terminator: &str,
    ) -> Self {
        Self {
            name,
            start: Regex::new(&format!("(?im){}{start}", *HEADING_PREFIX))
                .expect("valid regex"),
            through: through.map(|t| Regex::new(&format!("(?i){t}")).expect("valid regex")),
            terminator: Regex::new(terminator).expect("valid regex"),
        }
    }

    /// Byte range of the first section this rule matches in `text`.
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        for start in self.start.find_iter(text) {
            let body_from = start.end();
            let stop = self
                .terminator
                .find_at(text, body_from)
                .map_or(text.len(), |m| m.start());

            let end_of_required = match &self.through {
                None => body_from,
                Some(through) => match through.find_at(text, body_from) {
                    // The required phrase must sit inside this section.
                    Some(m) if m.start() < stop => m.end(),
                    _ => continue,
                },
            };

            let end = self
                .terminator
                .find_at(text, end_of_required)
                .map_or(text.len(), |m| m.start());
            return Some(start.start()..end);
        }
        None
    }
}

/// Forecast-summary rules, most specific first. The first rule that matches wins.
pub static FORECAST_SUMMARY_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(
            "summary-with-assumptions",
            r"Summary\s+of\s+the\s+5-year\s+forecast",
            Some(DETAILED_ASSUMPTIONS),
            STRICT_END,
        ),
        ExtractionRule::new(
            "five-year-summary",
            r"Summary\s+of\s+the\s+5-year\s+forecast",
            None,
            STRICT_END,
        ),
        ExtractionRule::new(
            "forecast-summary",
            r"Summary\s+of\s+the\s+forecast",
            None,
            LOOSE_END,
        ),
        ExtractionRule::new(
            "revenue-forecast",
            r"5-year\s+revenue\s+forecast",
            None,
            LOOSE_END,
        ),
    ]
});

/// Follow-up rule for an assumptions block the first pass did not reach.
static ASSUMPTIONS_RULE: LazyLock<ExtractionRule> = LazyLock::new(|| {
    ExtractionRule::new("growth-assumptions", DETAILED_ASSUMPTIONS, None, LOOSE_END)
});

static ASSUMPTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){DETAILED_ASSUMPTIONS}")).expect("valid regex"));

/// Lift the forecast summary out of `md`.
///
/// Returns the narrative with the section removed, and the section itself.
/// When no rule matches the narrative comes back unchanged.
pub(crate) fn extract_forecast_summary(md: &str) -> (String, Option<String>) {
    let mut body = md.to_string();

    let Some((rule, range)) = FORECAST_SUMMARY_RULES
        .iter()
        .find_map(|rule| rule.find(&body).map(|range| (rule, range)))
    else {
        return (body, None);
    };

    let mut summary = body[range.clone()].trim().to_string();
    debug!(rule = rule.name, len = range.len(), "extracted forecast summary");
    body.replace_range(range, "");

    // Upstream headings are inconsistent, so the assumptions block may sit
    // apart from the summary it belongs to.
    if !ASSUMPTIONS_RE.is_match(&summary) {
        if let Some(range) = ASSUMPTIONS_RULE.find(&body) {
            debug!(len = range.len(), "appending detached growth assumptions");
            summary.push_str("\n\n");
            summary.push_str(body[range.clone()].trim());
            body.replace_range(range, "");
        }
    }

    if summary.is_empty() {
        return (body, None);
    }
    (body, Some(summary))
}

/// Remove every section matched by `rule`.
pub(crate) fn remove_sections(md: &str, rule: &ExtractionRule) -> String {
    let mut body = md.to_string();
    while let Some(range) = rule.find(&body) {
        if range.is_empty() {
            break;
        }
        debug!(rule = rule.name, len = range.len(), "removed section");
        body.replace_range(range, "");
    }
    body
}
