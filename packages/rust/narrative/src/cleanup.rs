//! Narrative cleanup passes.
//!
//! Each pass is a function `&str -> String` applied in sequence by the
//! normalizer. Passes never fail: text they do not recognize is passed
//! through untouched.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::extract::{ExtractionRule, HEADING_EMOJI, remove_sections};

// ---------------------------------------------------------------------------
// Pass 1: Strip machine-readable artifacts
// ---------------------------------------------------------------------------

/// Remove code fences, echoed forecast objects, and chart boilerplate.
///
/// Runs before any section extraction so a removed block cannot split a
/// section in two.
pub(crate) fn strip_artifacts(md: &str) -> String {
    static FORECAST_JSON_SECTION: LazyLock<ExtractionRule> = LazyLock::new(|| {
        ExtractionRule::new(
            "forecast-json-section",
            r"5-Year\s+Forecast\s*\(JSON\)",
            None,
            r"(?i)Summary\s+of\s+the\s+5-year|##",
        )
    });

    let mut result = strip_code_fences(md);
    result = strip_forecast_objects(&result);
    result = strip_boilerplate(&result);
    remove_sections(&result, &FORECAST_JSON_SECTION)
}

/// Remove fenced code blocks of any language.
fn strip_code_fences(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").expect("valid regex"));

    FENCE_RE.replace_all(md, "").to_string()
}

/// Remove brace-delimited objects that carry both a `title` and a `series` key.
///
/// Objects are matched by brace depth, so nested series points go with their
/// parent. An unterminated object is cut to the end of its paragraph.
///
/// A `{` that never closes and carries no forecast keys ends the scan: every
/// later object is a slice of its tail, so none of them can be a forecast
/// object either.
fn strip_forecast_objects(md: &str) -> String {
    let mut out = String::with_capacity(md.len());
    let mut rest = md;

    while let Some(open) = rest.find('{') {
        let tail = &rest[open..];
        match balanced_object_len(tail) {
            Some(len) => {
                if is_forecast_object(&tail[..len]) {
                    debug!(len, "removed echoed forecast object");
                    out.push_str(&rest[..open]);
                } else {
                    out.push_str(&rest[..open + len]);
                }
                rest = &tail[len..];
            }
            None if is_forecast_object(tail) => {
                out.push_str(&rest[..open]);
                let cut = tail.find("\n\n").unwrap_or(tail.len());
                debug!(len = cut, "removed unterminated forecast object");
                rest = &tail[cut..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Length in bytes of the object starting at `s[0] == '{'`, if it closes.
pub(crate) fn balanced_object_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_forecast_object(obj: &str) -> bool {
    static TITLE_KEY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"(?i)"?\btitle\b"?\s*:"#).expect("valid regex"));
    static SERIES_KEY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"(?i)"?\bseries\b"?\s*:"#).expect("valid regex"));

    TITLE_KEY.is_match(obj) && SERIES_KEY.is_match(obj)
}

/// A chart marker: `CHART DATA (...)` in any case, or a bare upper-case
/// `CHART DATA:` label. Prose mentioning chart data is not a marker.
pub(crate) const CHART_DATA_MARKER: &str =
    r"(?i:CHART[ \t]+DATA[ \t]*\([^)\n]*\)[ \t]*:?)|CHART[ \t]+DATA[ \t]*:";

/// Remove "CHART DATA (...)" and "Forecast JSON" markers.
fn strip_boilerplate(md: &str) -> String {
    static CHART_DATA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(CHART_DATA_MARKER).expect("valid regex"));
    static FORECAST_JSON_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)Forecast\s+JSON[^:\n]*:?").expect("valid regex"));

    let result = CHART_DATA_RE.replace_all(md, "");
    FORECAST_JSON_RE.replace_all(&result, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Strip the prose "Sources" section
// ---------------------------------------------------------------------------

/// Remove a `## Sources` style section and its body.
///
/// Accepts `##`/`###`, any emoji prefix, and the "Sources & Citations" and
/// "References" spellings. The body runs until the next `#`.
pub(crate) fn strip_sources_section(md: &str) -> String {
    static SOURCES_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!(
            r"(?im)^[ \t]*#{{2,3}}[ \t]*{HEADING_EMOJI}(?:Sources|References)\b[^#]*$"
        ))
        .expect("valid regex")
    });

    SOURCES_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Strip inline numbered citation lines
// ---------------------------------------------------------------------------

/// Remove standalone `[n] text https://...` lines.
pub(crate) fn strip_citation_lines(md: &str) -> String {
    static CITATION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*\[\d+\][^\n]*https?://[^\n]*(?:\n|$)").expect("valid regex")
    });

    CITATION_LINE_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Promote loose subheadings
// ---------------------------------------------------------------------------

/// Plain-text titles upstream uses as headings.
pub(crate) const BUILTIN_SUBHEADINGS: &[&str] = &[
    "Market gaps and white space opportunities:",
    "Competitive advantages and challenges:",
];

/// Build the matcher for [`promote_subheadings`].
///
/// Returns `None` when there are no titles at all.
pub(crate) fn subheading_matcher<'a>(
    titles: impl IntoIterator<Item = &'a str>,
) -> Result<Option<Regex>, regex::Error> {
    let alternatives: Vec<String> = titles
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?im)^[ \t]*(?:{})", alternatives.join("|"))).map(Some)
}

/// Prefix known subheading lines with `### `.
///
/// Lines already written as markdown headings start with `#` and never match.
pub(crate) fn promote_subheadings(md: &str, matcher: Option<&Regex>) -> String {
    let Some(re) = matcher else {
        return md.to_string();
    };

    re.replace_all(md, |caps: &Captures| format!("### {}", caps[0].trim()))
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 6: Bulletize orphaned list content
// ---------------------------------------------------------------------------

/// Turn plain lines under a `Label:` line into bullets.
///
/// Applies only when two or more plain lines follow the label directly, with
/// no blank line and no existing list, heading, quote, or table markers. A
/// single line stays a paragraph.
pub(crate) fn bulletize_orphan_lists(md: &str) -> String {
    let lines: Vec<&str> = md.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        out.push(line.to_string());
        i += 1;

        if !is_label_line(line) {
            continue;
        }

        let run = lines[i..]
            .iter()
            .take_while(|l| is_plain_line(l))
            .count();
        if run > 1 {
            out.extend(lines[i..i + run].iter().map(|l| format!("- {}", l.trim())));
            i += run;
        }
    }

    let mut result = out.join("\n");
    if md.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// A heading-like line: ends with a colon and contains no other colon.
fn is_label_line(line: &str) -> bool {
    let trimmed = line.trim();
    if starts_with_block_marker(trimmed) && !trimmed.starts_with('#') {
        return false;
    }
    let Some(text) = trimmed
        .trim_start_matches('#')
        .trim_start()
        .strip_suffix(':')
    else {
        return false;
    };
    !text.trim().is_empty() && !text.contains(':')
}

fn is_plain_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !starts_with_block_marker(trimmed) && !is_label_line(trimmed)
}

fn starts_with_block_marker(trimmed: &str) -> bool {
    static ORDERED_ITEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d+[.)]\s").expect("valid regex"));

    trimmed.starts_with(['-', '*', '+', '#', '>', '|']) || ORDERED_ITEM_RE.is_match(trimmed)
}

// ---------------------------------------------------------------------------
// Pass 7: Linkify citation markers
// ---------------------------------------------------------------------------

/// Rewrite each `[n]` marker as `[[n]](#source-n)`.
///
/// Markers that already are link text (`[[n]](...)` or `[n](...)`) are left
/// alone, so the pass is idempotent.
pub fn linkify_citations(md: &str) -> String {
    static CITATION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid regex"));

    CITATION_RE
        .replace_all(md, |caps: &Captures| {
            let Some(whole) = caps.get(0) else {
                return String::new();
            };
            let inside_link = md[..whole.start()].ends_with('[')
                || md[whole.end()..].starts_with('(');
            if inside_link {
                return whole.as_str().to_string();
            }
            format!("[{}](#source-{})", whole.as_str(), &caps[1])
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Final pass: tidy whitespace
// ---------------------------------------------------------------------------

/// Collapse blank runs left by removals to a single blank line and trim the
/// ends. Trailing spaces inside the text are kept: two of them mark a hard
/// line break.
pub(crate) fn tidy(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_removes_any_language() {
        let input = "Before\n```json\n{\"a\": 1}\n```\nMiddle\n```\nplain\n```\nAfter";
        assert_eq!(strip_code_fences(input), "Before\n\nMiddle\n\nAfter");
    }

    #[test]
    fn strip_code_fences_leaves_unclosed_fence() {
        let input = "Text\n```python\nprint(1)";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn strip_forecast_objects_takes_nested_series() {
        let input = r#"Lead in. {"title": "Revenue", "unit": "USD", "series": [{"year": 2024, "value": 1}, {"year": 2025, "value": 2}]} Tail."#;
        assert_eq!(strip_forecast_objects(input), "Lead in.  Tail.");
    }

    #[test]
    fn strip_forecast_objects_accepts_unquoted_keys() {
        let input = "See {title: Revenue, series: [1, 2]} here";
        assert_eq!(strip_forecast_objects(input), "See  here");
    }

    #[test]
    fn strip_forecast_objects_keeps_other_braces() {
        let input = r#"Template {name} and {"title": "only title"} stay."#;
        assert_eq!(strip_forecast_objects(input), input);
    }

    #[test]
    fn strip_forecast_objects_cuts_unterminated_to_paragraph_end() {
        let input = "Intro\n{\"title\": \"R\", \"series\": [{\"year\": 2024\n\nNext paragraph";
        assert_eq!(strip_forecast_objects(input), "Intro\n\n\nNext paragraph");
    }

    #[test]
    fn strip_forecast_objects_keeps_unclosed_braces() {
        let input = format!("{} then {{name}} and text", "{".repeat(20_000));
        assert_eq!(strip_forecast_objects(&input), input);
    }

    #[test]
    fn strip_forecast_objects_ignores_braces_in_strings() {
        let input = r#"X {"title": "a } b", "series": []} Y"#;
        assert_eq!(strip_forecast_objects(input), "X  Y");
    }

    #[test]
    fn strip_boilerplate_removes_markers() {
        let input = "CHART DATA (for the widget):\nForecast JSON below:\nReal text";
        assert_eq!(strip_boilerplate(input), "\n\nReal text");
    }

    #[test]
    fn strip_boilerplate_leaves_chart_data_prose_alone() {
        let prose = "Our chart data shows strong growth.
See the chart data: below.";
        assert_eq!(strip_boilerplate(prose), prose);
        assert_eq!(strip_boilerplate("CHART DATA: x"), " x");
        assert_eq!(strip_boilerplate("chart data (json) x"), "x");
    }

    #[test]
    fn strip_artifacts_drops_forecast_json_section() {
        let input = "Intro\n\n5-Year Forecast (JSON)\nyear 2024: 10\n\nSummary of the 5-year forecast\nUp.";
        let result = strip_artifacts(input);
        assert_eq!(result, "Intro\n\nSummary of the 5-year forecast\nUp.");
    }

    #[test]
    fn strip_sources_section_matches_variants() {
        for header in [
            "## Sources",
            "## Sources & Citations",
            "## 📚 Sources & Citations",
            "### Sources",
            "### Source Citations",
            "## References",
        ] {
            let input = format!("Body text.\n\n{header}\n[1] Foo https://foo.com\nBar baz\n");
            let result = strip_sources_section(&input);
            if header.contains("Source Citations") {
                // "Source" without the plural is not a sources header.
                assert_eq!(result, input);
                continue;
            }
            assert_eq!(result, "Body text.\n\n", "header {header:?}");
        }
    }

    #[test]
    fn strip_sources_section_stops_at_next_heading() {
        let input = "## Sources\n- a\n- b\n## Appendix\nKeep me";
        assert_eq!(strip_sources_section(input), "\n## Appendix\nKeep me");
    }

    #[test]
    fn strip_citation_lines_removes_only_url_citations() {
        let input = "Claim [1].\n[1] Grand View Research https://gvr.com/x\n[2] No link here\nEnd";
        assert_eq!(
            strip_citation_lines(input),
            "Claim [1].\n[2] No link here\nEnd"
        );
    }

    #[test]
    fn promote_subheadings_builtin_titles() {
        let re = subheading_matcher(BUILTIN_SUBHEADINGS.iter().copied())
            .expect("compile")
            .expect("non-empty");
        let input = "Market gaps and white space opportunities:\nA\n\n### Competitive advantages and challenges:\nB";
        assert_eq!(
            promote_subheadings(input, Some(&re)),
            "### Market gaps and white space opportunities:\nA\n\n### Competitive advantages and challenges:\nB"
        );
    }

    #[test]
    fn promote_subheadings_escapes_configured_titles() {
        let re = subheading_matcher(["Risks (and mitigations):", "   "])
            .expect("compile")
            .expect("non-empty");
        assert_eq!(
            promote_subheadings("risks (and mitigations):\nx", Some(&re)),
            "### risks (and mitigations):\nx"
        );
    }

    #[test]
    fn subheading_matcher_empty_is_none() {
        assert!(subheading_matcher(["", " "]).expect("compile").is_none());
        assert_eq!(promote_subheadings("Text:", None), "Text:");
    }

    #[test]
    fn bulletize_converts_multiple_plain_lines() {
        let input = "### Strengths:\nFast service\nLow prices\n\nNext paragraph";
        assert_eq!(
            bulletize_orphan_lists(input),
            "### Strengths:\n- Fast service\n- Low prices\n\nNext paragraph"
        );
    }

    #[test]
    fn bulletize_leaves_single_line_alone() {
        let input = "Note:\nOnly one line here.\n\nMore";
        assert_eq!(bulletize_orphan_lists(input), input);
    }

    #[test]
    fn bulletize_leaves_existing_lists_alone() {
        let input = "Options:\n- one\n- two\n\nSteps:\n1. first\n2. second\n";
        assert_eq!(bulletize_orphan_lists(input), input);
    }

    #[test]
    fn bulletize_stops_at_next_label() {
        let input = "Strengths:\nA\nB\nWeaknesses:\nC\nD";
        assert_eq!(
            bulletize_orphan_lists(input),
            "Strengths:\n- A\n- B\nWeaknesses:\n- C\n- D"
        );
    }

    #[test]
    fn bulletize_ignores_lines_with_inner_colons() {
        let input = "Time: 10:30\nA\nB";
        assert_eq!(bulletize_orphan_lists(input), input);
    }

    #[test]
    fn linkify_citations_targets_source_anchor() {
        assert_eq!(
            linkify_citations("Growing fast [2]."),
            "Growing fast [[2]](#source-2)."
        );
    }

    #[test]
    fn linkify_citations_is_idempotent() {
        let once = linkify_citations("A [1] and B [12].");
        assert_eq!(once, "A [[1]](#source-1) and B [[12]](#source-12).");
        assert_eq!(linkify_citations(&once), once);
    }

    #[test]
    fn linkify_citations_skips_existing_links() {
        let input = "See [3](https://example.com).";
        assert_eq!(linkify_citations(input), input);
    }

    #[test]
    fn tidy_collapses_blank_runs() {
        assert_eq!(tidy("\n\nA\n\n\n\nB\n\n"), "A\n\nB");
        assert_eq!(tidy("A\n  \n\t\n\nB"), "A\n\nB");
    }

    #[test]
    fn tidy_keeps_hard_line_breaks() {
        let input = "Line one  \nLine two";
        assert_eq!(tidy(input), input);
        assert_eq!(tidy(&tidy(input)), input);
    }
}
