//! Source list deduplication and rendering.
//!
//! Entries are keyed by the URL they point at. The key is deliberately
//! shallow: lowercase plus trailing punctuation stripped. Query-string and
//! trailing-slash variants of one resource stay distinct.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

/// Target of a markdown link: `](url)`.
static LINK_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(([^)]+)\)").expect("valid regex"));

/// A whole markdown link: `[text](url)`.
static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\([^)\s]+\)").expect("valid regex"));

/// First bare URL, for keying. Stops at brackets and quotes.
static KEY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s)\]"]+"#).expect("valid regex"));

/// First bare URL, for rendering. Stops only at whitespace and angle brackets.
static RENDER_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s<>"]+"#).expect("valid regex"));

const TRAILING_PUNCT: [char; 8] = ['.', ',', ';', ':', '!', '?', ')', ']'];

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Comparison key for a source entry.
///
/// Tried in order: a markdown link target, the first `http(s)://` URL, the
/// whole trimmed entry. The result is lowercased with trailing punctuation
/// removed.
pub fn source_key(entry: &str) -> String {
    let trimmed = entry.trim();
    let raw = LINK_TARGET_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .or_else(|| KEY_URL_RE.find(trimmed))
        .map_or(trimmed, |m| m.as_str());

    raw.to_lowercase().trim_end_matches(TRAILING_PUNCT).to_string()
}

/// Drop entries whose key was already seen. First occurrence wins and
/// relative order is kept. Blank entries are skipped.
pub fn dedupe(sources: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = sources
        .iter()
        .filter(|s| !s.trim().is_empty())
        .filter(|s| seen.insert(source_key(s)))
        .cloned()
        .collect();

    if unique.len() < sources.len() {
        debug!(
            input = sources.len(),
            kept = unique.len(),
            "dropped duplicate or blank sources"
        );
    }
    unique
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a canonical source list as a numbered markdown list.
///
/// Item `n` carries the `source-n` anchor that linkified `[n]` markers point at.
pub fn render_sources(sources: &[String]) -> String {
    let rendered: Vec<String> = sources.iter().map(|s| render_entry(s)).collect();
    number_entries(&rendered)
}

/// Number already rendered entries and give each its anchor.
pub(crate) fn number_entries(entries: &[String]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let n = idx + 1;
            format!("{n}. <span id=\"source-{n}\"></span>{entry}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one entry: as-is when it already is a markdown link, as a link
/// when a URL can be recovered from it, as plain text otherwise.
///
/// Rendering a rendered entry returns it unchanged.
pub fn render_entry(entry: &str) -> String {
    let trimmed = entry.trim();
    if MD_LINK_RE.is_match(trimmed) {
        return trimmed.to_string();
    }

    let Some((range, url)) = recover_url(trimmed) else {
        return trimmed.to_string();
    };

    let remainder = format!("{} {}", &trimmed[..range.start], &trimmed[range.end..]);
    let text = remainder
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let text = text
        .trim_matches(|c: char| matches!(c, '-' | '—' | '–' | ':' | '|' | ',') || c.is_whitespace());

    if text.is_empty() {
        format!("[{url}]({url})")
    } else {
        format!("[{text}]({url})")
    }
}

/// Find the first absolute URL in `entry`.
///
/// Returns the byte range of the raw match and the URL with sentence
/// punctuation trimmed. Matches that do not parse as a URL are ignored.
fn recover_url(entry: &str) -> Option<(Range<usize>, String)> {
    let m = RENDER_URL_RE.find(entry)?;
    let cleaned = trim_url_tail(m.as_str());
    Url::parse(cleaned).ok()?;
    Some((m.range(), cleaned.to_string()))
}

/// Strip sentence punctuation glued to the end of a URL. Closing brackets
/// are only stripped when unbalanced within the URL.
fn trim_url_tail(url: &str) -> &str {
    let mut end = url;
    loop {
        let Some(last) = end.chars().next_back() else {
            return end;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' => true,
            ')' => end.matches('(').count() < end.matches(')').count(),
            ']' => end.matches('[').count() < end.matches(']').count(),
            _ => false,
        };
        if !strip {
            return end;
        }
        end = &end[..end.len() - last.len_utf8()];
    }
}
