//! Turns free-text model output into short lists.
//!
//! Model formatting is not guaranteed, so these rules are deliberately tolerant and
//! kept free of any network code.

use std::sync::LazyLock;

use regex::Regex;

/// Returned in place of an empty list when nothing could be parsed.
pub const NO_POINTS_EXTRACTED: &str = "No points extracted";

pub const INSIGHT_POINT_COUNT: usize = 2;
pub const MAX_KEYWORDS: usize = 5;

/// `1.`, `12.`, or a `-`, `*` or `•` bullet. A marker must be followed by whitespace
/// or end the line, so `---` rules and `*emphasis*` are not markers.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+\.|[-*•])(?:\s+|$)").expect("list marker pattern is valid")
});

/// Parses a list-shaped response into at most `limit` entries.
///
/// Lines starting with an ordinal or bullet marker are taken with the marker removed.
/// If no line carries a marker, every non-empty line is taken verbatim instead.
/// Lines without any letters or digits (rules, stray markers) are skipped, and the cap
/// applies only after marked lines have been preferred.
pub fn parse_points(text: &str, limit: usize) -> Vec<String> {
    let mut marked = Vec::new();
    let mut unmarked = Vec::new();

    for line in text.lines() {
        let line = strip_emphasis(line);

        match LIST_MARKER.find(&line) {
            Some(m) => {
                let rest = line[m.end()..].trim();
                if has_content(rest) {
                    marked.push(rest.to_string());
                }
            }
            None if has_content(&line) => unmarked.push(line),
            None => {}
        }
    }

    let mut points = if marked.is_empty() { unmarked } else { marked };
    points.truncate(limit);
    points
}

/// Like [`parse_points`] with the insight target size, but never empty.
pub fn insight_points(text: &str) -> Vec<String> {
    let points = parse_points(text, INSIGHT_POINT_COUNT);
    if points.is_empty() {
        return vec![NO_POINTS_EXTRACTED.to_string()];
    }
    points
}

/// Keywords may arrive one per line, comma separated, or both.
pub fn parse_keywords(text: &str) -> Vec<String> {
    parse_points(text, usize::MAX)
        .iter()
        .flat_map(|line| line.split(','))
        .map(|k| k.trim().trim_end_matches('.').trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .take(MAX_KEYWORDS)
        .collect()
}

/// Removes paired bold markup; single `*` bullets survive for marker detection.
fn strip_emphasis(line: &str) -> String {
    line.replace("**", "").replace("__", "").trim().to_string()
}

fn has_content(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

/// Cuts `s` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
