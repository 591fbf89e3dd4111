//! Turning provider-specific output into [`SearchResult`]s.
use regex::Regex;
use serde_json::Value;
use sift_common::model::SearchResult;
use sift_llm::GroundedAnswer;
use std::collections::HashSet;

/// Preview length for page text that is passed through unsummarized.
pub const PREVIEW_CHARS: usize = 2000;
/// Fallback excerpt length when summarization fails.
pub const FALLBACK_CHARS: usize = 500;
/// Most URLs taken from free text when a provider returned no sources.
pub const MAX_TEXT_URLS: usize = 5;

const URL_KEYS: &[&str] = &["url", "link", "href"];
const TITLE_KEYS: &[&str] = &["title", "name", "pageTitle", "publisher"];
const CONTENT_KEYS: &[&str] = &["snippet", "description", "summary"];

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Map one loosely shaped source object.
///
/// A bare string is taken as the URL. Objects without any URL alias are
/// dropped.
pub fn from_loose_source(source: &Value) -> Option<SearchResult> {
    if let Some(url) = source.as_str() {
        let url = url.trim();
        return (!url.is_empty()).then(|| SearchResult::with_url(url));
    }

    let url = first_str(source, URL_KEYS).or_else(|| {
        source
            .get("metadata")
            .and_then(|m| m.get("url"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })?;

    let mut result = SearchResult::with_url(url);
    if let Some(title) = first_str(source, TITLE_KEYS) {
        result = result.title(title);
    }
    result = result.content(first_str(source, CONTENT_KEYS).unwrap_or_default());
    Some(result)
}

/// Distinct `http(s)` URLs in order of first appearance, capped at
/// [`MAX_TEXT_URLS`].
pub fn urls_in_text(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"https?://[^\s)]+") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '"', '\'', ']', '>']))
        .filter(|u| seen.insert(u.to_string()))
        .take(MAX_TEXT_URLS)
        .map(str::to_string)
        .collect()
}

/// Results for a grounded answer: its sources when any map to a URL, otherwise
/// URLs found in the answer text with empty content.
pub fn grounded_results(answer: &GroundedAnswer) -> Vec<SearchResult> {
    let from_sources: Vec<SearchResult> =
        answer.sources.iter().filter_map(from_loose_source).collect();
    if !from_sources.is_empty() {
        return from_sources;
    }
    urls_in_text(&answer.text)
        .into_iter()
        .map(|u| SearchResult::with_url(u).content(""))
        .collect()
}
