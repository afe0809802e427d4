//! URL normalization

use std::sync::LazyLock;

use regex::Regex;

static HAS_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("static regex"));

/// Normalize user input into a probe-able URL
///
/// Absolute `scheme://` URLs pass through unchanged; bare domains and
/// `www.` hosts get an `https://` prefix.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if HAS_SCHEME.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Whether `url` parses as an absolute http or https URL with a host
pub fn is_http_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
