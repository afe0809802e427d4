//! HTML metadata scraping
//!
//! A deliberately small scanner: it reads `<title>`, the
//! `<meta name="description">` content and the first `<link rel="icon">`
//! from a page head. It is tolerant of attribute order, quoting style and
//! case.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("static regex"));
static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("static regex"));
static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("static regex"));
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
        .expect("static regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Metadata scraped from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute favicon URL; `/favicon.ico` at the origin when the page
    /// declares none
    pub favicon: Option<String>,
}

impl PageMeta {
    /// Scrape `html`, resolving relative URLs against `base`
    pub fn extract(html: &str, base: &Url) -> Self {
        let title = TITLE
            .captures(html)
            .map(|c| clean_text(&c[1]))
            .filter(|t| !t.is_empty());

        let description = META_TAG.find_iter(html).find_map(|tag| {
            let attrs = attributes(tag.as_str());
            let is_description = attrs
                .iter()
                .any(|(k, v)| k == "name" && v.eq_ignore_ascii_case("description"));
            if !is_description {
                return None;
            }
            attrs
                .into_iter()
                .find(|(k, _)| k == "content")
                .map(|(_, v)| clean_text(&v))
                .filter(|d| !d.is_empty())
        });

        let favicon = LINK_TAG
            .find_iter(html)
            .find_map(|tag| {
                let attrs = attributes(tag.as_str());
                let is_icon = attrs.iter().any(|(k, v)| {
                    k == "rel"
                        && v.split_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("icon"))
                });
                if !is_icon {
                    return None;
                }
                let href = attrs.into_iter().find(|(k, _)| k == "href")?.1;
                base.join(decode_entities(href.trim()).as_str()).ok()
            })
            .or_else(|| base.join("/favicon.ico").ok())
            .map(String::from);

        Self {
            title,
            description,
            favicon,
        }
    }
}

/// Attribute name/value pairs of a single tag, names lowercased
fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTR.captures_iter(tag)
        .map(|c| {
            let name = c[1].to_ascii_lowercase();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn clean_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[test]
    fn test_extracts_all_fields() {
        let html = r#"<html><head>
            <TITLE>  My   Blog &amp; Notes </TITLE>
            <meta content="Thoughts on things" name="Description">
            <link href="/static/icon.png" rel="shortcut icon">
        </head></html>"#;
        let meta = PageMeta::extract(html, &base());
        assert_eq!(meta.title.as_deref(), Some("My Blog & Notes"));
        assert_eq!(meta.description.as_deref(), Some("Thoughts on things"));
        assert_eq!(
            meta.favicon.as_deref(),
            Some("https://example.com/static/icon.png")
        );
    }

    #[test]
    fn test_relative_icon_resolves_against_page() {
        let html = "<link rel='icon' href='fav.svg'>";
        let meta = PageMeta::extract(html, &base());
        assert_eq!(meta.favicon.as_deref(), Some("https://example.com/blog/fav.svg"));
    }

    #[test]
    fn test_favicon_falls_back_to_origin() {
        let meta = PageMeta::extract("<p>no head</p>", &base());
        assert!(meta.title.is_none());
        assert!(meta.description.is_none());
        assert_eq!(meta.favicon.as_deref(), Some("https://example.com/favicon.ico"));
    }

    #[test]
    fn test_ignores_non_icon_links_and_other_meta() {
        let html = r#"<link rel="stylesheet" href="a.css"><meta name="keywords" content="x">"#;
        let meta = PageMeta::extract(html, &base());
        assert!(meta.description.is_none());
        assert_eq!(meta.favicon.as_deref(), Some("https://example.com/favicon.ico"));
    }
}
