//! Input checks applied before anything is submitted

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::profile::{LinkMap, MAX_LINKS};

/// Minimum label length for library entries
pub const MIN_LIBRARY_LABEL_CHARS: usize = 2;

static LINK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://\S+$").expect("static regex")
});

/// A profile label must be non-empty after trimming
pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.trim().is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    Ok(())
}

/// A link target is either an http(s) URL or an internal route
pub fn validate_link_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with('/') || LINK_URL.is_match(url) {
        return Ok(());
    }
    Err(ValidationError::InvalidUrl(url.to_string()))
}

/// Library labels need at least [`MIN_LIBRARY_LABEL_CHARS`] characters
pub fn validate_library_label(label: &str) -> Result<(), ValidationError> {
    if label.trim().chars().count() < MIN_LIBRARY_LABEL_CHARS {
        return Err(ValidationError::LabelTooShort {
            min: MIN_LIBRARY_LABEL_CHARS,
        });
    }
    Ok(())
}

/// Client-side mirror of the contract's capacity and uniqueness rules
pub fn check_can_receive(links: &LinkMap, label: &str) -> Result<(), ValidationError> {
    if links.is_full() {
        return Err(ValidationError::TooManyLinks { max: MAX_LINKS });
    }
    if links.contains(label) {
        return Err(ValidationError::DuplicateLabel(label.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_url_rules() {
        assert!(validate_link_url("https://example.com").is_ok());
        assert!(validate_link_url("http://example.com/a?b=c").is_ok());
        assert!(validate_link_url("/u/alice").is_ok());
        assert!(validate_link_url("example.com").is_err());
        assert!(validate_link_url("ftp://example.com").is_err());
        assert!(validate_link_url("https://").is_err());
    }

    #[test]
    fn test_label_rules() {
        assert_eq!(validate_label("  "), Err(ValidationError::EmptyLabel));
        assert!(validate_label("x").is_ok());
        assert!(validate_library_label("x").is_err());
        assert!(validate_library_label("Ок").is_ok());
    }

    #[test]
    fn test_capacity_checked_before_duplicate() {
        let links: LinkMap = (0..MAX_LINKS)
            .map(|i| (format!("l{i}"), "https://x.com".to_string()))
            .collect();
        assert_eq!(
            check_can_receive(&links, "l0"),
            Err(ValidationError::TooManyLinks { max: MAX_LINKS })
        );

        let links: LinkMap = [("A", "https://a.com")].into_iter().collect();
        assert!(matches!(
            check_can_receive(&links, "A"),
            Err(ValidationError::DuplicateLabel(_))
        ));
        assert!(check_can_receive(&links, "a").is_ok());
    }
}
