//! Canonical URL / slug derivation for article titles.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]").expect("valid slug charset regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("title {title:?} has no characters usable in a URL slug")]
    Empty { title: String },
}

/// Lower-cases `title`, collapses whitespace runs to `-` and drops anything outside `[a-z0-9-]`.
///
/// Leading and trailing whitespace is ignored, so a blank title yields `""`.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let hyphenated = WHITESPACE.replace_all(&lowered, "-");
    DISALLOWED.replace_all(&hyphenated, "").into_owned()
}

/// `{site_url}/posts/{slug}`. Titles whose slug has no alphanumeric character are rejected.
pub fn canonical_url(site_url: &str, title: &str) -> Result<String, SlugError> {
    let slug = derive_slug(title);
    if !slug.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(SlugError::Empty {
            title: title.to_owned(),
        });
    }
    Ok(format!("{}/posts/{}", site_url.trim_end_matches('/'), slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_punctuation_and_hyphenates() {
        assert_eq!(derive_slug("Hello, World! 2024"), "hello-world-2024");
    }

    #[test]
    fn slug_collapses_whitespace_runs() {
        assert_eq!(derive_slug("Rust \t and\n  YAML"), "rust-and-yaml");
    }

    #[test]
    fn blank_title_yields_empty_slug() {
        assert_eq!(derive_slug("  "), "");
        assert_eq!(derive_slug("!!! ???"), "-");
    }

    #[test]
    fn slug_is_deterministic() {
        let title = "Building a Blog Pipeline in Rust";
        assert_eq!(derive_slug(title), derive_slug(title));
        assert_eq!(derive_slug(&derive_slug(title)), derive_slug(title));
    }

    #[test]
    fn canonical_url_joins_base_and_slug() {
        assert_eq!(
            canonical_url("https://example.com/", "Hello, World! 2024").unwrap(),
            "https://example.com/posts/hello-world-2024"
        );
    }

    #[test]
    fn canonical_url_rejects_empty_slug() {
        let err = canonical_url("https://example.com", "   ").unwrap_err();
        assert_eq!(
            err,
            SlugError::Empty {
                title: "   ".to_owned()
            }
        );
        assert!(canonical_url("https://example.com", "!!! ???").is_err());
    }
}
