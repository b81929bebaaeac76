//! Identifier extraction from content addresses.
//!
//! Two shapes carry an identifier: the `watch?v=<id>` query form and the
//! `/shorts/<id>` path form. Anything unparsable fails closed.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;
use url::Url;

use feedguard_core_types::Identifier;

/// Base used to resolve the relative `href`s hosts usually emit.
static BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("https://www.youtube.com/").expect("static base url"));

/// Anchored on length and charset so trailing path or query noise is never
/// captured.
static SHORTS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/shorts/([A-Za-z0-9_-]{11})(?:/|$)").expect("static shorts pattern")
});

pub fn identifier_from_address(raw: &str) -> Option<Identifier> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match BASE.join(raw) {
            Ok(url) => url,
            Err(err) => {
                trace!(target: "feedguard.scanner", raw, %err, "malformed relative address");
                return None;
            }
        },
        Err(err) => {
            trace!(target: "feedguard.scanner", raw, %err, "malformed address");
            return None;
        }
    };

    if url.path().ends_with("/watch") {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .and_then(|(_, value)| Identifier::recognize(&value));
    }

    SHORTS_PATH
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .and_then(|id| Identifier::recognize(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> Option<String> {
        identifier_from_address(raw).map(|id| id.to_string())
    }

    #[test]
    fn extracts_query_form() {
        assert_eq!(
            extract("https://host/watch?v=ABCDEFGHIJK").as_deref(),
            Some("ABCDEFGHIJK")
        );
        assert_eq!(
            extract("/watch?list=PL1&v=a_b-c1234XY&t=42s").as_deref(),
            Some("a_b-c1234XY")
        );
    }

    #[test]
    fn extracts_path_form_without_trailing_noise() {
        assert_eq!(
            extract("https://host/shorts/ABCDEFGHIJK?x=1").as_deref(),
            Some("ABCDEFGHIJK")
        );
        assert_eq!(
            extract("/shorts/ABCDEFGHIJK/").as_deref(),
            Some("ABCDEFGHIJK")
        );
        assert_eq!(extract("/shorts/ABCDEFGHIJKLMN"), None);
    }

    #[test]
    fn fails_closed_on_malformed_or_foreign_addresses() {
        assert_eq!(extract(""), None);
        assert_eq!(extract("http://[::1"), None);
        assert_eq!(extract("https://host/watch?v=short"), None);
        assert_eq!(extract("https://host/watch"), None);
        assert_eq!(extract("https://host/channel/ABCDEFGHIJK"), None);
    }
}
