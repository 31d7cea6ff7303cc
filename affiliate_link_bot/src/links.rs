use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use url::Url;

/// Characters that people like to glue to the end of a link in chat
/// messages, but that are never meaningfully part of one.
const TRAILING_JUNK: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"', '>'];

static LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("Regex will always be valid"));

/// Pick out everything in `text` that looks like an HTTP(S) link.
///
/// `www.`-prefixed links without a scheme get `https://` prepended,
/// trailing punctuation is stripped, and duplicates are dropped while
/// keeping first-seen order. Anything that still fails to parse as a URL
/// is silently skipped; a message full of garbage is not an error.
#[must_use]
pub fn extract_links(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for candidate in LINK_REGEX.find_iter(text) {
        let trimmed = candidate.as_str().trim_end_matches(TRAILING_JUNK);

        let link = if trimmed.starts_with("www.") {
            format!("https://{trimmed}")
        } else {
            trimmed.to_string()
        };

        if Url::parse(&link).is_err() {
            continue;
        }

        if !found.contains(&link) {
            found.push(link);
        }
    }

    found
}

/// What kind of Flipkart page a link points at. Decides which query
/// parameters survive the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// A single product page; the path has a `/p/` segment.
    Product,
    /// Anything else: search results, store pages, the homepage.
    Listing,
}

impl LinkKind {
    #[must_use]
    pub fn of(url: &Url) -> Self {
        match url.path_segments() {
            Some(mut segments) => {
                if segments.any(|segment| segment == "p") {
                    LinkKind::Product
                } else {
                    LinkKind::Listing
                }
            }
            None => LinkKind::Listing,
        }
    }

    /// Query parameters that survive the rewrite, in the exact order they
    /// are serialized in. Everything else is tracking noise and gets
    /// dropped.
    fn allowed_params(self) -> &'static [&'static str] {
        match self {
            LinkKind::Product => &["pid", "lid", "marketplace", "iid", "ppt", "ppn", "ssid", "cid"],
            LinkKind::Listing => &["q", "store", "srno", "qH", "sid", "marketplace"],
        }
    }
}

/// Rewrite one link into an affiliate deep link.
///
/// The query string is flattened (last value wins on repeated keys),
/// filtered down to the [`LinkKind`]-specific allow-list, and rebuilt in a
/// fixed order with `affid`, then `affExtParam1` (the user's token, if
/// set), then `affExtParam2` appended at the end. Every link gets its
/// scheme forced to `https` and its fragment dropped. Flipkart hosts are
/// additionally rewritten to `dl.flipkart.com` with a `/dl` path prefix;
/// other hosts keep their host and path.
///
/// The output is byte-identical across calls for the same input and
/// token. Returns [`None`] if `raw` is not an absolute HTTP(S) URL; the
/// caller is expected to fall back to the original text.
#[must_use]
pub fn rewrite_link(
    raw: &str,
    affiliate_id: &str,
    token: Option<&str>,
    sub_id: Option<&str>,
) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() || url.cannot_be_a_base() {
        return None;
    }

    let kind = LinkKind::of(&url);

    // Flatten the query. Collecting into a map makes the last value win
    // on repeated keys.
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

    let mut params: Vec<(&str, &str)> = Vec::new();
    for key in kind.allowed_params() {
        if let Some(value) = query.get(*key) {
            params.push((*key, value.as_str()));
        }
    }
    params.push(("affid", affiliate_id));
    if let Some(token) = token {
        params.push(("affExtParam1", token));
    }
    if let Some(sub_id) = sub_id {
        params.push(("affExtParam2", sub_id));
    }

    url.set_scheme("https")
        .expect("https is a valid scheme for an http(s) URL");

    let is_flipkart = url
        .host_str()
        .is_some_and(|host| host == "flipkart.com" || host.ends_with(".flipkart.com"));

    if is_flipkart {
        url.set_host(Some("dl.flipkart.com"))
            .expect("dl.flipkart.com is a valid host");

        let path = url.path();
        if path != "/dl" && !path.starts_with("/dl/") {
            let prefixed = format!("/dl{path}");
            url.set_path(&prefixed);
        }
    }

    url.set_fragment(None);

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &params {
        serializer.append_pair(key, value);
    }
    url.set_query(Some(&serializer.finish()));

    Some(url.into())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn extraction_strips_junk_and_dedups() {
        let links = extract_links(
            "look: https://example.com/a?x=1, and again https://example.com/a?x=1! wow",
        );
        assert_eq!(links, vec!["https://example.com/a?x=1"]);
    }

    #[test]
    fn extraction_keeps_first_seen_order() {
        let links = extract_links("https://b.com/ then https://a.com/ then https://b.com/");
        assert_eq!(links, vec!["https://b.com/", "https://a.com/"]);
    }

    #[test]
    fn extraction_normalizes_www_links() {
        let links = extract_links("check www.flipkart.com/p/item?pid=X out");
        assert_eq!(links, vec!["https://www.flipkart.com/p/item?pid=X"]);
    }

    #[test]
    fn extraction_ignores_text_without_links() {
        assert!(extract_links("no links here, just vibes").is_empty());
        assert!(extract_links("").is_empty());
    }

    #[test]
    fn kind_detection() {
        let product =
            Url::parse("https://www.flipkart.com/some-watch/p/itm097197c3805ee?pid=X").unwrap();
        assert_eq!(LinkKind::of(&product), LinkKind::Product);

        let listing = Url::parse("https://www.flipkart.com/search?q=watch").unwrap();
        assert_eq!(LinkKind::of(&listing), LinkKind::Listing);
    }

    #[test]
    fn rewrite_matches_expected_deep_link() {
        let rewritten = rewrite_link(
            "https://www.flipkart.com/p/item?pid=ABC&foo=bar",
            "bh7162",
            Some("T12345"),
            None,
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://dl.flipkart.com/dl/p/item?pid=ABC&affid=bh7162&affExtParam1=T12345"
        );
    }

    #[test]
    fn rewrite_without_query_adds_only_affiliate_params() {
        let rewritten =
            rewrite_link("https://www.flipkart.com/p/item", "bh7162", None, None).unwrap();
        assert_eq!(rewritten, "https://dl.flipkart.com/dl/p/item?affid=bh7162");
    }

    #[test]
    fn rewrite_is_deterministic() {
        let input = "https://www.flipkart.com/watch/p/itm123?lid=L&pid=P&marketplace=FLIPKART";
        let first = rewrite_link(input, "bh7162", Some("tok"), Some("102")).unwrap();
        let second = rewrite_link(input, "bh7162", Some("tok"), Some("102")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rewrite_serializes_in_fixed_order() {
        // Input order is scrambled relative to the allow-list order.
        let rewritten = rewrite_link(
            "https://www.flipkart.com/watch/p/itm123?marketplace=FLIPKART&pid=P&lid=L",
            "bh7162",
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://dl.flipkart.com/dl/watch/p/itm123?pid=P&lid=L&marketplace=FLIPKART&affid=bh7162"
        );
    }

    #[test]
    fn rewrite_last_value_wins_on_repeated_keys() {
        let rewritten = rewrite_link(
            "https://www.flipkart.com/p/item?pid=first&pid=second",
            "bh7162",
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://dl.flipkart.com/dl/p/item?pid=second&affid=bh7162"
        );
    }

    #[test]
    fn rewrite_drops_unlisted_params() {
        let rewritten = rewrite_link(
            "https://www.flipkart.com/p/item?pid=X&utm_source=spam&cmpid=tracking&ref=wat",
            "bh7162",
            Some("tok"),
            None,
        )
        .unwrap();
        assert!(!rewritten.contains("utm_source"));
        assert!(!rewritten.contains("cmpid"));
        assert!(!rewritten.contains("ref"));
        assert!(rewritten.contains("pid=X"));
    }

    #[test]
    fn rewrite_listing_uses_listing_allow_list() {
        let rewritten = rewrite_link(
            "https://www.flipkart.com/search?q=shoes&foo=bar&marketplace=FLIPKART",
            "bh7162",
            Some("tok"),
            None,
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://dl.flipkart.com/dl/search?q=shoes&marketplace=FLIPKART&affid=bh7162&affExtParam1=tok"
        );
    }

    #[test]
    fn rewrite_leaves_other_hosts_in_place() {
        let rewritten =
            rewrite_link("https://example.com/thing?a=1", "bh7162", Some("tok"), None).unwrap();
        assert_eq!(
            rewritten,
            "https://example.com/thing?affid=bh7162&affExtParam1=tok"
        );
    }

    #[test]
    fn rewrite_forces_https_and_drops_fragments_everywhere() {
        let rewritten = rewrite_link(
            "http://example.com/thing?a=1#section",
            "bh7162",
            Some("tok"),
            None,
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://example.com/thing?affid=bh7162&affExtParam1=tok"
        );
    }

    #[test]
    fn rewrite_does_not_double_the_dl_prefix() {
        let rewritten = rewrite_link(
            "https://dl.flipkart.com/dl/p/item?pid=X",
            "bh7162",
            None,
            None,
        )
        .unwrap();
        assert_eq!(rewritten, "https://dl.flipkart.com/dl/p/item?pid=X&affid=bh7162");
    }

    #[test]
    fn rewrite_rejects_non_urls() {
        assert_eq!(rewrite_link("not a url", "bh7162", None, None), None);
        assert_eq!(rewrite_link("mailto:someone@example.com", "bh7162", None, None), None);
        assert_eq!(rewrite_link("/p/item?pid=X", "bh7162", None, None), None);
    }
}
