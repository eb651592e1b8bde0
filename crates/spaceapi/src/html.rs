//! `<link rel="space-api">` extraction from HTML pages.
//!
//! Only `<link>` start tags are of interest, so a tag scanner is enough: no
//! DOM is built. Attribute values may be double-quoted, single-quoted or bare,
//! and `rel` is matched as a whitespace-separated token list. Comments and
//! `<script>` bodies are removed before scanning.

use std::sync::LazyLock;

use regex::Regex;

/// `rel` token that marks a SpaceAPI link.
pub const SPACE_API_REL: &str = "space-api";

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b([^>]*)>").expect("static regex"));

/// Regions whose contents are not markup.
static NON_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>").expect("static regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("static regex")
});

/// Returns the `href` of the first `<link>` whose `rel` contains `space-api`.
pub fn find_space_api_link(html: &str) -> Option<String> {
    let markup = NON_MARKUP.replace_all(html, "");
    LINK_TAG.captures_iter(&markup).find_map(|tag| {
        let attrs = tag.get(1)?.as_str();
        let mut rel = None;
        let mut href = None;

        for attr in ATTRIBUTE.captures_iter(attrs) {
            let name = attr.get(1)?.as_str();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| m.as_str());
            if name.eq_ignore_ascii_case("rel") {
                rel = value;
            } else if name.eq_ignore_ascii_case("href") {
                href = value;
            }
        }

        let is_space_api = rel?
            .split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case(SPACE_API_REL));
        let href = href?.trim();
        (is_space_api && !href.is_empty()).then(|| decode_entities(href))
    })
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
