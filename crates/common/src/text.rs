// Word-count and URL domain derivation for drafts.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("html tag pattern is valid"));

/// Strip HTML tags from a fragment, leaving the text between them.
pub fn strip_html(fragment: &str) -> String {
    HTML_TAG.replace_all(fragment, "").into_owned()
}

/// Count the tokens of `content` with HTML tags stripped.
///
/// Tokens are split on single spaces (not whitespace runs) and empty
/// tokens are dropped, so consecutive spaces do not inflate the count but
/// newlines glue adjacent words into one token.
pub fn wordcount(content: &str) -> usize {
    strip_html(content).split(' ').filter(|token| !token.is_empty()).count()
}

/// Parse the hostname out of a URL string.
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_owned)
}
