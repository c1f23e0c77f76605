// Gist embed expansion: `<script src="https://gist.github.com/…">` tags
// found in scraped markdown are replaced with fenced code blocks built
// from the gist API's file listing.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::fetch::RemoteFetcher;

const GIST_API_BASE: &str = "https://api.github.com/gists";

static GIST_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<script[^>]*\bsrc=["']https://gist\.github\.com/(?:[\w.-]+/)?([0-9a-fA-F]+)\.js["'][^>]*>\s*</script>"#,
    )
    .expect("gist embed pattern is valid")
});

/// One embed tag found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistEmbed {
    /// Byte range of the whole `<script>…</script>` tag.
    pub range: Range<usize>,
    /// The gist identifier captured from the embed URL.
    pub id: String,
}

/// Scan markdown for gist embed script tags, in document order.
pub fn find_gist_embeds(content: &str) -> Vec<GistEmbed> {
    GIST_EMBED
        .captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).expect("match always has a full capture");
            GistEmbed { range: whole.range(), id: caps[1].to_string() }
        })
        .collect()
}

/// Splice resolved markdown over each embed's range.
///
/// Embeds resolved to `None` are left byte-for-byte unchanged.
pub fn splice_embeds(content: &str, resolved: &[(GistEmbed, Option<String>)]) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for (embed, replacement) in resolved {
        out.push_str(&content[cursor..embed.range.start]);
        match replacement {
            Some(markdown) => out.push_str(markdown),
            None => out.push_str(&content[embed.range.clone()]),
        }
        cursor = embed.range.end;
    }

    out.push_str(&content[cursor..]);
    out
}

// ── Gist API ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    language: Option<String>,
    #[serde(default)]
    content: String,
}

/// Resolves gist identifiers into fenced-code markdown via the public
/// gist API.
#[derive(Debug, Clone)]
pub struct GistResolver {
    fetcher: RemoteFetcher,
    api_base: String,
}

impl GistResolver {
    pub fn new(fetcher: RemoteFetcher) -> Self {
        Self { fetcher, api_base: GIST_API_BASE.to_string() }
    }

    /// Point the resolver at a different API host (used by tests).
    pub fn with_api_base(fetcher: RemoteFetcher, api_base: impl Into<String>) -> Self {
        Self { fetcher, api_base: api_base.into() }
    }

    /// Fetch a gist and render its files as fenced code blocks.
    ///
    /// Returns `None` on any fetch error or when the gist has no files;
    /// the caller leaves the embed tag untouched.
    pub async fn resolve(&self, gist_id: &str) -> Option<String> {
        let url = format!("{}/{gist_id}", self.api_base);
        let body = match self.fetcher.fetch_text(&url).await {
            Ok(body) => body,
            Err(error) => {
                debug!(gist_id, %error, "gist fetch failed, leaving embed untouched");
                return None;
            }
        };

        let parsed: GistResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(gist_id, %error, "gist response was not valid json");
                return None;
            }
        };

        render_files(&parsed.files)
    }

    /// Expand every gist embed in `content`, leaving failed embeds alone.
    pub async fn expand_embeds(&self, content: &str) -> String {
        let embeds = find_gist_embeds(content);
        if embeds.is_empty() {
            return content.to_string();
        }

        let mut resolved = Vec::with_capacity(embeds.len());
        for embed in embeds {
            let markdown = self.resolve(&embed.id).await;
            resolved.push((embed, markdown));
        }

        splice_embeds(content, &resolved)
    }
}

/// Render gist files as fenced code blocks, one per file, sorted by
/// filename, joined with a blank line. Language tags are lower-cased.
fn render_files(files: &BTreeMap<String, GistFile>) -> Option<String> {
    if files.is_empty() {
        return None;
    }

    let blocks: Vec<String> = files
        .values()
        .map(|file| {
            let language = file.language.as_deref().unwrap_or("").to_lowercase();
            format!("```{language}\n{}\n```", file.content)
        })
        .collect();

    Some(blocks.join("\n\n"))
}
