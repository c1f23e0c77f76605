// Image localization: remote images referenced by rendered draft HTML
// are fetched, stored under the media root keyed by the owning draft,
// and the markdown + HTML are rewritten to the local URL.
//
// Per-image failures skip that image only; no image aborts a save.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lol_html::{element, HtmlRewriter, Settings};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::config::MediaConfig;
use crate::fetch::{rewrite_alias_host, RemoteFetcher};

/// Localizes remote images into the configured media root.
#[derive(Debug, Clone)]
pub struct ImageLocalizer {
    fetcher: RemoteFetcher,
    media: MediaConfig,
}

impl ImageLocalizer {
    pub fn new(fetcher: RemoteFetcher, media: MediaConfig) -> Self {
        Self { fetcher, media }
    }

    /// Localize every remote `img[src]` in `content_html`, rewriting both
    /// the markdown `content` (in place) and the returned HTML.
    ///
    /// The URL rewrite is recorded before the on-disk existence check so
    /// that repeated runs converge even if an earlier run died between
    /// rewriting and writing the file.
    pub async fn localize(
        &self,
        draft_pk: i64,
        content: &mut String,
        content_html: &str,
    ) -> Result<String> {
        let sources = collect_image_sources(content_html)?;
        let mut rewrites: HashMap<String, String> = HashMap::new();

        for src in sources {
            if rewrites.contains_key(&src) {
                continue;
            }

            let src_url = rewrite_alias_host(&src);
            if src_url.starts_with(&self.media.url) {
                // Already localized on an earlier save.
                continue;
            }

            let fetched = match self.fetcher.fetch_bytes(&src_url).await {
                Ok(fetched) => fetched,
                Err(error) => {
                    debug!(src = %src_url, %error, "image fetch failed, skipping");
                    continue;
                }
            };

            let filename = fetched.file_name.unwrap_or_else(|| hashed_filename(&src_url));
            let rel_dir = self.media.draft_image_dir(draft_pk);
            let file_path = self.media.root.join(&rel_dir).join(&filename);
            let file_url = format!("{}{rel_dir}/{filename}", self.media.url);

            *content = content.replace(&src, &file_url);
            rewrites.insert(src, file_url);

            if already_present(&file_path) {
                continue;
            }

            write_atomically(&file_path, &fetched.bytes)
                .with_context(|| format!("failed to store image at `{}`", file_path.display()))?;
            resize_to_fit(&file_path, self.media.max_image_width, self.media.max_image_height);
        }

        rewrite_image_sources(content_html, &rewrites)
    }
}

/// Collect `img[src]` attribute values in document order.
pub fn collect_image_sources(html: &str) -> Result<Vec<String>> {
    let mut sources = Vec::new();
    let mut sink = Vec::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src") {
                    sources.push(src);
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| sink.extend_from_slice(chunk),
    );

    rewriter.write(html.as_bytes()).map_err(|e| anyhow!("html scan error: {e}"))?;
    rewriter.end().map_err(|e| anyhow!("html scan finalization error: {e}"))?;

    Ok(sources)
}

/// Rewrite `img[src]` attributes according to the old → new URL map.
pub fn rewrite_image_sources(html: &str, rewrites: &HashMap<String, String>) -> Result<String> {
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src") {
                    if let Some(local) = rewrites.get(&src) {
                        el.set_attribute("src", local)?;
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html.as_bytes()).map_err(|e| anyhow!("html rewrite error: {e}"))?;
    rewriter.end().map_err(|e| anyhow!("html rewrite finalization error: {e}"))?;

    String::from_utf8(output).context("rewritten html was not valid utf-8")
}

/// Stable filename for a source URL: hex digest of the URL path.
///
/// The same source always maps to the same name, which is what makes the
/// already-downloaded check work across saves.
pub fn hashed_filename(src_url: &str) -> String {
    let path = Url::parse(src_url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| src_url.to_string());

    let digest = Sha256::digest(path.as_bytes());
    let mut name = String::with_capacity(digest.len() * 2 + 4);
    for byte in digest {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push_str(".jpg");
    name
}

/// A file counts as already fetched only when it exists with nonzero size,
/// so a crashed partial write does not block a refetch.
fn already_present(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}

/// Write bytes via a temp file and rename, so concurrent readers never
/// observe a partial file at the final path.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| anyhow!("image path has no parent directory"))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create media directory `{}`", parent.display()))?;

    let staging = parent.join(format!(
        ".{}.part-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("image"),
        std::process::id(),
    ));
    fs::write(&staging, bytes)
        .with_context(|| format!("failed to write staging file `{}`", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to move image into place at `{}`", path.display()))?;
    Ok(())
}

/// Shrink the stored file in place so neither dimension exceeds the bound,
/// preserving aspect ratio. Files that cannot be decoded are left as
/// written rather than failing the pipeline.
fn resize_to_fit(path: &Path, max_width: u32, max_height: u32) {
    let reader = match image::ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader,
        Err(error) => {
            debug!(path = %path.display(), %error, "could not open stored image");
            return;
        }
    };

    let img = match reader.decode() {
        Ok(img) => img,
        Err(error) => {
            debug!(path = %path.display(), %error, "stored image is not decodable, leaving as-is");
            return;
        }
    };

    if img.width() <= max_width && img.height() <= max_height {
        return;
    }

    let resized = img.thumbnail(max_width, max_height);
    if let Err(error) = resized.save(path) {
        warn!(path = %path.display(), %error, "failed to save resized image");
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    // ── scanning ─────────────────────────────────────────────────────

    #[test]
    fn collects_image_sources_in_document_order() {
        let html = r#"<p><img src="https://a.example/1.png"></p><img src="https://b.example/2.png" alt="x">"#;
        let sources = collect_image_sources(html).unwrap();
        assert_eq!(sources, vec!["https://a.example/1.png", "https://b.example/2.png"]);
    }

    #[test]
    fn ignores_images_without_src() {
        let html = r#"<img alt="no src"><img src="https://a.example/1.png">"#;
        let sources = collect_image_sources(html).unwrap();
        assert_eq!(sources, vec!["https://a.example/1.png"]);
    }

    // ── rewriting ────────────────────────────────────────────────────

    #[test]
    fn rewrites_mapped_sources_and_leaves_others() {
        let html = r#"<img src="https://a.example/1.png"><img src="https://b.example/2.png">"#;
        let mut rewrites = HashMap::new();
        rewrites.insert(
            "https://a.example/1.png".to_string(),
            "/media/drafts/img/7/abc.jpg".to_string(),
        );

        let out = rewrite_image_sources(html, &rewrites).unwrap();
        assert!(out.contains(r#"src="/media/drafts/img/7/abc.jpg""#), "got: {out}");
        assert!(out.contains(r#"src="https://b.example/2.png""#), "got: {out}");
    }

    #[test]
    fn rewrite_preserves_other_attributes() {
        let html = r#"<img class="hero" src="https://a.example/1.png" alt="pic">"#;
        let mut rewrites = HashMap::new();
        rewrites.insert("https://a.example/1.png".to_string(), "/media/x.jpg".to_string());

        let out = rewrite_image_sources(html, &rewrites).unwrap();
        assert!(out.contains(r#"class="hero""#), "got: {out}");
        assert!(out.contains(r#"alt="pic""#), "got: {out}");
    }

    #[test]
    fn rewrite_with_empty_map_is_identity() {
        let html = r#"<p><img src="https://a.example/1.png"></p>"#;
        let out = rewrite_image_sources(html, &HashMap::new()).unwrap();
        assert_eq!(out, html);
    }

    // ── filenames ────────────────────────────────────────────────────

    #[test]
    fn hashed_filename_is_deterministic() {
        let a = hashed_filename("https://a.example/pics/cat.png?w=100");
        let b = hashed_filename("https://a.example/pics/cat.png?w=100");
        assert_eq!(a, b);
        assert!(a.ends_with(".jpg"));
    }

    #[test]
    fn hashed_filename_keys_on_url_path() {
        // Query strings are not part of the identity; the path is.
        let plain = hashed_filename("https://a.example/pics/cat.png");
        let with_query = hashed_filename("https://a.example/pics/cat.png?w=100");
        let other_path = hashed_filename("https://a.example/pics/dog.png");

        assert_eq!(plain, with_query);
        assert_ne!(plain, other_path);
    }

    // ── storage ──────────────────────────────────────────────────────

    #[test]
    fn already_present_requires_nonzero_size() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.jpg");
        let empty = dir.path().join("empty.jpg");
        let full = dir.path().join("full.jpg");
        fs::write(&empty, b"").unwrap();
        fs::write(&full, b"bytes").unwrap();

        assert!(!already_present(&missing));
        assert!(!already_present(&empty));
        assert!(already_present(&full));
    }

    #[test]
    fn write_atomically_creates_parents_and_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drafts").join("img").join("9").join("pic.jpg");

        write_atomically(&path, b"image bytes").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"image bytes");

        // No staging leftovers.
        let siblings: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    // ── resizing ─────────────────────────────────────────────────────

    #[test]
    fn resize_shrinks_oversized_images_preserving_aspect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        image::RgbImage::new(100, 50).save(&path).unwrap();

        resize_to_fit(&path, 10, 10);

        let resized = image::open(&path).unwrap();
        assert!(resized.width() <= 10 && resized.height() <= 10);
        assert_eq!(resized.width(), 10);
        assert_eq!(resized.height(), 5);
    }

    #[test]
    fn resize_leaves_small_images_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        resize_to_fit(&path, 10, 10);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn resize_leaves_undecodable_files_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.jpg");
        fs::write(&path, b"not an image at all").unwrap();

        resize_to_fit(&path, 10, 10);
        assert_eq!(fs::read(&path).unwrap(), b"not an image at all");
    }
}
