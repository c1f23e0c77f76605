// Outbound HTTP fetches for scraped content, gists, and images.
//
// Every request goes through one shared client with an explicit timeout;
// a slow remote host becomes a fetch failure instead of a stalled save.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

const USER_AGENT_STRING: &str = concat!("vellum/", env!("CARGO_PKG_VERSION"));

/// Response header carrying a server-provided filename for downloads.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Known alias-host rewrite: the file-sharing provider's viewer URL is
/// swapped for its direct-download host (first occurrence only).
pub fn rewrite_alias_host(url: &str) -> String {
    url.replacen("https://www.dropbox.com", "https://dl.dropbox.com", 1)
}

/// Why a fetch failed. Per-item callers swallow these; the content fetch
/// treats any of them as a hard validation failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url `{url}`")]
    InvalidUrl { url: String },
    #[error("unsupported scheme `{scheme}` in url `{url}`")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("request to `{url}` failed: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("`{url}` returned status {status}")]
    Status { url: String, status: StatusCode },
}

/// A fetched binary body plus the optional server-provided filename.
#[derive(Debug)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

/// Shared HTTP client for all pipeline fetches.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_STRING)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    /// GET a URL and return its body as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        let url = url.to_string();
        response.text().await.map_err(|source| FetchError::Request { url, source })
    }

    /// GET a URL and return its raw bytes plus the filename header, if any.
    pub async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, FetchError> {
        let response = self.get(url).await?;
        let file_name = response
            .headers()
            .get(FILE_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .map(ToOwned::to_owned);

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request { url: url.to_string(), source })?;

        Ok(FetchedBytes { bytes: bytes.to_vec(), file_name })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let target = rewrite_alias_host(url);
        let parsed = Url::parse(&target)
            .map_err(|_| FetchError::InvalidUrl { url: target.clone() })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                url: target.clone(),
                scheme: parsed.scheme().to_string(),
            });
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| FetchError::Request { url: target.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: target, status });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    // ── alias rewrite ────────────────────────────────────────────────

    #[test]
    fn dropbox_viewer_url_is_rewritten_to_direct_download() {
        assert_eq!(
            rewrite_alias_host("https://www.dropbox.com/x"),
            "https://dl.dropbox.com/x"
        );
    }

    #[test]
    fn alias_rewrite_replaces_first_occurrence_only() {
        assert_eq!(
            rewrite_alias_host("https://www.dropbox.com/link?next=https://www.dropbox.com/y"),
            "https://dl.dropbox.com/link?next=https://www.dropbox.com/y"
        );
    }

    #[test]
    fn alias_rewrite_is_idempotent() {
        let once = rewrite_alias_host("https://www.dropbox.com/x");
        assert_eq!(rewrite_alias_host(&once), once);
    }

    #[test]
    fn non_alias_hosts_pass_through() {
        assert_eq!(
            rewrite_alias_host("https://example.com/post.md"),
            "https://example.com/post.md"
        );
    }

    // ── scheme validation ────────────────────────────────────────────

    #[tokio::test]
    async fn relative_url_is_an_invalid_url_error() {
        let fetcher = RemoteFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch_text("/just/a/path").await.expect_err("fetch should fail");
        assert!(matches!(err, FetchError::InvalidUrl { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn data_url_is_an_unsupported_scheme_error() {
        let fetcher = RemoteFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher
            .fetch_bytes("data:image/png;base64,AAAA")
            .await
            .expect_err("fetch should fail");
        assert!(matches!(err, FetchError::UnsupportedScheme { .. }), "got: {err:?}");
    }
}
