// Content ingestion for scrape-origin drafts: fetch the external URL as
// markdown, expand gist embeds, render to HTML, localize images.
//
// Ingestion is an explicit step producing a fully-formed content payload;
// persistence happens separately, so a failed fetch never leaves a
// partially written record.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::info;
use vellum_common::markdown;

use crate::config::{FetchConfig, MediaConfig};
use crate::fetch::{FetchError, RemoteFetcher};
use crate::gist::GistResolver;
use crate::images::ImageLocalizer;

/// Why ingestion failed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The initial content fetch failed. Hard failure: the save is
    /// rejected before anything is persisted.
    #[error("External url failed to scrape")]
    Scrape(#[source] FetchError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The fully-formed content payload ingestion produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedContent {
    pub content: String,
    pub content_html: String,
}

/// Orchestrates fetch → gist expansion → render → image localization.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    fetcher: RemoteFetcher,
    gists: GistResolver,
    images: ImageLocalizer,
}

impl IngestPipeline {
    pub fn new(media: MediaConfig, fetch: &FetchConfig) -> Result<Self> {
        let fetcher = RemoteFetcher::new(Duration::from_secs(fetch.timeout_secs))?;
        Ok(Self::with_parts(
            fetcher.clone(),
            GistResolver::new(fetcher.clone()),
            ImageLocalizer::new(fetcher, media),
        ))
    }

    /// Assemble a pipeline from pre-built parts (tests point the gist
    /// resolver at a local API host this way).
    pub fn with_parts(
        fetcher: RemoteFetcher,
        gists: GistResolver,
        images: ImageLocalizer,
    ) -> Self {
        Self { fetcher, gists, images }
    }

    /// Populate content for a draft whose only source is `external_url`.
    ///
    /// The image localizer needs the draft's row id for its storage path,
    /// so the caller persists a provisional row first and passes its id.
    pub async fn ingest(
        &self,
        draft_pk: i64,
        external_url: &str,
    ) -> Result<IngestedContent, IngestError> {
        let raw = self.fetcher.fetch_text(external_url).await.map_err(IngestError::Scrape)?;

        let mut content = self.gists.expand_embeds(&raw).await;
        let rendered = markdown::render_html(&content);
        let content_html = self.images.localize(draft_pk, &mut content, &rendered).await?;

        info!(draft_pk, url = external_url, bytes = content.len(), "ingested external content");
        Ok(IngestedContent { content, content_html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_failure_reads_as_a_validation_message() {
        let err = IngestError::Scrape(FetchError::InvalidUrl { url: "nope".to_string() });
        assert_eq!(err.to_string(), "External url failed to scrape");
    }
}
