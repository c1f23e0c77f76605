// Core domain types shared across all Vellum crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text;

/// A webhook target grouping drafts, identified by an opaque token.
///
/// The token (`uuid`) is generated exactly once, at first save, and is
/// never regenerated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    pub id: i64,
    /// Opaque webhook token. Immutable after first save.
    pub uuid: String,
    pub name: String,
    /// Tagged polymorphic owner reference: kind discriminator plus key.
    pub owner: Option<OwnerRef>,
    /// Default `published` state for drafts created through the webhook.
    pub auto_publish: bool,
}

/// Reference to an arbitrary parent entity owning a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub id: i64,
}

/// A named external outlet a draft can be attributed to.
///
/// `slug` is recomputed from `name` on every save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Publication {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A single document record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Draft {
    pub id: i64,
    pub collection_id: i64,
    /// External origin id. Set only by webhook push, immutable afterwards.
    pub draft_id: Option<i64>,
    /// Scrape origin URL.
    pub external_url: String,
    pub canonical_url: String,
    pub publication_id: Option<i64>,
    /// Title.
    pub name: String,
    pub description: String,
    /// Raw markdown (or plain text) content.
    pub content: String,
    /// Content rendered as HTML.
    pub content_html: String,
    /// Optional uploaded cover image path.
    pub image: String,
    pub slug: String,
    pub user_id: Option<i64>,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub published: bool,
    /// Set exactly once, the first time `published` becomes true.
    pub date_published: Option<DateTime<Utc>>,
}

/// Where a draft's content came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftOrigin {
    /// Direct webhook push (`draft_id` set).
    Push,
    /// Scraped from an external URL (`external_url` set).
    Scrape,
}

impl Draft {
    /// The draft's origin, or `None` when neither (or both) origin fields
    /// are set, an invalid state that fails validation at save time.
    pub fn origin(&self) -> Option<DraftOrigin> {
        match (self.draft_id.is_some(), !self.external_url.is_empty()) {
            (true, false) => Some(DraftOrigin::Push),
            (false, true) => Some(DraftOrigin::Scrape),
            _ => None,
        }
    }

    /// Token count of `content` with HTML tags stripped.
    ///
    /// Tokens are split on single spaces; empty tokens are dropped.
    pub fn wordcount(&self) -> usize {
        text::wordcount(&self.content)
    }

    /// Hostname of the canonical URL, falling back to the external URL.
    pub fn domain(&self) -> Option<String> {
        [&self.canonical_url, &self.external_url]
            .into_iter()
            .filter(|url| !url.is_empty())
            .find_map(|url| text::domain_of(url))
    }

    /// Stamp `date_published` on the first transition to published.
    ///
    /// A later un-publish/re-publish never changes an already-set value.
    pub fn stamp_published(&mut self, now: DateTime<Utc>) {
        if self.published && self.date_published.is_none() {
            self.date_published = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn draft() -> Draft {
        Draft {
            id: 1,
            collection_id: 1,
            draft_id: None,
            external_url: String::new(),
            canonical_url: String::new(),
            publication_id: None,
            name: "A Draft".to_string(),
            description: String::new(),
            content: String::new(),
            content_html: String::new(),
            image: String::new(),
            slug: String::new(),
            user_id: None,
            user_email: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_synced_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            published: false,
            date_published: None,
        }
    }

    // ── origin ───────────────────────────────────────────────────────

    #[test]
    fn origin_is_push_when_only_draft_id_set() {
        let mut d = draft();
        d.draft_id = Some(42);
        assert_eq!(d.origin(), Some(DraftOrigin::Push));
    }

    #[test]
    fn origin_is_scrape_when_only_external_url_set() {
        let mut d = draft();
        d.external_url = "https://example.com/post.md".to_string();
        assert_eq!(d.origin(), Some(DraftOrigin::Scrape));
    }

    #[test]
    fn origin_is_none_when_neither_set() {
        assert_eq!(draft().origin(), None);
    }

    #[test]
    fn origin_is_none_when_both_set() {
        let mut d = draft();
        d.draft_id = Some(42);
        d.external_url = "https://example.com/post.md".to_string();
        assert_eq!(d.origin(), None);
    }

    // ── stamp_published ──────────────────────────────────────────────

    #[test]
    fn stamp_published_sets_date_once() {
        let mut d = draft();
        let first = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        d.published = true;
        d.stamp_published(first);
        assert_eq!(d.date_published, Some(first));

        // Un-publish then re-publish: the original date survives.
        d.published = false;
        d.stamp_published(later);
        d.published = true;
        d.stamp_published(later);
        assert_eq!(d.date_published, Some(first));
    }

    #[test]
    fn stamp_published_noop_while_unpublished() {
        let mut d = draft();
        d.stamp_published(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap());
        assert_eq!(d.date_published, None);
    }

    // ── derived fields ───────────────────────────────────────────────

    #[test]
    fn domain_prefers_canonical_url() {
        let mut d = draft();
        d.canonical_url = "https://blog.example.com/post".to_string();
        d.external_url = "https://other.example.org/post.md".to_string();
        assert_eq!(d.domain().as_deref(), Some("blog.example.com"));
    }

    #[test]
    fn domain_falls_back_to_external_url() {
        let mut d = draft();
        d.external_url = "https://other.example.org/post.md".to_string();
        assert_eq!(d.domain().as_deref(), Some("other.example.org"));
    }

    #[test]
    fn domain_is_none_without_urls() {
        assert_eq!(draft().domain(), None);
    }
}
