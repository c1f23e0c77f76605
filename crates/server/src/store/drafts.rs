// drafts table access and save rules.
//
// Every save re-runs the derived-field rules: origin validation, slug
// assignment, publish timestamp, sync timestamps. Slug uniqueness is
// backstopped by the UNIQUE constraint; a conflicting commit regenerates
// the suffix and retries exactly once.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use vellum_common::{slug, types::Draft};

/// Why a draft save was rejected.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The record is invalid; nothing was persisted.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

const DRAFT_COLUMNS: &str = "id, collection_id, draft_id, external_url, canonical_url, \
     publication_id, name, description, content, content_html, image, slug, \
     user_id, user_email, created_at, updated_at, last_synced_at, published, date_published";

/// CRUD operations and save rules for `drafts`.
pub struct DraftStore;

impl DraftStore {
    /// Insert a new draft, assigning its row id into `draft.id`.
    pub fn insert(conn: &Connection, draft: &mut Draft) -> Result<(), SaveError> {
        apply_save_rules(conn, draft)?;

        match insert_row(conn, draft) {
            Ok(id) => {
                draft.id = id;
                Ok(())
            }
            Err(err) if is_slug_conflict(&err) => {
                draft.slug = regenerated_slug(draft);
                let id = insert_row(conn, draft)
                    .context("failed to insert draft after slug regeneration")?;
                draft.id = id;
                Ok(())
            }
            Err(err) => Err(SaveError::Internal(
                anyhow::Error::from(err).context("failed to insert draft"),
            )),
        }
    }

    /// Re-save an existing draft by row id.
    pub fn update(conn: &Connection, draft: &mut Draft) -> Result<(), SaveError> {
        apply_save_rules(conn, draft)?;

        match update_row(conn, draft) {
            Ok(()) => Ok(()),
            Err(err) if is_slug_conflict(&err) => {
                draft.slug = regenerated_slug(draft);
                update_row(conn, draft)
                    .context("failed to update draft after slug regeneration")?;
                Ok(())
            }
            Err(err) => Err(SaveError::Internal(
                anyhow::Error::from(err).context("failed to update draft"),
            )),
        }
    }

    /// Fetch a draft by row id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Draft>> {
        conn.query_row(
            &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
            params![id],
            row_to_record,
        )
        .optional()
        .context("failed to query draft by id")
    }

    /// Fetch a draft by its webhook identity `(external draft id, collection)`.
    pub fn get_by_origin(
        conn: &Connection,
        collection_id: i64,
        draft_id: i64,
    ) -> Result<Option<Draft>> {
        conn.query_row(
            &format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts \
                 WHERE collection_id = ?1 AND draft_id = ?2"
            ),
            params![collection_id, draft_id],
            row_to_record,
        )
        .optional()
        .context("failed to query draft by origin")
    }

    /// List all drafts, most recently updated first.
    pub fn list(conn: &Connection) -> Result<Vec<Draft>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts ORDER BY updated_at DESC, id DESC"
            ))
            .context("failed to prepare draft list query")?;

        let rows = stmt.query_map([], row_to_record).context("failed to query drafts")?;
        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect draft rows")
    }

    /// Total number of persisted drafts.
    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM drafts", [], |row| row.get(0))
            .context("failed to count drafts")
    }

    /// Delete a draft by row id.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn
            .execute("DELETE FROM drafts WHERE id = ?1", params![id])
            .context("failed to delete draft")?;
        Ok(changed > 0)
    }
}

fn apply_save_rules(conn: &Connection, draft: &mut Draft) -> Result<(), SaveError> {
    if draft.origin().is_none() {
        return Err(SaveError::Validation(
            "exactly one of draft id and external url is required".to_string(),
        ));
    }

    let now = Utc::now();

    if draft.slug.is_empty() {
        let mut proposed = slug::slugify(&draft.name);
        if proposed.is_empty() {
            proposed = "draft".to_string();
        }
        // One collision check, one random-suffix resolution.
        if slug_taken(conn, &proposed, draft.id)? {
            proposed = slug::with_random_suffix(&proposed);
        }
        draft.slug = slug::clamp(&proposed);
    }

    draft.stamp_published(now);
    draft.updated_at = now;
    draft.last_synced_at = now;
    Ok(())
}

fn regenerated_slug(draft: &Draft) -> String {
    let mut proposed = slug::slugify(&draft.name);
    if proposed.is_empty() {
        proposed = "draft".to_string();
    }
    slug::with_random_suffix(&proposed)
}

fn slug_taken(conn: &Connection, slug: &str, exclude_id: i64) -> Result<bool, SaveError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM drafts WHERE slug = ?1 AND id != ?2",
            params![slug, exclude_id],
            |row| row.get(0),
        )
        .context("failed to check slug uniqueness")?;
    Ok(count > 0)
}

fn is_slug_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi, Some(message))
            if ffi.code == rusqlite::ErrorCode::ConstraintViolation
                && message.contains("drafts.slug")
    )
}

fn insert_row(conn: &Connection, draft: &Draft) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO drafts \
         (collection_id, draft_id, external_url, canonical_url, publication_id, \
          name, description, content, content_html, image, slug, \
          user_id, user_email, created_at, updated_at, last_synced_at, \
          published, date_published) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            draft.collection_id,
            draft.draft_id,
            draft.external_url,
            draft.canonical_url,
            draft.publication_id,
            draft.name,
            draft.description,
            draft.content,
            draft.content_html,
            draft.image,
            draft.slug,
            draft.user_id,
            draft.user_email,
            draft.created_at,
            draft.updated_at,
            draft.last_synced_at,
            draft.published,
            draft.date_published,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_row(conn: &Connection, draft: &Draft) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE drafts \
         SET collection_id = ?1, draft_id = ?2, external_url = ?3, canonical_url = ?4, \
             publication_id = ?5, name = ?6, description = ?7, content = ?8, \
             content_html = ?9, image = ?10, slug = ?11, user_id = ?12, user_email = ?13, \
             created_at = ?14, updated_at = ?15, last_synced_at = ?16, \
             published = ?17, date_published = ?18 \
         WHERE id = ?19",
        params![
            draft.collection_id,
            draft.draft_id,
            draft.external_url,
            draft.canonical_url,
            draft.publication_id,
            draft.name,
            draft.description,
            draft.content,
            draft.content_html,
            draft.image,
            draft.slug,
            draft.user_id,
            draft.user_email,
            draft.created_at,
            draft.updated_at,
            draft.last_synced_at,
            draft.published,
            draft.date_published,
            draft.id,
        ],
    )?;
    Ok(())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    Ok(Draft {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        draft_id: row.get(2)?,
        external_url: row.get(3)?,
        canonical_url: row.get(4)?,
        publication_id: row.get(5)?,
        name: row.get(6)?,
        description: row.get(7)?,
        content: row.get(8)?,
        content_html: row.get(9)?,
        image: row.get(10)?,
        slug: row.get(11)?,
        user_id: row.get(12)?,
        user_email: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        last_synced_at: row.get(16)?,
        published: row.get(17)?,
        date_published: row.get(18)?,
    })
}
