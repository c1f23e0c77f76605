// publications table access.
//
// The slug is recomputed from the name on every save.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use vellum_common::{slug, types::Publication};

use super::drafts::SaveError;

/// CRUD operations for `publications`.
pub struct PublicationStore;

impl PublicationStore {
    /// Insert a new publication. The name must be unique.
    pub fn create(conn: &Connection, name: &str) -> Result<Publication, SaveError> {
        let derived = slug::slugify(name);
        let result = conn.execute(
            "INSERT INTO publications (name, slug) VALUES (?1, ?2)",
            params![name, derived],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                Ok(Publication { id, name: name.to_string(), slug: derived })
            }
            Err(err) if is_name_conflict(&err) => Err(SaveError::Validation(format!(
                "a publication named `{name}` already exists"
            ))),
            Err(err) => Err(SaveError::Internal(
                anyhow::Error::from(err).context("failed to insert publication"),
            )),
        }
    }

    /// Re-save a publication, recomputing its slug from the name.
    pub fn update(conn: &Connection, publication: &mut Publication) -> Result<(), SaveError> {
        publication.slug = slug::slugify(&publication.name);
        let result = conn.execute(
            "UPDATE publications SET name = ?1, slug = ?2 WHERE id = ?3",
            params![publication.name, publication.slug, publication.id],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_name_conflict(&err) => Err(SaveError::Validation(format!(
                "a publication named `{}` already exists",
                publication.name
            ))),
            Err(err) => Err(SaveError::Internal(
                anyhow::Error::from(err).context("failed to update publication"),
            )),
        }
    }

    /// Fetch a publication by row id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Publication>> {
        conn.query_row(
            "SELECT id, name, slug FROM publications WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .context("failed to query publication by id")
    }

    /// List all publications, alphabetically.
    pub fn list(conn: &Connection) -> Result<Vec<Publication>> {
        let mut stmt = conn
            .prepare("SELECT id, name, slug FROM publications ORDER BY name ASC")
            .context("failed to prepare publication list query")?;

        let rows = stmt.query_map([], row_to_record).context("failed to query publications")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to collect publication rows")
    }
}

fn is_name_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi, Some(message))
            if ffi.code == rusqlite::ErrorCode::ConstraintViolation
                && message.contains("publications.name")
    )
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Publication> {
    Ok(Publication { id: row.get(0)?, name: row.get(1)?, slug: row.get(2)? })
}
