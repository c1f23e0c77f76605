// collections table access: create, read, list, delete.
//
// The webhook token is generated here, at first save, and never touched
// again. Deleting a collection cascades to its drafts.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;
use vellum_common::types::{Collection, OwnerRef};

/// Fields the caller controls when creating a collection.
#[derive(Debug, Clone, Default)]
pub struct NewCollection {
    pub name: String,
    pub owner: Option<OwnerRef>,
    pub auto_publish: bool,
}

impl NewCollection {
    pub fn auto_publishing(name: impl Into<String>) -> Self {
        Self { name: name.into(), owner: None, auto_publish: true }
    }
}

/// CRUD operations for `collections`.
pub struct CollectionStore;

impl CollectionStore {
    /// Insert a new collection, generating its webhook token.
    ///
    /// An empty name is replaced with a placeholder referencing the
    /// assigned row id.
    pub fn create(conn: &Connection, new: &NewCollection) -> Result<Collection> {
        let uuid = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO collections (uuid, name, owner_kind, owner_id, auto_publish) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid,
                new.name,
                new.owner.as_ref().map(|o| o.kind.as_str()),
                new.owner.as_ref().map(|o| o.id),
                new.auto_publish,
            ],
        )
        .context("failed to insert collection")?;
        let id = conn.last_insert_rowid();

        if new.name.is_empty() {
            conn.execute(
                "UPDATE collections SET name = ?1 WHERE id = ?2",
                params![format!("Collection No. {id}"), id],
            )
            .context("failed to assign placeholder collection name")?;
        }

        Self::get(conn, id)?.context("collection row missing after insert")
    }

    /// Fetch a collection by row id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Collection>> {
        conn.query_row(
            "SELECT id, uuid, name, owner_kind, owner_id, auto_publish \
             FROM collections WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .context("failed to query collection by id")
    }

    /// Fetch a collection by its webhook token.
    pub fn get_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Collection>> {
        conn.query_row(
            "SELECT id, uuid, name, owner_kind, owner_id, auto_publish \
             FROM collections WHERE uuid = ?1",
            params![uuid],
            row_to_record,
        )
        .optional()
        .context("failed to query collection by uuid")
    }

    /// List all collections, oldest first.
    pub fn list(conn: &Connection) -> Result<Vec<Collection>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, uuid, name, owner_kind, owner_id, auto_publish \
                 FROM collections ORDER BY id ASC",
            )
            .context("failed to prepare collection list query")?;

        let rows = stmt.query_map([], row_to_record).context("failed to query collections")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to collect collection rows")
    }

    /// Count the drafts grouped under a collection.
    pub fn draft_count(conn: &Connection, id: i64) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM drafts WHERE collection_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .context("failed to count collection drafts")
    }

    /// Delete a collection. Drafts under it are removed by the cascade.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn
            .execute("DELETE FROM collections WHERE id = ?1", params![id])
            .context("failed to delete collection")?;
        Ok(changed > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collection> {
    let owner_kind: Option<String> = row.get(3)?;
    let owner_id: Option<i64> = row.get(4)?;
    Ok(Collection {
        id: row.get(0)?,
        uuid: row.get(1)?,
        name: row.get(2)?,
        owner: owner_kind
            .zip(owner_id)
            .map(|(kind, id)| OwnerRef { kind, id }),
        auto_publish: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::store::db::Db;

    fn setup() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path().join("vellum.db")).expect("db should open");
        (dir, db)
    }

    #[test]
    fn create_generates_token_once() {
        let (_dir, db) = setup();
        let created =
            CollectionStore::create(db.connection(), &NewCollection::auto_publishing("Blog"))
                .expect("create should succeed");

        assert!(!created.uuid.is_empty());
        assert_eq!(created.name, "Blog");
        assert!(created.auto_publish);

        let loaded = CollectionStore::get(db.connection(), created.id)
            .expect("query should succeed")
            .expect("row should exist");
        assert_eq!(loaded.uuid, created.uuid);
    }

    #[test]
    fn create_with_empty_name_uses_placeholder() {
        let (_dir, db) = setup();
        let created = CollectionStore::create(db.connection(), &NewCollection::default())
            .expect("create should succeed");
        assert_eq!(created.name, format!("Collection No. {}", created.id));
    }

    #[test]
    fn create_stores_owner_reference() {
        let (_dir, db) = setup();
        let new = NewCollection {
            name: "Site".to_string(),
            owner: Some(OwnerRef { kind: "site".to_string(), id: 9 }),
            auto_publish: false,
        };
        let created =
            CollectionStore::create(db.connection(), &new).expect("create should succeed");
        assert_eq!(created.owner, Some(OwnerRef { kind: "site".to_string(), id: 9 }));
        assert!(!created.auto_publish);
    }

    #[test]
    fn get_by_uuid_finds_the_collection() {
        let (_dir, db) = setup();
        let created =
            CollectionStore::create(db.connection(), &NewCollection::auto_publishing("Blog"))
                .expect("create should succeed");

        let loaded = CollectionStore::get_by_uuid(db.connection(), &created.uuid)
            .expect("query should succeed")
            .expect("row should exist");
        assert_eq!(loaded.id, created.id);

        let missing = CollectionStore::get_by_uuid(db.connection(), "nope")
            .expect("query should succeed");
        assert!(missing.is_none());
    }

    #[test]
    fn list_returns_collections_in_creation_order() {
        let (_dir, db) = setup();
        CollectionStore::create(db.connection(), &NewCollection::auto_publishing("A")).unwrap();
        CollectionStore::create(db.connection(), &NewCollection::auto_publishing("B")).unwrap();

        let all = CollectionStore::list(db.connection()).expect("list should succeed");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "A");
        assert_eq!(all[1].name, "B");
    }

    #[test]
    fn delete_missing_returns_false() {
        let (_dir, db) = setup();
        assert!(!CollectionStore::delete(db.connection(), 99).expect("delete should succeed"));
    }
}
