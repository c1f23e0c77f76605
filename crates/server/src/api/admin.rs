// Admin JSON surface: list/detail views over collections, drafts, and
// publications, plus the manual save hooks.
//
// Creating or re-saving a scrape-origin draft runs the ingestion pipeline;
// the db lock is released while the pipeline is on the network.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use vellum_common::types::{Collection, Draft, DraftOrigin, OwnerRef, Publication};

use crate::error::ApiError;
use crate::store::{CollectionStore, DraftStore, NewCollection, PublicationStore};

use super::AppState;

/// Header the admin UI sends identifying the acting editor.
pub const EDITOR_EMAIL_HEADER: &str = "x-editor-email";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/admin/collections", post(create_collection).get(list_collections))
        .route("/admin/collections/{id}", get(get_collection).delete(delete_collection))
        .route("/admin/drafts", post(create_draft).get(list_drafts))
        .route("/admin/drafts/{id}", get(get_draft).put(update_draft).delete(delete_draft))
        .route("/admin/publications", post(create_publication).get(list_publications))
        .route("/admin/publications/{id}", put(update_publication))
        .with_state(state)
}

// ── Request / Response types ───────────────────────────────────────

#[derive(Deserialize)]
struct CreateCollectionRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    owner: Option<OwnerRef>,
    #[serde(default = "default_auto_publish")]
    auto_publish: bool,
}

fn default_auto_publish() -> bool {
    true
}

#[derive(Serialize)]
struct CollectionView {
    #[serde(flatten)]
    collection: Collection,
    drafts: i64,
    /// Webhook path for this collection's token.
    webhook: String,
}

impl CollectionView {
    fn new(collection: Collection, drafts: i64) -> Self {
        let webhook = format!("/hooks/{}", collection.uuid);
        Self { collection, drafts, webhook }
    }
}

#[derive(Serialize)]
struct CollectionEnvelope {
    collection: CollectionView,
}

#[derive(Serialize)]
struct CollectionsEnvelope {
    items: Vec<CollectionView>,
}

#[derive(Deserialize)]
struct CreateDraftRequest {
    collection_id: i64,
    name: String,
    external_url: String,
    #[serde(default)]
    canonical_url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    publication_id: Option<i64>,
    #[serde(default)]
    published: bool,
}

#[derive(Deserialize, Default)]
struct UpdateDraftRequest {
    name: Option<String>,
    description: Option<String>,
    canonical_url: Option<String>,
    external_url: Option<String>,
    publication_id: Option<i64>,
    /// Path of an uploaded cover image.
    image: Option<String>,
    published: Option<bool>,
}

#[derive(Serialize)]
struct DraftView {
    #[serde(flatten)]
    draft: Draft,
    wordcount: usize,
    domain: Option<String>,
    origin: Option<DraftOrigin>,
}

impl From<Draft> for DraftView {
    fn from(draft: Draft) -> Self {
        let wordcount = draft.wordcount();
        let domain = draft.domain();
        let origin = draft.origin();
        Self { draft, wordcount, domain, origin }
    }
}

#[derive(Serialize)]
struct DraftEnvelope {
    draft: DraftView,
}

#[derive(Serialize)]
struct DraftsEnvelope {
    items: Vec<DraftView>,
}

#[derive(Deserialize)]
struct PublicationRequest {
    name: String,
}

#[derive(Serialize)]
struct PublicationEnvelope {
    publication: Publication,
}

#[derive(Serialize)]
struct PublicationsEnvelope {
    items: Vec<Publication>,
}

// ── Collections ────────────────────────────────────────────────────

async fn create_collection(
    State(state): State<AppState>,
    Json(payload): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CollectionEnvelope>), ApiError> {
    let db = state.db.lock().await;
    let new = NewCollection {
        name: payload.name,
        owner: payload.owner,
        auto_publish: payload.auto_publish,
    };
    let collection =
        CollectionStore::create(db.connection(), &new).map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(CollectionEnvelope { collection: CollectionView::new(collection, 0) }),
    ))
}

async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionsEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let conn = db.connection();

    let mut items = Vec::new();
    for collection in CollectionStore::list(conn).map_err(ApiError::internal)? {
        let drafts =
            CollectionStore::draft_count(conn, collection.id).map_err(ApiError::internal)?;
        items.push(CollectionView::new(collection, drafts));
    }

    Ok(Json(CollectionsEnvelope { items }))
}

async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CollectionEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let conn = db.connection();

    let collection = CollectionStore::get(conn, id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("collection does not exist"))?;
    let drafts = CollectionStore::draft_count(conn, id).map_err(ApiError::internal)?;

    Ok(Json(CollectionEnvelope { collection: CollectionView::new(collection, drafts) }))
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    let deleted = CollectionStore::delete(db.connection(), id).map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found("collection does not exist"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Drafts ─────────────────────────────────────────────────────────

async fn create_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftEnvelope>), ApiError> {
    // Persist a provisional row first: the image localizer keys its
    // storage path on the draft's row id.
    let mut draft = {
        let db = state.db.lock().await;
        let conn = db.connection();

        CollectionStore::get(conn, payload.collection_id)
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::bad_request("collection_id does not exist"))?;

        let now = chrono::Utc::now();
        let mut draft = Draft {
            id: 0,
            collection_id: payload.collection_id,
            draft_id: None,
            external_url: payload.external_url,
            canonical_url: payload.canonical_url,
            publication_id: payload.publication_id,
            name: payload.name,
            description: payload.description,
            content: String::new(),
            content_html: String::new(),
            image: String::new(),
            slug: String::new(),
            user_id: None,
            user_email: editor_email(&headers).unwrap_or_default(),
            created_at: now,
            updated_at: now,
            last_synced_at: now,
            published: payload.published,
            date_published: None,
        };
        DraftStore::insert(conn, &mut draft)?;
        draft
    };

    match state.pipeline.ingest(draft.id, &draft.external_url).await {
        Ok(ingested) => {
            draft.content = ingested.content;
            draft.content_html = ingested.content_html;
        }
        Err(error) => {
            // The scrape is part of validation: remove the provisional row
            // so a failed save persists nothing.
            let db = state.db.lock().await;
            let _ = DraftStore::delete(db.connection(), draft.id);
            return Err(ApiError::bad_request(error.to_string()));
        }
    }

    let db = state.db.lock().await;
    DraftStore::update(db.connection(), &mut draft)?;

    Ok((StatusCode::CREATED, Json(DraftEnvelope { draft: draft.into() })))
}

async fn list_drafts(State(state): State<AppState>) -> Result<Json<DraftsEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let items = DraftStore::list(db.connection())
        .map_err(ApiError::internal)?
        .into_iter()
        .map(DraftView::from)
        .collect();
    Ok(Json(DraftsEnvelope { items }))
}

async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DraftEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let draft = DraftStore::get(db.connection(), id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("draft does not exist"))?;
    Ok(Json(DraftEnvelope { draft: draft.into() }))
}

async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateDraftRequest>,
) -> Result<Json<DraftEnvelope>, ApiError> {
    let mut draft = {
        let db = state.db.lock().await;
        DraftStore::get(db.connection(), id)
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::not_found("draft does not exist"))?
    };

    if let Some(name) = payload.name {
        draft.name = name;
    }
    if let Some(description) = payload.description {
        draft.description = description;
    }
    if let Some(canonical_url) = payload.canonical_url {
        draft.canonical_url = canonical_url;
    }
    if let Some(external_url) = payload.external_url {
        draft.external_url = external_url;
    }
    if let Some(publication_id) = payload.publication_id {
        draft.publication_id = Some(publication_id);
    }
    if let Some(image) = payload.image {
        draft.image = image;
    }
    if let Some(published) = payload.published {
        draft.published = published;
    }

    // A manual save of a scrape-origin draft re-runs ingestion; the image
    // localizer makes the second run a no-op for already-local images.
    if draft.origin() == Some(DraftOrigin::Scrape) {
        let ingested = state
            .pipeline
            .ingest(draft.id, &draft.external_url)
            .await
            .map_err(|error| ApiError::bad_request(error.to_string()))?;
        draft.content = ingested.content;
        draft.content_html = ingested.content_html;
    }

    // Fill in the acting editor's email when the draft has none.
    if draft.user_email.is_empty() {
        if let Some(email) = editor_email(&headers) {
            draft.user_email = email;
        }
    }

    let db = state.db.lock().await;
    DraftStore::update(db.connection(), &mut draft)?;

    Ok(Json(DraftEnvelope { draft: draft.into() }))
}

async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    let deleted = DraftStore::delete(db.connection(), id).map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found("draft does not exist"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Publications ───────────────────────────────────────────────────

async fn create_publication(
    State(state): State<AppState>,
    Json(payload): Json<PublicationRequest>,
) -> Result<(StatusCode, Json<PublicationEnvelope>), ApiError> {
    let db = state.db.lock().await;
    let publication = PublicationStore::create(db.connection(), &payload.name)?;
    Ok((StatusCode::CREATED, Json(PublicationEnvelope { publication })))
}

async fn list_publications(
    State(state): State<AppState>,
) -> Result<Json<PublicationsEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let items = PublicationStore::list(db.connection()).map_err(ApiError::internal)?;
    Ok(Json(PublicationsEnvelope { items }))
}

async fn update_publication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PublicationRequest>,
) -> Result<Json<PublicationEnvelope>, ApiError> {
    let db = state.db.lock().await;
    let conn = db.connection();

    let mut publication = PublicationStore::get(conn, id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("publication does not exist"))?;
    publication.name = payload.name;
    PublicationStore::update(conn, &mut publication)?;

    Ok(Json(PublicationEnvelope { publication }))
}

fn editor_email(headers: &HeaderMap) -> Option<String> {
    headers
        .get(EDITOR_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
