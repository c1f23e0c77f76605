// The webhook endpoint: POST /hooks/{uuid}.
//
// The body is form-encoded with a `payload` field holding JSON. Missing
// payload keys reject the whole request naming the key. Drafts are
// upserted on (external draft id, collection); the ingestion pipeline is
// never run here since push-origin drafts carry their own content.

use std::collections::HashMap;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;
use vellum_common::types::{Collection, Draft};

use crate::error::ApiError;
use crate::store::{CollectionStore, DraftStore};

use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new().route("/hooks/{uuid}", post(receive)).with_state(state)
}

/// One delivery from the external writing tool.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub content_html: String,
    pub user_id: i64,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

async fn receive(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let raw = form.get("payload").ok_or_else(|| ApiError::bad_request("payload is required"))?;
    let payload = parse_payload(raw).map_err(ApiError::bad_request)?;

    let db = state.db.lock().await;
    let conn = db.connection();

    let collection = CollectionStore::get_by_uuid(conn, &uuid)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("unknown collection token"))?;

    match DraftStore::get_by_origin(conn, collection.id, payload.id).map_err(ApiError::internal)? {
        None => {
            let mut draft = draft_from_payload(&collection, &payload);
            DraftStore::insert(conn, &mut draft)?;
            info!(draft_id = payload.id, collection = collection.id, "webhook created draft");
        }
        Some(mut draft) => {
            overwrite_from_payload(&mut draft, &payload);
            DraftStore::update(conn, &mut draft)?;
            info!(draft_id = payload.id, collection = collection.id, "webhook updated draft");
        }
    }

    Ok((StatusCode::OK, "Thanks!"))
}

/// Pull the required keys out of the JSON payload, rejecting the whole
/// request with the first missing key's name.
fn parse_payload(raw: &str) -> Result<WebhookPayload, String> {
    let data: Value =
        serde_json::from_str(raw).map_err(|_| "payload is not valid json".to_string())?;

    let id = data
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| "id is required".to_string())?;
    let name = required_str(&data, "name")?;
    let content = required_str(&data, "content")?;
    let content_html = required_str(&data, "content_html")?;

    let user = data.get("user").ok_or_else(|| "user is required".to_string())?;
    let user_id = user
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| "user.id is required".to_string())?;
    let user_email = user
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| "user.email is required".to_string())?
        .to_string();

    let created_at = required_timestamp(&data, "created_at")?;
    let updated_at = required_timestamp(&data, "updated_at")?;

    Ok(WebhookPayload { id, name, content, content_html, user_id, user_email, created_at, updated_at })
}

fn required_str(data: &Value, key: &str) -> Result<String, String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| format!("{key} is required"))
}

fn required_timestamp(data: &Value, key: &str) -> Result<DateTime<Utc>, String> {
    let raw = required_str(data, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("{key} is not a valid timestamp"))
}

fn draft_from_payload(collection: &Collection, payload: &WebhookPayload) -> Draft {
    Draft {
        id: 0,
        collection_id: collection.id,
        draft_id: Some(payload.id),
        external_url: String::new(),
        canonical_url: String::new(),
        publication_id: None,
        name: payload.name.clone(),
        description: String::new(),
        content: payload.content.clone(),
        content_html: payload.content_html.clone(),
        image: String::new(),
        slug: String::new(),
        user_id: Some(payload.user_id),
        user_email: payload.user_email.clone(),
        created_at: payload.created_at,
        updated_at: payload.updated_at,
        last_synced_at: payload.updated_at,
        published: collection.auto_publish,
        date_published: None,
    }
}

/// Overwrite the payload-derived fields on an existing draft, leaving
/// everything else (slug, published, publication, …) alone.
fn overwrite_from_payload(draft: &mut Draft, payload: &WebhookPayload) {
    draft.name = payload.name.clone();
    draft.content = payload.content.clone();
    draft.content_html = payload.content_html.clone();
    draft.user_id = Some(payload.user_id);
    draft.user_email = payload.user_email.clone();
    draft.created_at = payload.created_at;
}
