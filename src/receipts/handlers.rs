use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::sessions,
    error::ApiError,
    receipts::{
        dto::{DeleteResponse, SearchResponse, UploadResponse},
        services::{self, NewUpload, ReceiptMeta},
    },
    state::AppState,
};

// Headroom over the 10 MiB file ceiling so the validation pipeline, not
// the framework, names the rule for slightly-too-big files.
const BODY_LIMIT: usize = 12 * 1024 * 1024;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/receipts/search", get(search))
        .route("/receipts/upload", post(upload))
        .route("/receipts/:id", delete(delete_receipt))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

#[instrument(skip(state, jar))]
pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SearchResponse>), ApiError> {
    let (user_id, jar) = sessions::authenticate(&state, jar).await?;
    let receipts = services::list_receipts(&state, user_id).await?;
    Ok((jar, Json(SearchResponse { receipts })))
}

#[instrument(skip(state, jar, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(StatusCode, CookieJar, Json<UploadResponse>), ApiError> {
    let (user_id, jar) = sessions::authenticate(&state, jar).await?;

    let mut file: Option<(String, String, Bytes)> = None;
    let mut items_raw: Option<String> = None;
    let mut tags_raw: Option<String> = None;
    let mut date_raw: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Could not read file: {e}")))?;
                file = Some((file_name, content_type, data));
            }
            Some("items") => items_raw = Some(read_text(field).await?),
            Some("tags") => tags_raw = Some(read_text(field).await?),
            Some("date") => date_raw = Some(read_text(field).await?),
            _ => {}
        }
    }

    let (file_name, content_type, body) =
        file.ok_or_else(|| ApiError::Validation("No file provided".into()))?;
    let date_raw =
        date_raw.ok_or_else(|| ApiError::Validation("Purchase date is required".into()))?;
    let date = Date::parse(date_raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::Validation("Invalid purchase date, expected YYYY-MM-DD".into()))?;
    let items = parse_names(items_raw.as_deref(), "items")?;
    let tags = parse_names(tags_raw.as_deref(), "tags")?;

    let receipt = services::create_receipt(
        &state,
        user_id,
        NewUpload {
            file_name,
            content_type,
            body,
        },
        ReceiptMeta { date, items, tags },
    )
    .await?;

    Ok((StatusCode::CREATED, jar, Json(UploadResponse { receipt })))
}

#[instrument(skip(state, jar))]
pub async fn delete_receipt(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<(CookieJar, Json<DeleteResponse>), ApiError> {
    let (user_id, jar) = sessions::authenticate(&state, jar).await?;
    services::delete_receipt(&state, user_id, id).await?;
    Ok((
        jar,
        Json(DeleteResponse {
            success: true,
            message: "Receipt deleted".into(),
        }),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or("field").to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("Could not read '{name}': {e}")))
}

/// `items` and `tags` arrive as JSON string arrays inside the multipart
/// form. Missing or blank fields mean "none"; malformed JSON is an error
/// rather than silently dropped.
fn parse_names(raw: Option<&str>, field: &str) -> Result<Vec<String>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        ApiError::Validation(format!("Field '{field}' must be a JSON array of strings"))
    })?;
    Ok(names.into_iter().map(|s| s.trim().to_string()).collect())
}
