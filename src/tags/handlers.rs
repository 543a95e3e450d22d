use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use tracing::instrument;

use crate::{auth::sessions, error::ApiError, state::AppState, tags::repo::Tag};

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<Tag>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}

#[instrument(skip(state, jar))]
pub async fn list_tags(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TagsResponse>), ApiError> {
    let (user_id, jar) = sessions::authenticate(&state, jar).await?;
    let tags = Tag::list_by_user(&state.db, user_id).await?;
    Ok((jar, Json(TagsResponse { tags })))
}
