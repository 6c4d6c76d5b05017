use axum::{http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{auth::extractors::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct PostItem {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub text: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/posts", get(list_posts).post(create_post))
}

pub async fn list_posts() -> Json<Vec<PostItem>> {
    Json(Vec::new())
}

#[instrument(skip(payload))]
pub async fn create_post(
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> StatusCode {
    info!(%user_id, len = payload.text.len(), "post submitted; not stored");
    StatusCode::ACCEPTED
}
