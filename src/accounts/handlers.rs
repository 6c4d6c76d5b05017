use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{public_list, Page, PublicUser, UserDetails, UserList},
    services,
};
use crate::{
    auth::{extractors::RequestContext, handlers::register, services::drain_flash},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/:username", get(show_user))
        .route("/users/:username/followers", get(list_followers))
        .route("/users/:username/following", get(list_following))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route(
        "/users/:username/follow",
        post(follow_user).delete(unfollow_user),
    )
}

#[instrument(skip(state, ctx))]
pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Page<UserList>>> {
    let users = services::list_all(state.users.as_ref()).await?;
    let ctx = drain_flash(&state, ctx).await?;
    Ok(Json(Page::new(public_list(users), ctx)))
}

#[instrument(skip(state, ctx))]
pub async fn show_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
) -> AppResult<Json<Page<UserDetails>>> {
    let user = services::find_by_username(state.users.as_ref(), &username)
        .await?
        .ok_or(AppError::NotFound)?;
    let ctx = drain_flash(&state, ctx).await?;
    Ok(Json(Page::new(
        UserDetails {
            user: PublicUser::from(user),
        },
        ctx,
    )))
}

#[instrument(skip(state))]
pub async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserList>> {
    let users = services::followers(state.users.as_ref(), &username).await?;
    Ok(Json(public_list(users)))
}

#[instrument(skip(state))]
pub async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserList>> {
    let users = services::following(state.users.as_ref(), &username).await?;
    Ok(Json(public_list(users)))
}

#[instrument(skip(state, ctx))]
pub async fn follow_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
) -> AppResult<Json<PublicUser>> {
    let target = services::follow(state.users.as_ref(), &ctx, &username).await?;
    Ok(Json(PublicUser::from(target)))
}

#[instrument(skip(state, ctx))]
pub async fn unfollow_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
) -> AppResult<Json<PublicUser>> {
    let target = services::unfollow(state.users.as_ref(), &ctx, &username).await?;
    Ok(Json(PublicUser::from(target)))
}
