use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    cookie::{clear_cookie, session_cookie},
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    extractors::RequestContext,
    services,
};
use crate::{accounts::dto::PublicUser, error::AppResult, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// POST /users
#[instrument(skip(state, ctx, payload))]
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let (user, session) = services::register_and_login(
        &state,
        &ctx,
        &payload.email,
        &payload.username,
        &payload.password,
    )
    .await?;
    let cookie = session_cookie(&state.config.session, &session.token)?;

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, ctx, payload))]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let (user, session) =
        services::login(&state, &ctx, &payload.username, &payload.password).await?;
    let cookie = session_cookie(&state.config.session, &session.token)?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, ctx))]
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<impl IntoResponse> {
    services::logout(&state, &ctx).await?;
    let cookie = clear_cookie(&state.config.session)?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]))
}

#[instrument(skip(state, ctx))]
pub async fn get_me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<PublicUser>> {
    let user = services::current_user(&state, &ctx).await?;
    Ok(Json(PublicUser::from(user)))
}
