use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::{
    extractors::RequestContext,
    password::{verify_dummy, verify_password},
    session::{is_well_formed_token, Flash, SessionRecord},
};
use crate::{
    accounts::{repo::UserStore, repo_types::User, services as directory},
    error::{AppError, AppResult},
    state::AppState,
};

pub const REGISTERED_FLASH: &str = "Your account has successfully been created!";
pub const WELCOME_FLASH: &str = "Welcome back!";
pub const LOGIN_FAILED_FLASH: &str = "Password or username is incorrect";

/// Check a username/password pair. Unknown users and wrong passwords both
/// come back as [`AppError::InvalidCredentials`].
pub async fn authenticate(users: &dyn UserStore, username: &str, password: &str) -> AppResult<User> {
    let Some(user) = users.find_by_username(username.trim()).await? else {
        verify_dummy(password);
        warn!("login rejected");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login rejected");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

/// Authenticate and attach the identity to a fresh session.
pub async fn login(
    state: &AppState,
    ctx: &RequestContext,
    username: &str,
    password: &str,
) -> AppResult<(User, SessionRecord)> {
    let user = match authenticate(state.users.as_ref(), username, password).await {
        Ok(user) => user,
        Err(e) => {
            if let (AppError::InvalidCredentials, Some(token)) = (&e, &ctx.session_token) {
                state
                    .sessions
                    .push_flash(token, Flash::error(LOGIN_FAILED_FLASH))
                    .await?;
            }
            return Err(e);
        }
    };
    let session = start_session(state, ctx, &user, Flash::success(WELCOME_FLASH)).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, session))
}

/// Register, then log the new user in without a second password check.
pub async fn register_and_login(
    state: &AppState,
    ctx: &RequestContext,
    email: &str,
    username: &str,
    password: &str,
) -> AppResult<(User, SessionRecord)> {
    let user = directory::register(state.users.as_ref(), email, username, password).await?;
    let session = start_session(state, ctx, &user, Flash::success(REGISTERED_FLASH)).await?;
    Ok((user, session))
}

/// Clear the current identity. Anonymous callers are a no-op.
pub async fn logout(state: &AppState, ctx: &RequestContext) -> AppResult<()> {
    if let Some(token) = &ctx.session_token {
        state.sessions.destroy(token).await?;
        info!(user_id = ?ctx.current_identity, "user logged out");
    }
    Ok(())
}

pub async fn current_user(state: &AppState, ctx: &RequestContext) -> AppResult<User> {
    let user_id = ctx.require_user()?;
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Token rotates on every login so a pre-login cookie can't be fixated.
async fn start_session(
    state: &AppState,
    ctx: &RequestContext,
    user: &User,
    flash: Flash,
) -> AppResult<SessionRecord> {
    if let Some(old) = &ctx.session_token {
        state.sessions.destroy(old).await?;
    }
    let expires_at = OffsetDateTime::now_utc() + Duration::days(state.config.session.ttl_days);
    let session = state.sessions.create(user.id, expires_at).await?;
    state.sessions.push_flash(&session.token, flash).await?;
    Ok(session)
}

/// Turn a cookie token into a request context. Pending flash messages stay
/// in the store until [`drain_flash`] renders them. Unknown, malformed or
/// expired tokens give an anonymous context.
pub async fn resume_session(state: &AppState, token: &str) -> AppResult<RequestContext> {
    if !is_well_formed_token(token) {
        debug!("ignoring malformed session cookie");
        return Ok(RequestContext::anonymous());
    }
    let Some(session) = state.sessions.load(token).await? else {
        return Ok(RequestContext::anonymous());
    };

    let now = OffsetDateTime::now_utc();
    if session.is_expired(now) {
        debug!(user_id = %session.user_id, "session expired");
        state.sessions.destroy(token).await?;
        return Ok(RequestContext::anonymous());
    }

    let cfg = &state.config.session;
    if now - session.touched_at >= Duration::seconds(cfg.touch_after_secs) {
        state
            .sessions
            .touch(token, now + Duration::days(cfg.ttl_days))
            .await?;
    }

    Ok(RequestContext::authenticated(
        session.token,
        session.user_id,
        Vec::new(),
    ))
}

/// Move the session's pending flash messages into the context. Only pages
/// that render them should call this.
pub async fn drain_flash(state: &AppState, mut ctx: RequestContext) -> AppResult<RequestContext> {
    if let Some(token) = &ctx.session_token {
        ctx.flash = state.sessions.take_flash(token).await?;
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PW: &str = "correct-horse";

    async fn registered(state: &AppState, username: &str) -> (User, SessionRecord) {
        register_and_login(
            state,
            &RequestContext::anonymous(),
            &format!("{username}@x.io"),
            username,
            PW,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn register_then_authenticate_yields_same_id() {
        let state = AppState::fake();
        let (user, _) = registered(&state, "alice").await;
        let authed = authenticate(state.users.as_ref(), "alice", PW).await.unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail_the_same_way() {
        let state = AppState::fake();
        registered(&state, "alice").await;

        let wrong = authenticate(state.users.as_ref(), "alice", "not-the-password")
            .await
            .unwrap_err();
        let unknown = authenticate(state.users.as_ref(), "nobody", PW)
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn registration_authenticates_the_session() {
        let state = AppState::fake();
        let (user, session) = registered(&state, "alice").await;

        let ctx = resume_session(&state, &session.token).await.unwrap();
        assert_eq!(ctx.current_identity, Some(user.id));
        assert!(ctx.flash.is_empty());
        let ctx = drain_flash(&state, ctx).await.unwrap();
        assert_eq!(ctx.flash, vec![Flash::success(REGISTERED_FLASH)]);

        let again = resume_session(&state, &session.token).await.unwrap();
        let again = drain_flash(&state, again).await.unwrap();
        assert!(again.flash.is_empty());
        assert_eq!(current_user(&state, &again).await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn login_rotates_the_token() {
        let state = AppState::fake();
        let (_, first) = registered(&state, "alice").await;
        let ctx = resume_session(&state, &first.token).await.unwrap();

        let (_, second) = login(&state, &ctx, "alice", PW).await.unwrap();
        assert_ne!(first.token, second.token);
        assert!(!resume_session(&state, &first.token).await.unwrap().is_authenticated());
        let ctx = resume_session(&state, &second.token).await.unwrap();
        let ctx = drain_flash(&state, ctx).await.unwrap();
        assert_eq!(ctx.flash, vec![Flash::success(WELCOME_FLASH)]);
    }

    #[tokio::test]
    async fn failed_login_leaves_error_flash_on_existing_session() {
        let state = AppState::fake();
        let (_, session) = registered(&state, "alice").await;
        let ctx = resume_session(&state, &session.token).await.unwrap();

        let err = login(&state, &ctx, "alice", "nope-nope-nope").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let ctx = resume_session(&state, &session.token).await.unwrap();
        assert!(ctx.is_authenticated());
        let ctx = drain_flash(&state, ctx).await.unwrap();
        assert_eq!(
            ctx.flash,
            vec![Flash::success(REGISTERED_FLASH), Flash::error(LOGIN_FAILED_FLASH)]
        );
    }

    #[tokio::test]
    async fn logout_returns_to_anonymous() {
        let state = AppState::fake();
        let (_, session) = registered(&state, "alice").await;
        let ctx = resume_session(&state, &session.token).await.unwrap();

        logout(&state, &ctx).await.unwrap();
        let after = resume_session(&state, &session.token).await.unwrap();
        assert!(!after.is_authenticated());
        assert!(matches!(
            current_user(&state, &after).await.unwrap_err(),
            AppError::Unauthorized
        ));
        logout(&state, &RequestContext::anonymous()).await.unwrap();
    }

    #[tokio::test]
    async fn resume_leaves_flash_pending() {
        let state = AppState::fake();
        let (_, session) = registered(&state, "alice").await;

        resume_session(&state, &session.token).await.unwrap();
        resume_session(&state, &session.token).await.unwrap();
        let ctx = resume_session(&state, &session.token).await.unwrap();
        let ctx = drain_flash(&state, ctx).await.unwrap();
        assert_eq!(ctx.flash, vec![Flash::success(REGISTERED_FLASH)]);
    }

    #[tokio::test]
    async fn drain_on_anonymous_context_is_empty() {
        let state = AppState::fake();
        let ctx = drain_flash(&state, RequestContext::anonymous()).await.unwrap();
        assert!(ctx.flash.is_empty());
    }

    fn with_touch_after(touch_after_secs: i64) -> AppState {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.session.touch_after_secs = touch_after_secs;
        state.config = std::sync::Arc::new(config);
        state
    }

    #[tokio::test]
    async fn stale_touch_extends_expiry() {
        let state = with_touch_after(0);
        let (user, _) = registered(&state, "alice").await;
        let soon = OffsetDateTime::now_utc() + Duration::hours(1);
        let session = state.sessions.create(user.id, soon).await.unwrap();

        let ctx = resume_session(&state, &session.token).await.unwrap();
        assert!(ctx.is_authenticated());
        let reloaded = state.sessions.load(&session.token).await.unwrap().unwrap();
        let floor = OffsetDateTime::now_utc() + Duration::days(state.config.session.ttl_days)
            - Duration::minutes(1);
        assert!(reloaded.expires_at > floor);
        assert!(reloaded.touched_at >= session.touched_at);
    }

    #[tokio::test]
    async fn recent_touch_keeps_expiry() {
        let state = AppState::fake();
        assert_eq!(state.config.session.touch_after_secs, 86_400);
        let (user, _) = registered(&state, "alice").await;
        let soon = OffsetDateTime::now_utc() + Duration::hours(1);
        let session = state.sessions.create(user.id, soon).await.unwrap();

        resume_session(&state, &session.token).await.unwrap();
        let reloaded = state.sessions.load(&session.token).await.unwrap().unwrap();
        assert_eq!(reloaded.expires_at, session.expires_at);
        assert_eq!(reloaded.touched_at, session.touched_at);
    }

    #[tokio::test]
    async fn expired_session_is_dropped() {
        let state = AppState::fake();
        let (user, _) = registered(&state, "alice").await;
        let past = OffsetDateTime::now_utc() - Duration::minutes(1);
        let stale = state.sessions.create(user.id, past).await.unwrap();

        let ctx = resume_session(&state, &stale.token).await.unwrap();
        assert!(!ctx.is_authenticated());
        assert!(state.sessions.load(&stale.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_cookie_is_anonymous() {
        let state = AppState::fake();
        assert!(!resume_session(&state, "../etc").await.unwrap().is_authenticated());
        let unknown = crate::auth::session::generate_token();
        assert!(!resume_session(&state, &unknown).await.unwrap().is_authenticated());
    }
}
