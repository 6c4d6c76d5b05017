use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::{cookie::read_cookie, services::resume_session, session::Flash};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// Typed per-request context: who is calling and, on pages that render
/// them, the flash messages that were waiting. Built once per request from
/// the session cookie; `flash` stays empty until `drain_flash` fills it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session_token: Option<String>,
    pub current_identity: Option<Uuid>,
    pub flash: Vec<Flash>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(session_token: String, user_id: Uuid, flash: Vec<Flash>) -> Self {
        Self {
            session_token: Some(session_token),
            current_identity: Some(user_id),
            flash,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_identity.is_some()
    }

    /// Precondition for every operation acting as "the current user".
    pub fn require_user(&self) -> AppResult<Uuid> {
        self.current_identity.ok_or(AppError::Unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match read_cookie(&parts.headers, &state.config.session.cookie_name) {
            Some(token) => resume_session(state, &token).await,
            None => Ok(Self::anonymous()),
        }
    }
}

/// Authenticated caller. Rejects anonymous requests with 401.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        Ok(AuthUser(ctx.require_user()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_context_is_unauthorized() {
        let err = RequestContext::anonymous().require_user().unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn authenticated_context_yields_identity() {
        let id = Uuid::new_v4();
        let ctx = RequestContext::authenticated("tok".into(), id, Vec::new());
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.require_user().unwrap(), id);
    }
}
