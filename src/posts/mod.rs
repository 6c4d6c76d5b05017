//! Posts are a placeholder: there is no post model yet. Creation requires a
//! logged-in user and is accepted without effect.

mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
