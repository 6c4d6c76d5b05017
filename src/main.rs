use time::OffsetDateTime;

mod accounts;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod posts;
mod state;


use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "socialnet=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    auth::password::warm_up();
    let app_state = AppState::init(config).await?;

    match app_state.sessions.purge_expired(OffsetDateTime::now_utc()).await {
        Ok(n) if n > 0 => tracing::info!(purged = n, "expired sessions removed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "session purge failed; continuing"),
    }

    let result = app::serve(app::build_app(app_state.clone())).await;
    app_state.close().await;
    result
}
