use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::SessionConfig;

/// Value of the cookie called `name`, if the request carries one.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
}

pub fn session_cookie(cfg: &SessionConfig, token: &str) -> anyhow::Result<HeaderValue> {
    build(cfg, token, cfg.ttl_days * 24 * 60 * 60)
}

/// Expires the cookie on the client.
pub fn clear_cookie(cfg: &SessionConfig) -> anyhow::Result<HeaderValue> {
    build(cfg, "", 0)
}

fn build(cfg: &SessionConfig, value: &str, max_age: i64) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cfg.cookie_name, value, max_age
    );
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}
