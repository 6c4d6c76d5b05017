use std::str::FromStr;

use anyhow::Context;

/// Which persistence backend the stores are built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_days: i64,
    pub touch_after_secs: i64,
    pub cookie_secure: bool,
}

pub const MAX_SESSION_TTL_DAYS: i64 = 365;

impl SessionConfig {
    /// TTL must be 1..=365 days; the touch threshold must lie within the TTL.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.ttl_days) {
            anyhow::bail!(
                "SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}, got {}",
                self.ttl_days
            );
        }
        let ttl_secs = self.ttl_days * 24 * 60 * 60;
        if !(0..=ttl_secs).contains(&self.touch_after_secs) {
            anyhow::bail!(
                "SESSION_TOUCH_AFTER_SECS must be between 0 and {ttl_secs}, got {}",
                self.touch_after_secs
            );
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".into(),
            ttl_days: 7,
            touch_after_secs: 24 * 60 * 60,
            cookie_secure: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres backend");
        }

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            ttl_days: env_parse("SESSION_TTL_DAYS")?.unwrap_or(defaults.ttl_days),
            touch_after_secs: env_parse("SESSION_TOUCH_AFTER_SECS")?
                .unwrap_or(defaults.touch_after_secs),
            cookie_secure: env_parse("SESSION_COOKIE_SECURE")?.unwrap_or(defaults.cookie_secure),
        };
        session.validate()?;

        Ok(Self {
            backend,
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
            session,
        })
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parse {key}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!(" MEMORY ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn session_defaults_match_a_week_long_cookie() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.cookie_name, "session");
        assert_eq!(cfg.ttl_days, 7);
        assert_eq!(cfg.touch_after_secs, 86_400);
        assert!(cfg.cookie_secure);
        cfg.validate().unwrap();
    }

    #[test]
    fn session_ttl_out_of_range_is_rejected() {
        for ttl_days in [0, -1, MAX_SESSION_TTL_DAYS + 1, i64::MAX] {
            let cfg = SessionConfig {
                ttl_days,
                ..SessionConfig::default()
            };
            assert!(cfg.validate().is_err(), "ttl_days={ttl_days}");
        }
    }

    #[test]
    fn touch_threshold_must_fit_in_ttl() {
        let cfg = SessionConfig {
            ttl_days: 1,
            touch_after_secs: 86_401,
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SessionConfig {
            touch_after_secs: -5,
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SessionConfig {
            touch_after_secs: 0,
            ..SessionConfig::default()
        };
        cfg.validate().unwrap();
    }
}
