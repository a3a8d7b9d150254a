use std::{net::SocketAddr, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key}={value:?} is not valid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session_idle_minutes: i64,
    pub notification_page_size: u32,
    pub feed_capacity: usize,
    pub db_max_connections: u32,
    pub allow_directory_sign_in: bool,
}

impl Config {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            session_idle_minutes: 5,
            notification_page_size: 50,
            feed_capacity: 256,
            db_max_connections: 16,
            allow_directory_sign_in: false,
        }
    }

    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let mut config = Config::new(database_url);

        if let Some(value) = lookup("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", value)?;
        }
        if let Some(value) = lookup("SESSION_IDLE_MINUTES") {
            config.session_idle_minutes = positive("SESSION_IDLE_MINUTES", value)?;
        }
        if let Some(value) = lookup("NOTIFICATION_PAGE_SIZE") {
            config.notification_page_size = positive("NOTIFICATION_PAGE_SIZE", value)?;
        }
        if let Some(value) = lookup("FEED_CAPACITY") {
            config.feed_capacity = positive("FEED_CAPACITY", value)?;
        }
        if let Some(value) = lookup("DB_MAX_CONNECTIONS") {
            config.db_max_connections = positive("DB_MAX_CONNECTIONS", value)?;
        }
        if let Some(value) = lookup("ALLOW_DIRECTORY_SIGN_IN") {
            config.allow_directory_sign_in = parse("ALLOW_DIRECTORY_SIGN_IN", value)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value,
    })
}

fn positive<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = parse(key, value.clone())?;
    if parsed <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be at least 1".to_owned(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite://app.db")])).unwrap();
        assert_eq!(config.database_url, "sqlite://app.db");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.notification_page_size, 50);
        assert_eq!(config.feed_capacity, 256);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("NOTIFICATION_PAGE_SIZE", "20"),
            ("FEED_CAPACITY", "8"),
            ("ALLOW_DIRECTORY_SIGN_IN", "true"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.notification_page_size, 20);
        assert_eq!(config.feed_capacity, 8);
        assert!(config.allow_directory_sign_in);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("NOTIFICATION_PAGE_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "NOTIFICATION_PAGE_SIZE", .. }));
    }
}
