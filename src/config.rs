use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub public_rps: u32,
    pub admin_rps: u32,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub db_lock_timeout_ms: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Staff account created at startup when `ADMIN_EMAIL` and `ADMIN_PASSWORD` are set.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub phone: String,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bootstrap_admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                phone: lookup("ADMIN_PHONE").unwrap_or_else(|| "admin".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            server_address: required(&lookup, "SERVER_ADDRESS")?,
            database_url: required(&lookup, "DATABASE_URL")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 72)?,
            public_rps: parse_or(&lookup, "PUBLIC_RPS", 50)?,
            admin_rps: parse_or(&lookup, "ADMIN_RPS", 20)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 10)?,
            db_lock_timeout_ms: parse_or(&lookup, "DB_LOCK_TIMEOUT_MS", 5000)?,
            bootstrap_admin,
        })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let config = Config::from_lookup(lookup_from(&[
            ("SERVER_ADDRESS", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.token_ttl_hours, 72);
        assert_eq!(config.public_rps, 50);
        assert_eq!(config.admin_rps, 20);
        assert_eq!(config.db_lock_timeout_ms, 5000);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn missing_required_key_is_named() {
        let err = Config::from_lookup(lookup_from(&[("SERVER_ADDRESS", "0.0.0.0:8080")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("SERVER_ADDRESS", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("JWT_SECRET", "secret"),
            ("PUBLIC_RPS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("PUBLIC_RPS")));
    }

    #[test]
    fn bootstrap_admin_requires_email_and_password() {
        let config = Config::from_lookup(lookup_from(&[
            ("SERVER_ADDRESS", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/quiz"),
            ("JWT_SECRET", "secret"),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "changeme"),
        ]))
        .unwrap();
        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.email, "root@example.com");
        assert_eq!(admin.phone, "admin");
    }
}
