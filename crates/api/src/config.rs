//! Process configuration from the environment (optionally via `.env`).

use core::str::FromStr;

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value for {var}: '{value}' ({reason})")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Requests whose raw path starts with this prefix skip tenant resolution.
    pub admin_path_prefix: String,
    pub bcrypt_cost: u32,
    pub seed_demo_data: bool,
}

impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl_secs", &self.jwt_ttl.num_seconds())
            .field("database", &self.database_url.as_ref().map(|_| "postgres").unwrap_or("in-memory"))
            .field("admin_path_prefix", &self.admin_path_prefix)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("seed_demo_data", &self.seed_demo_data)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: "dev-secret".to_string(),
            jwt_ttl: Duration::seconds(3600),
            database_url: None,
            admin_path_prefix: "/admin".to_string(),
            bcrypt_cost: 10,
            seed_demo_data: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank values fall back
    /// to [`Config::default`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let ttl_secs: i64 = parse_or(get("JWT_EXPIRES_IN_SECS"), "JWT_EXPIRES_IN_SECS", 3600)?;
        if ttl_secs <= 0 {
            return Err(ConfigError {
                var: "JWT_EXPIRES_IN_SECS",
                value: ttl_secs.to_string(),
                reason: "must be positive".into(),
            });
        }

        let admin_path_prefix = get("ADMIN_PATH_PREFIX").unwrap_or(defaults.admin_path_prefix);
        if !admin_path_prefix.starts_with('/') {
            return Err(ConfigError {
                var: "ADMIN_PATH_PREFIX",
                value: admin_path_prefix,
                reason: "must start with '/'".into(),
            });
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            jwt_ttl: Duration::seconds(ttl_secs),
            database_url: get("DATABASE_URL"),
            admin_path_prefix,
            bcrypt_cost: parse_or(get("BCRYPT_COST"), "BCRYPT_COST", defaults.bcrypt_cost)?,
            seed_demo_data: parse_bool(get("SEED_DEMO_DATA"), "SEED_DEMO_DATA", defaults.seed_demo_data)?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn parse_bool(raw: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError {
            var,
            value: v,
            reason: "expected true/false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr, "0.0.0.0:3000");
        assert_eq!(c.jwt_ttl, Duration::seconds(3600));
        assert_eq!(c.admin_path_prefix, "/admin");
        assert!(c.database_url.is_none());
        assert!(c.seed_demo_data);
    }

    #[test]
    fn values_are_parsed() {
        let c = config(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN_SECS", "60"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("BCRYPT_COST", "4"),
            ("SEED_DEMO_DATA", "no"),
        ])
        .unwrap();
        assert_eq!(c.jwt_secret, "s3cret");
        assert_eq!(c.jwt_ttl.num_seconds(), 60);
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(c.bcrypt_cost, 4);
        assert!(!c.seed_demo_data);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config(&[("BCRYPT_COST", "lots")]).unwrap_err();
        assert_eq!(err.var, "BCRYPT_COST");
        assert!(config(&[("JWT_EXPIRES_IN_SECS", "0")]).is_err());
        assert!(config(&[("ADMIN_PATH_PREFIX", "admin")]).is_err());
        assert!(config(&[("SEED_DEMO_DATA", "maybe")]).is_err());
    }

    #[test]
    fn debug_redacts_the_secret() {
        let c = config(&[("JWT_SECRET", "topsecret")]).unwrap();
        assert!(!format!("{c:?}").contains("topsecret"));
    }
}
