//! Service settings (environment) and coefficient tables (TOML).
//!
//! Tables are resolved in this order:
//! 1) `$SCORING_TABLES_PATH`
//! 2) `config/scoring.toml`
//! 3) built-in `default_seed()`

pub mod tables;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;

pub use tables::{
    default_seed, CategoryAffinity, ElementRow, EsmsTransform, LunarTable, PlanetCoefficients,
    PlanetTable, ScoringTables,
};

const ENV_TABLES_PATH: &str = "SCORING_TABLES_PATH";
const DEFAULT_TABLES_PATH: &str = "config/scoring.toml";

/// Load and validate tables from an explicit TOML file.
pub fn load_tables_from(path: &Path) -> Result<ScoringTables, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let tables = ScoringTables::from_toml_str(&content)?;
    info!(target: "scoring", path = %path.display(), "coefficient tables loaded");
    Ok(tables)
}

/// Load tables using env var + fallbacks (see module docs).
pub fn load_tables_default() -> Result<ScoringTables, ConfigError> {
    if let Some(p) = env_string(ENV_TABLES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(ConfigError::InvalidValue {
                key: ENV_TABLES_PATH.into(),
                reason: format!("{} does not exist", pb.display()),
            });
        }
        return load_tables_from(&pb);
    }
    let default_path = PathBuf::from(DEFAULT_TABLES_PATH);
    if default_path.exists() {
        return load_tables_from(&default_path);
    }
    Ok(default_seed())
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Live positions endpoint; `None` leaves the live tier unconfigured.
    pub live_url: Option<String>,
    /// HTTP client timeout for the live tier.
    pub live_timeout: Duration,
    /// Upper bound on any single tier attempt.
    pub tier_timeout: Duration,
    pub cache_ttl: Duration,
    /// Consecutive failures that open a remote tier's circuit; 0 disables it.
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub metrics_route: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            live_url: None,
            live_timeout: Duration::from_millis(2000),
            tier_timeout: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(3600),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(60),
            metrics_route: false,
        }
    }
}

impl ServiceConfig {
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            live_url: env_string("ASTRO_LIVE_URL"),
            live_timeout: env_millis("ASTRO_LIVE_TIMEOUT_MS")?.unwrap_or(d.live_timeout),
            tier_timeout: env_millis("ASTRO_TIER_TIMEOUT_MS")?.unwrap_or(d.tier_timeout),
            cache_ttl: env_u64("ASTRO_CACHE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(d.cache_ttl),
            breaker_threshold: env_u64("ASTRO_BREAKER_THRESHOLD")?
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(d.breaker_threshold),
            breaker_cooldown: env_u64("ASTRO_BREAKER_COOLDOWN_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(d.breaker_cooldown),
            metrics_route: env_string("METRICS_ROUTE").is_some_and(|v| is_truthy(&v)),
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    env_string(key)
        .map(|v| {
            v.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("`{v}`: {e}"),
            })
        })
        .transpose()
}

fn env_millis(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_u64(key)?.map(Duration::from_millis))
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for k in [
            "ASTRO_LIVE_URL",
            "ASTRO_LIVE_TIMEOUT_MS",
            "ASTRO_TIER_TIMEOUT_MS",
            "ASTRO_CACHE_TTL_SECS",
            "ASTRO_BREAKER_THRESHOLD",
            "ASTRO_BREAKER_COOLDOWN_SECS",
            "METRICS_ROUTE",
            ENV_TABLES_PATH,
        ] {
            std::env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn env_defaults_and_overrides() {
        clear_env();
        assert_eq!(ServiceConfig::from_env().unwrap(), ServiceConfig::default());

        std::env::set_var("ASTRO_LIVE_URL", "http://localhost:9000/positions");
        std::env::set_var("ASTRO_TIER_TIMEOUT_MS", "150");
        std::env::set_var("METRICS_ROUTE", "1");
        std::env::set_var("ASTRO_BREAKER_THRESHOLD", "0");
        std::env::set_var("ASTRO_BREAKER_COOLDOWN_SECS", "5");
        let cfg = ServiceConfig::from_env().unwrap();
        assert_eq!(cfg.breaker_threshold, 0);
        assert_eq!(cfg.breaker_cooldown, Duration::from_secs(5));
        assert_eq!(cfg.live_url.as_deref(), Some("http://localhost:9000/positions"));
        assert_eq!(cfg.tier_timeout, Duration::from_millis(150));
        assert!(cfg.metrics_route);

        std::env::set_var("ASTRO_CACHE_TTL_SECS", "soon");
        assert!(ServiceConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn tables_from_env_path() {
        clear_env();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "sign_share = 0.5").unwrap();
        std::env::set_var(ENV_TABLES_PATH, f.path());
        let t = load_tables_default().unwrap();
        assert_eq!(t.sign_share, 0.5);

        std::env::set_var(ENV_TABLES_PATH, "/definitely/not/here.toml");
        assert!(load_tables_default().is_err());
        clear_env();
    }
}
