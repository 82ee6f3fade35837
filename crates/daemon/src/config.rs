use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use engine::DEFAULT_SEGMENT_SECONDS;

/// Runtime configuration, read from the environment with local defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub store_root: PathBuf,
    pub scratch_dir: PathBuf,
    pub ml_service_url: String,
    pub ml_service_timeout: Duration,
    pub segment_seconds: u32,
    pub language_code: String,
    pub scene_threshold: f64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 7777)),
            db_path: PathBuf::from(".cache/moviemanager.db"),
            store_root: PathBuf::from(".cache/store"),
            scratch_dir: std::env::temp_dir(),
            ml_service_url: "http://127.0.0.1:8001".to_string(),
            ml_service_timeout: Duration::from_secs(600),
            segment_seconds: DEFAULT_SEGMENT_SECONDS,
            language_code: "ko-KR".to_string(),
            scene_threshold: 30.0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        let segment_seconds: u32 = parse_env("MOVIEMANAGER_SEGMENT_SECONDS", defaults.segment_seconds)?;
        if segment_seconds == 0 {
            anyhow::bail!("MOVIEMANAGER_SEGMENT_SECONDS must be greater than zero");
        }

        Ok(Config {
            bind: parse_env("MOVIEMANAGER_BIND", defaults.bind)?,
            db_path: parse_env("MOVIEMANAGER_DB_PATH", defaults.db_path)?,
            store_root: parse_env("MOVIEMANAGER_STORE_ROOT", defaults.store_root)?,
            scratch_dir: parse_env("MOVIEMANAGER_SCRATCH_DIR", defaults.scratch_dir)?,
            ml_service_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.ml_service_url),
            ml_service_timeout: Duration::from_secs(parse_env(
                "ML_SERVICE_TIMEOUT_SECS",
                defaults.ml_service_timeout.as_secs(),
            )?),
            segment_seconds,
            language_code: std::env::var("MOVIEMANAGER_LANGUAGE").unwrap_or(defaults.language_code),
            scene_threshold: parse_env("MOVIEMANAGER_SCENE_THRESHOLD", defaults.scene_threshold)?,
            log_level: std::env::var("MOVIEMANAGER_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: u32 = parse_env("MOVIEMANAGER_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("MOVIEMANAGER_TEST_BAD_NUMBER", "ten");
        let result: Result<u32> = parse_env("MOVIEMANAGER_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
        std::env::remove_var("MOVIEMANAGER_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.segment_seconds, 600);
        assert_eq!(config.bind.port(), 7777);
    }
}
