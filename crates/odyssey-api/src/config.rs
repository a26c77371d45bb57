//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use odyssey_preload::config::PreloadConfig;

use crate::error::AppError;

/// Everything `main` needs to start the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Gemini API key. Without one the server generates nothing and every
    /// consumer uses its static fallback content.
    pub gemini_api_key: Option<String>,
    /// Directory for durable storage. In-memory when unset.
    pub data_dir: Option<PathBuf>,
    /// Preloader tunables.
    pub preload: PreloadConfig,
    /// How long a session may go without a request before it is torn down.
    pub session_idle_timeout: Duration,
    /// How often idle sessions are swept.
    pub session_sweep_interval: Duration,
}

/// Default idle time before a session expires.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default time between idle-session sweeps.
pub const DEFAULT_SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut preload = PreloadConfig::default();
        if let Some(n) = parse_var::<usize>(&var, "ODYSSEY_PRELOAD_CONCURRENCY")? {
            preload.max_concurrency = n;
        }
        if let Some(n) = parse_var::<u32>(&var, "ODYSSEY_PRELOAD_RETRIES")? {
            preload.max_retries = n;
        }
        if let Some(ms) = parse_var::<u64>(&var, "ODYSSEY_PRELOAD_BACKOFF_MS")? {
            preload.base_backoff = Duration::from_millis(ms);
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&var, "PORT")?.unwrap_or(3000),
            gemini_api_key: var("GEMINI_API_KEY"),
            data_dir: var("ODYSSEY_DATA_DIR").map(PathBuf::from),
            preload,
            session_idle_timeout: parse_var::<u64>(&var, "ODYSSEY_SESSION_IDLE_SECS")?
                .map_or(DEFAULT_SESSION_IDLE_TIMEOUT, Duration::from_secs),
            session_sweep_interval: parse_var::<u64>(&var, "ODYSSEY_SESSION_SWEEP_SECS")?
                .map_or(DEFAULT_SESSION_SWEEP_INTERVAL, |secs| {
                    Duration::from_secs(secs.max(1))
                }),
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{name} must be a valid number: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.gemini_api_key.is_none());
        assert!(config.data_dir.is_none());
        assert_eq!(config.preload, PreloadConfig::default());
        assert_eq!(config.session_idle_timeout, DEFAULT_SESSION_IDLE_TIMEOUT);
        assert_eq!(config.session_sweep_interval, DEFAULT_SESSION_SWEEP_INTERVAL);
    }

    #[test]
    fn test_session_expiry_is_configurable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("ODYSSEY_SESSION_IDLE_SECS", "600"),
            ("ODYSSEY_SESSION_SWEEP_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.session_idle_timeout, Duration::from_secs(600));
        assert_eq!(config.session_sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("GEMINI_API_KEY", "secret"),
            ("ODYSSEY_DATA_DIR", "/var/lib/odyssey"),
            ("ODYSSEY_PRELOAD_CONCURRENCY", "4"),
            ("ODYSSEY_PRELOAD_RETRIES", "5"),
            ("ODYSSEY_PRELOAD_BACKOFF_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/odyssey")));
        assert_eq!(config.preload.max_concurrency, 4);
        assert_eq!(config.preload.max_retries, 5);
        assert_eq!(config.preload.base_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_key_counts_as_unset() {
        let config = ServerConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap();

        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let result = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }
}
