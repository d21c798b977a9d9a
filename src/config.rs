use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Health Navigator";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend origin used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Upper bound for every backend call (a cold backend can take close to a minute).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the backend origin.
pub const ENV_BASE_URL: &str = "HEALTH_NAVIGATOR_API_URL";

/// Environment variable overriding the per-call timeout, in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "HEALTH_NAVIGATOR_TIMEOUT_MS";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "health_navigator=info,warn"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
    #[error("Timeout must be a positive number of milliseconds, got {0:?}")]
    InvalidTimeout(String),
}

/// Connection settings shared by every component that talks to the backend.
///
/// Built once at startup and handed to [`crate::api::HttpBackend`], which the
/// prober and the workflow controller both use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            timeout: validate_timeout(timeout)?,
        })
    }

    /// Defaults overridden by `HEALTH_NAVIGATOR_API_URL` / `HEALTH_NAVIGATOR_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config = config.with_base_url(&url)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS).filter(|v| !v.trim().is_empty()) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config = config.with_timeout(Duration::from_millis(ms))?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.timeout = validate_timeout(timeout)?;
        Ok(self)
    }

    /// Backend origin without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-call upper bound applied to every request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

fn validate_timeout(timeout: Duration) -> Result<Duration, ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout(format!("{}ms", timeout.as_millis())));
    }
    Ok(timeout)
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = ClientConfig::new("https://api.example.org/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(config.base_url(), "https://api.example.org");
    }

    #[test]
    fn rejects_url_without_scheme() {
        let err = ClientConfig::new("localhost:8000", DEFAULT_TIMEOUT).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBaseUrl("localhost:8000".into()));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = ClientConfig::default()
            .with_timeout(Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENV_BASE_URL, "https://health.example.com/"),
            (ENV_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "https://health.example.com");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn empty_env_values_fall_back_to_defaults() {
        let config =
            ClientConfig::from_lookup(lookup_from(&[(ENV_BASE_URL, "  "), (ENV_TIMEOUT_MS, "")]))
                .unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn unparseable_timeout_is_an_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_MS, "soon")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout("soon".into()));
    }

    #[test]
    fn app_name_is_health_navigator() {
        assert_eq!(APP_NAME, "Health Navigator");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
