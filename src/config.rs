use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "DermSight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend used when nothing else is configured (local development server).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Environment variable consulted by the CLI for the backend endpoint.
pub const API_URL_ENV: &str = "DERMSIGHT_API_URL";

/// Bounded wait for one analysis exchange, measured from request start.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024; // 20MB

/// Upper end of the backend risk score used to size the risk bar.
pub const DEFAULT_RISK_SCALE: f64 = 6.0;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "dermsight=info,dermsight_lib=info,warn"
}

/// Client configuration, passed explicitly to everything that talks to
/// the backend. Nothing reads process-wide state after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend root, without trailing slash.
    pub base_url: String,
    /// Deadline for the whole request/response exchange.
    pub timeout: Duration,
    /// Largest image accepted locally before upload.
    pub max_image_bytes: u64,
    /// Risk score that maps to a full risk bar.
    pub risk_scale: f64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            risk_scale: DEFAULT_RISK_SCALE,
        }
    }

    /// Resolve the base URL from `DERMSIGHT_API_URL`, falling back to the
    /// local development server. Only the CLI entry point calls this.
    pub fn from_env() -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_image_bytes(mut self, max: u64) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn with_risk_scale(mut self, scale: f64) -> Self {
        self.risk_scale = scale;
        self
    }

    /// Full URL of the analysis endpoint.
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze/", self.base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_twenty_seconds() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(20));
    }

    #[test]
    fn default_points_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.analyze_url(), "http://127.0.0.1:8000/analyze/");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = ClientConfig::new("https://triage.example.org/");
        assert_eq!(config.base_url, "https://triage.example.org");
        assert_eq!(config.analyze_url(), "https://triage.example.org/analyze/");
    }

    #[test]
    fn builders_override_defaults() {
        let config = ClientConfig::new("http://localhost:9000")
            .with_timeout(Duration::from_millis(250))
            .with_max_image_bytes(1024)
            .with_risk_scale(15.0);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_image_bytes, 1024);
        assert_eq!(config.risk_scale, 15.0);
    }

    #[test]
    fn app_name_is_dermsight() {
        assert_eq!(APP_NAME, "DermSight");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
