use std::time::Duration;

use roadwatch_core::error::CoreError;

/// Default backend base URL for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Backend connection settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Bearer token; requests are sent unauthenticated when absent.
    pub access_token: Option<String>,
    /// Applied to every request, including stream downloads.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                     |
    /// |------------------------|-----------------------------|
    /// | `BACKEND_BASE_URL`     | `http://localhost:8000/api` |
    /// | `ACCESS_TOKEN`         | unset                       |
    /// | `REQUEST_TIMEOUT_SECS` | `10`                        |
    pub fn from_env() -> Result<Self, CoreError> {
        let base_url = std::env::var("BACKEND_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        if base_url.trim().is_empty() {
            return Err(CoreError::Config("BACKEND_BASE_URL must not be empty".into()));
        }

        let access_token = std::env::var("ACCESS_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let request_timeout = parse_request_timeout(std::env::var("REQUEST_TIMEOUT_SECS").ok())?;

        Ok(Self {
            base_url,
            access_token,
            request_timeout,
        })
    }
}

/// Parse `REQUEST_TIMEOUT_SECS`. Zero is rejected.
fn parse_request_timeout(raw: Option<String>) -> Result<Duration, CoreError> {
    let secs: u64 = match raw {
        Some(raw) => raw.trim().parse().map_err(|_| {
            CoreError::Config(format!("REQUEST_TIMEOUT_SECS must be a valid u64, got '{raw}'"))
        })?,
        None => DEFAULT_REQUEST_TIMEOUT_SECS,
    };
    if secs == 0 {
        return Err(CoreError::Config("REQUEST_TIMEOUT_SECS must be greater than 0".into()));
    }
    Ok(Duration::from_secs(secs))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}
