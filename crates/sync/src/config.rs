use std::str::FromStr;
use std::time::Duration;

/// Default backend base URL for local development.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Default delay between two status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default number of polls before the session times out.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Default timeout for one REST request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default silence allowed on the progress stream. The backend sends a
/// frame every 5 seconds while a run is active.
pub const DEFAULT_CHANNEL_IDLE_SECS: u64 = 30;

/// Synchronization settings, passed explicitly into every session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend base URL without the `/api` suffix.
    pub base_url: String,
    /// Delay before each status poll once the session is polling.
    pub poll_interval: Duration,
    /// Poll attempts allowed before giving up with a timeout.
    pub max_poll_attempts: u32,
    /// Per-request timeout for REST calls. The progress stream uses it
    /// for the connect and for the response headers only.
    pub request_timeout: Duration,
    /// Longest gap between two chunks on the progress stream before
    /// the channel is treated as lost.
    pub channel_idle_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            channel_idle_timeout: Duration::from_secs(DEFAULT_CHANNEL_IDLE_SECS),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `IDEAGEN_API_URL`               | `http://127.0.0.1:8000` |
    /// | `IDEAGEN_POLL_INTERVAL_SECS`    | `5`                     |
    /// | `IDEAGEN_POLL_MAX_ATTEMPTS`     | `120`                   |
    /// | `IDEAGEN_REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `IDEAGEN_CHANNEL_IDLE_SECS`     | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("IDEAGEN_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let poll_interval_secs: u64 =
            env_or("IDEAGEN_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let max_poll_attempts: u32 =
            env_or("IDEAGEN_POLL_MAX_ATTEMPTS", DEFAULT_MAX_POLL_ATTEMPTS)?;
        let request_timeout_secs: u64 =
            env_or("IDEAGEN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let channel_idle_secs: u64 =
            env_or("IDEAGEN_CHANNEL_IDLE_SECS", DEFAULT_CHANNEL_IDLE_SECS)?;

        let config = Self {
            base_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_poll_attempts,
            request_timeout: Duration::from_secs(request_timeout_secs),
            channel_idle_timeout: Duration::from_secs(channel_idle_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a session stall or never poll.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base URL must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be positive".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll attempt cap must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be positive".into()));
        }
        if self.channel_idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "channel idle timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Errors raised while building a [`SyncConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_poll_attempts, 120);
        assert_eq!(config.channel_idle_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_attempt_cap_is_rejected() {
        let config = SyncConfig {
            max_poll_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SyncConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let config = SyncConfig {
            channel_idle_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
