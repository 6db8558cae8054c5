//! Configuration for the OneAccount authentication middleware.

use std::time::{Duration, Instant};

/// Default configuration constants.
pub mod defaults {
    use std::time::Duration;

    /// Path the widget posts to and the client resumes on.
    pub const CALLBACK_PATH: &str = "oneaccountauth";

    /// Remote endpoint confirming that a bearer token belongs to an identifier.
    pub const VERIFY_URL: &str = "https://api.oneaccount.app/widget/verify";

    /// Verification request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Idle pooled connections are closed after this long.
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum idle connections kept per host.
    pub const POOL_MAX_IDLE_PER_HOST: usize = 100;

    /// How long staged data waits for pickup (1 minute).
    pub const ENTRY_TTL: Duration = Duration::from_secs(60);

    /// Interval of the background sweep (must be shorter than the TTL).
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

    /// Largest callback body buffered by the middleware (1 MiB).
    pub const MAX_BODY_BYTES: usize = 1024 * 1024;
}

/// Middleware configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Callback path intercepted by the middleware. `None` means the default.
    pub callback_path: Option<String>,

    /// Verification endpoint (overridable for mock servers).
    pub verify_url: String,

    /// Verification request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Idle connection timeout of the verification client.
    pub pool_idle_timeout: Duration,

    /// Idle connections kept per host by the verification client.
    pub pool_max_idle_per_host: usize,

    /// Lifetime of a staged entry in the default store.
    pub entry_ttl: Duration,

    /// Sweep interval of the default store.
    pub sweep_interval: Duration,

    /// Body size limit when the identifier has to be read from the body.
    pub max_body_bytes: usize,
}

impl Config {
    /// Create a configuration with every field at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callback_path: None,
            verify_url: defaults::VERIFY_URL.to_string(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            pool_idle_timeout: defaults::POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: defaults::POOL_MAX_IDLE_PER_HOST,
            entry_ttl: defaults::ENTRY_TTL,
            sweep_interval: defaults::SWEEP_INTERVAL,
            max_body_bytes: defaults::MAX_BODY_BYTES,
        }
    }

    /// Create a test configuration pointing verification at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            verify_url: format!("{}/widget/verify", base_url.trim_end_matches('/')),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..Self::new()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from a variable lookup, as [`Config::from_env`]
    /// does with the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::new();
        config.callback_path = lookup("ONEACCOUNT_CALLBACK_PATH");
        if let Some(url) = lookup("ONEACCOUNT_VERIFY_URL") {
            if url.trim().is_empty() {
                anyhow::bail!("ONEACCOUNT_VERIFY_URL is set but empty");
            }
            config.verify_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Callback path with surrounding slashes removed, or the default when unset.
    #[must_use]
    pub fn resolved_callback_path(&self) -> String {
        self.callback_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults::CALLBACK_PATH)
            .to_string()
    }

    /// Check the store timing invariants.
    ///
    /// # Errors
    ///
    /// Returns error on a zero TTL or sweep interval, when the sweep
    /// interval is not shorter than the TTL, or when the TTL is too large to
    /// compute an expiry instant.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.entry_ttl.is_zero() {
            anyhow::bail!("entry TTL must be non-zero");
        }
        if Instant::now().checked_add(self.entry_ttl).is_none() {
            anyhow::bail!("entry TTL ({:?}) is too large", self.entry_ttl);
        }
        if self.sweep_interval.is_zero() {
            anyhow::bail!("sweep interval must be non-zero");
        }
        if self.sweep_interval >= self.entry_ttl {
            anyhow::bail!(
                "sweep interval ({:?}) must be shorter than the entry TTL ({:?})",
                self.sweep_interval,
                self.entry_ttl
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.callback_path.is_none());
        assert_eq!(config.verify_url, defaults::VERIFY_URL);
        assert_eq!(config.resolved_callback_path(), "oneaccountauth");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_callback_path_is_trimmed() {
        let config = Config {
            callback_path: Some("/auth/callback/".into()),
            ..Config::new()
        };
        assert_eq!(config.resolved_callback_path(), "auth/callback");
    }

    #[test]
    fn test_empty_callback_path_falls_back_to_default() {
        let config = Config {
            callback_path: Some("//".into()),
            ..Config::new()
        };
        assert_eq!(config.resolved_callback_path(), defaults::CALLBACK_PATH);
    }

    #[test]
    fn test_for_testing_points_at_mock() {
        let config = Config::for_testing("http://127.0.0.1:9999/");
        assert_eq!(config.verify_url, "http://127.0.0.1:9999/widget/verify");
    }

    #[test]
    fn test_validate_rejects_bad_timing() {
        let config = Config {
            sweep_interval: Duration::from_secs(60),
            ..Config::new()
        };
        assert!(config.validate().is_err());

        let config = Config {
            entry_ttl: Duration::ZERO,
            ..Config::new()
        };
        assert!(config.validate().is_err());

        let config = Config {
            sweep_interval: Duration::ZERO,
            ..Config::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_ttl() {
        let config = Config {
            entry_ttl: Duration::MAX,
            ..Config::new()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too large"));

        let config = Config {
            entry_ttl: Duration::from_secs(24 * 60 * 60),
            ..Config::new()
        };
        assert!(config.validate().is_ok());
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn test_from_lookup_without_variables_uses_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.callback_path.is_none());
        assert_eq!(config.verify_url, defaults::VERIFY_URL);
    }

    #[test]
    fn test_from_lookup_reads_callback_path_and_verify_url() {
        let config = Config::from_lookup(lookup(&[
            ("ONEACCOUNT_CALLBACK_PATH", "/auth/cb/"),
            ("ONEACCOUNT_VERIFY_URL", "http://127.0.0.1:9999/widget/verify"),
        ]))
        .unwrap();
        assert_eq!(config.callback_path.as_deref(), Some("/auth/cb/"));
        assert_eq!(config.resolved_callback_path(), "auth/cb");
        assert_eq!(config.verify_url, "http://127.0.0.1:9999/widget/verify");
    }

    #[test]
    fn test_from_lookup_rejects_empty_verify_url() {
        let err = Config::from_lookup(lookup(&[("ONEACCOUNT_VERIFY_URL", "  ")])).unwrap_err();
        assert!(err.to_string().contains("ONEACCOUNT_VERIFY_URL is set but empty"));
    }
}
