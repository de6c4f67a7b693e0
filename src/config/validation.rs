//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse backend identities into URLs
//! - Validate value ranges (attempts > 0, probe timeout < interval)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::LbConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured; provide one or more backends to load balance")]
    NoBackends,

    #[error("backend '{raw}' is not a valid URL: {reason}")]
    MalformedBackend { raw: String, reason: String },

    #[error("backend '{0}' must use the http scheme")]
    UnsupportedScheme(String),

    #[error("backend '{0}' has no host")]
    MissingHost(String),

    #[error("backend '{0}' is configured more than once")]
    DuplicateBackend(String),

    #[error("listener bind address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("health_check.timeout_secs ({timeout}) must be shorter than interval_secs ({interval})")]
    ProbeTimeoutTooLong { timeout: u64, interval: u64 },

    #[error("health_check.interval_secs must be at least 1")]
    ZeroInterval,
}

/// Parse one backend identity.
///
/// Only plain `http` targets are accepted; TLS to backends is out of scope.
pub fn parse_backend_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| ValidationError::MalformedBackend {
        raw: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme(trimmed.to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost(trimmed.to_string()));
    }

    Ok(url)
}

/// Parse every backend in order, collecting all errors.
pub fn parse_backends(raw: &[String]) -> Result<Vec<Url>, Vec<ValidationError>> {
    if raw.is_empty() {
        return Err(vec![ValidationError::NoBackends]);
    }

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut urls = Vec::with_capacity(raw.len());

    for entry in raw {
        match parse_backend_url(entry) {
            Ok(url) => {
                if !seen.insert(url.to_string()) {
                    errors.push(ValidationError::DuplicateBackend(url.to_string()));
                    continue;
                }
                urls.push(url);
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(urls)
    } else {
        Err(errors)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = match parse_backends(&config.backends) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    };

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }

    let hc = &config.health_check;
    if hc.enabled {
        if hc.interval_secs == 0 {
            errors.push(ValidationError::ZeroInterval);
        } else if hc.timeout_secs >= hc.interval_secs {
            errors.push(ValidationError::ProbeTimeoutTooLong {
                timeout: hc.timeout_secs,
                interval: hc.interval_secs,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(backends: &[&str]) -> LbConfig {
        LbConfig {
            backends: backends.iter().map(|s| s.to_string()).collect(),
            ..LbConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config_with(&["http://127.0.0.1:3031", "http://localhost:3032"]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_backends_rejected() {
        let errors = validate_config(&config_with(&[])).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = config_with(&["not a url", "https://secure:443", "http://ok:1"]);
        config.retries.max_attempts = 0;
        config.health_check.timeout_secs = 200;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::MalformedBackend { .. }));
        assert!(matches!(errors[1], ValidationError::UnsupportedScheme(_)));
        assert!(errors.contains(&ValidationError::ZeroAttempts));
        assert!(errors.contains(&ValidationError::ProbeTimeoutTooLong {
            timeout: 200,
            interval: 120
        }));
    }

    #[test]
    fn test_duplicate_backend() {
        let errors = parse_backends(&[
            "http://127.0.0.1:3031".to_string(),
            "http://127.0.0.1:3031/".to_string(),
        ])
        .unwrap_err();
        assert!(matches!(errors[0], ValidationError::DuplicateBackend(_)));
    }

    #[test]
    fn test_parse_keeps_order() {
        let urls = parse_backends(&[
            "http://b:2".to_string(),
            " http://a:1 ".to_string(),
        ])
        .unwrap();
        assert_eq!(urls[0].as_str(), "http://b:2/");
        assert_eq!(urls[1].as_str(), "http://a:1/");
    }

    #[test]
    fn test_disabled_health_check_skips_timing_rules() {
        let mut config = config_with(&["http://127.0.0.1:3031"]);
        config.health_check.enabled = false;
        config.health_check.interval_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
