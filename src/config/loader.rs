//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::LbConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

/// Read a TOML file without validating it.
///
/// Callers merge command-line overrides before validating.
pub fn read_config(path: &Path) -> Result<LbConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_config;
    use std::io::Write;

    fn load(path: &Path) -> Result<LbConfig, ConfigError> {
        let config = read_config(path)?;
        validate_config(&config)?;
        Ok(config)
    }

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("simple-lb-{}-{}.toml", name, std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_file() {
        let path = write_temp("valid", "backends = [\"http://127.0.0.1:3031\"]\n");
        let config = load(&path).unwrap();
        assert_eq!(config.backends, vec!["http://127.0.0.1:3031".to_string()]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_rejects_empty_backends() {
        let path = write_temp("empty", "policy = \"round-robin\"\n");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e == &vec![ValidationError::NoBackends]));
        assert!(err.to_string().contains("no backends configured"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_parse_error() {
        let path = write_temp("broken", "backends = [\n");
        assert!(matches!(load(&path), Err(ConfigError::Parse(_))));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/nonexistent/simple-lb.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
