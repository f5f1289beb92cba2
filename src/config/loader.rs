//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::schema::{CustomersConfig, GatewayConfig};
use crate::config::validation::{validate_config, validate_customers_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate gateway configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = read_toml(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate customers service configuration from a TOML file.
pub fn load_customers_config(path: &Path) -> Result<CustomersConfig, ConfigError> {
    let config: CustomersConfig = read_toml(path)?;
    validate_customers_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [[routes]]
            id = "twitter"
            uri = "http://twitter.com/@"
            predicate = { type = "path", pattern = "/twitter/**" }
            filters = [{ type = "rewrite_path", regex = "/twitter/(?<handle>.*)", replacement = "/${handle}" }]
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routes[0].id, "twitter");
    }

    #[test]
    fn test_load_reports_parse_and_validation_errors() {
        let garbage = write_config("routes = 12");
        assert!(matches!(load_config(garbage.path()), Err(ConfigError::Parse(_))));

        let invalid = write_config(
            r#"
            [[routes]]
            id = "x"
            uri = "ftp://example.com"
            predicate = { type = "path", pattern = "/x" }
            "#,
        );
        match load_config(invalid.path()) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors[0].field, "routes[0].uri"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_customers_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
