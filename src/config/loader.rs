//! Configuration loading from disk and the environment.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::NoteConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values taken from the command line or environment, applied on top of
/// the file configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the port of `listener.bind_address`.
    pub port: Option<u16>,
    /// Boolean text for `capture.encode_bytes`; unparseable text is ignored.
    pub encode_bytes: Option<String>,
    /// Replaces `logging.file`.
    pub log_filename: Option<PathBuf>,
}

/// Load configuration from a TOML file. Validation is left to the caller so
/// overrides can be applied first.
pub fn load_config(path: &Path) -> Result<NoteConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: NoteConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve the final configuration: file (or defaults), then overrides,
/// then validation.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<NoteConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => NoteConfig::default(),
    };
    apply_overrides(&mut config, overrides);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn apply_overrides(config: &mut NoteConfig, overrides: &Overrides) {
    if let Some(port) = overrides.port {
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{port}"),
        };
    }

    if let Some(text) = &overrides.encode_bytes {
        match parse_bool(text) {
            Some(flag) => config.capture.encode_bytes = flag,
            None => tracing::warn!(value = %text, "Ignoring unparseable ENCODE_BYTES"),
        }
    }

    if let Some(path) = &overrides.log_filename {
        config.logging.file = Some(path.clone());
    }
}

/// Boolean text as accepted for `ENCODE_BYTES`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bool() {
        for text in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool(text), Some(true), "{text}");
        }
        for text in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool(text), Some(false), "{text}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[capture]\nencode_bytes = true\n\n[listener]\nbind_address = \"127.0.0.1:9000\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.capture.encode_bytes);
        assert!(config.capture.parse_forms);
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.logging.max_size_mb, 20);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[capture\nencode_bytes = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = NoteConfig::default();
        apply_overrides(
            &mut config,
            &Overrides {
                port: Some(9999),
                encode_bytes: Some("T".into()),
                log_filename: Some(PathBuf::from("/tmp/notes.log")),
            },
        );
        assert_eq!(config.listener.bind_address, "0.0.0.0:9999");
        assert!(config.capture.encode_bytes);
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/notes.log")));
    }

    #[test]
    fn test_invalid_encode_bytes_is_ignored() {
        let mut config = NoteConfig::default();
        config.capture.encode_bytes = true;
        apply_overrides(
            &mut config,
            &Overrides {
                encode_bytes: Some("maybe".into()),
                ..Default::default()
            },
        );
        assert!(config.capture.encode_bytes);
    }

    #[test]
    fn test_resolve_validates_after_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"bogus\"").unwrap();

        let overrides = Overrides {
            port: Some(8081),
            ..Default::default()
        };
        let config = resolve_config(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8081");

        let err = resolve_config(Some(file.path()), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
