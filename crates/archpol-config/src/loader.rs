//! Configuration loading from JSON documents on disk.
//!
//! # Design
//! - A missing `ARCHPOL_CONFIG` means built-in defaults; a path that is set but
//!   unreadable is an error rather than a silent fallback.
//! - All documents pass through `validate::parse_document`.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::defaults::CONFIG_PATH_ENV;
use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;
use crate::validate::parse_document;

/// Load and validate a configuration document from a JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be read, is not valid JSON, or fails
/// validation.
pub fn load_from_path(path: &Path) -> ConfigResult<EngineConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { source })?;
    let config = parse_document(&value)?;
    info!(path = %path.display(), "loaded engine configuration");
    Ok(config)
}

/// Load configuration from the path named by `ARCHPOL_CONFIG`, or defaults.
///
/// # Errors
///
/// Returns an error when the variable is set and the referenced document
/// cannot be loaded.
pub fn load_from_env() -> ConfigResult<EngineConfig> {
    load_from_env_value(env::var_os(CONFIG_PATH_ENV))
}

fn load_from_env_value(value: Option<OsString>) -> ConfigResult<EngineConfig> {
    match value {
        Some(path) if !path.is_empty() => load_from_path(Path::new(&path)),
        _ => {
            debug!("no configuration path set; using defaults");
            Ok(EngineConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(body.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn loads_document_from_disk() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config(r#"{"limits":{"max_copies":3}}"#)?;
        let config = load_from_path(file.path())?;
        assert_eq!(config.limits.max_copies, 3);
        Ok(())
    }

    #[test]
    fn malformed_json_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config("{ not json")?;
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_from_path(Path::new("/definitely/missing/archpol.json"));
        assert!(matches!(
            err,
            Err(ConfigError::Io {
                operation: "read_config",
                ..
            })
        ));
    }

    #[test]
    fn env_path_is_honoured() -> Result<(), Box<dyn std::error::Error>> {
        let file = write_config(r#"{"defaults":{"archive_age_minutes":15}}"#)?;
        let loaded = load_from_env_value(Some(file.path().as_os_str().to_owned()))?;
        assert_eq!(loaded.defaults.archive_age_minutes, 15);
        Ok(())
    }

    #[test]
    fn unset_or_empty_env_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(load_from_env_value(None)?, EngineConfig::default());
        assert_eq!(
            load_from_env_value(Some(OsString::new()))?,
            EngineConfig::default()
        );
        Ok(())
    }

    #[test]
    fn load_from_env_matches_process_environment() {
        let expected = load_from_env_value(env::var_os(CONFIG_PATH_ENV)).is_ok();
        assert_eq!(load_from_env().is_ok(), expected);
    }
}
