//! TOML-based configuration for the `recorder-cli` binary.
//!
//! Not part of the distilled spec's module list; SPEC_FULL.md §4.H adds it
//! as ambient stack, following the `serde` + `toml` idiom.

use std::path::Path;

use serde::Deserialize;

use crate::discovery::DEFAULT_DISCOVERY_PORT;
use crate::error::ConfigError;

/// Recorder configuration loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The partition this recorder's node belongs to, e.g. `"/robot"`.
    pub partition: String,

    /// UDP port the discovery client binds to.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Directory recorded logs are written into; `record` names the file
    /// after the invocation time within this directory.
    pub log_dir: String,

    /// Topic-matching regex patterns registered at startup.
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}

impl Config {
    /// Load and parse a TOML config file from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.toml");
        std::fs::write(&path, "partition = \"/robot\"\nlog_dir = \"/var/log/recorder\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.partition, "/robot");
        assert_eq!(config.discovery_port, DEFAULT_DISCOVERY_PORT);
        assert!(config.patterns.is_empty());
    }

    #[test]
    fn parses_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.toml");
        std::fs::write(
            &path,
            "partition = \"/robot\"\ndiscovery_port = 15000\nlog_dir = \"/data\"\npatterns = [\"^sensor/\", \"^cmd$\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.discovery_port, 15000);
        assert_eq!(config.patterns, vec!["^sensor/".to_string(), "^cmd$".to_string()]);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/nonexistent-dir-for-sure/recorder.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.toml");
        std::fs::write(&path, "not valid toml = [").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
