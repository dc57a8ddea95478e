//! Engine configuration.
//!
//! Defines the YAML-serializable configuration that lists the dictionaries
//! to load and tunes matching and dynamic-source execution.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! dictionaries:
//!   - /usr/share/suggest/dictionaries
//!   - ~/.config/suggest/git.yaml
//! matching:
//!   mode: prefix
//!   staleness: advisory
//! execution:
//!   command_timeout_secs: 5
//!   refresh_on_suggest: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use command_suggest_core::{MatchMode, StalenessPolicy, SuggestOptions};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How typed text is matched against candidates.
///
/// # Examples
///
/// ```
/// # use command_suggest_db::MatchingConfig;
/// # use command_suggest_core::{MatchMode, StalenessPolicy};
/// let matching: MatchingConfig = serde_yaml::from_str("mode: contains").unwrap();
/// assert_eq!(matching.mode, MatchMode::Contains);
/// assert_eq!(matching.staleness, StalenessPolicy::Advisory);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// `prefix` (default) or `contains`.
    #[serde(default)]
    pub mode: MatchMode,
    /// `advisory` (default) or `reject_expired`.
    #[serde(default)]
    pub staleness: StalenessPolicy,
}

/// Settings for running dynamic value sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Kill a source command after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Enqueue refreshes for due sources while suggesting.
    #[serde(default = "default_true")]
    pub refresh_on_suggest: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: None,
            refresh_on_suggest: true,
        }
    }
}

impl ExecutionConfig {
    /// The command timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

/// Top-level engine configuration.
///
/// Loaded from a YAML file (typically `suggest.yml`).
///
/// # Examples
///
/// ```no_run
/// use command_suggest_db::SuggestConfig;
///
/// let config = SuggestConfig::load("suggest.yml").unwrap();
/// for path in &config.dictionaries {
///     println!("dictionary source: {}", path.display());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Dictionary files or directories, loaded in order.
    #[serde(default)]
    pub dictionaries: Vec<PathBuf>,
    /// Matching options.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Dynamic source execution.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            dictionaries: Vec::new(),
            matching: MatchingConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl SuggestConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::DatabaseError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Matching options for the suggestion engine.
    ///
    /// # Examples
    ///
    /// ```
    /// # use command_suggest_db::SuggestConfig;
    /// # use command_suggest_core::MatchMode;
    /// let config = SuggestConfig::default();
    /// assert_eq!(config.suggest_options().match_mode, MatchMode::Prefix);
    /// ```
    pub fn suggest_options(&self) -> SuggestOptions {
        SuggestOptions {
            match_mode: self.matching.mode,
            staleness: self.matching.staleness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
dictionaries:
  - /usr/share/suggest
  - git.yaml
matching:
  mode: contains
  staleness: reject_expired
execution:
  command_timeout_secs: 3
  refresh_on_suggest: false
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: SuggestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(
            config.dictionaries,
            vec![PathBuf::from("/usr/share/suggest"), PathBuf::from("git.yaml")]
        );
        assert_eq!(config.matching.mode, MatchMode::Contains);
        assert_eq!(config.matching.staleness, StalenessPolicy::RejectExpired);
        assert_eq!(
            config.execution.command_timeout(),
            Some(Duration::from_secs(3))
        );
        assert!(!config.execution.refresh_on_suggest);
    }

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: SuggestConfig = serde_yaml::from_str("version: \"1.0\"\n").unwrap();
        assert!(config.dictionaries.is_empty());
        assert_eq!(config.matching, MatchingConfig::default());
        assert!(config.execution.refresh_on_suggest);
        assert!(config.execution.command_timeout().is_none());
    }

    #[test]
    fn test_missing_version_is_rejected() {
        let result: std::result::Result<SuggestConfig, _> =
            serde_yaml::from_str("dictionaries: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_suggest_options_follow_matching() {
        let config: SuggestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let options = config.suggest_options();
        assert_eq!(options.match_mode, MatchMode::Contains);
        assert_eq!(options.staleness, StalenessPolicy::RejectExpired);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggest.yml");

        let original: SuggestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = SuggestConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
