//! Engine configuration

use crate::placement::PlacementPolicy;
use crate::synthesis::GeneratorCommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for a `TaxonomyEngine`
///
/// Every field has a default, so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vault-relative folder holding the MOC tree and the index
    pub moc_root: PathBuf,
    /// Index file name, stored directly under `moc_root`
    pub index_file: String,
    /// Characters of each note included in synthesis prompts
    pub excerpt_chars: usize,
    /// Pause between cascade levels, for generator rate limits
    pub pacing_delay_ms: u64,
    pub placement: PlacementPolicy,
    /// External command used as the text generator by the CLI
    pub generator: Option<GeneratorCommand>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            moc_root: PathBuf::from("MOCs"),
            index_file: "hierarchy.json".to_string(),
            excerpt_chars: 500,
            pacing_delay_ms: 2000,
            placement: PlacementPolicy::Single,
            generator: None,
        }
    }
}

impl EngineConfig {
    /// Load a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Vault-relative location of the persisted index
    pub fn index_path(&self) -> PathBuf {
        self.moc_root.join(&self.index_file)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn with_moc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.moc_root = root.into();
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_placement(mut self, policy: PlacementPolicy) -> Self {
        self.placement = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.index_path(), PathBuf::from("MOCs/hierarchy.json"));
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            b"moc_root: Maps\npacing_delay_ms: 0\nplacement:\n  mode: multi\n  max_alternatives: 1\ngenerator:\n  command: llm\n  args: [\"-s\"]\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.moc_root, PathBuf::from("Maps"));
        assert_eq!(config.pacing_delay(), Duration::ZERO);
        assert!(matches!(
            config.placement,
            PlacementPolicy::Multi { max_alternatives: 1, .. }
        ));
        assert_eq!(config.generator.unwrap().command, "llm");
    }

    #[test]
    fn bad_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "excerpt_chars: lots\n").unwrap();

        let err = EngineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }
}
