use crate::snapshot::DuplicatePolicy;
use anyhow::{bail, Result};
use config::Config;
use serde::Deserialize;
use std::path::PathBuf;

pub const CONFIG_KEY_INPUT_PATH: &str = "input-path";
pub const CONFIG_KEY_OUTPUT_PATH: &str = "output-path";
pub const CONFIG_KEY_TOP_N: &str = "top-n";

/// Balance snapshot configuration (from TOML, environment and CLI overrides).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub user_states_path: String,
    pub token_id: u64,
    pub top_n: usize,
    #[serde(default)]
    pub duplicate_entries: DuplicatePolicy,
    #[serde(default)]
    pub merkle: MerkleConfig,
}

impl SnapshotConfig {
    /// Layer `config` over the bundled defaults and deserialize
    pub fn try_load(config: &Config) -> Result<Self> {
        let full = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        let loaded: Self = full.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            bail!("{CONFIG_KEY_TOP_N} must be at least 1");
        }
        if self.user_states_path.split('.').all(str::is_empty) {
            bail!("user-states-path must name at least one key");
        }
        Ok(())
    }
}

/// Merkle distribution output files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MerkleConfig {
    #[serde(default = "defaults::root_path")]
    pub root_path: PathBuf,
    #[serde(default = "defaults::proofs_path")]
    pub proofs_path: PathBuf,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            root_path: defaults::root_path(),
            proofs_path: defaults::proofs_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn root_path() -> PathBuf {
        PathBuf::from("../data/merkle_root.json")
    }
    pub fn proofs_path() -> PathBuf {
        PathBuf::from("../data/merkle_proofs.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DEFAULT_TOKEN_ID, DEFAULT_USER_STATES_PATH};

    fn empty() -> Config {
        Config::builder().build().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SnapshotConfig::try_load(&empty()).unwrap();

        assert_eq!(config.input_path, PathBuf::from("../data/state_561930000.json"));
        assert_eq!(config.output_path, PathBuf::from("../data/balances.json"));
        assert_eq!(config.user_states_path, DEFAULT_USER_STATES_PATH);
        assert_eq!(config.token_id, DEFAULT_TOKEN_ID);
        assert_eq!(config.top_n, 10000);
        assert_eq!(config.duplicate_entries, DuplicatePolicy::First);
        assert_eq!(config.merkle, MerkleConfig::default());
    }

    #[test]
    fn test_overrides() {
        let overrides = Config::builder()
            .set_override(CONFIG_KEY_TOP_N, 25)
            .unwrap()
            .set_override(CONFIG_KEY_OUTPUT_PATH, "/tmp/out.json")
            .unwrap()
            .set_override("duplicate-entries", "error")
            .unwrap()
            .set_override("merkle.root-path", "/tmp/root.json")
            .unwrap()
            .build()
            .unwrap();

        let config = SnapshotConfig::try_load(&overrides).unwrap();

        assert_eq!(config.top_n, 25);
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.duplicate_entries, DuplicatePolicy::Error);
        assert_eq!(config.merkle.root_path, PathBuf::from("/tmp/root.json"));
        assert_eq!(config.merkle.proofs_path, defaults::proofs_path());
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let overrides = Config::builder().set_override(CONFIG_KEY_TOP_N, 0).unwrap().build().unwrap();

        let err = SnapshotConfig::try_load(&overrides).unwrap_err();
        assert!(err.to_string().contains("top-n"));
    }

    #[test]
    fn test_empty_key_path_rejected() {
        let overrides = Config::builder()
            .set_override("user-states-path", "")
            .unwrap()
            .build()
            .unwrap();

        assert!(SnapshotConfig::try_load(&overrides).is_err());
    }
}
