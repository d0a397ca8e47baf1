//! Loading `E2eConfig` from disk and the environment.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::domain::config::{E2eConfig, EnvOverrides};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "E2E_CONFIG_PATH";

/// File name under the home directory.
pub const CONFIG_FILE_NAME: &str = ".test_infra_config.yaml";

/// Prefix of the per-field environment overrides.
pub const ENV_PREFIX: &str = "E2E_";

/// YAML config file plus `E2E_*` overrides.
pub struct YamlConfigStore;

impl YamlConfigStore {
    /// Load the config: file (or defaults if absent), then env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override variable has the wrong type.
    pub fn load(&self) -> Result<E2eConfig> {
        let path = self.path()?;
        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("cannot parse {}", path.display()))?
        } else {
            E2eConfig::default()
        };
        let env: EnvOverrides = envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("invalid E2E_* environment override")?;
        Ok(file.with_overrides(env))
    }

    /// # Errors
    ///
    /// Returns an error if no override is set and the home directory is unknown.
    pub fn path(&self) -> Result<PathBuf> {
        if let Ok(val) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }
}
