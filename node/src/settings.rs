//! # Node Settings
//!
//! The TOML file written by `init` and read by `run`. Ports can be
//! overridden from the command line or `LOCKED_VAULT_*` environment
//! variables; the vault deployment parameters cannot.
//!
//! ```toml
//! api_port = 9841
//! metrics_port = 9842
//!
//! [vault]
//! chain_id = 31337
//! vault_address = "0x..."
//! token = "0x..."
//! owner = "0x..."
//! lock_duration_secs = 180
//! relock_policy = "reset_on_deposit"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use locked_vault_contracts::VaultConfig;
use locked_vault_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};
use serde::{Deserialize, Serialize};

/// Name of the settings file inside a data directory.
pub const SETTINGS_FILE: &str = "config.toml";

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

/// Everything `run` needs besides the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Deployment parameters. Kept last so TOML writes it as a trailing table.
    pub vault: VaultConfig,
}

impl NodeSettings {
    /// Settings with default ports around a vault config.
    pub fn new(vault: VaultConfig) -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            vault,
        }
    }

    /// Reads and validates a settings file.
    ///
    /// # Errors
    ///
    /// Missing or unreadable file, invalid TOML, or a vault config that
    /// fails [`VaultConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: NodeSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        settings
            .vault
            .validate()
            .with_context(|| format!("invalid vault configuration in {}", path.display()))?;
        Ok(settings)
    }

    /// Writes the settings as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("failed to encode settings")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Applies command-line port overrides.
    pub fn with_overrides(mut self, api_port: Option<u16>, metrics_port: Option<u16>) -> Self {
        if let Some(port) = api_port {
            self.api_port = port;
        }
        if let Some(port) = metrics_port {
            self.metrics_port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locked_vault_contracts::RelockPolicy;
    use locked_vault_protocol::Address;

    fn vault_config() -> VaultConfig {
        VaultConfig::new(
            5,
            Address::new([0x5A; 20]),
            Address::new([0x70; 20]),
            Address::new([0x01; 20]),
        )
        .with_lock_duration(600)
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = NodeSettings::new(
            vault_config()
                .with_trusted_forwarder(Address::new([0xF0; 20]))
                .with_relock_policy(RelockPolicy::PreserveActiveLock),
        );

        settings.save(&path).unwrap();
        assert_eq!(NodeSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn ports_default_when_omitted() {
        let raw = r#"
            [vault]
            chain_id = 97
            vault_address = "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a"
            token = "0x7070707070707070707070707070707070707070"
            owner = "0x0101010101010101010101010101010101010101"
            lock_duration_secs = 60
        "#;
        let settings: NodeSettings = toml::from_str(raw).unwrap();
        assert_eq!(settings.api_port, DEFAULT_API_PORT);
        assert_eq!(settings.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(settings.vault.relock_policy, RelockPolicy::ResetOnDeposit);
        assert!(settings.vault.trusted_forwarder.is_none());
    }

    #[test]
    fn load_rejects_zero_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut settings = NodeSettings::new(vault_config());
        settings.vault.lock_duration_secs = 0;
        settings.save(&path).unwrap();

        let err = NodeSettings::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid vault configuration"));
    }

    #[test]
    fn overrides_only_replace_given_ports() {
        let settings = NodeSettings::new(vault_config()).with_overrides(Some(1), None);
        assert_eq!(settings.api_port, 1);
        assert_eq!(settings.metrics_port, DEFAULT_METRICS_PORT);
    }
}
