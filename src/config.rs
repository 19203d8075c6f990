// NODE CONFIGURATION
// Node-local settings. Layered: built-in defaults, then an optional TOML
// file, then TESSERA_* environment variables.
//
// Governance parameters are not configured here; they live in state.

use anyhow::Context;
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_types::coin::{parse_dec_coins, CoinError, DecCoin};

pub const DEFAULT_CHAIN_ID: &str = "tessera-1";
pub const DEFAULT_MIN_GAS_PRICES: &str = "0.002utsr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain_id: String,

    /// Mempool-only gas price floor, e.g. `"0.002utsr"`
    pub min_gas_prices: String,

    /// Fixed height of the v1 → v2 transition; none keeps the chain on v1
    /// until upgraded by signalling
    #[serde(default)]
    pub v2_upgrade_height: Option<u64>,

    /// Overrides the per-version activation delay after quorum
    #[serde(default)]
    pub upgrade_height_delay: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            min_gas_prices: DEFAULT_MIN_GAS_PRICES.to_string(),
            v2_upgrade_height: None,
            upgrade_height_delay: None,
        }
    }
}

impl AppConfig {
    fn defaults() -> anyhow::Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("chain_id", DEFAULT_CHAIN_ID)?
            .set_default("min_gas_prices", DEFAULT_MIN_GAS_PRICES)?)
    }

    /// Loads defaults, then `path` if it exists, then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("TESSERA").try_parsing(true))
            .build()
            .context("failed to assemble node configuration")?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid node configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document layered over the defaults.
    pub fn from_toml(document: &str) -> anyhow::Result<Self> {
        let settings = Self::defaults()?
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .context("failed to parse node configuration")?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.chain_id.is_empty(), "chain_id must not be empty");
        self.min_gas_prices()
            .with_context(|| format!("invalid min_gas_prices {:?}", self.min_gas_prices))?;
        if let Some(height) = self.v2_upgrade_height {
            anyhow::ensure!(height > 0, "v2_upgrade_height must be positive");
        }
        Ok(())
    }

    pub fn min_gas_prices(&self) -> Result<Vec<DecCoin>, CoinError> {
        parse_dec_coins(&self.min_gas_prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::Ratio;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        let prices = config.min_gas_prices().unwrap();
        assert_eq!(prices[0].amount, Ratio::new(2, 1000));
    }

    #[test]
    fn test_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            chain_id = "tessera-devnet"
            min_gas_prices = "0.1utsr"
            v2_upgrade_height = 20
            upgrade_height_delay = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.chain_id, "tessera-devnet");
        assert_eq!(config.v2_upgrade_height, Some(20));
        assert_eq!(config.upgrade_height_delay, Some(3));
    }

    #[test]
    fn test_rejects_bad_prices() {
        assert!(AppConfig::from_toml(r#"min_gas_prices = "cheap""#).is_err());
        assert!(AppConfig::from_toml(r#"chain_id = """#).is_err());
    }
}
