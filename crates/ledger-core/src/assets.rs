use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{LedgerError, Result};

/// One monitored (symbol, network) pair.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetConfig {
    pub symbol: String,
    pub network: String,
}

/// The monitored universe, loaded once at startup from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetCatalog {
    pub assets: Vec<AssetConfig>,
}

impl AssetCatalog {
    /// Loads and validates the assets file. Invalid entries are a fatal
    /// startup error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::AssetsConfig(format!("failed to read {}: {}", path.display(), e))
        })?;

        let catalog: AssetCatalog = serde_json::from_str(&content).map_err(|e| {
            LedgerError::AssetsConfig(format!("failed to parse {}: {}", path.display(), e))
        })?;

        catalog.validate()?;

        info!(
            file = %path.display(),
            assets = catalog.assets.len(),
            "Loaded asset catalog"
        );
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(LedgerError::AssetsConfig(
                "asset catalog is empty".to_string(),
            ));
        }
        for entry in &self.assets {
            if entry.symbol.trim().is_empty() || entry.network.trim().is_empty() {
                return Err(LedgerError::AssetsConfig(format!(
                    "invalid asset entry: symbol={:?} network={:?}",
                    entry.symbol, entry.network
                )));
            }
        }
        Ok(())
    }

    /// The distinct symbols in the catalog, used to filter the address
    /// inventory when loading monitored wallets.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.assets.iter().map(|a| a.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_from(json: &str) -> Result<AssetCatalog> {
        let catalog: AssetCatalog = serde_json::from_str(json)
            .map_err(|e| LedgerError::AssetsConfig(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    #[test]
    fn accepts_valid_catalog() {
        let catalog = catalog_from(
            r#"{"assets": [
                {"symbol": "ETH", "network": "ethereum-mainnet"},
                {"symbol": "BTC", "network": "bitcoin-mainnet"},
                {"symbol": "ETH", "network": "base-mainnet"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(catalog.symbols(), vec!["BTC", "ETH"]);
    }

    #[test]
    fn rejects_blank_entries() {
        assert!(catalog_from(r#"{"assets": [{"symbol": "", "network": "x"}]}"#).is_err());
        assert!(catalog_from(r#"{"assets": [{"symbol": "BTC", "network": " "}]}"#).is_err());
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(catalog_from(r#"{"assets": []}"#).is_err());
    }
}
