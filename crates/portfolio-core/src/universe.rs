//! Asset Universe
//!
//! Immutable reference data: which assets exist, their category and their
//! static weight bounds within the category.

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};
use crate::model::{Asset, AssetCategory};

/// The set of investable assets, in reporting order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetUniverse {
    assets: Vec<Asset>,
}

impl Default for AssetUniverse {
    fn default() -> Self {
        Self::standard()
    }
}

impl AssetUniverse {
    /// Build a universe, rejecting duplicate ids and inverted bounds
    pub fn new(assets: Vec<Asset>) -> Result<Self> {
        for (i, asset) in assets.iter().enumerate() {
            if assets[..i].iter().any(|a| a.id == asset.id) {
                return Err(AllocationError::Config(format!("duplicate asset {}", asset.id)));
            }
            if !(0.0..=1.0).contains(&asset.min_weight)
                || !(0.0..=1.0).contains(&asset.max_weight)
                || asset.min_weight > asset.max_weight
            {
                return Err(AllocationError::Config(format!(
                    "invalid bounds for {}: [{}, {}]",
                    asset.id, asset.min_weight, asset.max_weight
                )));
            }
        }
        Ok(Self { assets })
    }

    /// Large-cap NSE equities, major crypto in INR, gold and two flexi cap funds
    pub fn standard() -> Self {
        let equities = [
            ("RELIANCE.NS", "Reliance Industries"),
            ("TCS.NS", "Tata Consultancy Services"),
            ("HDFCBANK.NS", "HDFC Bank"),
            ("INFY.NS", "Infosys"),
            ("ICICIBANK.NS", "ICICI Bank"),
            ("HINDUNILVR.NS", "Hindustan Unilever"),
            ("SBIN.NS", "State Bank of India"),
            ("ITC.NS", "ITC"),
            ("BHARTIARTL.NS", "Bharti Airtel"),
            ("KOTAKBANK.NS", "Kotak Mahindra Bank"),
        ];

        let mut assets: Vec<Asset> = equities
            .iter()
            .map(|(id, name)| Asset::new(*id, *name, AssetCategory::Equities, 0.05, 0.20))
            .collect();

        assets.push(Asset::new("BTC-INR", "Bitcoin", AssetCategory::Crypto, 0.30, 0.70));
        assets.push(Asset::new("ETH-INR", "Ethereum", AssetCategory::Crypto, 0.20, 0.60));
        assets.push(Asset::new("SOL-INR", "Solana", AssetCategory::Crypto, 0.10, 0.40));

        assets.push(Asset::new("GC=F", "Gold", AssetCategory::Commodities, 0.50, 1.0));

        assets.push(
            Asset::new("PPFAS_FLEXI_CAP", "Parag Parikh Flexi Cap", AssetCategory::Funds, 0.30, 0.70)
                .with_reference_price(dec!(50.27))
                .with_assumed_growth(0.15),
        );
        assets.push(
            Asset::new("HDFC_FLEXI_CAP", "HDFC Flexi Cap", AssetCategory::Funds, 0.30, 0.70)
                .with_reference_price(dec!(45.89))
                .with_assumed_growth(0.12),
        );

        Self { assets }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Assets of one category, in universe order
    pub fn assets_in(&self, category: AssetCategory) -> Vec<&Asset> {
        self.assets.iter().filter(|a| a.category == category).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_universe_shape() {
        let universe = AssetUniverse::standard();
        assert_eq!(universe.assets_in(AssetCategory::Equities).len(), 10);
        assert_eq!(universe.assets_in(AssetCategory::Crypto).len(), 3);
        assert_eq!(universe.assets_in(AssetCategory::Commodities).len(), 1);
        assert_eq!(universe.assets_in(AssetCategory::Funds).len(), 2);
        assert!(universe.get("GC=F").is_some());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_bounds() {
        let dup = vec![
            Asset::new("X", "X", AssetCategory::Equities, 0.1, 0.5),
            Asset::new("X", "X", AssetCategory::Equities, 0.1, 0.5),
        ];
        assert!(AssetUniverse::new(dup).is_err());

        let inverted = vec![Asset::new("Y", "Y", AssetCategory::Crypto, 0.6, 0.2)];
        assert!(AssetUniverse::new(inverted).is_err());
    }
}
