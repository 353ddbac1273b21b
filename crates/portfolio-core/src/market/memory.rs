//! In-memory market data, filled explicitly by the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{CurrentPriceProvider, PriceHistoryProvider};
use crate::error::{AllocationError, Result};
use crate::model::PricePoint;

#[derive(Clone, Debug, Default)]
pub struct StaticMarketData {
    histories: HashMap<String, Vec<PricePoint>>,
    prices: HashMap<String, Decimal>,
    failing: Vec<String>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, asset_id: impl Into<String>, points: Vec<PricePoint>) -> Self {
        self.histories.insert(asset_id.into(), points);
        self
    }

    pub fn with_price(mut self, asset_id: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(asset_id.into(), price);
        self
    }

    /// Make every lookup for this asset return a provider error
    pub fn with_failure(mut self, asset_id: impl Into<String>) -> Self {
        self.failing.push(asset_id.into());
        self
    }

    fn check(&self, asset_id: &str) -> Result<()> {
        if self.failing.iter().any(|f| f == asset_id) {
            return Err(AllocationError::Provider(format!("lookup failed for {}", asset_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceHistoryProvider for StaticMarketData {
    async fn get_price_history(
        &self,
        asset_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        self.check(asset_id)?;
        Ok(self
            .histories
            .get(asset_id)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start && p.date <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "StaticMarketData"
    }
}

#[async_trait]
impl CurrentPriceProvider for StaticMarketData {
    async fn get_current_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
        self.check(asset_id)?;
        Ok(self.prices.get(asset_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_history_filtered_by_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let market = StaticMarketData::new().with_history(
            "X",
            vec![PricePoint::new(d(1), 10.0), PricePoint::new(d(2), 11.0), PricePoint::new(d(3), 12.0)],
        );
        let history = market.get_price_history("X", d(2), d(3)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(market.get_price_history("Y", d(1), d(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_prices_skip_failures() {
        let market = StaticMarketData::new()
            .with_price("A", dec!(10))
            .with_price("B", dec!(0))
            .with_failure("C");
        let prices = market.get_current_prices(&["A", "B", "C", "D"]).await;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["A"], dec!(10));
    }
}
