//! Market Data
//!
//! Provider abstractions for historical closes and current prices.
//! Live retrieval lives outside this crate; implement these traits to plug it in.

mod mock;
mod memory;

pub use memory::StaticMarketData;
pub use mock::MockMarketData;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::PricePoint;

/// Source of daily closing prices
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Closes between `start` and `end` inclusive; an empty vector means no data
    async fn get_price_history(
        &self,
        asset_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Source of current prices
#[async_trait]
pub trait CurrentPriceProvider: Send + Sync {
    /// Latest price, or `None` when the provider has nothing for this asset
    async fn get_current_price(&self, asset_id: &str) -> Result<Option<Decimal>>;

    /// Prices for several assets; failures and misses are left out
    async fn get_current_prices(&self, asset_ids: &[&str]) -> HashMap<String, Decimal> {
        let mut prices = HashMap::new();
        for id in asset_ids {
            match self.get_current_price(id).await {
                Ok(Some(price)) if price > Decimal::ZERO => {
                    prices.insert((*id).to_string(), price);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Current price lookup failed for {}: {}", id, e),
            }
        }
        prices
    }
}
