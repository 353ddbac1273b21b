//! Mock Market Data
//!
//! For demos and tests. Static current prices plus a deterministic synthetic
//! daily history per asset, so repeated runs give identical allocations.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{CurrentPriceProvider, PriceHistoryProvider};
use crate::error::Result;
use crate::model::PricePoint;

/// Mock provider with static INR prices
#[derive(Clone, Debug, Default)]
pub struct MockMarketData;

impl MockMarketData {
    pub fn new() -> Self {
        Self
    }

    /// Current price for a known ticker
    fn base_price(&self, asset_id: &str) -> Option<Decimal> {
        match asset_id.to_uppercase().as_str() {
            "RELIANCE.NS" => Some(dec!(2950.40)),
            "TCS.NS" => Some(dec!(4102.75)),
            "HDFCBANK.NS" => Some(dec!(1648.10)),
            "INFY.NS" => Some(dec!(1856.30)),
            "ICICIBANK.NS" => Some(dec!(1251.95)),
            "HINDUNILVR.NS" => Some(dec!(2398.00)),
            "SBIN.NS" => Some(dec!(821.45)),
            "ITC.NS" => Some(dec!(468.70)),
            "BHARTIARTL.NS" => Some(dec!(1602.25)),
            "KOTAKBANK.NS" => Some(dec!(1779.60)),
            "BTC-INR" => Some(dec!(8215000)),
            "ETH-INR" => Some(dec!(291400)),
            "SOL-INR" => Some(dec!(16480)),
            "GC=F" => Some(dec!(276473)),
            "HDFC_FLEXI_CAP" => Some(dec!(100.0)),
            "PPFAS_FLEXI_CAP" => Some(dec!(102.0)),
            _ => None,
        }
    }

    /// (drift per day, oscillation amplitude, oscillation period in days, daily noise scale)
    fn profile(asset_id: &str) -> Option<(f64, f64, f64, f64)> {
        let p = match asset_id.to_uppercase().as_str() {
            "BTC-INR" => (0.0016, 0.12, 47.0, 0.030),
            "ETH-INR" => (0.0011, 0.15, 39.0, 0.036),
            "SOL-INR" => (0.0019, 0.22, 31.0, 0.048),
            "GC=F" => (0.0004, 0.03, 61.0, 0.008),
            id if id.ends_with(".NS") => {
                let h = fnv1a(id);
                let drift = 0.0002 + (h % 60) as f64 / 100_000.0;
                let amp = 0.03 + ((h >> 8) % 50) as f64 / 1000.0;
                let period = 25.0 + ((h >> 16) % 40) as f64;
                let noise = 0.010 + ((h >> 24) % 10) as f64 / 1000.0;
                (drift, amp, period, noise)
            }
            _ => return None,
        };
        Some(p)
    }
}

#[async_trait]
impl PriceHistoryProvider for MockMarketData {
    async fn get_price_history(
        &self,
        asset_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        // Funds have no listed history; the statistics builder synthesizes one
        let Some((drift, amp, period, noise)) = Self::profile(asset_id) else {
            return Ok(Vec::new());
        };
        let seed = fnv1a(asset_id);

        let mut points = Vec::new();
        let mut t = 0.0_f64;
        for date in start.iter_days().take_while(|d| *d <= end) {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let wobble = amp * (2.0 * std::f64::consts::PI * t / period).sin();
            let jitter = noise * pseudo_noise(seed, t as u64);
            let close = 100.0 * (drift * t + wobble + jitter).exp();
            points.push(PricePoint::new(date, close));
            t += 1.0;
        }
        Ok(points)
    }

    fn name(&self) -> &str {
        "MockMarketData"
    }
}

#[async_trait]
impl CurrentPriceProvider for MockMarketData {
    async fn get_current_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
        Ok(self.base_price(asset_id))
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Deterministic value in [-1, 1] for a (seed, step) pair
fn pseudo_noise(seed: u64, step: u64) -> f64 {
    let mut x = seed ^ step.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    (x % 20_001) as f64 / 10_000.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_current_prices() {
        let market = MockMarketData::new();
        assert_eq!(market.get_current_price("GC=F").await.unwrap(), Some(dec!(276473)));
        assert_eq!(market.get_current_price("NOTREAL").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_history_is_deterministic_weekdays() {
        let market = MockMarketData::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        let a = market.get_price_history("TCS.NS", start, end).await.unwrap();
        let b = market.get_price_history("TCS.NS", start, end).await.unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.iter().all(|p| p.close > 0.0));
        assert!(a.iter().all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[tokio::test]
    async fn test_mock_funds_have_no_history() {
        let market = MockMarketData::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let history = market.get_price_history("HDFC_FLEXI_CAP", start, end).await.unwrap();
        assert!(history.is_empty());
    }
}
