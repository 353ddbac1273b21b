//! Domain Models
//!
//! Core data types for risk-profiled portfolio allocation.
//! Money, prices and quantities use `rust_decimal`; return statistics stay in `f64`.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::AllocationError;

/// Fixed set of asset classes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Equities,
    Crypto,
    Commodities,
    Funds,
}

impl AssetCategory {
    /// Canonical processing and reporting order
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Equities,
        AssetCategory::Crypto,
        AssetCategory::Commodities,
        AssetCategory::Funds,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Equities => "equities",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Commodities => "commodities",
            AssetCategory::Funds => "funds",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference data for one investable asset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    /// Ticker (e.g., "TCS.NS", "BTC-INR")
    pub id: String,

    /// Display name
    pub name: String,

    pub category: AssetCategory,

    /// Minimum weight as a fraction of the category
    pub min_weight: f64,

    /// Maximum weight as a fraction of the category
    pub max_weight: f64,

    /// Fixed reference price (fund NAV)
    pub reference_price: Option<Decimal>,

    /// Assumed annual growth used when no history can be obtained
    pub assumed_growth: Option<f64>,
}

impl Asset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: AssetCategory,
        min_weight: f64,
        max_weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            min_weight,
            max_weight,
            reference_price: None,
            assumed_growth: None,
        }
    }

    pub fn with_reference_price(mut self, price: Decimal) -> Self {
        self.reference_price = Some(price);
        self
    }

    pub fn with_assumed_growth(mut self, growth: f64) -> Self {
        self.assumed_growth = Some(growth);
        self
    }
}

/// One daily close
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily closes for one asset, ascending by date
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    pub asset_id: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by date and dropping non-positive or non-finite closes
    pub fn new(asset_id: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            asset_id: asset_id.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }
}

/// Named risk appetite buckets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Conservative,
    Moderate,
    Balanced,
    Growth,
    Aggressive,
}

impl RiskCategory {
    /// Canonical risk factor for the bucket
    pub fn risk_factor(self) -> f64 {
        match self {
            RiskCategory::Conservative => 0.2,
            RiskCategory::Moderate | RiskCategory::Balanced => 0.5,
            RiskCategory::Growth => 0.7,
            RiskCategory::Aggressive => 0.9,
        }
    }
}

impl FromStr for RiskCategory {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskCategory::Conservative),
            "moderate" => Ok(RiskCategory::Moderate),
            "balanced" => Ok(RiskCategory::Balanced),
            "growth" => Ok(RiskCategory::Growth),
            "aggressive" => Ok(RiskCategory::Aggressive),
            other => Err(AllocationError::InvalidProfile(format!(
                "unknown risk category '{}'",
                other
            ))),
        }
    }
}

/// Risk profile supplied from questionnaire results
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Score from 0 (very conservative) to 10 (aggressive)
    #[serde(default)]
    pub risk_score: Option<f64>,

    /// Named category; used only when no score is present
    #[serde(default)]
    pub risk_category: Option<String>,
}

impl RiskProfile {
    pub fn from_score(score: f64) -> Self {
        Self {
            risk_score: Some(score),
            risk_category: None,
        }
    }

    pub fn from_category(category: impl Into<String>) -> Self {
        Self {
            risk_score: None,
            risk_category: Some(category.into()),
        }
    }
}

/// Realized allocation for one asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub asset_id: String,
    pub name: String,
    pub category: AssetCategory,

    /// Fraction of the total investment actually committed
    pub weight: Decimal,

    /// Initial investment in currency
    pub amount: Decimal,

    /// Reported holding value; equals `amount` for commodities (valued at cost)
    pub current_value: Decimal,

    /// Units held
    pub quantity: Decimal,

    /// Price used for the conversion, if any was obtainable
    pub current_price: Option<Decimal>,

    /// Annualized expected return
    pub expected_return: f64,

    /// Annualized volatility
    pub volatility: f64,
}

/// Whole-portfolio figures derived from the allocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_investment: Decimal,
    pub total_current_value: Decimal,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,

    /// Investment left uncommitted after reconciliation
    pub remaining_amount: Decimal,
}

/// Per-category outcome of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: AssetCategory,

    /// Weight from the risk mapper
    pub target_weight: f64,

    /// Weight after reconciliation
    pub realized_weight: Decimal,

    pub amount: Decimal,

    /// Whether the solver converged (false means the fallback was used)
    pub converged: bool,
}

/// Complete output of one allocation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAllocation {
    pub risk_factor: f64,
    pub portfolio_metrics: PortfolioMetrics,
    pub categories: Vec<CategorySummary>,
    pub allocations: Vec<AssetAllocation>,
}

/// Structured result handed across the core's boundary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PortfolioAllocation>,
}

impl AllocationResponse {
    pub fn success(data: PortfolioAllocation) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Convert an `f64` statistic into a `Decimal`, mapping non-finite values to zero
pub(crate) fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_risk_category_parse_case_insensitive() {
        assert_eq!("Aggressive".parse::<RiskCategory>().unwrap(), RiskCategory::Aggressive);
        assert_eq!(" growth ".parse::<RiskCategory>().unwrap(), RiskCategory::Growth);
        assert!("yolo".parse::<RiskCategory>().is_err());
    }

    #[test]
    fn test_price_series_sorted_and_cleaned() {
        let series = PriceSeries::new(
            "TCS.NS",
            vec![
                PricePoint::new(day(3), 102.0),
                PricePoint::new(day(1), 100.0),
                PricePoint::new(day(2), f64::NAN),
                PricePoint::new(day(4), -1.0),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].date, day(1));
        assert_eq!(series.last_close(), Some(102.0));
    }

    #[test]
    fn test_response_constructors() {
        let failed = AllocationResponse::failure("no data");
        assert!(!failed.success);
        assert!(failed.data.is_none());

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal_from_f64(0.5), dec!(0.5));
        assert_eq!(decimal_from_f64(f64::NAN), Decimal::ZERO);
    }
}
