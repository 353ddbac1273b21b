//! Risk Profile Mapper
//!
//! Converts a questionnaire risk score or named category into a single risk
//! factor in [0, 1], then derives target category weights and per-asset
//! weight bounds from that factor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AllocationError;
use crate::model::{Asset, AssetCategory, RiskCategory, RiskProfile};

/// Factor used when the profile cannot be resolved
pub const DEFAULT_RISK_FACTOR: f64 = 0.5;

const MAX_LOWER_BOUND: f64 = 0.9;
const MIN_BOUND_GAP: f64 = 0.01;

/// Resolve the canonical risk factor; the score wins over the category
pub fn risk_factor(score: Option<f64>, category: Option<&str>) -> f64 {
    if let Some(score) = score.filter(|s| s.is_finite()) {
        return (score / 10.0).clamp(0.0, 1.0);
    }

    match category {
        Some(name) => match name.parse::<RiskCategory>() {
            Ok(category) => category.risk_factor(),
            Err(e) => {
                tracing::warn!("{}; defaulting to moderate risk", e);
                DEFAULT_RISK_FACTOR
            }
        },
        None => {
            tracing::warn!(
                "{}; defaulting to moderate risk",
                AllocationError::InvalidProfile("neither score nor category present".into())
            );
            DEFAULT_RISK_FACTOR
        }
    }
}

/// Convenience wrapper over [`risk_factor`]
pub fn profile_risk_factor(profile: &RiskProfile) -> f64 {
    risk_factor(profile.risk_score, profile.risk_category.as_deref())
}

/// Category weight at risk factor 0 and at risk factor 1
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeightRange {
    pub at_min_risk: f64,
    pub at_max_risk: f64,
}

impl CategoryWeightRange {
    pub const fn new(at_min_risk: f64, at_max_risk: f64) -> Self {
        Self {
            at_min_risk,
            at_max_risk,
        }
    }

    /// Linear interpolation on the risk factor
    pub fn interpolate(&self, risk_factor: f64) -> f64 {
        let r = risk_factor.clamp(0.0, 1.0);
        self.at_min_risk + (self.at_max_risk - self.at_min_risk) * r
    }
}

/// One risk band: applies while the factor is at or below `max_risk`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub max_risk: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl RiskTier {
    pub const fn new(max_risk: f64, min_multiplier: f64, max_multiplier: f64) -> Self {
        Self {
            max_risk,
            min_multiplier,
            max_multiplier,
        }
    }
}

/// Risk-adjusted weight bounds of an asset within its category
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub lower: f64,
    pub upper: f64,
}

impl WeightBounds {
    pub fn contains(&self, weight: f64, tolerance: f64) -> bool {
        weight >= self.lower - tolerance && weight <= self.upper + tolerance
    }
}

/// Declarative tables driving category weights and asset bounds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskMapper {
    ranges: BTreeMap<AssetCategory, CategoryWeightRange>,
    tiers: BTreeMap<AssetCategory, Vec<RiskTier>>,
}

impl Default for RiskMapper {
    fn default() -> Self {
        use AssetCategory::*;

        let ranges = BTreeMap::from([
            (Equities, CategoryWeightRange::new(0.30, 0.55)),
            (Crypto, CategoryWeightRange::new(0.02, 0.20)),
            // Defensive categories shrink as appetite grows
            (Commodities, CategoryWeightRange::new(0.25, 0.10)),
            (Funds, CategoryWeightRange::new(0.43, 0.15)),
        ]);

        let tiers = BTreeMap::from([
            (
                Equities,
                vec![
                    RiskTier::new(0.3, 0.8, 0.9),
                    RiskTier::new(0.7, 1.0, 1.0),
                    RiskTier::new(1.0, 1.2, 1.3),
                ],
            ),
            (
                Crypto,
                vec![
                    RiskTier::new(0.3, 0.5, 0.6),
                    RiskTier::new(0.6, 1.0, 1.0),
                    RiskTier::new(0.8, 1.3, 1.4),
                    RiskTier::new(1.0, 1.6, 1.8),
                ],
            ),
            (
                Commodities,
                vec![
                    RiskTier::new(0.3, 1.3, 1.2),
                    RiskTier::new(0.7, 1.0, 1.0),
                    RiskTier::new(1.0, 0.8, 1.0),
                ],
            ),
            (
                Funds,
                vec![
                    RiskTier::new(0.3, 1.2, 1.3),
                    RiskTier::new(0.7, 1.0, 1.0),
                    RiskTier::new(1.0, 0.8, 0.8),
                ],
            ),
        ]);

        Self { ranges, tiers }
    }
}

impl RiskMapper {
    pub fn new(
        ranges: BTreeMap<AssetCategory, CategoryWeightRange>,
        mut tiers: BTreeMap<AssetCategory, Vec<RiskTier>>,
    ) -> Self {
        for bands in tiers.values_mut() {
            bands.sort_by(|a, b| a.max_risk.total_cmp(&b.max_risk));
        }
        Self { ranges, tiers }
    }

    /// Raw (unnormalized) target weight of one category
    pub fn category_weight(&self, category: AssetCategory, risk_factor: f64) -> f64 {
        self.ranges
            .get(&category)
            .map_or(0.0, |range| range.interpolate(risk_factor).max(0.0))
    }

    /// Target weights of the given categories, renormalized to sum to one
    pub fn category_weights(
        &self,
        categories: &[AssetCategory],
        risk_factor: f64,
    ) -> BTreeMap<AssetCategory, f64> {
        let raw: BTreeMap<AssetCategory, f64> = categories
            .iter()
            .map(|c| (*c, self.category_weight(*c, risk_factor)))
            .collect();

        let total: f64 = raw.values().sum();
        if total <= 0.0 {
            // No configured range for any present category: split evenly
            let even = if raw.is_empty() { 0.0 } else { 1.0 / raw.len() as f64 };
            return raw.into_keys().map(|c| (c, even)).collect();
        }

        raw.into_iter().map(|(c, w)| (c, w / total)).collect()
    }

    /// Band in force for the category at this risk factor
    pub fn tier(&self, category: AssetCategory, risk_factor: f64) -> Option<RiskTier> {
        let bands = self.tiers.get(&category)?;
        bands
            .iter()
            .find(|t| risk_factor <= t.max_risk)
            .or_else(|| bands.last())
            .copied()
    }

    /// Static bounds scaled by the category's risk band, then clamped to a feasible pair
    pub fn asset_bounds(&self, asset: &Asset, risk_factor: f64) -> WeightBounds {
        let (min_mult, max_mult) = self
            .tier(asset.category, risk_factor)
            .map_or((1.0, 1.0), |t| (t.min_multiplier, t.max_multiplier));

        let lower = (asset.min_weight * min_mult).clamp(0.0, MAX_LOWER_BOUND);
        let upper = (asset.max_weight * max_mult).clamp(lower + MIN_BOUND_GAP, 1.0);

        WeightBounds { lower, upper }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::AssetUniverse;

    #[test]
    fn test_score_takes_precedence() {
        assert!((risk_factor(Some(7.0), Some("conservative")) - 0.7).abs() < 1e-12);
        assert_eq!(risk_factor(Some(14.0), None), 1.0);
        assert_eq!(risk_factor(Some(-3.0), None), 0.0);
    }

    #[test]
    fn test_category_lookup_and_defaults() {
        assert!((risk_factor(None, Some("GROWTH")) - 0.7).abs() < 1e-12);
        assert!((risk_factor(None, Some("Balanced")) - 0.5).abs() < 1e-12);
        assert_eq!(risk_factor(None, Some("reckless")), DEFAULT_RISK_FACTOR);
        assert_eq!(risk_factor(None, None), DEFAULT_RISK_FACTOR);
        assert_eq!(risk_factor(Some(f64::NAN), Some("aggressive")), 0.9);
    }

    #[test]
    fn test_category_weights_sum_to_one() {
        let mapper = RiskMapper::default();
        for step in 0..=100 {
            let r = f64::from(step) / 100.0;
            let weights = mapper.category_weights(&AssetCategory::ALL, r);
            let total: f64 = weights.values().sum();
            assert!((total - 1.0).abs() < 1e-6, "r={} total={}", r, total);
            assert!(weights.values().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn test_defensive_categories_shrink_with_risk() {
        let mapper = RiskMapper::default();
        let low = mapper.category_weights(&AssetCategory::ALL, 0.2);
        let high = mapper.category_weights(&AssetCategory::ALL, 0.9);
        let defensive = |w: &BTreeMap<AssetCategory, f64>| {
            w[&AssetCategory::Funds] + w[&AssetCategory::Commodities]
        };
        assert!(defensive(&low) > defensive(&high));
        assert!(low[&AssetCategory::Crypto] < high[&AssetCategory::Crypto]);
    }

    #[test]
    fn test_missing_category_renormalizes() {
        let mapper = RiskMapper::default();
        let weights = mapper.category_weights(&[AssetCategory::Equities, AssetCategory::Funds], 0.5);
        assert_eq!(weights.len(), 2);
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tier_selection() {
        let mapper = RiskMapper::default();
        let crypto = |r| mapper.tier(AssetCategory::Crypto, r).unwrap();
        assert_eq!(crypto(0.0).min_multiplier, 0.5);
        assert_eq!(crypto(0.3).min_multiplier, 0.5);
        assert_eq!(crypto(0.31).min_multiplier, 1.0);
        assert_eq!(crypto(0.75).min_multiplier, 1.3);
        assert_eq!(crypto(1.0).min_multiplier, 1.6);
    }

    #[test]
    fn test_asset_bounds_always_feasible_pair() {
        let mapper = RiskMapper::default();
        let universe = AssetUniverse::standard();
        for step in 0..=20 {
            let r = f64::from(step) / 20.0;
            for asset in universe.assets() {
                let b = mapper.asset_bounds(asset, r);
                assert!(b.lower >= 0.0 && b.lower <= 0.9);
                assert!(b.upper >= b.lower + 0.01 - 1e-12 && b.upper <= 1.0);
            }
        }
    }

    #[test]
    fn test_bounds_clamped() {
        let mapper = RiskMapper::default();
        let heavy = Asset::new("X", "X", AssetCategory::Crypto, 0.95, 1.0);
        let b = mapper.asset_bounds(&heavy, 1.0);
        assert_eq!(b.lower, 0.9);
        assert_eq!(b.upper, 1.0);

        let pinned = Asset::new("Y", "Y", AssetCategory::Equities, 0.5, 0.5);
        let b = mapper.asset_bounds(&pinned, 0.5);
        assert!((b.upper - 0.51).abs() < 1e-12);
    }
}
