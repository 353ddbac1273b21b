//! Allocation Reconciler
//!
//! Turns target weights into purchasable quantities and currency amounts:
//!
//! | Category    | Quantity                  | Amount          | Current value   |
//! |-------------|---------------------------|-----------------|-----------------|
//! | Equities    | floor(amount / price)     | quantity × price| quantity × price|
//! | Funds       | round(amount / price, 4)  | quantity × price| quantity × price|
//! | Commodities | round(amount / price, 4)  | allocated       | allocated (cost)|
//! | Crypto      | amount / price            | allocated       | quantity × price|
//!
//! Equity lot leftovers pool up and go to the first fund; a final safety pass
//! rescales everything if the total overshoots the investment amount.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::AllocationError;
use crate::model::{Asset, AssetAllocation, AssetCategory, decimal_from_f64};

/// Decimal places kept for fund and commodity quantities
pub const UNIT_DECIMALS: u32 = 4;

/// Decimal places kept for currency amounts before quantization
pub const MONEY_DECIMALS: u32 = 2;

/// One asset's planned share of the investment
#[derive(Clone, Debug)]
pub struct PlannedAsset {
    pub asset: Asset,
    /// category weight × weight within the category
    pub target_weight: f64,
    pub price: Option<Decimal>,
    pub expected_return: f64,
    pub volatility: f64,
}

/// Result of reconciliation
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub allocations: Vec<AssetAllocation>,
    /// Investment left uncommitted
    pub remaining: Decimal,
    /// Whether the over-allocation rescale fired
    pub rescaled: bool,
}

/// Converts weights into amounts and quantities for one investment
#[derive(Clone, Debug)]
pub struct Reconciler {
    investment_amount: Decimal,
    tolerance: Decimal,
}

impl Reconciler {
    pub fn new(investment_amount: Decimal, tolerance: Decimal) -> Self {
        Self {
            investment_amount,
            tolerance,
        }
    }

    pub fn reconcile(&self, planned: Vec<PlannedAsset>) -> Reconciliation {
        let mut pool = Decimal::ZERO;
        let mut allocations = Vec::with_capacity(planned.len());

        for plan in planned {
            let target = (self.investment_amount * decimal_from_f64(plan.target_weight.max(0.0)))
                .round_dp(MONEY_DECIMALS);

            let (quantity, amount, current_value) = match plan.price {
                Some(price) if price > Decimal::ZERO => {
                    quantize(plan.asset.category, target, price)
                }
                _ => {
                    if target > Decimal::ZERO {
                        tracing::warn!(
                            "{}; {} returned to the remainder pool",
                            AllocationError::PriceUnavailable(plan.asset.id.clone()),
                            target
                        );
                    }
                    (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
                }
            };

            pool += target - amount;
            allocations.push(AssetAllocation {
                asset_id: plan.asset.id,
                name: plan.asset.name,
                category: plan.asset.category,
                weight: Decimal::ZERO,
                amount,
                current_value,
                quantity,
                current_price: plan.price,
                expected_return: plan.expected_return,
                volatility: plan.volatility,
            });
        }

        self.absorb_remainder(&mut allocations, pool);
        self.refresh_weights(&mut allocations);
        let rescaled = self.rescale(&mut allocations);

        Reconciliation {
            remaining: self.remaining(&allocations),
            allocations,
            rescaled,
        }
    }

    /// Scale every holding by `investment / total` when the total overshoots
    /// the investment beyond tolerance. Returns whether anything changed;
    /// a second call right after a rescale is a no-op.
    pub fn rescale(&self, allocations: &mut [AssetAllocation]) -> bool {
        let total: Decimal = allocations.iter().map(|a| a.amount).sum();
        let ceiling = self.investment_amount * (Decimal::ONE + self.tolerance);
        if total <= ceiling || total <= Decimal::ZERO {
            return false;
        }

        tracing::warn!(
            "{}; rescaling all holdings",
            AllocationError::OverAllocation {
                allocated: total,
                requested: self.investment_amount,
            }
        );

        let factor = self.investment_amount / total;
        for allocation in allocations.iter_mut() {
            let Some(price) = allocation.current_price.filter(|p| *p > Decimal::ZERO) else {
                continue;
            };
            let scaled = (allocation.amount * factor).round_dp(MONEY_DECIMALS);
            let (quantity, amount, current_value) = quantize(allocation.category, scaled, price);
            allocation.quantity = quantity;
            allocation.amount = amount;
            allocation.current_value = current_value;
        }
        self.refresh_weights(allocations);
        true
    }

    /// Hand the pooled leftovers to the first priced fund, if any
    fn absorb_remainder(&self, allocations: &mut [AssetAllocation], pool: Decimal) {
        if pool <= Decimal::ZERO {
            return;
        }

        let fund = allocations.iter_mut().find(|a| {
            a.category == AssetCategory::Funds
                && a.current_price.is_some_and(|p| p > Decimal::ZERO)
        });

        match fund {
            Some(fund) => {
                let price = fund.current_price.unwrap_or(Decimal::ONE);
                let (quantity, amount, current_value) =
                    quantize(AssetCategory::Funds, fund.amount + pool, price);
                tracing::debug!("Redirected remainder {} into {}", pool, fund.asset_id);
                fund.quantity = quantity;
                fund.amount = amount;
                fund.current_value = current_value;
            }
            None => tracing::info!("No fund to absorb remainder {}; left unallocated", pool),
        }
    }

    fn refresh_weights(&self, allocations: &mut [AssetAllocation]) {
        if self.investment_amount <= Decimal::ZERO {
            return;
        }
        for allocation in allocations.iter_mut() {
            allocation.weight = allocation.amount / self.investment_amount;
        }
    }

    fn remaining(&self, allocations: &[AssetAllocation]) -> Decimal {
        let total: Decimal = allocations.iter().map(|a| a.amount).sum();
        (self.investment_amount - total).max(Decimal::ZERO)
    }
}

/// Apply the asset-class rule: returns (quantity, amount, current value)
pub fn quantize(category: AssetCategory, amount: Decimal, price: Decimal) -> (Decimal, Decimal, Decimal) {
    let units = amount / price;
    match category {
        AssetCategory::Equities => {
            let quantity = units.floor();
            let actual = quantity * price;
            (quantity, actual, actual)
        }
        AssetCategory::Funds => {
            let quantity = round_units(units);
            let actual = quantity * price;
            (quantity, actual, actual)
        }
        // Marked at cost, not to market
        AssetCategory::Commodities => (round_units(units), amount, amount),
        AssetCategory::Crypto => (units, amount, units * price),
    }
}

fn round_units(units: Decimal) -> Decimal {
    units.round_dp_with_strategy(UNIT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn plan(id: &str, category: AssetCategory, weight: f64, price: Option<Decimal>) -> PlannedAsset {
        PlannedAsset {
            asset: Asset::new(id, id, category, 0.0, 1.0),
            target_weight: weight,
            price,
            expected_return: 0.12,
            volatility: 0.2,
        }
    }

    fn reconciler(amount: Decimal) -> Reconciler {
        Reconciler::new(amount, dec!(0.001))
    }

    #[test]
    fn test_single_equity_whole_lots() {
        let result = reconciler(dec!(50000))
            .reconcile(vec![plan("TCS.NS", AssetCategory::Equities, 1.0, Some(dec!(2500)))]);
        let a = &result.allocations[0];
        assert_eq!(a.quantity, dec!(20));
        assert_eq!(a.amount, dec!(50000));
        assert_eq!(result.remaining, Decimal::ZERO);
        assert_eq!(a.weight, Decimal::ONE);
    }

    #[test]
    fn test_commodity_valued_at_cost() {
        let (quantity, amount, current) =
            quantize(AssetCategory::Commodities, dec!(29510), dec!(276473));
        assert_eq!(quantity, dec!(0.1067));
        assert_eq!(amount, dec!(29510));
        assert_eq!(current, dec!(29510));
        assert_ne!(current, quantity * dec!(276473));
    }

    #[test]
    fn test_fund_units_four_decimals() {
        let (quantity, amount, _) = quantize(AssetCategory::Funds, dec!(10000), dec!(45.89));
        assert_eq!(quantity, dec!(217.9124));
        assert!(quantity.scale() <= 4);
        assert_eq!(amount, quantity * dec!(45.89));
    }

    #[test]
    fn test_crypto_keeps_full_quotient() {
        let (quantity, amount, current) = quantize(AssetCategory::Crypto, dec!(5000), dec!(8215000));
        assert_eq!(amount, dec!(5000));
        assert!(quantity.scale() > 4);
        assert!((current - dec!(5000)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_equity_leftover_flows_into_first_fund() {
        let result = reconciler(dec!(100000)).reconcile(vec![
            plan("A.NS", AssetCategory::Equities, 0.5, Some(dec!(3000))),
            plan("F1", AssetCategory::Funds, 0.25, Some(dec!(50))),
            plan("F2", AssetCategory::Funds, 0.25, Some(dec!(40))),
        ]);
        let equity = &result.allocations[0];
        assert_eq!(equity.quantity, dec!(16));
        assert_eq!(equity.amount, dec!(48000));

        let first_fund = &result.allocations[1];
        assert_eq!(first_fund.amount, dec!(27000));
        assert_eq!(first_fund.quantity, dec!(540));
        assert_eq!(result.allocations[2].amount, dec!(25000));

        let total: Decimal = result.allocations.iter().map(|a| a.amount).sum();
        assert_eq!(total, dec!(100000));
        let weights: Decimal = result.allocations.iter().map(|a| a.weight).sum();
        assert_eq!(weights, Decimal::ONE);
        assert!(!result.rescaled);
    }

    #[test]
    fn test_leftover_reported_without_fund() {
        let result = reconciler(dec!(50000)).reconcile(vec![
            plan("A.NS", AssetCategory::Equities, 0.6, Some(dec!(7000))),
            plan("GC=F", AssetCategory::Commodities, 0.4, Some(dec!(276473))),
        ]);
        // 30000 buys 4 lots at 7000
        assert_eq!(result.allocations[0].amount, dec!(28000));
        assert_eq!(result.remaining, dec!(2000));
    }

    #[test]
    fn test_unpriced_asset_goes_to_pool() {
        let result = reconciler(dec!(60000)).reconcile(vec![
            plan("X", AssetCategory::Crypto, 0.5, None),
            plan("F", AssetCategory::Funds, 0.5, Some(dec!(100))),
        ]);
        assert_eq!(result.allocations[0].quantity, Decimal::ZERO);
        assert_eq!(result.allocations[1].amount, dec!(60000));
        assert_eq!(result.allocations[1].quantity, dec!(600));
    }

    #[test]
    fn test_rescale_is_idempotent() {
        let r = reconciler(dec!(100000));
        let mut allocations = r
            .reconcile(vec![
                plan("A.NS", AssetCategory::Equities, 0.4, Some(dec!(1000))),
                plan("GC=F", AssetCategory::Commodities, 0.3, Some(dec!(276473))),
                plan("F", AssetCategory::Funds, 0.3, Some(dec!(50))),
            ])
            .allocations;

        // Inflate every holding to force an overshoot
        for a in allocations.iter_mut() {
            let (q, amount, value) = quantize(a.category, a.amount * dec!(1.2), a.current_price.unwrap());
            a.quantity = q;
            a.amount = amount;
            a.current_value = value;
        }

        assert!(r.rescale(&mut allocations));
        let once = allocations.clone();
        let total: Decimal = once.iter().map(|a| a.amount).sum();
        assert!(total <= dec!(100000) * dec!(1.001));
        for a in &once {
            if a.category == AssetCategory::Equities {
                assert_eq!(a.quantity, a.quantity.floor());
            }
        }

        assert!(!r.rescale(&mut allocations));
        assert_eq!(allocations, once);
    }
}
