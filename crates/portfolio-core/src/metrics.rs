//! Portfolio-level metrics from reconciled holdings.
//!
//! Expected return and volatility are realized-weight averages of the
//! per-asset statistics. Volatility is the linear sum `Σ wᵢσᵢ` with no
//! correlation term, so it bounds the true portfolio volatility from above.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::model::{AssetAllocation, PortfolioMetrics};

pub fn portfolio_metrics(
    allocations: &[AssetAllocation],
    investment_amount: Decimal,
    risk_free_rate: f64,
) -> PortfolioMetrics {
    let mut expected_return = 0.0;
    let mut volatility = 0.0;
    let mut total_investment = Decimal::ZERO;
    let mut total_current_value = Decimal::ZERO;

    for allocation in allocations {
        let weight = allocation.weight.to_f64().unwrap_or(0.0);
        expected_return += weight * allocation.expected_return;
        volatility += weight * allocation.volatility;
        total_investment += allocation.amount;
        total_current_value += allocation.current_value;
    }

    PortfolioMetrics {
        total_investment,
        total_current_value,
        expected_return,
        volatility,
        sharpe_ratio: sharpe_ratio(expected_return, volatility, risk_free_rate),
        remaining_amount: (investment_amount - total_investment).max(Decimal::ZERO),
    }
}

/// Excess return per unit of volatility; zero when volatility is zero
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free_rate: f64) -> f64 {
    if volatility > 0.0 {
        (expected_return - risk_free_rate) / volatility
    } else {
        0.0
    }
}
