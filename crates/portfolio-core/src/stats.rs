//! Price/Return Statistics
//!
//! Aligns raw closes onto a common trading calendar and derives annualized
//! return, volatility, covariance and momentum for every asset in the universe.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

use crate::config::{ReturnMethod, TRADING_DAYS};
use crate::error::{AllocationError, Result};
use crate::model::{Asset, PriceSeries};

/// Lookbacks (in rows) and weights of the momentum score
const MOMENTUM_SHORT: usize = 63;
const MOMENTUM_LONG: usize = 126;
const MOMENTUM_SHORT_WEIGHT: f64 = 0.7;
const MOMENTUM_LONG_WEIGHT: f64 = 0.3;

/// Annualized statistics for one run, indexed in universe order
#[derive(Clone, Debug)]
pub struct AssetStatistics {
    pub asset_ids: Vec<String>,
    pub annual_returns: DVector<f64>,
    pub annual_volatility: DVector<f64>,
    pub covariance: DMatrix<f64>,
    /// Blend of 3- and 6-month price momentum
    pub momentum: DVector<f64>,
    /// Last observed close; `None` for assets priced only by a synthetic series
    pub last_close: Vec<Option<f64>>,
    /// False where defaults were substituted
    pub has_data: Vec<bool>,
}

impl AssetStatistics {
    pub fn index_of(&self, asset_id: &str) -> Option<usize> {
        self.asset_ids.iter().position(|id| id == asset_id)
    }

    /// Returns vector restricted to the given positions
    pub fn returns_for(&self, indices: &[usize]) -> DVector<f64> {
        DVector::from_fn(indices.len(), |a, _| self.annual_returns[indices[a]])
    }

    /// Covariance submatrix restricted to the given positions
    pub fn covariance_for(&self, indices: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(indices.len(), indices.len(), |a, b| {
            self.covariance[(indices[a], indices[b])]
        })
    }

    /// Correlation matrix derived from the covariance
    pub fn correlation(&self) -> DMatrix<f64> {
        let n = self.covariance.nrows();
        DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                return 1.0;
            }
            let denom = (self.covariance[(i, i)] * self.covariance[(j, j)]).sqrt();
            if denom > 0.0 && denom.is_finite() {
                self.covariance[(i, j)] / denom
            } else {
                0.0
            }
        })
    }

    /// Per-asset Sharpe ratio against the given risk-free rate
    pub fn sharpe(&self, index: usize, risk_free_rate: f64) -> f64 {
        let vol = self.annual_volatility[index];
        if vol > 0.0 {
            (self.annual_returns[index] - risk_free_rate) / vol
        } else {
            0.0
        }
    }
}

/// Turns raw histories into [`AssetStatistics`]
#[derive(Clone, Debug)]
pub struct StatisticsBuilder {
    method: ReturnMethod,
    default_return: f64,
    default_volatility: f64,
}

impl StatisticsBuilder {
    pub fn new(method: ReturnMethod, default_return: f64, default_volatility: f64) -> Self {
        Self {
            method,
            default_return,
            default_volatility,
        }
    }

    /// Fails with `DataUnavailable` only when no asset has a usable history
    pub fn build(
        &self,
        assets: &[Asset],
        histories: &HashMap<String, PriceSeries>,
    ) -> Result<AssetStatistics> {
        let calendar = trading_calendar(histories);
        if calendar.len() < 2 {
            return Err(AllocationError::DataUnavailable);
        }

        let aligned: Vec<Option<Vec<f64>>> = assets
            .iter()
            .map(|asset| match histories.get(&asset.id).filter(|s| !s.is_empty()) {
                Some(series) => Some(align(series, &calendar)),
                None => asset
                    .assumed_growth
                    .map(|growth| synthetic_series(growth, calendar.len())),
            })
            .collect();

        let daily: Vec<Option<Vec<f64>>> = aligned
            .iter()
            .map(|prices| prices.as_deref().map(daily_returns))
            .collect();

        let n = assets.len();
        let mut returns = DVector::zeros(n);
        let mut volatility = DVector::zeros(n);
        let mut momentum = DVector::zeros(n);
        let mut has_data = vec![false; n];

        for (i, asset) in assets.iter().enumerate() {
            match (&aligned[i], &daily[i]) {
                (Some(prices), Some(r)) => {
                    returns[i] = self.annualized_return(prices, r);
                    volatility[i] = annualized_volatility(r);
                    momentum[i] = momentum_score(prices);
                    has_data[i] = true;
                }
                _ => {
                    tracing::warn!(
                        "{}; using default return {:.0}% and volatility {:.0}%",
                        AllocationError::PriceUnavailable(asset.id.clone()),
                        self.default_return * 100.0,
                        self.default_volatility * 100.0
                    );
                    returns[i] = self.default_return;
                    volatility[i] = self.default_volatility;
                }
            }
        }

        let covariance = DMatrix::from_fn(n, n, |i, j| match (&daily[i], &daily[j]) {
            (Some(a), Some(b)) if a.len() > 1 => {
                let cov = a.iter().covariance(b.iter()) * TRADING_DAYS;
                if cov.is_finite() { cov } else { 0.0 }
            }
            _ if i == j => volatility[i] * volatility[i],
            _ => 0.0,
        });

        tracing::debug!(
            "Built statistics for {} assets over {} aligned days ({} with history)",
            n,
            calendar.len(),
            has_data.iter().filter(|d| **d).count()
        );

        Ok(AssetStatistics {
            asset_ids: assets.iter().map(|a| a.id.clone()).collect(),
            annual_returns: returns,
            annual_volatility: volatility,
            covariance,
            momentum,
            last_close: assets
                .iter()
                .map(|a| histories.get(&a.id).and_then(PriceSeries::last_close))
                .collect(),
            has_data,
        })
    }

    fn annualized_return(&self, prices: &[f64], daily: &[f64]) -> f64 {
        let value = match self.method {
            ReturnMethod::MeanDaily => daily.mean() * TRADING_DAYS,
            ReturnMethod::Compounded => {
                let first = prices[0];
                let last = prices[prices.len() - 1];
                (last / first).powf(TRADING_DAYS / prices.len() as f64) - 1.0
            }
        };
        if value.is_finite() { value } else { self.default_return }
    }
}

/// Sorted union of all dates present in any non-empty series
fn trading_calendar(histories: &HashMap<String, PriceSeries>) -> Vec<NaiveDate> {
    histories
        .values()
        .flat_map(|s| s.points.iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Project a series onto the calendar, filling forward then backward
fn align(series: &PriceSeries, calendar: &[NaiveDate]) -> Vec<f64> {
    let by_date: HashMap<NaiveDate, f64> = series.points.iter().map(|p| (p.date, p.close)).collect();

    let mut filled = Vec::with_capacity(calendar.len());
    let mut last = None;
    for date in calendar {
        if let Some(close) = by_date.get(date) {
            last = Some(*close);
        }
        filled.push(last);
    }

    let first_known = filled.iter().flatten().next().copied().unwrap_or(0.0);
    filled.into_iter().map(|v| v.unwrap_or(first_known)).collect()
}

/// Nominal price curve compounding `annual_growth` per trading day
fn synthetic_series(annual_growth: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 * (1.0 + annual_growth).powf(i as f64 / TRADING_DAYS))
        .collect()
}

fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

fn annualized_volatility(daily: &[f64]) -> f64 {
    if daily.len() < 2 {
        return 0.0;
    }
    let vol = daily.std_dev() * TRADING_DAYS.sqrt();
    if vol.is_finite() { vol } else { 0.0 }
}

fn momentum_score(prices: &[f64]) -> f64 {
    let last = prices[prices.len() - 1];
    let change = |lookback: usize| {
        let base = prices[prices.len().saturating_sub(lookback)];
        last / base - 1.0
    };
    MOMENTUM_SHORT_WEIGHT * change(MOMENTUM_SHORT) + MOMENTUM_LONG_WEIGHT * change(MOMENTUM_LONG)
}
