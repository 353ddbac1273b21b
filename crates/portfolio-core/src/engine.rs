//! Portfolio Engine
//!
//! One `compute_allocation` call runs the whole pipeline:
//!
//! ```text
//! fetch ─▶ statistics ─▶ risk factor ─▶ category optimizations (parallel)
//!                                              │
//!                 response ◀─ metrics ◀─ reconcile
//! ```
//!
//! The engine holds only immutable configuration and provider handles. All
//! per-run data lives in a [`RunContext`] created and dropped inside the call,
//! so one engine can serve concurrent requests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use futures::future::join_all;
use nalgebra::DVector;
use rayon::prelude::*;
use rust_decimal::Decimal;

use crate::config::{EngineConfig, InitialGuess};
use crate::error::{AllocationError, Result};
use crate::market::{CurrentPriceProvider, MockMarketData, PriceHistoryProvider};
use crate::metrics::portfolio_metrics;
use crate::model::{
    AllocationResponse, AssetCategory, CategorySummary, PortfolioAllocation, PriceSeries,
    RiskProfile, decimal_from_f64,
};
use crate::optimizer::{CategoryOptimization, CategoryProblem, SharpeOptimizer};
use crate::reconcile::{PlannedAsset, Reconciler};
use crate::risk::{RiskMapper, WeightBounds, profile_risk_factor};
use crate::selection::{momentum_initial_guess, select_top};
use crate::stats::{AssetStatistics, StatisticsBuilder};
use crate::universe::AssetUniverse;

/// Market data gathered for one run
struct RunContext {
    current_prices: HashMap<String, Decimal>,
    statistics: AssetStatistics,
    risk_factor: f64,
}

/// Stateless allocation service
#[derive(Clone)]
pub struct PortfolioEngine {
    history: Arc<dyn PriceHistoryProvider>,
    prices: Arc<dyn CurrentPriceProvider>,
    universe: AssetUniverse,
    mapper: RiskMapper,
    config: EngineConfig,
}

impl PortfolioEngine {
    pub fn new(
        history: Arc<dyn PriceHistoryProvider>,
        prices: Arc<dyn CurrentPriceProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            history,
            prices,
            universe: AssetUniverse::standard(),
            mapper: RiskMapper::default(),
            config,
        }
    }

    /// Engine over [`MockMarketData`] for demos and tests
    pub fn mock(config: EngineConfig) -> Self {
        let market = Arc::new(MockMarketData::new());
        Self::new(market.clone(), market, config)
    }

    pub fn with_universe(mut self, universe: AssetUniverse) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_mapper(mut self, mapper: RiskMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    /// Allocate `investment_amount` for `profile` using history up to today
    pub async fn compute_allocation(
        &self,
        investment_amount: Decimal,
        profile: &RiskProfile,
    ) -> AllocationResponse {
        self.compute_allocation_as_of(investment_amount, profile, Utc::now().date_naive())
            .await
    }

    /// Same as [`Self::compute_allocation`] with an explicit valuation date
    pub async fn compute_allocation_as_of(
        &self,
        investment_amount: Decimal,
        profile: &RiskProfile,
        as_of: NaiveDate,
    ) -> AllocationResponse {
        match self.allocate_as_of(investment_amount, profile, as_of).await {
            Ok(allocation) => AllocationResponse::success(allocation),
            Err(e) => {
                tracing::error!("Allocation failed: {}", e);
                AllocationResponse::failure(e.user_message())
            }
        }
    }

    /// Typed variant of [`Self::compute_allocation`]; returns only fatal errors
    pub async fn allocate(
        &self,
        investment_amount: Decimal,
        profile: &RiskProfile,
    ) -> Result<PortfolioAllocation> {
        self.allocate_as_of(investment_amount, profile, Utc::now().date_naive())
            .await
    }

    pub async fn allocate_as_of(
        &self,
        investment_amount: Decimal,
        profile: &RiskProfile,
        as_of: NaiveDate,
    ) -> Result<PortfolioAllocation> {
        if investment_amount <= Decimal::ZERO {
            return Err(AllocationError::InvalidInput(format!(
                "investment amount must be positive, got {}",
                investment_amount
            )));
        }
        self.config.validate()?;

        tracing::info!(
            "Computing allocation of {} across {} assets",
            investment_amount,
            self.universe.len()
        );

        let ctx = self.prepare(profile, as_of).await?;
        let optimizations = self.optimize_categories(&ctx).await?;

        let weights = category_weights_of(&self.mapper, &self.universe, ctx.risk_factor);
        let planned = self.plan(&ctx, &weights, &optimizations);

        let reconciled = Reconciler::new(investment_amount, self.config.over_allocation_tolerance)
            .reconcile(planned);
        let metrics = portfolio_metrics(
            &reconciled.allocations,
            investment_amount,
            self.config.risk_free_rate,
        );

        let categories = weights
            .iter()
            .map(|(category, target)| {
                let held = reconciled.allocations.iter().filter(|a| a.category == *category);
                CategorySummary {
                    category: *category,
                    target_weight: *target,
                    realized_weight: held.clone().map(|a| a.weight).sum(),
                    amount: held.map(|a| a.amount).sum(),
                    converged: optimizations
                        .iter()
                        .find(|o| o.category == *category)
                        .is_some_and(|o| o.converged),
                }
            })
            .collect();

        tracing::info!(
            "Allocated {} of {} (expected return {:.2}%, sharpe {:.2})",
            metrics.total_investment,
            investment_amount,
            metrics.expected_return * 100.0,
            metrics.sharpe_ratio
        );

        Ok(PortfolioAllocation {
            risk_factor: ctx.risk_factor,
            portfolio_metrics: metrics,
            categories,
            allocations: reconciled.allocations,
        })
    }

    /// Fetch market data under the wall-clock timeout and derive statistics
    async fn prepare(&self, profile: &RiskProfile, as_of: NaiveDate) -> Result<RunContext> {
        let start = as_of
            .checked_sub_days(Days::new(u64::from(self.config.lookback_days)))
            .unwrap_or(NaiveDate::MIN);

        let ids: Vec<&str> = self.universe.assets().iter().map(|a| a.id.as_str()).collect();
        let fetch = futures::future::join(
            join_all(ids.iter().map(|id| self.history.get_price_history(id, start, as_of))),
            self.prices.get_current_prices(&ids),
        );

        let timeout = Duration::from_secs(self.config.run_timeout_secs);
        let (histories, current_prices) = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| AllocationError::Timeout(self.config.run_timeout_secs))?;

        let histories: HashMap<String, PriceSeries> = ids
            .iter()
            .zip(histories)
            .filter_map(|(id, result)| match result {
                Ok(points) => Some(((*id).to_string(), PriceSeries::new(*id, points))),
                Err(e) => {
                    tracing::warn!(
                        "History lookup via {} failed for {}: {}",
                        self.history.name(),
                        id,
                        e
                    );
                    None
                }
            })
            .collect();

        let statistics = StatisticsBuilder::new(
            self.config.return_method,
            self.config.default_return,
            self.config.default_volatility,
        )
        .build(self.universe.assets(), &histories)?;

        let risk_factor = profile_risk_factor(profile);
        tracing::debug!("Resolved risk factor {:.2}", risk_factor);

        Ok(RunContext {
            current_prices,
            statistics,
            risk_factor,
        })
    }

    /// Build one problem per populated category and solve them in parallel
    /// on the blocking pool
    async fn optimize_categories(&self, ctx: &RunContext) -> Result<Vec<CategoryOptimization>> {
        let problems: Vec<CategoryProblem> = AssetCategory::ALL
            .iter()
            .filter_map(|category| self.category_problem(ctx, *category))
            .collect();

        let optimizer = SharpeOptimizer::new(self.config.risk_free_rate, self.config.solver.clone());
        tokio::task::spawn_blocking(move || {
            problems
                .par_iter()
                .filter_map(|problem| optimizer.optimize(problem))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AllocationError::Internal(format!("category solve failed: {}", e)))
    }

    fn category_problem(&self, ctx: &RunContext, category: AssetCategory) -> Option<CategoryProblem> {
        let stats = &ctx.statistics;
        let mut indices: Vec<usize> = self
            .universe
            .assets()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.category == category)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return None;
        }

        if let (AssetCategory::Equities, Some(keep)) = (category, self.config.max_equities) {
            indices = select_top(&indices, stats, self.config.risk_free_rate, keep);
            tracing::debug!("Selected {} equities by momentum and Sharpe rank", indices.len());
        }

        let assets = self.universe.assets();
        let mut bounds: Vec<WeightBounds> = indices
            .iter()
            .map(|&i| self.mapper.asset_bounds(&assets[i], ctx.risk_factor))
            .collect();
        if self.config.max_equities.is_some() && category == AssetCategory::Equities {
            widen_upper_bounds(&mut bounds);
        }

        let n = indices.len();
        let initial = match self.config.initial_guess {
            InitialGuess::Equal => DVector::from_element(n, 1.0 / n as f64),
            InitialGuess::Momentum => {
                let momentum: Vec<f64> = indices.iter().map(|&i| stats.momentum[i]).collect();
                momentum_initial_guess(&momentum)
            }
        };

        Some(CategoryProblem {
            category,
            asset_ids: indices.iter().map(|&i| assets[i].id.clone()).collect(),
            returns: stats.returns_for(&indices),
            covariance: stats.covariance_for(&indices),
            bounds,
            initial,
        })
    }

    /// Target weights and prices per asset, in universe order
    fn plan(
        &self,
        ctx: &RunContext,
        category_weights: &BTreeMap<AssetCategory, f64>,
        optimizations: &[CategoryOptimization],
    ) -> Vec<PlannedAsset> {
        let intra: HashMap<&str, f64> = optimizations
            .iter()
            .flat_map(|o| o.asset_ids.iter().map(String::as_str).zip(o.weights.iter().copied()))
            .collect();

        self.universe
            .assets()
            .iter()
            .filter_map(|asset| {
                let weight = intra.get(asset.id.as_str())?;
                let category_weight = category_weights.get(&asset.category).copied().unwrap_or(0.0);
                let index = ctx.statistics.index_of(&asset.id)?;
                Some(PlannedAsset {
                    asset: asset.clone(),
                    target_weight: category_weight * weight,
                    price: current_price(ctx, index, asset.reference_price),
                    expected_return: ctx.statistics.annual_returns[index],
                    volatility: ctx.statistics.annual_volatility[index],
                })
            })
            .collect()
    }
}

/// Category weights over the categories the universe actually holds
fn category_weights_of(
    mapper: &RiskMapper,
    universe: &AssetUniverse,
    risk_factor: f64,
) -> BTreeMap<AssetCategory, f64> {
    let present: Vec<AssetCategory> = AssetCategory::ALL
        .iter()
        .copied()
        .filter(|c| !universe.assets_in(*c).is_empty())
        .collect();
    mapper.category_weights(&present, risk_factor)
}

/// Provider price, then reference price, then last real close
fn current_price(ctx: &RunContext, index: usize, reference: Option<Decimal>) -> Option<Decimal> {
    ctx.current_prices
        .get(&ctx.statistics.asset_ids[index])
        .copied()
        .or(reference)
        .or_else(|| {
            ctx.statistics.last_close[index]
                .map(|close| decimal_from_f64(close).round_dp(4))
                .filter(|p| *p > Decimal::ZERO)
        })
}

/// A reduced equity set may not reach full investment under the static caps;
/// stretch the upper bounds proportionally until it can
fn widen_upper_bounds(bounds: &mut [WeightBounds]) {
    let upper_sum: f64 = bounds.iter().map(|b| b.upper).sum();
    if upper_sum >= 1.0 || upper_sum <= 0.0 {
        return;
    }
    for b in bounds.iter_mut() {
        b.upper = (b.upper / upper_sum).min(1.0);
    }
}
