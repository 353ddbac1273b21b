//! Engine Configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};

/// Trading days per year used for annualization
pub const TRADING_DAYS: f64 = 252.0;

/// How per-asset annual returns are derived from daily closes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMethod {
    /// Mean daily return x 252
    #[default]
    MeanDaily,
    /// Total-period return rescaled to a 252-day year
    Compounded,
}

/// Starting point handed to the category solver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialGuess {
    #[default]
    Equal,
    /// Momentum ranks normalized to sum to one
    Momentum,
}

/// Iteration budget for the constrained Sharpe solver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Convergence threshold on the size of a projected step
    pub tolerance: f64,
    /// Initial gradient step; halved on every rejected step
    pub step_size: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
            step_size: 0.05,
        }
    }
}

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Annual risk-free rate for Sharpe ratios
    pub risk_free_rate: f64,

    /// Calendar days of history requested from the provider
    pub lookback_days: u32,

    /// Allowed relative over-allocation before a rescale kicks in
    pub over_allocation_tolerance: Decimal,

    /// Return substituted for an asset with no history
    pub default_return: f64,

    /// Volatility substituted for an asset with no history
    pub default_volatility: f64,

    pub return_method: ReturnMethod,

    pub initial_guess: InitialGuess,

    /// Keep only the top N equities by momentum and Sharpe rank
    pub max_equities: Option<usize>,

    /// Wall-clock budget for the market data fetch phase
    pub run_timeout_secs: u64,

    pub solver: SolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.07,
            lookback_days: 365,
            over_allocation_tolerance: dec!(0.001),
            default_return: 0.10,
            default_volatility: 0.15,
            return_method: ReturnMethod::MeanDaily,
            initial_guess: InitialGuess::Equal,
            max_equities: None,
            run_timeout_secs: 30,
            solver: SolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `PORTFOLIO_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("PORTFOLIO_RISK_FREE_RATE") {
            config.risk_free_rate = v;
        }
        if let Some(v) = env_parse("PORTFOLIO_LOOKBACK_DAYS") {
            config.lookback_days = v;
        }
        if let Some(v) = env_parse("PORTFOLIO_OVER_ALLOCATION_TOLERANCE") {
            config.over_allocation_tolerance = v;
        }
        if let Some(v) = env_parse("PORTFOLIO_RUN_TIMEOUT_SECS") {
            config.run_timeout_secs = v;
        }
        if let Some(v) = env_parse("PORTFOLIO_MAX_EQUITIES") {
            config.max_equities = Some(v);
        }
        if let Some(v) = env_parse("PORTFOLIO_SOLVER_MAX_ITERATIONS") {
            config.solver.max_iterations = v;
        }
        if let Ok(method) = std::env::var("PORTFOLIO_RETURN_METHOD") {
            match method.to_lowercase().as_str() {
                "compounded" => config.return_method = ReturnMethod::Compounded,
                "mean_daily" => config.return_method = ReturnMethod::MeanDaily,
                other => tracing::warn!("Ignoring unknown PORTFOLIO_RETURN_METHOD '{}'", other),
            }
        }
        if let Ok(guess) = std::env::var("PORTFOLIO_INITIAL_GUESS") {
            match guess.to_lowercase().as_str() {
                "momentum" => config.initial_guess = InitialGuess::Momentum,
                "equal" => config.initial_guess = InitialGuess::Equal,
                other => tracing::warn!("Ignoring unknown PORTFOLIO_INITIAL_GUESS '{}'", other),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(AllocationError::Config("risk_free_rate must be finite".into()));
        }
        if self.lookback_days == 0 {
            return Err(AllocationError::Config("lookback_days must be positive".into()));
        }
        if self.over_allocation_tolerance < Decimal::ZERO {
            return Err(AllocationError::Config(
                "over_allocation_tolerance cannot be negative".into(),
            ));
        }
        if self.solver.max_iterations == 0 {
            return Err(AllocationError::Config("solver.max_iterations must be positive".into()));
        }
        if !(self.solver.tolerance > 0.0 && self.solver.step_size > 0.0) {
            return Err(AllocationError::Config(
                "solver tolerance and step_size must be positive".into(),
            ));
        }
        if self.default_volatility < 0.0 {
            return Err(AllocationError::Config("default_volatility cannot be negative".into()));
        }
        if self.max_equities == Some(0) {
            return Err(AllocationError::Config("max_equities must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.risk_free_rate - 0.07).abs() < f64::EPSILON);
        assert_eq!(config.over_allocation_tolerance, dec!(0.001));
    }

    #[test]
    fn test_validate_rejects_bad_solver() {
        let mut config = EngineConfig::default();
        config.solver.max_iterations = 0;
        assert!(matches!(config.validate(), Err(AllocationError::Config(_))));

        let mut config = EngineConfig::default();
        config.max_equities = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EngineConfig::default());
    }
}
