//! # portfolio-core
//!
//! Risk-profiled allocation of an investment amount across equities, crypto,
//! commodities and mutual funds.
//!
//! ## Approach
//!
//! - **Risk factor first** - A questionnaire score or named category becomes a single factor in [0, 1]
//! - **Category split by appetite** - Defensive categories shrink as the factor grows
//! - **Sharpe within each category** - Bounded, fully invested, solved per category in parallel
//! - **Buyable lots** - Whole shares, 4-decimal fund units, leftovers swept into a fund
//!
//! ## Example: 100,000 at moderate risk
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Risk factor 0.5                                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Equities    ████████████████████  42.5%  10 NSE large caps │
//! │  Funds       ███████████████       29.0%  2 flexi cap funds │
//! │  Commodities ███████████           17.5%  gold              │
//! │  Crypto      ██████                11.0%  BTC / ETH / SOL   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use portfolio_core::{EngineConfig, PortfolioEngine, RiskProfile};
//! use rust_decimal_macros::dec;
//!
//! # async fn run() {
//! let engine = PortfolioEngine::mock(EngineConfig::from_env());
//! let response = engine
//!     .compute_allocation(dec!(100000), &RiskProfile::from_category("moderate"))
//!     .await;
//! assert!(response.success);
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod reconcile;
pub mod risk;
pub mod selection;
pub mod stats;
pub mod universe;

pub use config::{EngineConfig, InitialGuess, ReturnMethod, SolverConfig};
pub use engine::PortfolioEngine;
pub use error::{AllocationError, Result};
pub use market::{CurrentPriceProvider, MockMarketData, PriceHistoryProvider, StaticMarketData};
pub use model::{
    AllocationResponse, Asset, AssetAllocation, AssetCategory, CategorySummary,
    PortfolioAllocation, PortfolioMetrics, PricePoint, PriceSeries, RiskCategory, RiskProfile,
};
pub use risk::RiskMapper;
pub use universe::AssetUniverse;
