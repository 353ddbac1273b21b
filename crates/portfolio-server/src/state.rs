//! Application State

use std::sync::Arc;

use portfolio_core::{
    AssetUniverse, CurrentPriceProvider, EngineConfig, PortfolioEngine, PriceHistoryProvider,
};

/// Shared application state; holds no per-request data
#[derive(Clone)]
pub struct AppState {
    /// Daily close history
    pub history: Arc<dyn PriceHistoryProvider>,

    /// Current quotes
    pub prices: Arc<dyn CurrentPriceProvider>,

    pub universe: Arc<AssetUniverse>,

    pub config: Arc<EngineConfig>,
}

impl AppState {
    /// Fresh engine for one request
    pub fn engine(&self) -> PortfolioEngine {
        PortfolioEngine::new(self.history.clone(), self.prices.clone(), (*self.config).clone())
            .with_universe((*self.universe).clone())
    }
}
