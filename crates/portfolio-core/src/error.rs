//! Error Types for the Allocation Engine
//!
//! Most conditions are recovered inside the pipeline with a deterministic
//! fallback; only a handful abort a run. See [`AllocationError::is_recoverable`].

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::AssetCategory;

pub type Result<T> = std::result::Result<T, AllocationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// No usable price history for any asset in the universe
    #[error("No price data available for any asset")]
    DataUnavailable,

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Optimization did not converge for {category}: {reason}")]
    OptimizationNonConvergent {
        category: AssetCategory,
        reason: String,
    },

    #[error("Over-allocation: allocated {allocated} exceeds requested {requested}")]
    OverAllocation {
        allocated: Decimal,
        requested: Decimal,
    },

    #[error("Invalid risk profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Market data fetch timed out after {0}s")]
    Timeout(u64),

    #[error("Market data provider error: {0}")]
    Provider(String),

    /// The solver task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AllocationError {
    /// Whether the pipeline can continue with a fallback after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AllocationError::PriceUnavailable(_)
                | AllocationError::OptimizationNonConvergent { .. }
                | AllocationError::OverAllocation { .. }
                | AllocationError::InvalidProfile(_)
                | AllocationError::Provider(_)
        )
    }

    /// Message suitable for the failure result handed to callers
    pub fn user_message(&self) -> String {
        match self {
            AllocationError::DataUnavailable => {
                "Market data is currently unavailable. Please try again later.".into()
            }
            AllocationError::InvalidInput(msg) => format!("Invalid request: {}", msg),
            AllocationError::Timeout(_) => {
                "Fetching market data took too long. Please try again.".into()
            }
            AllocationError::Config(_) => "The allocation service is misconfigured.".into(),
            other => format!("Failed to generate portfolio: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_split() {
        assert!(!AllocationError::DataUnavailable.is_recoverable());
        assert!(!AllocationError::Timeout(30).is_recoverable());
        assert!(!AllocationError::Internal("solver task panicked".into()).is_recoverable());
        assert!(AllocationError::InvalidProfile("empty".into()).is_recoverable());
        assert!(AllocationError::OptimizationNonConvergent {
            category: AssetCategory::Crypto,
            reason: "max iterations".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_user_message() {
        let msg = AllocationError::DataUnavailable.user_message();
        assert!(msg.contains("unavailable"));
    }
}
