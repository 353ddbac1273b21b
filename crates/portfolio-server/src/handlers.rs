//! HTTP Handlers

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use portfolio_core::{AllocationError, AllocationResponse, RiskProfile};

use crate::state::AppState;

/// Smallest accepted investment
pub const MIN_INVESTMENT: Decimal = dec!(50000);

/// Amount used when the request names none
pub const DEFAULT_INVESTMENT: Decimal = dec!(100000);

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub history_provider: String,
    pub assets: usize,
}

/// Query string of `GET /api/portfolio`, also the body of `POST /api/portfolio`
#[derive(Debug, Default, Deserialize)]
pub struct PortfolioRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub risk_category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        history_provider: state.history.name().to_string(),
        assets: state.universe.len(),
    })
}

/// `GET /api/portfolio?amount=&risk_score=&risk_category=`
pub async fn portfolio_query(
    State(state): State<AppState>,
    Query(request): Query<PortfolioRequest>,
) -> Result<Json<AllocationResponse>, ApiError> {
    allocate(&state, request).await
}

/// `POST /api/portfolio` with the same fields as JSON
pub async fn portfolio_body(
    State(state): State<AppState>,
    Json(request): Json<PortfolioRequest>,
) -> Result<Json<AllocationResponse>, ApiError> {
    allocate(&state, request).await
}

async fn allocate(state: &AppState, request: PortfolioRequest) -> Result<Json<AllocationResponse>, ApiError> {
    let amount = request.amount.unwrap_or(DEFAULT_INVESTMENT);
    if amount < MIN_INVESTMENT {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Minimum investment amount is {}", MIN_INVESTMENT),
                code: "AMOUNT_TOO_LOW".into(),
            }),
        ));
    }

    let profile = RiskProfile {
        risk_score: request.risk_score,
        risk_category: request.risk_category,
    };

    let allocation = state
        .engine()
        .allocate(amount, &profile)
        .await
        .map_err(|e| {
            tracing::error!("Portfolio allocation error: {}", e);
            error_response(&e)
        })?;

    Ok(Json(AllocationResponse::success(allocation)))
}

fn error_response(error: &AllocationError) -> ApiError {
    let (status, code) = match error {
        AllocationError::InvalidInput(_) | AllocationError::InvalidProfile(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
        }
        AllocationError::DataUnavailable => (StatusCode::INTERNAL_SERVER_ERROR, "DATA_UNAVAILABLE"),
        AllocationError::Timeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TIMEOUT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "ALLOCATION_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: error.user_message(),
            code: code.into(),
        }),
    )
}
