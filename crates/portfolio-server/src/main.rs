//! portfolio-server
//!
//! Axum HTTP surface over the allocation engine. It validates the request,
//! builds an engine per call and renders the allocation as JSON.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_core::{AssetUniverse, EngineConfig, MockMarketData};

use crate::handlers::{health_check, portfolio_body, portfolio_query};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before reading RUST_LOG and PORTFOLIO_*
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    config.validate()?;
    tracing::info!(
        "Engine config: risk-free {:.2}%, lookback {}d, timeout {}s, return method {:?}",
        config.risk_free_rate * 100.0,
        config.lookback_days,
        config.run_timeout_secs,
        config.return_method
    );

    let market = Arc::new(MockMarketData::new());
    tracing::warn!("Using mock market data; plug a live provider into AppState for real quotes");

    let state = AppState {
        history: market.clone(),
        prices: market,
        universe: Arc::new(AssetUniverse::standard()),
        config: Arc::new(config),
    };
    tracing::info!("Universe holds {} assets", state.universe.len());

    let app = router(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("portfolio-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/portfolio  - Allocation from query parameters");
    tracing::info!("  POST /api/portfolio  - Allocation from JSON body");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/portfolio", get(portfolio_query).post(portfolio_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use portfolio_core::StaticMarketData;
    use serde_json::Value;
    use tower::ServiceExt;

    fn mock_state() -> AppState {
        let market = Arc::new(MockMarketData::new());
        AppState {
            history: market.clone(),
            prices: market,
            universe: Arc::new(AssetUniverse::standard()),
            config: Arc::new(EngineConfig::default()),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(mock_state()), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["assets"], 16);
    }

    #[tokio::test]
    async fn test_portfolio_from_query() {
        let (status, body) = send(
            router(mock_state()),
            get_request("/api/portfolio?amount=100000&risk_score=3"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["allocations"].as_array().unwrap().len(), 16);
        assert!(body["data"]["portfolio_metrics"]["sharpe_ratio"].is_number());
    }

    #[tokio::test]
    async fn test_portfolio_default_amount() {
        let (status, body) = send(
            router(mock_state()),
            get_request("/api/portfolio?risk_category=conservative"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["risk_factor"], 0.2);
    }

    #[tokio::test]
    async fn test_portfolio_from_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/portfolio")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"amount": "75000", "risk_category": "aggressive"}"#))
            .unwrap();
        let (status, body) = send(router(mock_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["risk_factor"], 0.9);
    }

    #[tokio::test]
    async fn test_amount_below_minimum() {
        let (status, body) = send(
            router(mock_state()),
            get_request("/api/portfolio?amount=49999.99&risk_score=5"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "AMOUNT_TOO_LOW");
    }

    #[tokio::test]
    async fn test_amount_at_minimum_accepted() {
        let (status, body) = send(
            router(mock_state()),
            get_request("/api/portfolio?amount=50000&risk_score=5"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_no_market_data() {
        let market = Arc::new(StaticMarketData::new());
        let state = AppState {
            history: market.clone(),
            prices: market,
            ..mock_state()
        };
        let (status, body) = send(router(state), get_request("/api/portfolio?risk_score=5")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DATA_UNAVAILABLE");
    }
}
