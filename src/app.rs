use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cache::{CacheStatus, CustomerCache};
use crate::config::{CacheConfig, ServerConfig};
use crate::error::CacheError;
use crate::index::ProductRecord;
use crate::lookup::LookupReply;

pub struct AppState {
    cache: Arc<CustomerCache>,
}

#[derive(Deserialize)]
struct LookupRequest {
    #[serde(default)]
    mobile: String,
}

#[derive(Serialize)]
struct LookupResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    products: Option<Vec<ProductRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl LookupResponse {
    fn failure(message: &str) -> Self {
        LookupResponse {
            success: false,
            customer_name: None,
            products: None,
            message: Some(message.to_string()),
        }
    }
}

impl From<LookupReply> for LookupResponse {
    fn from(reply: LookupReply) -> Self {
        if !reply.found {
            return LookupResponse::failure("New Customer (Not found in database)");
        }
        LookupResponse {
            success: true,
            customer_name: reply.name,
            products: reply.products,
            message: None,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    cache: CacheStatus,
}

/// Routes of the lookup front end. Exposed separately from [`run`] so the
/// handlers can be driven without a socket.
pub fn router(cache: Arc<CustomerCache>) -> Router {
    let app_state = Arc::new(AppState { cache });

    Router::new()
        .route("/lookup-customer", post(lookup_customer))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run(
    cache_config: CacheConfig,
    server_config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!(
        "customer source {}, snapshot {}",
        cache_config.source_path.display(),
        cache_config.snapshot_path.display()
    );
    let cache = Arc::new(CustomerCache::new(cache_config)?);

    // Warm the cache before the first lookup needs it.
    let preload = Arc::clone(&cache);
    tokio::task::spawn_blocking(move || {
        log::info!("pre-loading customer data");
        match preload.warm_up() {
            Ok(()) => log::info!("customer data pre-loaded"),
            Err(e) => log::error!("customer data pre-load failed: {}", e),
        }
    });

    let app = router(cache);

    let listener = TcpListener::bind(server_config.addr).await?;
    log::info!("Listening on http://{}", server_config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn lookup_customer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LookupRequest>,
) -> Response {
    let cache = Arc::clone(&state.cache);

    // A cold cache reads the spreadsheet, so keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || cache.lookup(&payload.mobile)).await;

    match result {
        Ok(Ok(lookup)) => Json(LookupResponse::from(LookupReply::from(lookup))).into_response(),
        Ok(Err(CacheError::InvalidInput(_))) => (
            StatusCode::BAD_REQUEST,
            Json(LookupResponse::failure("Invalid Number (Must be 10 digits)")),
        )
            .into_response(),
        Ok(Err(e)) => {
            log::error!("customer lookup failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(LookupResponse::failure("Customer data is not available")),
            )
                .into_response()
        }
        Err(e) => {
            log::error!("customer lookup task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LookupResponse::failure("Customer data is not available")),
            )
                .into_response()
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Local::now().to_rfc3339(),
        cache: state.cache.status(),
    })
}
