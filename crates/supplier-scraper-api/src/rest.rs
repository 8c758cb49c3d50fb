//! HTTP REST API.
//!
//! One `POST /scrape-<site>` endpoint per portal. Each request runs a full
//! batch (launch, login, extract, normalize) and answers with the canonical
//! records, or the `login_failed` marker.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use supplier_scraper::{scrape, Launcher, ScrapeRequest, ScraperConfig, Site};

/// State shared by every handler.
pub struct AppState {
    pub launcher: Arc<dyn Launcher>,
    pub config: ScraperConfig,
}

impl AppState {
    pub fn new(launcher: Arc<dyn Launcher>, config: ScraperConfig) -> Arc<Self> {
        Arc::new(Self { launcher, config })
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/scrape-eklor", post(scrape_eklor))
        .route("/scrape-powr-connect", post(scrape_powr_connect))
        .route("/scrape-voltaneo", post(scrape_voltaneo))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until the process stops.
pub async fn start(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn scrape_eklor(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    run_site(Site::Eklor, state, body).await
}

async fn scrape_powr_connect(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    run_site(Site::PowrConnect, state, body).await
}

async fn scrape_voltaneo(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    run_site(Site::Voltaneo, state, body).await
}

fn detail(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn run_site(
    site: Site,
    state: Arc<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(%site, "rejected request body: {rejection}");
            return detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text());
        }
    };

    // Run the batch on its own task so a panic in the browser layer becomes a 500.
    let task = tokio::task::spawn(async move {
        scrape(state.launcher.as_ref(), site, &request, &state.config).await
    });

    match task.await {
        Ok(Ok(output)) => Json(output).into_response(),
        Ok(Err(e)) => {
            tracing::error!(%site, "scrape failed: {e}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, format!("Scraping error: {e}"))
        }
        Err(e) => {
            tracing::error!(%site, "scrape task failed: {e}");
            detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Scraping error: task failed: {e}"),
            )
        }
    }
}
