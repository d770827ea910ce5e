//! HTTP gateway for abwright.
//!
//! Serves the assignment API and provides [`assignment_middleware`], which
//! host applications layer onto their own routes to receive an [`Exp`] in
//! every handler.
//!
//! Built on Axum.

pub mod assignment;

use std::sync::Arc;

use abwright_catalog::CatalogLoader;
use abwright_config::AppConfig;
use abwright_core::{Environment, Experiment};
use abwright_engine::AssignmentEngine;
use axum::{Router, extract::State, middleware, response::Json, routing::get};
use serde::Serialize;
use tracing::info;

pub use assignment::{Exp, assignment_middleware, request_context};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub catalog: CatalogLoader,
    pub engine: AssignmentEngine,
}

impl GatewayState {
    pub fn new(config: AppConfig) -> Self {
        let catalog = CatalogLoader::from_config(&config, Environment::Server);
        let engine = AssignmentEngine::new(&config.assignment);
        Self {
            config,
            catalog,
            engine,
        }
    }

    /// Replace the configured catalog loader.
    pub fn with_catalog(mut self, catalog: CatalogLoader) -> Self {
        self.catalog = catalog;
        self
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// `/health` and `/v1/experiments` are served without assignment; every
/// other route runs behind [`assignment_middleware`].
pub fn build_router(state: SharedState) -> Router {
    let assigned = Router::new()
        .route("/v1/assignment", get(assignment_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            assignment_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/experiments", get(experiments_handler))
        .merge(assigned)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> abwright_core::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(GatewayState::new(config));

    info!(
        addr = %addr,
        local_experiments = state.config.experiments.len(),
        remote = state.catalog.has_remote(),
        cookie = state.engine.cookie_name(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn assignment_handler(exp: Exp) -> Json<abwright_core::Assignment> {
    Json(exp.assignment().clone())
}

#[derive(Serialize)]
struct ExperimentSummary {
    #[serde(rename = "experimentID")]
    id: String,
    name: String,
    weight: f64,
    variants: usize,
    sections: usize,
    #[serde(rename = "eligibleWhen", skip_serializing_if = "Option::is_none")]
    eligible_when: Option<String>,
}

impl From<&Experiment> for ExperimentSummary {
    fn from(exp: &Experiment) -> Self {
        Self {
            id: exp.id.clone(),
            name: exp.name.clone(),
            weight: exp.selection_weight(),
            variants: exp.variants.len(),
            sections: exp.section_count(),
            eligible_when: exp.eligible_when.clone(),
        }
    }
}

#[derive(Serialize)]
struct ExperimentsResponse {
    count: usize,
    experiments: Vec<ExperimentSummary>,
}

async fn experiments_handler(State(state): State<SharedState>) -> Json<ExperimentsResponse> {
    let catalog = state.catalog.load().await;
    Json(ExperimentsResponse {
        count: catalog.len(),
        experiments: catalog.iter().map(ExperimentSummary::from).collect(),
    })
}
