//! REST API over a finished planning run.
//!
//! Provides four GET endpoints:
//! - `/summary` — scenario inputs, costs and emissions
//! - `/capacities` — optimal capacity table
//! - `/dispatch` — energy balance with optional snapshot range filtering
//! - `/sensitivity` — CO₂ sweep, if one was run

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::model::statistics::{BalanceRow, energy_balance};
use crate::runner::PlanningRun;

/// Immutable application state shared across all request handlers.
///
/// Built once after the solve and wrapped in `Arc`; everything is read-only.
pub struct AppState {
    /// The completed run.
    pub run: PlanningRun,
    /// Energy balance derived from `run`, computed once up front.
    pub balance: Vec<BalanceRow>,
}

impl AppState {
    pub fn new(run: PlanningRun) -> Self {
        let balance = energy_balance(&run.result);
        Self { run, balance }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/summary", get(handlers::get_summary))
        .route("/capacities", get(handlers::get_capacities))
        .route("/dispatch", get(handlers::get_dispatch))
        .route("/sensitivity", get(handlers::get_sensitivity))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
