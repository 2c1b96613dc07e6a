//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{DispatchQuery, DispatchRecord, ErrorResponse, SummaryResponse};

/// `GET /summary` → 200 + `SummaryResponse` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(SummaryResponse::from(&state.run))
}

/// `GET /capacities` → 200 + capacity rows
pub async fn get_capacities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.run.statistics.capacities.clone())
}

/// Returns the energy balance, optionally filtered by snapshot range.
///
/// `GET /dispatch` → 200 + `Vec<DispatchRecord>` JSON
/// `GET /dispatch?from=N&to=M` → filtered range (inclusive)
/// `GET /dispatch?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DispatchQuery>,
) -> impl IntoResponse {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(usize::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let records: Vec<DispatchRecord> = state
        .balance
        .iter()
        .enumerate()
        .filter(|(i, _)| *i >= from && *i <= to)
        .map(|(i, row)| DispatchRecord::new(i, row))
        .collect();

    Ok(Json(records))
}

/// `GET /sensitivity` → 200 + sweep table, or 404 when no sweep was run
pub async fn get_sensitivity(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.run.sensitivity {
        Some(table) => Ok(Json(table.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no sensitivity sweep was run; start with --sensitivity".to_string(),
            }),
        )),
    }
}
