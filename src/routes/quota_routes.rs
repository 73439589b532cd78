use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::quota_controller::QuotaController;
use crate::models::quota::{
    PumpFuelRequest, PumpFuelResponse, QuotaBalanceResponse, QuotaResetResponse, SweepSummary,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_quota_router() -> Router<AppState> {
    Router::new()
        .route("/check/:vehicle_id/:fuel_type", get(check_quota))
        .route("/pump", post(pump_fuel))
        .route("/reset/:vehicle_id/:fuel_type", post(reset_quota))
        .route("/sweep", post(run_sweep))
}

async fn check_quota(
    State(state): State<AppState>,
    Path((vehicle_id, fuel_type)): Path<(Uuid, String)>,
) -> Result<Json<QuotaBalanceResponse>, AppError> {
    let controller = QuotaController::new(&state);
    let response = controller.check_quota(vehicle_id, &fuel_type).await?;
    Ok(Json(response))
}

async fn pump_fuel(
    State(state): State<AppState>,
    Json(request): Json<PumpFuelRequest>,
) -> Result<(StatusCode, Json<PumpFuelResponse>), AppError> {
    let controller = QuotaController::new(&state);
    let response = controller.pump_fuel(request).await?;

    // Saldo insuficiente es un resultado esperado: 400 con el saldo real
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(response)))
}

async fn reset_quota(
    State(state): State<AppState>,
    Path((vehicle_id, fuel_type)): Path<(Uuid, String)>,
) -> Result<Json<QuotaResetResponse>, AppError> {
    let controller = QuotaController::new(&state);
    let response = controller.reset_quota(vehicle_id, &fuel_type).await?;
    Ok(Json(response))
}

async fn run_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepSummary>, AppError> {
    let controller = QuotaController::new(&state);
    let summary = controller.run_sweep().await?;
    Ok(Json(summary))
}
