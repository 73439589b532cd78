//! Controller del flujo de cuotas
//!
//! Valida la entrada del caller (tipo de combustible, monto positivo, tope de
//! 100L por transacción) y delega en los servicios. El saldo insuficiente se
//! devuelve como resultado tipado, no como error genérico.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::quota::{
    PumpFuelRequest, PumpFuelResponse, QuotaBalanceResponse, QuotaResetResponse, SweepSummary,
};
use crate::models::vehicle::{FuelType, Vehicle};
use crate::repositories::VehicleProvider;
use crate::services::notification_service::{NotificationGateway, QuotaNotification};
use crate::services::quota_reset_sweep::QuotaResetSweep;
use crate::services::quota_service::{DispenseOutcome, QuotaService};
use crate::state::AppState;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::validation::parse_fuel_amount;

pub struct QuotaController {
    quota_service: Arc<QuotaService>,
    vehicles: Arc<dyn VehicleProvider>,
    notifier: Arc<dyn NotificationGateway>,
    sweep: Arc<QuotaResetSweep>,
}

impl QuotaController {
    pub fn new(state: &AppState) -> Self {
        Self {
            quota_service: state.quota_service.clone(),
            vehicles: state.vehicles.clone(),
            notifier: state.notifier.clone(),
            sweep: state.sweep.clone(),
        }
    }

    async fn resolve_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vehicle> {
        self.vehicles
            .find_by_id(vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", &vehicle_id.to_string()))
    }

    fn parse_fuel_type(raw: &str) -> AppResult<FuelType> {
        raw.parse::<FuelType>().map_err(AppError::BadRequest)
    }

    /// Consultar el saldo del período activo
    pub async fn check_quota(
        &self,
        vehicle_id: Uuid,
        fuel_type: &str,
    ) -> AppResult<QuotaBalanceResponse> {
        let fuel_type = Self::parse_fuel_type(fuel_type)?;
        let vehicle = self.resolve_vehicle(vehicle_id).await?;
        self.quota_service.get_balance(&vehicle, fuel_type).await
    }

    /// Registrar un despacho de combustible
    pub async fn pump_fuel(&self, request: PumpFuelRequest) -> AppResult<PumpFuelResponse> {
        request.validate()?;
        let fuel_type = Self::parse_fuel_type(&request.fuel_type)?;
        let amount = parse_fuel_amount(request.amount_liters)?;
        let vehicle = self.resolve_vehicle(request.vehicle_id).await?;

        match self.quota_service.deduct(&vehicle, fuel_type, amount).await? {
            DispenseOutcome::Dispensed {
                quota_before,
                quota_after,
                warning,
                ..
            } => {
                // Recibo por SMS: best-effort, no afecta el resultado
                let station_name = request
                    .station_name
                    .unwrap_or_else(|| "fuel station".to_string());
                self.notifier
                    .notify(
                        &vehicle.owner,
                        QuotaNotification::FuelTransaction {
                            registration_number: vehicle.registration_number.clone(),
                            fuel_type,
                            amount_liters: amount,
                            station_name,
                            remaining_liters: quota_after,
                        },
                    )
                    .await;

                Ok(PumpFuelResponse {
                    success: true,
                    vehicle_id: vehicle.id.to_string(),
                    fuel_type: fuel_type.to_string(),
                    amount_liters: Some(amount),
                    quota_before: Some(quota_before),
                    quota_after: Some(quota_after),
                    remaining_quota: None,
                    warning: warning.map(|level| level.label().to_string()),
                    error_code: None,
                    message: format!(
                        "Fuel pumped successfully! {}L {} dispensed. Remaining quota: {}L",
                        amount.round_dp(1),
                        fuel_type,
                        quota_after.round_dp(1)
                    ),
                })
            }
            DispenseOutcome::InsufficientBalance { remaining } => Ok(PumpFuelResponse {
                success: false,
                vehicle_id: vehicle.id.to_string(),
                fuel_type: fuel_type.to_string(),
                amount_liters: None,
                quota_before: None,
                quota_after: None,
                remaining_quota: Some(remaining),
                warning: None,
                error_code: Some("INSUFFICIENT_BALANCE".to_string()),
                message: format!("Insufficient quota! Remaining: {}L", remaining.round_dp(1)),
            }),
        }
    }

    /// Reset administrativo del período de un vehículo
    pub async fn reset_quota(
        &self,
        vehicle_id: Uuid,
        fuel_type: &str,
    ) -> AppResult<QuotaResetResponse> {
        let fuel_type = Self::parse_fuel_type(fuel_type)?;
        let vehicle = self.resolve_vehicle(vehicle_id).await?;
        let period = self.quota_service.reset_period(&vehicle, fuel_type).await?;

        Ok(QuotaResetResponse {
            vehicle_id: vehicle.id.to_string(),
            fuel_type: fuel_type.to_string(),
            allocated_quota: period.allocated_quota,
            remaining_quota: period.remaining_quota,
            period_start: period.start_date.to_rfc3339(),
            period_end: period.end_date.to_rfc3339(),
            message: format!(
                "Quota reset successfully for {} ({})",
                vehicle.registration_number,
                Utc::now().format("%B %Y")
            ),
        })
    }

    /// Disparo administrativo/programado del barrido mensual
    pub async fn run_sweep(&self) -> AppResult<SweepSummary> {
        self.sweep.run_monthly_sweep().await
    }
}
