//! Barrido mensual de reasignación de cuotas
//!
//! Proceso batch best-effort: para cada vehículo conocido fuerza el reset de
//! su período y emite el aviso de nueva asignación. Las fallas por vehículo
//! se cuentan y se loguean pero no abortan el barrido. Los vehículos se
//! procesan en lotes paralelos acotados, igual que el procesamiento por
//! chunks del geocoding batch.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::quota::SweepSummary;
use crate::models::vehicle::Vehicle;
use crate::repositories::VehicleProvider;
use crate::services::quota_service::QuotaService;
use crate::utils::errors::{AppError, AppResult};

/// Estado observable del barrido
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Running,
    Completed(SweepSummary),
    CompletedWithFailures(SweepSummary),
}

pub struct QuotaResetSweep {
    quota_service: Arc<QuotaService>,
    vehicles: Arc<dyn VehicleProvider>,
    chunk_size: usize,
    running: AtomicBool,
    cancel_requested: AtomicBool,
    last_state: RwLock<SweepState>,
}

impl QuotaResetSweep {
    pub fn new(
        quota_service: Arc<QuotaService>,
        vehicles: Arc<dyn VehicleProvider>,
        chunk_size: usize,
    ) -> Self {
        Self {
            quota_service,
            vehicles,
            chunk_size: chunk_size.max(1),
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            last_state: RwLock::new(SweepState::Idle),
        }
    }

    pub async fn state(&self) -> SweepState {
        self.last_state.read().await.clone()
    }

    /// Pedir la cancelación cooperativa: se atiende entre lotes, nunca a
    /// mitad del reset de un vehículo
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Ejecutar el barrido completo una vez.
    ///
    /// Reinvocarlo dentro del mismo mes es un reset forzado válido, pero dos
    /// disparos simultáneos del mismo tick se rechazan con Conflict.
    pub async fn run_monthly_sweep(&self) -> AppResult<SweepSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Conflict(
                "Monthly quota sweep is already running".to_string(),
            ));
        }

        self.cancel_requested.store(false, Ordering::SeqCst);
        *self.last_state.write().await = SweepState::Running;

        let result = self.execute().await;

        let final_state = match &result {
            Ok(summary) if summary.failed > 0 => {
                SweepState::CompletedWithFailures(summary.clone())
            }
            Ok(summary) => SweepState::Completed(summary.clone()),
            Err(_) => SweepState::Idle,
        };
        *self.last_state.write().await = final_state;
        self.running.store(false, Ordering::SeqCst);

        result
    }

    async fn execute(&self) -> AppResult<SweepSummary> {
        log::info!("=== STARTING MONTHLY QUOTA RESET SWEEP ===");

        let vehicles = self.vehicles.list_all().await?;
        let total = vehicles.len();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for chunk in vehicles.chunks(self.chunk_size) {
            if self.cancel_requested.load(Ordering::SeqCst) {
                log::warn!("🛑 Sweep cancelled; remaining vehicles left untouched");
                cancelled = true;
                break;
            }

            let futures = chunk.iter().map(|vehicle| self.reset_one(vehicle));
            for ok in join_all(futures).await {
                if ok {
                    succeeded += 1;
                } else {
                    failed += 1;
                }
            }
        }

        let summary = SweepSummary {
            total,
            succeeded,
            failed,
            cancelled,
        };

        log::info!("=== MONTHLY SWEEP COMPLETED ===");
        log::info!(
            "Total vehicles: {} | succeeded: {} | failed: {}{}",
            summary.total,
            summary.succeeded,
            summary.failed,
            if summary.cancelled { " | CANCELLED" } else { "" }
        );

        Ok(summary)
    }

    /// Resetear un vehículo; toda falla queda contenida acá
    async fn reset_one(&self, vehicle: &Vehicle) -> bool {
        match self
            .quota_service
            .reset_period(vehicle, vehicle.fuel_type)
            .await
        {
            Ok(period) => {
                log::info!(
                    "✅ Reset quota for {}: {}L",
                    vehicle.registration_number,
                    period.allocated_quota
                );
                true
            }
            Err(e) => {
                log::error!(
                    "❌ Failed to reset quota for {}: {}",
                    vehicle.registration_number,
                    e
                );
                false
            }
        }
    }
}

/// Próximo disparo del scheduler: primer día del mes siguiente, 00:01 UTC,
/// antes de que empiece el consumo significativo del mes nuevo
pub fn next_monthly_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 1, 0)
        .single()
        .expect("first day of month is a valid UTC timestamp")
}
