//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa a
//! través del router de Axum: el pool, la configuración y los servicios del
//! motor de cuotas ya cableados.

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::quota_repository::PgQuotaRepository;
use crate::repositories::vehicle_repository::PgVehicleRepository;
use crate::repositories::{QuotaStore, VehicleProvider};
use crate::services::notification_service::{NotificationGateway, TwilioNotificationService};
use crate::services::quota_reset_sweep::QuotaResetSweep;
use crate::services::quota_service::QuotaService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: EnvironmentConfig,
    pub quota_service: Arc<QuotaService>,
    pub vehicles: Arc<dyn VehicleProvider>,
    pub notifier: Arc<dyn NotificationGateway>,
    pub sweep: Arc<QuotaResetSweep>,
}

impl AppState {
    pub fn new(pool: PgPool, config: EnvironmentConfig) -> Self {
        let store: Arc<dyn QuotaStore> = Arc::new(PgQuotaRepository::new(pool.clone()));
        let vehicles: Arc<dyn VehicleProvider> = Arc::new(PgVehicleRepository::new(pool.clone()));
        let notifier: Arc<dyn NotificationGateway> =
            Arc::new(TwilioNotificationService::from_config(&config));

        let quota_service = Arc::new(QuotaService::new(store, notifier.clone()));
        let sweep = Arc::new(QuotaResetSweep::new(
            quota_service.clone(),
            vehicles.clone(),
            config.sweep_chunk_size,
        ));

        Self {
            pool,
            config,
            quota_service,
            vehicles,
            notifier,
            sweep,
        }
    }
}
