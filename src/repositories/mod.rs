//! Repositorios del sistema
//!
//! Este módulo define los seams de persistencia del motor de cuotas. El
//! ledger solo habla con estos traits; la implementación Postgres es la de
//! producción y la de memoria se usa en tests y desarrollo local.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::quota::{NewQuotaPeriod, QuotaPeriod};
use crate::models::vehicle::{FuelType, Vehicle};
use crate::utils::errors::AppResult;

pub mod memory;
pub mod quota_repository;
pub mod vehicle_repository;

/// Persistencia de registros QuotaPeriod.
///
/// Las tres operaciones son atómicas por clave (vehículo, combustible):
/// el chequeo de suficiencia y la resta de `deduct_if_sufficient` son un solo
/// paso indivisible, y `rotate_period` reemplaza el registro vigente sin
/// estados intermedios observables.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Buscar el registro activo (no supersedido, con `end_date >= now`)
    async fn find_active(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>>;

    /// Cerrar el registro vigente y crear uno nuevo, en un solo paso atómico.
    ///
    /// Con `supersede_active = false` (creación perezosa) solo se cierran
    /// registros vencidos: si dos callers compiten, ambos convergen en el
    /// mismo registro nuevo. Con `true` (reset forzado) también se cierra el
    /// registro activo. Los registros cerrados se retienen para auditoría.
    async fn rotate_period(
        &self,
        new_period: NewQuotaPeriod,
        now: DateTime<Utc>,
        supersede_active: bool,
    ) -> AppResult<QuotaPeriod>;

    /// Restar `amount` del registro activo solo si `remaining >= amount`.
    ///
    /// Devuelve el registro ya actualizado, o `None` si la condición falló
    /// (saldo insuficiente o sin registro activo). Nunca muta en el caso
    /// `None`.
    async fn deduct_if_sufficient(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>>;
}

/// Proveedor de vehículos - solo lectura desde el punto de vista del motor
#[async_trait]
pub trait VehicleProvider: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    /// Listar todos los vehículos conocidos (lo recorre el sweep mensual)
    async fn list_all(&self) -> AppResult<Vec<Vehicle>>;
}
