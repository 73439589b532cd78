//! Implementación en memoria de los seams de persistencia
//!
//! Se usa en los tests de integración y para correr el servicio sin Postgres.
//! Todas las operaciones del store toman el mismo mutex, así que cada una es
//! atómica respecto de las demás, igual que sus equivalentes SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::quota::{NewQuotaPeriod, QuotaPeriod};
use crate::models::vehicle::{FuelType, Vehicle};
use crate::repositories::{QuotaStore, VehicleProvider};
use crate::utils::errors::AppResult;

type QuotaKey = (Uuid, FuelType);

/// Store de cuotas en memoria
#[derive(Default)]
pub struct MemoryQuotaStore {
    periods: Mutex<HashMap<QuotaKey, Vec<QuotaPeriod>>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cantidad total de registros (activos + históricos) para una clave
    pub async fn history_len(&self, vehicle_id: Uuid, fuel_type: FuelType) -> usize {
        let periods = self.periods.lock().await;
        periods
            .get(&(vehicle_id, fuel_type))
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn find_active(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        let periods = self.periods.lock().await;
        Ok(periods
            .get(&(vehicle_id, fuel_type))
            .and_then(|rows| rows.iter().find(|p| p.is_active(now)))
            .cloned())
    }

    async fn rotate_period(
        &self,
        new_period: NewQuotaPeriod,
        now: DateTime<Utc>,
        supersede_active: bool,
    ) -> AppResult<QuotaPeriod> {
        let mut periods = self.periods.lock().await;
        let rows = periods
            .entry((new_period.vehicle_id, new_period.fuel_type))
            .or_default();

        for row in rows.iter_mut() {
            if row.superseded_at.is_none() && (supersede_active || row.end_date < now) {
                row.superseded_at = Some(now);
                row.updated_at = now;
            }
        }

        // Si otro caller ya creó el registro del período vigente, devolverlo
        // en lugar de duplicarlo (mismo comportamiento que ON CONFLICT)
        if let Some(existing) = rows.iter().find(|p| p.is_active(now)) {
            return Ok(existing.clone());
        }

        let period = QuotaPeriod {
            id: Uuid::new_v4(),
            vehicle_id: new_period.vehicle_id,
            fuel_type: new_period.fuel_type,
            allocated_quota: new_period.allocated_quota,
            remaining_quota: new_period.allocated_quota,
            allocation_period: new_period.allocation_period,
            start_date: new_period.start_date,
            end_date: new_period.end_date,
            superseded_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(period.clone());

        Ok(period)
    }

    async fn deduct_if_sufficient(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        let mut periods = self.periods.lock().await;
        let active = periods
            .get_mut(&(vehicle_id, fuel_type))
            .and_then(|rows| rows.iter_mut().find(|p| p.is_active(now)));

        match active {
            Some(period) if period.remaining_quota >= amount => {
                period.remaining_quota -= amount;
                period.updated_at = now;
                Ok(Some(period.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Proveedor de vehículos en memoria
#[derive(Default)]
pub struct MemoryVehicleProvider {
    vehicles: Vec<Vehicle>,
}

impl MemoryVehicleProvider {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles }
    }
}

#[async_trait]
impl VehicleProvider for MemoryVehicleProvider {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.iter().find(|v| v.id == id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Vehicle>> {
        Ok(self.vehicles.clone())
    }
}
