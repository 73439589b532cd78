//! Servicio del libro de cuotas
//!
//! Dueño del registro de saldo por (vehículo, combustible): resuelve o crea
//! el período activo, ejecuta la deducción atómica, consulta saldos y fuerza
//! resets administrativos. La atomicidad del chequeo-y-resta vive en el
//! `QuotaStore`; este servicio nunca hace un read-then-write separado.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::quota::{AllocationPeriod, NewQuotaPeriod, QuotaBalanceResponse, QuotaPeriod};
use crate::models::vehicle::{FuelType, Vehicle};
use crate::repositories::QuotaStore;
use crate::services::allocation_service::monthly_allocation;
use crate::services::notification_service::{NotificationGateway, QuotaNotification};
use crate::services::threshold_monitor::{evaluate_transition, QuotaWarningLevel};
use crate::utils::errors::{AppError, AppResult};

/// Resultado tipado de un intento de despacho
#[derive(Debug)]
pub enum DispenseOutcome {
    /// Deducción aplicada; se devuelven los saldos antes/después para el
    /// recibo y el aviso de umbral que produjo la transición (si hubo)
    Dispensed {
        period: QuotaPeriod,
        quota_before: Decimal,
        quota_after: Decimal,
        warning: Option<QuotaWarningLevel>,
    },
    /// Saldo insuficiente: no se mutó nada y se informa el saldo real
    InsufficientBalance { remaining: Decimal },
}

pub struct QuotaService {
    store: Arc<dyn QuotaStore>,
    notifier: Arc<dyn NotificationGateway>,
}

impl QuotaService {
    pub fn new(store: Arc<dyn QuotaStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self { store, notifier }
    }

    /// Resolver el período activo, creándolo perezosamente si no existe.
    ///
    /// Idempotente bajo llamadas concurrentes para la misma clave: el store
    /// garantiza que resulta exactamente un registro.
    pub async fn current_period(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
    ) -> AppResult<QuotaPeriod> {
        let now = Utc::now();

        if let Some(period) = self.store.find_active(vehicle.id, fuel_type, now).await? {
            return Ok(period);
        }

        log::info!(
            "🆕 Creating monthly quota record for vehicle {} ({})",
            vehicle.registration_number,
            fuel_type
        );
        self.store
            .rotate_period(new_monthly_period(vehicle, fuel_type, now), now, false)
            .await
    }

    pub async fn remaining_balance(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
    ) -> AppResult<Decimal> {
        Ok(self.current_period(vehicle, fuel_type).await?.remaining_quota)
    }

    pub async fn has_sufficient_balance(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
        amount: Decimal,
    ) -> AppResult<bool> {
        Ok(self.remaining_balance(vehicle, fuel_type).await? >= amount)
    }

    /// Resumen de saldo para la API (incluye `expiring_soon`)
    pub async fn get_balance(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
    ) -> AppResult<QuotaBalanceResponse> {
        let period = self.current_period(vehicle, fuel_type).await?;
        Ok(QuotaBalanceResponse::from_period(&period, Utc::now()))
    }

    /// Deducción atómica de combustible.
    ///
    /// Chequeo de suficiencia y resta en un solo paso indivisible del store;
    /// si dos estaciones despachan a la vez, la suma de deducciones exitosas
    /// nunca supera lo asignado. El aviso de umbral se despacha best-effort.
    pub async fn deduct(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
        amount: Decimal,
    ) -> AppResult<DispenseOutcome> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("Invalid fuel amount!".to_string()));
        }

        // Garantizar que el registro del período exista antes de debitar
        self.current_period(vehicle, fuel_type).await?;

        let now = Utc::now();
        match self
            .store
            .deduct_if_sufficient(vehicle.id, fuel_type, amount, now)
            .await?
        {
            Some(updated) => {
                let quota_after = updated.remaining_quota;
                let quota_before = quota_after + amount;

                let warning =
                    evaluate_transition(updated.allocated_quota, quota_before, quota_after);
                if let Some(level) = warning {
                    self.dispatch_threshold_warning(vehicle, &updated, level).await;
                }

                log::info!(
                    "⛽ Deducted {}L {} from {} ({}L remaining)",
                    amount,
                    fuel_type,
                    vehicle.registration_number,
                    quota_after
                );

                Ok(DispenseOutcome::Dispensed {
                    period: updated,
                    quota_before,
                    quota_after,
                    warning,
                })
            }
            None => {
                // La condición falló en el instante del chequeo: informar el
                // saldo real para que el caller explique el faltante
                let remaining = self.remaining_balance(vehicle, fuel_type).await?;
                log::warn!(
                    "🚫 Insufficient quota for {} ({}): requested {}L, remaining {}L",
                    vehicle.registration_number,
                    fuel_type,
                    amount,
                    remaining
                );
                Ok(DispenseOutcome::InsufficientBalance { remaining })
            }
        }
    }

    /// Reset administrativo: cierra el registro vigente y crea uno nuevo para
    /// el mes presente, haya vencido o no el período natural.
    pub async fn reset_period(
        &self,
        vehicle: &Vehicle,
        fuel_type: FuelType,
    ) -> AppResult<QuotaPeriod> {
        let now = Utc::now();
        let period = self
            .store
            .rotate_period(new_monthly_period(vehicle, fuel_type, now), now, true)
            .await?;

        log::info!(
            "🔄 Reset quota for {}: {}L allocated for {}",
            vehicle.registration_number,
            period.allocated_quota,
            period_label(now)
        );

        // Aviso de nueva asignación: best-effort, una falla no revierte el reset
        let delivered = self
            .notifier
            .notify(
                &vehicle.owner,
                QuotaNotification::NewAllocation {
                    registration_number: vehicle.registration_number.clone(),
                    allocated_liters: period.allocated_quota,
                    period_label: period_label(now),
                },
            )
            .await;
        if !delivered {
            log::warn!(
                "⚠️ Allocation notice not delivered for {}",
                vehicle.registration_number
            );
        }

        Ok(period)
    }

    async fn dispatch_threshold_warning(
        &self,
        vehicle: &Vehicle,
        period: &QuotaPeriod,
        level: QuotaWarningLevel,
    ) {
        let delivered = self
            .notifier
            .notify(
                &vehicle.owner,
                QuotaNotification::LowQuotaWarning {
                    registration_number: vehicle.registration_number.clone(),
                    remaining_liters: period.remaining_quota,
                    fuel_type: period.fuel_type,
                    level,
                },
            )
            .await;

        if !delivered {
            log::warn!(
                "⚠️ Failed to deliver {} quota warning for {}",
                level.label(),
                vehicle.registration_number
            );
        }
    }
}

/// Armar los valores de un período mensual nuevo para "now"
fn new_monthly_period(vehicle: &Vehicle, fuel_type: FuelType, now: DateTime<Utc>) -> NewQuotaPeriod {
    let (start_date, end_date) = month_bounds(now);
    let allocated = monthly_allocation(vehicle.vehicle_class(), fuel_type, vehicle.engine_capacity);

    NewQuotaPeriod {
        vehicle_id: vehicle.id,
        fuel_type,
        allocated_quota: allocated,
        allocation_period: AllocationPeriod::Monthly,
        start_date,
        end_date,
    }
}

/// Límites del mes calendario de `now`: primer instante y último segundo
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (now.year(), now.month());

    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("first day of month is a valid UTC timestamp");

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let next_start = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .expect("first day of month is a valid UTC timestamp");

    (start, next_start - Duration::seconds(1))
}

/// Etiqueta humana del período, ej. "August 2026"
pub fn period_label(now: DateTime<Utc>) -> String {
    now.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_mid_year() {
        let now = Utc.with_ymd_and_hms(2026, 8, 14, 10, 30, 0).unwrap();
        let (start, end) = month_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_month_bounds_december_rolls_year() {
        let now = Utc.with_ymd_and_hms(2026, 12, 25, 0, 0, 0).unwrap();
        let (start, end) = month_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_month_bounds_february() {
        let now = Utc.with_ymd_and_hms(2027, 2, 3, 0, 0, 0).unwrap();
        let (_, end) = month_bounds(now);
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 2, 28, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_period_label() {
        let now = Utc.with_ymd_and_hms(2026, 8, 14, 0, 0, 0).unwrap();
        assert_eq!(period_label(now), "August 2026");
    }
}
