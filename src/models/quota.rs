//! Modelos del libro de cuotas de combustible
//!
//! QuotaPeriod es el único estado mutable compartido del sistema: un registro
//! por (vehículo, combustible, período). Los DTOs de la API viven acá también.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;
use validator::Validate;

use crate::models::vehicle::FuelType;

/// Días antes del fin de período en los que se marca `expiring_soon`
pub const EXPIRY_WARNING_DAYS: i64 = 3;

/// Tipo de período de asignación - por ahora solo mensual
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AllocationPeriod {
    Monthly,
}

impl AllocationPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPeriod::Monthly => "monthly",
        }
    }
}

/// Registro de cuota activo o histórico.
///
/// Invariantes: `0 <= remaining_quota <= allocated_quota`, `allocated_quota`
/// es inmutable después de la creación, y a lo sumo un registro por
/// (vehículo, combustible) está activo (sin `superseded_at` y con
/// `end_date >= now`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPeriod {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub fuel_type: FuelType,
    pub allocated_quota: Decimal,
    pub remaining_quota: Decimal,
    pub allocation_period: AllocationPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotaPeriod {
    pub fn used_quota(&self) -> Decimal {
        self.allocated_quota - self.remaining_quota
    }

    /// Porcentaje usado sobre lo asignado (0 si la asignación es cero)
    pub fn usage_percentage(&self) -> Decimal {
        if self.allocated_quota.is_zero() {
            return Decimal::ZERO;
        }
        self.used_quota() * Decimal::from(100) / self.allocated_quota
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.superseded_at.is_none() && self.end_date >= now
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        self.end_date - now <= Duration::days(EXPIRY_WARNING_DAYS)
    }
}

/// Valores para persistir un período nuevo (el store asigna id y timestamps)
#[derive(Debug, Clone)]
pub struct NewQuotaPeriod {
    pub vehicle_id: Uuid,
    pub fuel_type: FuelType,
    pub allocated_quota: Decimal,
    pub allocation_period: AllocationPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Response de consulta de saldo para la API
#[derive(Debug, Serialize)]
pub struct QuotaBalanceResponse {
    pub vehicle_id: String,
    pub fuel_type: String,
    pub allocated_quota: Decimal,
    pub remaining_quota: Decimal,
    pub used_quota: Decimal,
    pub usage_percentage: Decimal,
    pub expiring_soon: bool,
    pub period_start: String,
    pub period_end: String,
}

impl QuotaBalanceResponse {
    pub fn from_period(period: &QuotaPeriod, now: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: period.vehicle_id.to_string(),
            fuel_type: period.fuel_type.to_string(),
            allocated_quota: period.allocated_quota,
            remaining_quota: period.remaining_quota,
            used_quota: period.used_quota(),
            usage_percentage: period.usage_percentage().round_dp(1),
            expiring_soon: period.is_expiring_soon(now),
            period_start: period.start_date.to_rfc3339(),
            period_end: period.end_date.to_rfc3339(),
        }
    }
}

/// Request de despacho de combustible desde una estación
#[derive(Debug, Deserialize, Validate)]
pub struct PumpFuelRequest {
    pub vehicle_id: Uuid,

    #[validate(length(min = 2, max = 20))]
    pub fuel_type: String,

    pub amount_liters: f64,

    pub station_name: Option<String>,
}

/// Response de despacho - cubre tanto el éxito como el saldo insuficiente
#[derive(Debug, Serialize)]
pub struct PumpFuelResponse {
    pub success: bool,
    pub vehicle_id: String,
    pub fuel_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_liters: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_before: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_after: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
}

/// Response de reset administrativo
#[derive(Debug, Serialize)]
pub struct QuotaResetResponse {
    pub vehicle_id: String,
    pub fuel_type: String,
    pub allocated_quota: Decimal,
    pub remaining_quota: Decimal,
    pub period_start: String,
    pub period_end: String,
    pub message: String,
}

/// Resumen del barrido mensual de reasignación
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SweepSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_period(allocated: i64, remaining: i64) -> QuotaPeriod {
        let start = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 8, 31, 23, 59, 59).unwrap();
        QuotaPeriod {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            fuel_type: FuelType::Petrol,
            allocated_quota: Decimal::from(allocated),
            remaining_quota: Decimal::from(remaining),
            allocation_period: AllocationPeriod::Monthly,
            start_date: start,
            end_date: end,
            superseded_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_usage_percentage() {
        let period = sample_period(60, 15);
        assert_eq!(period.used_quota(), Decimal::from(45));
        assert_eq!(period.usage_percentage(), Decimal::from(75));
    }

    #[test]
    fn test_usage_percentage_zero_allocation() {
        let period = sample_period(0, 0);
        assert_eq!(period.usage_percentage(), Decimal::ZERO);
    }

    #[test]
    fn test_expiring_soon_window() {
        let period = sample_period(60, 60);
        let far = Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).unwrap();
        let near = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        assert!(!period.is_expiring_soon(far));
        assert!(period.is_expiring_soon(near));
    }

    #[test]
    fn test_is_active() {
        let mut period = sample_period(60, 60);
        let during = Utc.with_ymd_and_hms(2026, 8, 15, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        assert!(period.is_active(during));
        assert!(!period.is_active(after));

        period.superseded_at = Some(during);
        assert!(!period.is_active(during));
    }
}
