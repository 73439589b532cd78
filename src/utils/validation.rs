//! Utilidades de validación
//!
//! Este módulo contiene las validaciones de entrada del flujo de despacho.
//! El tope por transacción es responsabilidad del caller, no del ledger.

use rust_decimal::Decimal;

use crate::utils::errors::{AppError, AppResult};

/// Máximo de litros por transacción en una estación
pub const MAX_PUMP_LITERS: f64 = 100.0;

/// Validar y convertir el monto de litros de un despacho.
///
/// Rechaza montos no positivos, no finitos y los que superan el tope por
/// transacción de la estación.
pub fn parse_fuel_amount(amount_liters: f64) -> AppResult<Decimal> {
    if !amount_liters.is_finite() {
        return Err(AppError::BadRequest("Invalid fuel amount!".to_string()));
    }

    if amount_liters <= 0.0 {
        return Err(AppError::BadRequest("Invalid fuel amount!".to_string()));
    }

    if amount_liters > MAX_PUMP_LITERS {
        return Err(AppError::BadRequest(
            "Maximum 100 liters allowed per transaction!".to_string(),
        ));
    }

    Decimal::from_f64_retain(amount_liters)
        .ok_or_else(|| AppError::BadRequest("Invalid fuel amount!".to_string()))
}
