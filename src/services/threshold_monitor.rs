//! Monitor de umbrales de saldo bajo
//!
//! Detección por flanco: un aviso se dispara solo cuando una deducción cruza
//! el umbral (antes por encima, después en o por debajo), nunca en cada
//! deducción posterior mientras el saldo ya está bajo. Si una misma deducción
//! cruza los dos umbrales, el aviso crítico suprime al de saldo bajo.

use rust_decimal::Decimal;
use serde::Serialize;

/// Umbral de saldo bajo (porcentaje de lo asignado)
pub const LOW_QUOTA_THRESHOLD_PCT: i64 = 20;
/// Umbral crítico (porcentaje de lo asignado)
pub const CRITICAL_QUOTA_THRESHOLD_PCT: i64 = 10;

/// Nivel de aviso que produce una deducción
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWarningLevel {
    Low,
    Critical,
}

impl QuotaWarningLevel {
    pub fn threshold_pct(&self) -> Decimal {
        match self {
            QuotaWarningLevel::Low => Decimal::from(LOW_QUOTA_THRESHOLD_PCT),
            QuotaWarningLevel::Critical => Decimal::from(CRITICAL_QUOTA_THRESHOLD_PCT),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuotaWarningLevel::Low => "low",
            QuotaWarningLevel::Critical => "critical",
        }
    }
}

/// Evaluar la transición saldo-antes -> saldo-después de una deducción.
///
/// Devuelve `Some(nivel)` solo si esta deducción cruzó un umbral.
pub fn evaluate_transition(
    allocated: Decimal,
    before: Decimal,
    after: Decimal,
) -> Option<QuotaWarningLevel> {
    if allocated <= Decimal::ZERO {
        return None;
    }

    let hundred = Decimal::from(100);
    let before_pct = before * hundred / allocated;
    let after_pct = after * hundred / allocated;

    let crossed = |threshold: Decimal| after_pct <= threshold && before_pct > threshold;

    if crossed(Decimal::from(CRITICAL_QUOTA_THRESHOLD_PCT)) {
        Some(QuotaWarningLevel::Critical)
    } else if crossed(Decimal::from(LOW_QUOTA_THRESHOLD_PCT)) {
        Some(QuotaWarningLevel::Low)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(allocated: i64, before: i64, after: i64) -> Option<QuotaWarningLevel> {
        evaluate_transition(
            Decimal::from(allocated),
            Decimal::from(before),
            Decimal::from(after),
        )
    }

    #[test]
    fn test_no_warning_above_thresholds() {
        assert_eq!(eval(100, 85, 75), None);
        assert_eq!(eval(100, 75, 65), None);
    }

    #[test]
    fn test_low_warning_fires_on_crossing() {
        assert_eq!(eval(100, 25, 18), Some(QuotaWarningLevel::Low));
    }

    #[test]
    fn test_low_warning_fires_exactly_at_threshold() {
        assert_eq!(eval(100, 21, 20), Some(QuotaWarningLevel::Low));
    }

    #[test]
    fn test_no_refire_while_already_below() {
        // Ya estaba por debajo del 20%: no se vuelve a avisar
        assert_eq!(eval(100, 18, 15), None);
    }

    #[test]
    fn test_critical_warning_fires_on_crossing() {
        assert_eq!(eval(100, 15, 5), Some(QuotaWarningLevel::Critical));
    }

    #[test]
    fn test_critical_suppresses_low_on_double_crossing() {
        // Una sola deducción cruza 20% y 10%: solo el aviso crítico
        assert_eq!(eval(100, 25, 8), Some(QuotaWarningLevel::Critical));
    }

    #[test]
    fn test_published_sequence_fires_exactly_twice() {
        // 85% -> 75% -> 65% -> 15% -> 5% de saldo restante
        let steps = [(85, 75), (75, 65), (65, 15), (15, 5)];
        let warnings: Vec<_> = steps
            .iter()
            .filter_map(|(before, after)| eval(100, *before, *after))
            .collect();
        assert_eq!(
            warnings,
            vec![QuotaWarningLevel::Low, QuotaWarningLevel::Critical]
        );
    }

    #[test]
    fn test_zero_allocation_never_warns() {
        assert_eq!(eval(0, 0, 0), None);
    }
}
