//! Services module
//!
//! Este módulo contiene la lógica de negocio del motor de cuotas: el
//! calculador de asignaciones, el ledger, el monitor de umbrales, el gateway
//! de notificaciones y el barrido mensual.

pub mod allocation_service;
pub mod notification_service;
pub mod quota_reset_sweep;
pub mod quota_service;
pub mod threshold_monitor;

pub use quota_service::*;
pub use threshold_monitor::*;
