//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos del motor de cuotas y los DTOs
//! que expone la API.

pub mod vehicle;
pub mod quota;
