//! Controllers del sistema
//!
//! Capa entre las rutas HTTP y los servicios del motor de cuotas.

pub mod quota_controller;
