//! Fuel Quota Management System
//!
//! Motor de cuotas mensuales de combustible: asignación por clase de
//! vehículo, deducción atómica en estaciones, avisos por cruce de umbral y
//! barrido mensual de reasignación.

pub mod config;
pub mod controllers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
