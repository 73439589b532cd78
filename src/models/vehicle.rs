//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle tal como lo consume el motor de
//! cuotas: solo lectura, la registración de vehículos vive en otro servicio.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Tipo de combustible - las cuotas se llevan por (vehículo, combustible)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "petrol" => Ok(FuelType::Petrol),
            "diesel" => Ok(FuelType::Diesel),
            other => Err(format!("Unknown fuel type: '{}'", other)),
        }
    }
}

/// Clase de vehículo según el registro de tránsito.
///
/// El parseo es total: una etiqueta desconocida cae en `Other` y el
/// calculador de asignaciones le aplica la base de un auto.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Car,
    Motorcycle,
    ThreeWheeler,
    Bus,
    Lorry,
    Other,
}

impl VehicleClass {
    /// Convertir la etiqueta libre del registro en una clase conocida
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "car" => VehicleClass::Car,
            "motorcycle" => VehicleClass::Motorcycle,
            "three wheeler" | "three-wheeler" | "three_wheeler" => VehicleClass::ThreeWheeler,
            "bus" => VehicleClass::Bus,
            "lorry" => VehicleClass::Lorry,
            _ => VehicleClass::Other,
        }
    }
}

/// Contacto del dueño para notificaciones SMS/email
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OwnerContact {
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// Vehicle tal como lo entrega el proveedor externo (solo lectura)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub registration_number: String,
    pub vehicle_type: String,
    pub fuel_type: FuelType,
    pub engine_capacity: Option<Decimal>,
    pub owner: OwnerContact,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn vehicle_class(&self) -> VehicleClass {
        VehicleClass::from_label(&self.vehicle_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_type_parse() {
        assert_eq!("Petrol".parse::<FuelType>().unwrap(), FuelType::Petrol);
        assert_eq!(" diesel ".parse::<FuelType>().unwrap(), FuelType::Diesel);
        assert!("kerosene".parse::<FuelType>().is_err());
    }

    #[test]
    fn test_vehicle_class_is_total() {
        assert_eq!(VehicleClass::from_label("Car"), VehicleClass::Car);
        assert_eq!(VehicleClass::from_label("three wheeler"), VehicleClass::ThreeWheeler);
        assert_eq!(VehicleClass::from_label("three-wheeler"), VehicleClass::ThreeWheeler);
        assert_eq!(VehicleClass::from_label("hovercraft"), VehicleClass::Other);
    }
}
