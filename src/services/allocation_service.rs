//! Calculador de asignaciones mensuales
//!
//! Función pura: (clase de vehículo, combustible, cilindrada) -> litros del
//! período. Sin estado ni I/O, segura para llamar desde cualquier cantidad de
//! callers concurrentes.

use rust_decimal::Decimal;

use crate::models::vehicle::{FuelType, VehicleClass};

// Asignaciones mensuales por defecto (en litros)
const PETROL_CAR_QUOTA: i64 = 60;
const PETROL_MOTORCYCLE_QUOTA: i64 = 20;
const PETROL_THREE_WHEELER_QUOTA: i64 = 40;
const DIESEL_CAR_QUOTA: i64 = 80;
const DIESEL_COMMERCIAL_QUOTA: i64 = 200;

// Bono por cilindrada alta en autos nafteros
const HIGH_DISPLACEMENT_THRESHOLD_CC: i64 = 1800;
const HIGH_DISPLACEMENT_BONUS: i64 = 20;

/// Calcular la asignación mensual para un vehículo.
///
/// Función total: toda combinación clase/combustible tiene un valor; las
/// clases no reconocidas caen en la base de un auto para ese combustible.
pub fn monthly_allocation(
    vehicle_class: VehicleClass,
    fuel_type: FuelType,
    engine_capacity: Option<Decimal>,
) -> Decimal {
    let liters = match fuel_type {
        FuelType::Petrol => match vehicle_class {
            VehicleClass::Car => {
                let over_threshold = engine_capacity
                    .map(|cc| cc > Decimal::from(HIGH_DISPLACEMENT_THRESHOLD_CC))
                    .unwrap_or(false);
                if over_threshold {
                    PETROL_CAR_QUOTA + HIGH_DISPLACEMENT_BONUS
                } else {
                    PETROL_CAR_QUOTA
                }
            }
            VehicleClass::Motorcycle => PETROL_MOTORCYCLE_QUOTA,
            VehicleClass::ThreeWheeler => PETROL_THREE_WHEELER_QUOTA,
            _ => PETROL_CAR_QUOTA,
        },
        FuelType::Diesel => match vehicle_class {
            VehicleClass::Bus | VehicleClass::Lorry => DIESEL_COMMERCIAL_QUOTA,
            _ => DIESEL_CAR_QUOTA,
        },
    };

    Decimal::from(liters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liters(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_petrol_car_with_high_displacement_gets_bonus() {
        let amount = monthly_allocation(
            VehicleClass::Car,
            FuelType::Petrol,
            Some(Decimal::from(2000)),
        );
        assert_eq!(amount, liters(80));
    }

    #[test]
    fn test_petrol_car_with_low_displacement() {
        let amount = monthly_allocation(
            VehicleClass::Car,
            FuelType::Petrol,
            Some(Decimal::from(1500)),
        );
        assert_eq!(amount, liters(60));
    }

    #[test]
    fn test_petrol_car_threshold_is_exclusive() {
        let amount = monthly_allocation(
            VehicleClass::Car,
            FuelType::Petrol,
            Some(Decimal::from(1800)),
        );
        assert_eq!(amount, liters(60));
    }

    #[test]
    fn test_petrol_car_without_displacement() {
        let amount = monthly_allocation(VehicleClass::Car, FuelType::Petrol, None);
        assert_eq!(amount, liters(60));
    }

    #[test]
    fn test_petrol_motorcycle_and_three_wheeler() {
        assert_eq!(
            monthly_allocation(VehicleClass::Motorcycle, FuelType::Petrol, None),
            liters(20)
        );
        assert_eq!(
            monthly_allocation(VehicleClass::ThreeWheeler, FuelType::Petrol, None),
            liters(40)
        );
    }

    #[test]
    fn test_diesel_commercial_vehicles() {
        assert_eq!(
            monthly_allocation(VehicleClass::Bus, FuelType::Diesel, None),
            liters(200)
        );
        assert_eq!(
            monthly_allocation(VehicleClass::Lorry, FuelType::Diesel, None),
            liters(200)
        );
    }

    #[test]
    fn test_diesel_car() {
        assert_eq!(
            monthly_allocation(VehicleClass::Car, FuelType::Diesel, None),
            liters(80)
        );
    }

    #[test]
    fn test_unknown_class_falls_back_to_car_baseline() {
        assert_eq!(
            monthly_allocation(VehicleClass::Other, FuelType::Petrol, None),
            liters(60)
        );
        assert_eq!(
            monthly_allocation(VehicleClass::Other, FuelType::Diesel, None),
            liters(80)
        );
        // Un colectivo naftero no tiene fila propia en la tabla publicada
        assert_eq!(
            monthly_allocation(VehicleClass::Bus, FuelType::Petrol, None),
            liters(60)
        );
    }
}
