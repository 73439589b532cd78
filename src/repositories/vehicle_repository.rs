//! Repositorio Postgres de vehículos
//!
//! El motor de cuotas solo lee: la registración de vehículos y dueños es un
//! flujo externo que escribe estas tablas por su cuenta.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::vehicle::{FuelType, OwnerContact, Vehicle};
use crate::repositories::VehicleProvider;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    registration_number: String,
    vehicle_type: String,
    fuel_type: String,
    engine_capacity: Option<Decimal>,
    owner_phone: Option<String>,
    owner_email: Option<String>,
    created_at: DateTime<Utc>,
}

impl VehicleRow {
    fn into_model(self) -> AppResult<Vehicle> {
        let fuel_type = self
            .fuel_type
            .parse::<FuelType>()
            .map_err(AppError::Internal)?;

        Ok(Vehicle {
            id: self.id,
            registration_number: self.registration_number,
            vehicle_type: self.vehicle_type,
            fuel_type,
            engine_capacity: self.engine_capacity,
            owner: OwnerContact {
                phone_number: self.owner_phone,
                email: self.owner_email,
            },
            created_at: self.created_at,
        })
    }
}

pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleProvider for PgVehicleRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT v.id, v.registration_number, v.vehicle_type, v.fuel_type,
                   v.engine_capacity, v.created_at,
                   u.phone_number AS owner_phone, u.email AS owner_email
            FROM vehicles v
            JOIN users u ON u.id = v.owner_id
            WHERE v.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VehicleRow::into_model).transpose()
    }

    async fn list_all(&self) -> AppResult<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT v.id, v.registration_number, v.vehicle_type, v.fuel_type,
                   v.engine_capacity, v.created_at,
                   u.phone_number AS owner_phone, u.email AS owner_email
            FROM vehicles v
            JOIN users u ON u.id = v.owner_id
            ORDER BY v.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VehicleRow::into_model).collect()
    }
}
