//! Repositorio Postgres del libro de cuotas
//!
//! La deducción es un único UPDATE condicional ("restar donde
//! remaining >= monto"): el chequeo y la resta ocurren en el mismo statement,
//! así dos despachos concurrentes nunca pueden sobregirar el saldo. La
//! rotación de período corre dentro de una transacción y el índice único
//! parcial sobre la fila activa garantiza un solo registro por clave.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::quota::{AllocationPeriod, NewQuotaPeriod, QuotaPeriod};
use crate::models::vehicle::FuelType;
use crate::repositories::QuotaStore;
use crate::utils::errors::{AppError, AppResult};

/// Fila cruda de la tabla fuel_quotas
#[derive(Debug, sqlx::FromRow)]
struct QuotaPeriodRow {
    id: Uuid,
    vehicle_id: Uuid,
    fuel_type: String,
    allocated_quota: Decimal,
    remaining_quota: Decimal,
    allocation_period: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    superseded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuotaPeriodRow {
    fn into_model(self) -> AppResult<QuotaPeriod> {
        let fuel_type = self
            .fuel_type
            .parse::<FuelType>()
            .map_err(AppError::Internal)?;

        let allocation_period = match self.allocation_period.as_str() {
            "monthly" => AllocationPeriod::Monthly,
            other => {
                return Err(AppError::Internal(format!(
                    "Unknown allocation period in fuel_quotas row: '{}'",
                    other
                )))
            }
        };

        Ok(QuotaPeriod {
            id: self.id,
            vehicle_id: self.vehicle_id,
            fuel_type,
            allocated_quota: self.allocated_quota,
            remaining_quota: self.remaining_quota,
            allocation_period,
            start_date: self.start_date,
            end_date: self.end_date,
            superseded_at: self.superseded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct PgQuotaRepository {
    pool: PgPool,
}

impl PgQuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaStore for PgQuotaRepository {
    async fn find_active(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        let row = sqlx::query_as::<_, QuotaPeriodRow>(
            r#"
            SELECT * FROM fuel_quotas
            WHERE vehicle_id = $1 AND fuel_type = $2
              AND superseded_at IS NULL AND end_date >= $3
            "#,
        )
        .bind(vehicle_id)
        .bind(fuel_type.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuotaPeriodRow::into_model).transpose()
    }

    async fn rotate_period(
        &self,
        new_period: NewQuotaPeriod,
        now: DateTime<Utc>,
        supersede_active: bool,
    ) -> AppResult<QuotaPeriod> {
        let mut tx = self.pool.begin().await?;

        // Cerrar (no borrar) el registro vigente: las filas supersedidas
        // quedan como historial de auditoría
        if supersede_active {
            sqlx::query(
                r#"
                UPDATE fuel_quotas
                SET superseded_at = $3, updated_at = $3
                WHERE vehicle_id = $1 AND fuel_type = $2 AND superseded_at IS NULL
                "#,
            )
            .bind(new_period.vehicle_id)
            .bind(new_period.fuel_type.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        } else {
            // Camino perezoso: solo se cierran registros ya vencidos, nunca
            // uno activo que otro caller pueda estar debitando
            sqlx::query(
                r#"
                UPDATE fuel_quotas
                SET superseded_at = $3, updated_at = $3
                WHERE vehicle_id = $1 AND fuel_type = $2
                  AND superseded_at IS NULL AND end_date < $3
                "#,
            )
            .bind(new_period.vehicle_id)
            .bind(new_period.fuel_type.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // El índice único parcial hace que dos creaciones concurrentes
        // converjan: la que pierde no inserta nada y relee la fila ganadora
        sqlx::query(
            r#"
            INSERT INTO fuel_quotas
                (id, vehicle_id, fuel_type, allocated_quota, remaining_quota,
                 allocation_period, start_date, end_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_period.vehicle_id)
        .bind(new_period.fuel_type.as_str())
        .bind(new_period.allocated_quota)
        .bind(new_period.allocation_period.as_str())
        .bind(new_period.start_date)
        .bind(new_period.end_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, QuotaPeriodRow>(
            r#"
            SELECT * FROM fuel_quotas
            WHERE vehicle_id = $1 AND fuel_type = $2
              AND superseded_at IS NULL AND end_date >= $3
            "#,
        )
        .bind(new_period.vehicle_id)
        .bind(new_period.fuel_type.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        row.ok_or_else(|| {
            AppError::Internal(format!(
                "No active quota record after rotation for vehicle {}",
                new_period.vehicle_id
            ))
        })?
        .into_model()
    }

    async fn deduct_if_sufficient(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        let row = sqlx::query_as::<_, QuotaPeriodRow>(
            r#"
            UPDATE fuel_quotas
            SET remaining_quota = remaining_quota - $3, updated_at = $4
            WHERE vehicle_id = $1 AND fuel_type = $2
              AND superseded_at IS NULL AND end_date >= $4
              AND remaining_quota >= $3
            RETURNING *
            "#,
        )
        .bind(vehicle_id)
        .bind(fuel_type.as_str())
        .bind(amount)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuotaPeriodRow::into_model).transpose()
    }
}
