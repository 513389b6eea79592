// src/db/punch_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::hr::{PunchEvent, PunchType},
};

/// Leitura do livro de ponto (append-only, alimentado fora do núcleo).
#[derive(Clone)]
pub struct PunchRepository {
    pool: PgPool,
}

impl PunchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Primeiro check-in do dia (o mais cedo).
    pub async fn first_check_in<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<PunchEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let punch = sqlx::query_as::<_, PunchEvent>(
            r#"
            SELECT id, employee_id, date, punch_type, time, created_at
            FROM punch_events
            WHERE employee_id = $1 AND date = $2 AND punch_type = $3
            ORDER BY time ASC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(PunchType::CheckIn)
        .fetch_optional(executor)
        .await?;

        Ok(punch)
    }

    /// Último check-out do dia (o mais tarde).
    pub async fn last_check_out<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<PunchEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let punch = sqlx::query_as::<_, PunchEvent>(
            r#"
            SELECT id, employee_id, date, punch_type, time, created_at
            FROM punch_events
            WHERE employee_id = $1 AND date = $2 AND punch_type = $3
            ORDER BY time DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(PunchType::CheckOut)
        .fetch_optional(executor)
        .await?;

        Ok(punch)
    }
}
