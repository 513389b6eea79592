// src/db/hr_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::hr::{Contract, Employee, Holiday, WorkLocation},
};

/// Dados de referência (funcionários, contratos, locais, feriados).
/// Somente leitura para o núcleo: o cadastro vive fora daqui.
#[derive(Clone)]
pub struct HrRepository {
    pool: PgPool,
}

impl HrRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_employee<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
    ) -> Result<Option<Employee>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, full_name, role, supervisor_id, work_location_id, is_active, created_at
            FROM employees
            WHERE id = $1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(executor)
        .await?;

        Ok(employee)
    }

    pub async fn list_active_employees<'e, E>(
        &self,
        executor: E,
    ) -> Result<Vec<Employee>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, full_name, role, supervisor_id, work_location_id, is_active, created_at
            FROM employees
            WHERE is_active = TRUE
            ORDER BY full_name ASC
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(employees)
    }

    pub async fn get_active_contract<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
    ) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(
            r#"
            SELECT id, employee_id, monthly_salary, start_date, end_date, is_active, created_at
            FROM contracts
            WHERE employee_id = $1 AND is_active = TRUE
            ORDER BY start_date DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(executor)
        .await?;

        Ok(contract)
    }

    pub async fn get_work_location<'e, E>(
        &self,
        executor: E,
        location_id: Uuid,
    ) -> Result<Option<WorkLocation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let location = sqlx::query_as::<_, WorkLocation>(
            r#"
            SELECT id, name, work_start, work_end, grace_checkin_min, grace_checkout_min,
                   daily_hours, weekend_days, created_at
            FROM work_locations
            WHERE id = $1
            "#,
        )
        .bind(location_id)
        .fetch_optional(executor)
        .await?;

        Ok(location)
    }

    /// Feriado oficial cobrindo a data, se houver.
    pub async fn get_holiday_for<'e, E>(
        &self,
        executor: E,
        date: NaiveDate,
    ) -> Result<Option<Holiday>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let holiday = sqlx::query_as::<_, Holiday>(
            r#"
            SELECT id, name, start_date, end_date, created_at
            FROM holidays
            WHERE start_date <= $1 AND end_date >= $1
            LIMIT 1
            "#,
        )
        .bind(date)
        .fetch_optional(executor)
        .await?;

        Ok(holiday)
    }
}
