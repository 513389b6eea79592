// src/db/attendance_repo.rs

use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::attendance::{DailyStatus, DayStatus, LockStatus, MonthlyHours},
};

const DAILY_STATUS_COLUMNS: &str = r#"
    id, employee_id, date, final_status, decision_source, reason,
    check_in_time, check_out_time, actual_hours, required_hours,
    late_minutes, early_leave_minutes, permission_hours, deduction_exempt,
    source_refs, trace_log, lock_status, corrections, created_at
"#;

/// A recomputação não atravessa o portão de finalização: registro trancado
/// fica como está.
fn ensure_unlocked(existing: Option<LockStatus>) -> Result<(), AppError> {
    if existing == Some(LockStatus::Locked) {
        return Err(AppError::invalid_transition(
            "registro trancado: o mês já foi finalizado",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Recomputação: apaga-e-reinsere dentro de uma única transação, para que
    /// nunca existam duas linhas para a mesma chave (funcionário, dia) e o
    /// trace sempre corresponda ao registro vigente. Um dia trancado pela
    /// finalização do mês nunca é substituído.
    pub async fn replace_daily_status(&self, status: &DailyStatus) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, LockStatus>(
            "SELECT lock_status FROM daily_statuses WHERE employee_id = $1 AND date = $2",
        )
        .bind(status.employee_id)
        .bind(status.date)
        .fetch_optional(&mut *tx)
        .await?;
        ensure_unlocked(existing)?;

        sqlx::query("DELETE FROM daily_statuses WHERE employee_id = $1 AND date = $2")
            .bind(status.employee_id)
            .bind(status.date)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO daily_statuses (
                id, employee_id, date, final_status, decision_source, reason,
                check_in_time, check_out_time, actual_hours, required_hours,
                late_minutes, early_leave_minutes, permission_hours, deduction_exempt,
                source_refs, trace_log, lock_status, corrections
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(status.id)
        .bind(status.employee_id)
        .bind(status.date)
        .bind(status.final_status)
        .bind(&status.decision_source)
        .bind(&status.reason)
        .bind(status.check_in_time)
        .bind(status.check_out_time)
        .bind(status.actual_hours)
        .bind(status.required_hours)
        .bind(status.late_minutes)
        .bind(status.early_leave_minutes)
        .bind(status.permission_hours)
        .bind(status.deduction_exempt)
        .bind(Json(&status.source_refs.0))
        .bind(Json(&status.trace_log.0))
        .bind(status.lock_status)
        .bind(Json(&status.corrections.0))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_daily_status<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyStatus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let status = sqlx::query_as::<_, DailyStatus>(&format!(
            "SELECT {DAILY_STATUS_COLUMNS} FROM daily_statuses WHERE employee_id = $1 AND date = $2"
        ))
        .bind(employee_id)
        .bind(date)
        .fetch_optional(executor)
        .await?;

        Ok(status)
    }

    pub async fn list_range<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyStatus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let statuses = sqlx::query_as::<_, DailyStatus>(&format!(
            r#"
            SELECT {DAILY_STATUS_COLUMNS}
            FROM daily_statuses
            WHERE employee_id = $1 AND date >= $2 AND date <= $3
            ORDER BY date ASC
            "#
        ))
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(statuses)
    }

    /// Dias ABSENT do ano, para o avaliador de penalidades.
    pub async fn list_absent_days<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyStatus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let statuses = sqlx::query_as::<_, DailyStatus>(&format!(
            r#"
            SELECT {DAILY_STATUS_COLUMNS}
            FROM daily_statuses
            WHERE employee_id = $1 AND date >= $2 AND date <= $3 AND final_status = $4
            ORDER BY date ASC
            "#
        ))
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .bind(DayStatus::Absent)
        .fetch_all(executor)
        .await?;

        Ok(statuses)
    }

    /// Aplica uma correção manual: só muda registros ainda abertos.
    pub async fn update_correction(&self, status: &DailyStatus) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE daily_statuses
            SET final_status = $1, reason = $2, corrections = $3
            WHERE id = $4 AND lock_status = $5
            "#,
        )
        .bind(status.final_status)
        .bind(&status.reason)
        .bind(Json(&status.corrections.0))
        .bind(status.id)
        .bind(LockStatus::Open)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict);
        }
        Ok(())
    }

    /// Tranca os dias do período contra correções (pós-finalização do mês).
    pub async fn lock_range(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE daily_statuses SET lock_status = $1 WHERE employee_id = $2 AND date >= $3 AND date <= $4",
        )
        .bind(LockStatus::Locked)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  HORAS MENSAIS
    // =========================================================================

    pub async fn get_monthly_hours<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Option<MonthlyHours>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, MonthlyHours>(
            r#"
            SELECT id, employee_id, year, month, required_hours, actual_hours,
                   permission_hours, compensation_hours, net_hours, deficit_hours,
                   deficit_days, working_days, present_days, absent_days, leave_days,
                   mission_days, holiday_days, weekend_days, late_days,
                   is_finalized, finalized_by, finalized_at, computed_at
            FROM monthly_hours
            WHERE employee_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(employee_id)
        .bind(year)
        .bind(month)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Upsert por chave (funcionário, ano, mês). Um mês finalizado nunca é
    /// sobrescrito: a cláusula WHERE do conflito devolve zero linhas e o
    /// chamador recebe um conflito.
    pub async fn upsert_monthly_hours(
        &self,
        record: &MonthlyHours,
    ) -> Result<MonthlyHours, AppError> {
        let saved = sqlx::query_as::<_, MonthlyHours>(
            r#"
            INSERT INTO monthly_hours (
                id, employee_id, year, month, required_hours, actual_hours,
                permission_hours, compensation_hours, net_hours, deficit_hours,
                deficit_days, working_days, present_days, absent_days, leave_days,
                mission_days, holiday_days, weekend_days, late_days, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, now())
            ON CONFLICT (employee_id, year, month) DO UPDATE SET
                required_hours = EXCLUDED.required_hours,
                actual_hours = EXCLUDED.actual_hours,
                permission_hours = EXCLUDED.permission_hours,
                compensation_hours = EXCLUDED.compensation_hours,
                net_hours = EXCLUDED.net_hours,
                deficit_hours = EXCLUDED.deficit_hours,
                deficit_days = EXCLUDED.deficit_days,
                working_days = EXCLUDED.working_days,
                present_days = EXCLUDED.present_days,
                absent_days = EXCLUDED.absent_days,
                leave_days = EXCLUDED.leave_days,
                mission_days = EXCLUDED.mission_days,
                holiday_days = EXCLUDED.holiday_days,
                weekend_days = EXCLUDED.weekend_days,
                late_days = EXCLUDED.late_days,
                computed_at = now()
            WHERE monthly_hours.is_finalized = FALSE
            RETURNING id, employee_id, year, month, required_hours, actual_hours,
                      permission_hours, compensation_hours, net_hours, deficit_hours,
                      deficit_days, working_days, present_days, absent_days, leave_days,
                      mission_days, holiday_days, weekend_days, late_days,
                      is_finalized, finalized_by, finalized_at, computed_at
            "#,
        )
        .bind(record.id)
        .bind(record.employee_id)
        .bind(record.year)
        .bind(record.month)
        .bind(record.required_hours)
        .bind(record.actual_hours)
        .bind(record.permission_hours)
        .bind(record.compensation_hours)
        .bind(record.net_hours)
        .bind(record.deficit_hours)
        .bind(record.deficit_days)
        .bind(record.working_days)
        .bind(record.present_days)
        .bind(record.absent_days)
        .bind(record.leave_days)
        .bind(record.mission_days)
        .bind(record.holiday_days)
        .bind(record.weekend_days)
        .bind(record.late_days)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ConcurrencyConflict)?;

        Ok(saved)
    }

    /// Portão de mão única: marca o mês como finalizado. Zero linhas afetadas
    /// significa que outro ator finalizou antes.
    pub async fn finalize_monthly_hours(
        &self,
        employee_id: Uuid,
        year: i32,
        month: i32,
        actor_id: Uuid,
    ) -> Result<Option<MonthlyHours>, AppError> {
        let record = sqlx::query_as::<_, MonthlyHours>(
            r#"
            UPDATE monthly_hours
            SET is_finalized = TRUE, finalized_by = $1, finalized_at = now()
            WHERE employee_id = $2 AND year = $3 AND month = $4 AND is_finalized = FALSE
            RETURNING id, employee_id, year, month, required_hours, actual_hours,
                      permission_hours, compensation_hours, net_hours, deficit_hours,
                      deficit_days, working_days, present_days, absent_days, leave_days,
                      mission_days, holiday_days, weekend_days, late_days,
                      is_finalized, finalized_by, finalized_at, computed_at
            "#,
        )
        .bind(actor_id)
        .bind(employee_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_allowed_for_new_or_open_record() {
        assert!(ensure_unlocked(None).is_ok());
        assert!(ensure_unlocked(Some(LockStatus::Open)).is_ok());
    }

    #[test]
    fn replace_refused_for_locked_record() {
        let err = ensure_unlocked(Some(LockStatus::Locked));
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }
}
