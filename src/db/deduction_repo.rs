// src/db/deduction_repo.rs

use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::deduction::{
        DeductionProposal, DeductionType, ProposalStatus, WarningRecord, WarningType,
    },
};

const PROPOSAL_COLUMNS: &str = r#"
    id, employee_id, amount, currency, deduction_type, period_start, period_end,
    year, month, explanation, source_records, status, created_by,
    reviewed_by, reviewed_at, executed_by, executed_at, finance_ledger_id,
    status_history, created_at
"#;

const WARNING_COLUMNS: &str = r#"
    id, employee_id, warning_type, violation_type, reason, period_year,
    details, source_records, status, reviewed_by, reviewed_at,
    executed_by, executed_at, status_history, created_at
"#;

#[derive(Clone)]
pub struct DeductionRepository {
    pool: PgPool,
}

impl DeductionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  PROPOSTAS DE DEDUÇÃO
    // =========================================================================

    pub async fn insert_proposal(&self, p: &DeductionProposal) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO deduction_proposals (
                id, employee_id, amount, currency, deduction_type, period_start,
                period_end, year, month, explanation, source_records, status,
                created_by, status_history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(p.id)
        .bind(p.employee_id)
        .bind(p.amount)
        .bind(&p.currency)
        .bind(p.deduction_type)
        .bind(p.period_start)
        .bind(p.period_end)
        .bind(p.year)
        .bind(p.month)
        .bind(Json(&p.explanation.0))
        .bind(Json(&p.source_records.0))
        .bind(p.status)
        .bind(p.created_by)
        .bind(Json(&p.status_history.0))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_proposal<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<DeductionProposal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let proposal = sqlx::query_as::<_, DeductionProposal>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM deduction_proposals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(proposal)
    }

    /// Atualização com trava otimista: o UPDATE só aplica se o status ainda
    /// for o que o chamador leu. Zero linhas = corrida perdida.
    pub async fn update_proposal_guarded<'e, E>(
        &self,
        executor: E,
        p: &DeductionProposal,
        expected: ProposalStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE deduction_proposals
            SET status = $1, reviewed_by = $2, reviewed_at = $3, executed_by = $4,
                executed_at = $5, finance_ledger_id = $6, status_history = $7
            WHERE id = $8 AND status = $9
            "#,
        )
        .bind(p.status)
        .bind(p.reviewed_by)
        .bind(p.reviewed_at)
        .bind(p.executed_by)
        .bind(p.executed_at)
        .bind(p.finance_ledger_id)
        .bind(Json(&p.status_history.0))
        .bind(p.id)
        .bind(expected)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict);
        }
        Ok(())
    }

    /// Já existe proposta de falta não-cancelada para o dia?
    pub async fn exists_absence_proposal<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM deduction_proposals
                WHERE employee_id = $1 AND deduction_type = $2
                  AND period_start = $3 AND status <> $4
            )
            "#,
        )
        .bind(employee_id)
        .bind(DeductionType::Absence)
        .bind(date)
        .bind(ProposalStatus::Cancelled)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Já existe proposta de déficit não-cancelada para o mês?
    /// É o guarda de idempotência da finalização.
    pub async fn exists_deficit_proposal<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM deduction_proposals
                WHERE employee_id = $1 AND deduction_type = $2
                  AND year = $3 AND month = $4 AND status <> $5
            )
            "#,
        )
        .bind(employee_id)
        .bind(DeductionType::HoursDeficit)
        .bind(year)
        .bind(month)
        .bind(ProposalStatus::Cancelled)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    // =========================================================================
    //  ADVERTÊNCIAS
    // =========================================================================

    pub async fn insert_warning(&self, w: &WarningRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO warning_records (
                id, employee_id, warning_type, violation_type, reason, period_year,
                details, source_records, status, status_history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(w.id)
        .bind(w.employee_id)
        .bind(w.warning_type)
        .bind(w.violation_type)
        .bind(&w.reason)
        .bind(w.period_year)
        .bind(Json(&w.details.0))
        .bind(Json(&w.source_records.0))
        .bind(w.status)
        .bind(Json(&w.status_history.0))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_warning<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<WarningRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let warning = sqlx::query_as::<_, WarningRecord>(&format!(
            "SELECT {WARNING_COLUMNS} FROM warning_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(warning)
    }

    pub async fn update_warning_guarded(
        &self,
        w: &WarningRecord,
        expected: ProposalStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE warning_records
            SET status = $1, reviewed_by = $2, reviewed_at = $3, executed_by = $4,
                executed_at = $5, status_history = $6
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(w.status)
        .bind(w.reviewed_by)
        .bind(w.reviewed_at)
        .bind(w.executed_by)
        .bind(w.executed_at)
        .bind(Json(&w.status_history.0))
        .bind(w.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict);
        }
        Ok(())
    }

    /// Guarda de idempotência: uma advertência por (funcionário, tipo, ano),
    /// ignorando canceladas.
    pub async fn exists_warning<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        warning_type: WarningType,
        period_year: i32,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM warning_records
                WHERE employee_id = $1 AND warning_type = $2
                  AND period_year = $3 AND status <> $4
            )
            "#,
        )
        .bind(employee_id)
        .bind(warning_type)
        .bind(period_year)
        .bind(ProposalStatus::Cancelled)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }
}
