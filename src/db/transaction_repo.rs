// src/db/transaction_repo.rs

use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::transaction::{Transaction, TransactionKind, TransactionStatus},
};

const TRANSACTION_COLUMNS: &str = r#"
    id, ref_no, kind, status, current_stage, workflow, workflow_skipped_stages,
    escalated, escalated_by_role, created_by, employee_id, start_date, end_date,
    data, timeline, approval_chain, created_at, updated_at
"#;

#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Próximo número sequencial legível (TRX-000123).
    pub async fn next_ref_no<'e, E>(&self, executor: E) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let seq = sqlx::query_scalar::<_, i64>("SELECT nextval('transaction_ref_seq')")
            .fetch_one(executor)
            .await?;

        Ok(format!("TRX-{:06}", seq))
    }

    pub async fn insert(&self, t: &Transaction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, ref_no, kind, status, current_stage, workflow,
                workflow_skipped_stages, escalated, escalated_by_role, created_by,
                employee_id, start_date, end_date, data, timeline, approval_chain
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(t.id)
        .bind(&t.ref_no)
        .bind(t.kind)
        .bind(t.status)
        .bind(t.current_stage)
        .bind(Json(&t.workflow.0))
        .bind(Json(&t.workflow_skipped_stages.0))
        .bind(t.escalated)
        .bind(t.escalated_by_role)
        .bind(t.created_by)
        .bind(t.employee_id)
        .bind(t.start_date)
        .bind(t.end_date)
        .bind(Json(&t.data.0))
        .bind(Json(&t.timeline.0))
        .bind(Json(&t.approval_chain.0))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(transaction)
    }

    /// Serialização por id: o UPDATE só aplica se o status ainda for o lido.
    /// Impede duas aprovações concorrentes de avançar a mesma instância.
    pub async fn update_guarded(
        &self,
        t: &Transaction,
        expected: TransactionStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, current_stage = $2, escalated = $3,
                escalated_by_role = $4, timeline = $5, approval_chain = $6,
                updated_at = now()
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(t.status)
        .bind(t.current_stage)
        .bind(t.escalated)
        .bind(t.escalated_by_role)
        .bind(Json(&t.timeline.0))
        .bind(Json(&t.approval_chain.0))
        .bind(t.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict);
        }
        Ok(())
    }

    /// Transação EXECUTADA do tipo dado cobrindo a data: a evidência que o
    /// resolvedor diário consome (licença, missão, permissão, abono, correção).
    pub async fn find_executed_covering<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        kind: TransactionKind,
        date: NaiveDate,
    ) -> Result<Option<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE employee_id = $1 AND kind = $2 AND status = $3
              AND start_date <= $4 AND end_date >= $4
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(employee_id)
        .bind(kind)
        .bind(TransactionStatus::Executed)
        .bind(date)
        .fetch_optional(executor)
        .await?;

        Ok(transaction)
    }

    pub async fn list_executed_covering<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        kinds: &[TransactionKind],
        date: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE employee_id = $1 AND kind = ANY($2) AND status = $3
              AND start_date <= $4 AND end_date >= $4
            ORDER BY created_at ASC
            "#
        ))
        .bind(employee_id)
        .bind(kinds)
        .bind(TransactionStatus::Executed)
        .bind(date)
        .fetch_all(executor)
        .await?;

        Ok(transactions)
    }
}
