// src/db/finance_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;

/// Escrita na razão financeira externa. Todo o núcleo converge para um único
/// caminho de escrita: DeductionService::execute_proposal. Nenhum outro
/// código pode inserir lançamentos.
#[derive(Clone)]
pub struct FinanceRepository {
    pool: PgPool,
}

impl FinanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_ledger_entry<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
        amount: Decimal,
        currency: &str,
        description: &str,
        proposal_id: Uuid,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO finance_ledger_entries (employee_id, amount, currency, description, proposal_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(employee_id)
        .bind(amount)
        .bind(currency)
        .bind(description)
        .bind(proposal_id)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }
}
