// src/db/job_repo.rs

use sqlx::types::Json;
use sqlx::PgPool;

use crate::{common::error::AppError, models::job::JobRun};

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_run(&self, run: &JobRun) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (
                id, job_kind, target_period, processed, succeeded, failed,
                failures, started_at, finished_at, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(run.id)
        .bind(&run.job_kind)
        .bind(&run.target_period)
        .bind(run.processed)
        .bind(run.succeeded)
        .bind(run.failed)
        .bind(Json(&run.failures.0))
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
