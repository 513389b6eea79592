// src/models/job.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Falha individual dentro de uma varredura em lote. A falha de um
/// funcionário nunca aborta o lote; fica registrada aqui.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub employee_id: Uuid,
    pub error: String,
}

/// Sumário persistido de uma execução de job (diário ou mensal),
/// para observabilidade.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: Uuid,
    pub job_kind: String,
    pub target_period: String,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub failures: Json<Vec<JobFailure>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}
