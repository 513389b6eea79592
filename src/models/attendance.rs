// src/models/attendance.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "day_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    Holiday,
    Weekend,
    OnLeave,
    OnAdminLeave,
    OnMission,
    Present,
    Late,
    EarlyLeave,
    Permission,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lock_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Open,
    Locked,
}

// --- Structs ---

/// Uma entrada do trace de resolução: toda regra tentada gera exatamente uma,
/// tenha casado ou não. É o mecanismo de auditoria que a revisão humana usa
/// para justificar o status final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub rule: String,
    pub checked: bool,
    pub matched: bool,
    pub details: String,
}

impl TraceEntry {
    pub fn new(rule: &str, matched: bool, details: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            checked: true,
            matched,
            details: details.into(),
        }
    }
}

/// Correção manual aplicada por um ator privilegiado. A lista é append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub actor_id: Uuid,
    pub reason: String,
    pub previous_status: DayStatus,
    pub new_status: DayStatus,
    pub at: DateTime<Utc>,
}

/// Referências aos registros-fonte que justificaram a decisão do dia.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRefs {
    pub holiday_id: Option<Uuid>,
    pub leave_transaction_id: Option<Uuid>,
    pub mission_transaction_id: Option<Uuid>,
    pub forgotten_punch_transaction_id: Option<Uuid>,
    pub permission_transaction_id: Option<Uuid>,
    pub excuse_transaction_ids: Vec<Uuid>,
    pub punch_ids: Vec<Uuid>,
}

/// O status de presença autoritativo de um (funcionário, dia).
/// Invariante: existe no máximo um registro por chave; a recomputação
/// apaga-e-reinsere para que o trace sempre corresponda ao registro atual.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatus {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub final_status: DayStatus,
    pub decision_source: String,
    pub reason: String,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub actual_hours: Option<f64>,
    pub required_hours: f64,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub permission_hours: f64,

    // Abono executado de atraso/saída antecipada: suprime a consequência de
    // dedução sem mudar o final_status (regra 8 da cadeia).
    pub deduction_exempt: bool,

    pub source_refs: Json<SourceRefs>,
    pub trace_log: Json<Vec<TraceEntry>>,
    pub lock_status: LockStatus,
    pub corrections: Json<Vec<Correction>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DailyStatus {
    /// O dia conta como dia de trabalho esperado? Feriados, fins de semana,
    /// licenças e missões executadas ficam fora das horas exigidas.
    pub fn is_expected_working_day(&self) -> bool {
        !matches!(
            self.final_status,
            DayStatus::Holiday
                | DayStatus::Weekend
                | DayStatus::OnLeave
                | DayStatus::OnAdminLeave
                | DayStatus::OnMission
        )
    }
}

/// Balanço mensal de horas, derivado integralmente dos DailyStatus do mês.
/// Invariantes: net_hours = actual + compensation − required;
/// deficit_hours = max(0, required − actual − compensation).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyHours {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub required_hours: f64,
    pub actual_hours: f64,
    pub permission_hours: f64,
    pub compensation_hours: f64,
    pub net_hours: f64,
    pub deficit_hours: f64,
    pub deficit_days: f64,
    pub working_days: i32,
    pub present_days: i32,
    pub absent_days: i32,
    pub leave_days: i32,
    pub mission_days: i32,
    pub holiday_days: i32,
    pub weekend_days: i32,
    pub late_days: i32,
    pub is_finalized: bool,
    pub finalized_by: Option<Uuid>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}
