// src/models/hr.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "staff_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Employee,
    Supervisor, // Chefia imediata
    Operations, // RH / Operações
    Finance,    // Financeiro
    Ceo,
    Stas, // Etapa final: o único papel que executa
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "punch_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunchType {
    CheckIn,
    CheckOut,
}

// --- Structs ---

/// Quem está agindo sobre um registro. A autoridade de override é uma
/// capacidade explícita do ator, verificada uma única vez na autorização,
/// nunca re-derivada por chamada.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: StaffRole,
    pub has_override_authority: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub role: StaffRole,
    pub supervisor_id: Option<Uuid>,
    pub work_location_id: Uuid,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub monthly_salary: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkLocation {
    pub id: Uuid,
    pub name: String,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub grace_checkin_min: i32,
    pub grace_checkout_min: i32,
    pub daily_hours: f64,

    // Dias ISO da semana (Seg=1 .. Dom=7). Padrão: Sexta + Sábado.
    pub weekend_days: Vec<i16>,

    pub created_at: Option<DateTime<Utc>>,
}

impl WorkLocation {
    /// O dia cai no padrão de fim de semana deste local?
    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let iso = date.weekday().number_from_monday() as i16;
        self.weekend_days.contains(&iso)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PunchEvent {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub punch_type: PunchType,
    pub time: NaiveTime,
    pub created_at: Option<DateTime<Utc>>,
}
