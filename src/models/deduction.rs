// src/models/deduction.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::hr::{Actor, StaffRole};

// Separação estrutural de papéis: quem revisa nunca é quem executa.
pub const REVIEWER_ROLE: StaffRole = StaffRole::Operations;
pub const EXECUTOR_ROLE: StaffRole = StaffRole::Stas;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "deduction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeductionType {
    Absence,
    HoursDeficit,
    Late,
    EarlyLeave,
    Violation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proposal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected | ProposalStatus::Executed | ProposalStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "warning_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    FirstWarning,
    SecondWarning,
    ThirdWarning,
    TerminationCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "violation_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    ConsecutiveAbsence,
    ScatteredAbsence,
}

// --- Structs ---

/// Auditoria de transição: toda mudança de status gera uma entrada, nunca
/// reescrita.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
    pub actor_id: Option<Uuid>,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Uma entrada numérica da derivação (nome + valor), na ordem em que entra
/// na fórmula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcInput {
    pub name: String,
    pub value: String,
}

/// A derivação completa da proposta: motivo de máquina, texto humano,
/// fórmula e todas as entradas numéricas. Capturada verbatim na criação
/// para a trilha de auditoria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionExplanation {
    pub reason_code: String,
    pub reason_text: String,
    pub formula: String,
    pub inputs: Vec<CalcInput>,
}

/// Proposta de dedução gerada pelo sistema, à espera de revisão humana.
/// Invariante: finance_ledger_id é não-nulo se e somente se status == EXECUTED.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeductionProposal {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub deduction_type: DeductionType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub explanation: Json<DeductionExplanation>,
    pub source_records: Json<Vec<Uuid>>,
    pub status: ProposalStatus,
    pub created_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub finance_ledger_id: Option<Uuid>,
    pub status_history: Json<Vec<StatusChange>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DeductionProposal {
    fn push_history(
        &mut self,
        from: ProposalStatus,
        to: ProposalStatus,
        actor_id: Option<Uuid>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.status_history.0.push(StatusChange {
            from,
            to,
            actor_id,
            at: now,
            note: note.map(|n| n.to_string()),
        });
    }

    fn ensure_reviewer(&self, actor: &Actor) -> Result<(), AppError> {
        if actor.role != REVIEWER_ROLE && !actor.has_override_authority {
            return Err(AppError::invalid_transition(format!(
                "papel {:?} não pode revisar propostas de dedução",
                actor.role
            )));
        }
        if actor.id == self.employee_id {
            return Err(AppError::invalid_transition(
                "o funcionário alvo não pode revisar a própria dedução",
            ));
        }
        if self.created_by == Some(actor.id) {
            return Err(AppError::invalid_transition(
                "o criador não pode revisar a própria proposta",
            ));
        }
        Ok(())
    }

    /// Revisa a proposta (APPROVED ou REJECTED). Exige status PENDING.
    pub fn review(
        &mut self,
        actor: &Actor,
        approve: bool,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.ensure_reviewer(actor)?;
        if self.status != ProposalStatus::Pending {
            return Err(AppError::invalid_transition(format!(
                "revisão exige status PENDING, encontrado {:?}",
                self.status
            )));
        }
        let to = if approve {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };
        self.push_history(self.status, to, Some(actor.id), note, now);
        self.status = to;
        self.reviewed_by = Some(actor.id);
        self.reviewed_at = Some(now);
        Ok(())
    }

    /// Cancela uma proposta ainda PENDING. Terminal.
    pub fn cancel(
        &mut self,
        actor: &Actor,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.ensure_reviewer(actor)?;
        if self.status != ProposalStatus::Pending {
            return Err(AppError::invalid_transition(format!(
                "cancelamento exige status PENDING, encontrado {:?}",
                self.status
            )));
        }
        self.push_history(self.status, ProposalStatus::Cancelled, Some(actor.id), note, now);
        self.status = ProposalStatus::Cancelled;
        Ok(())
    }

    /// Verifica se o ator pode executar a proposta no estado atual.
    /// A execução em si (escrita na razão financeira) fica no serviço: este é
    /// o único ponto do núcleo autorizado a movimentar dinheiro.
    pub fn ensure_executable(&self, actor: &Actor) -> Result<(), AppError> {
        if actor.role != EXECUTOR_ROLE {
            return Err(AppError::invalid_transition(format!(
                "somente o papel {:?} executa propostas, ator tem {:?}",
                EXECUTOR_ROLE, actor.role
            )));
        }
        if self.status != ProposalStatus::Approved {
            return Err(AppError::invalid_transition(format!(
                "execução exige status APPROVED, encontrado {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// Marca como EXECUTED, carimbando o id do lançamento na razão.
    pub fn mark_executed(
        &mut self,
        actor: &Actor,
        ledger_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.ensure_executable(actor)?;
        self.push_history(self.status, ProposalStatus::Executed, Some(actor.id), None, now);
        self.status = ProposalStatus::Executed;
        self.executed_by = Some(actor.id);
        self.executed_at = Some(now);
        self.finance_ledger_id = Some(ledger_id);
        Ok(())
    }
}

/// Limiares de política cruzados, registrados como evidência da advertência.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningDetails {
    pub threshold_days: u32,
    pub observed_days: u32,
}

/// Advertência (ou caso de desligamento) com a mesma disciplina
/// propor→revisar→executar das deduções. A execução nunca escreve na razão
/// financeira; dispara apenas a notificação ao funcionário.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WarningRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub warning_type: WarningType,
    pub violation_type: ViolationType,
    pub reason: String,
    pub period_year: i32,
    pub details: Json<WarningDetails>,
    pub source_records: Json<Vec<Uuid>>,
    pub status: ProposalStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub status_history: Json<Vec<StatusChange>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl WarningRecord {
    pub fn review(
        &mut self,
        actor: &Actor,
        approve: bool,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if actor.role != REVIEWER_ROLE && !actor.has_override_authority {
            return Err(AppError::invalid_transition(format!(
                "papel {:?} não pode revisar advertências",
                actor.role
            )));
        }
        if actor.id == self.employee_id {
            return Err(AppError::invalid_transition(
                "o funcionário alvo não pode revisar a própria advertência",
            ));
        }
        if self.status != ProposalStatus::Pending {
            return Err(AppError::invalid_transition(format!(
                "revisão exige status PENDING, encontrado {:?}",
                self.status
            )));
        }
        let to = if approve {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };
        self.status_history.0.push(StatusChange {
            from: self.status,
            to,
            actor_id: Some(actor.id),
            at: now,
            note: note.map(|n| n.to_string()),
        });
        self.status = to;
        self.reviewed_by = Some(actor.id);
        self.reviewed_at = Some(now);
        Ok(())
    }

    pub fn mark_executed(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), AppError> {
        if actor.role != EXECUTOR_ROLE {
            return Err(AppError::invalid_transition(format!(
                "somente o papel {:?} executa advertências, ator tem {:?}",
                EXECUTOR_ROLE, actor.role
            )));
        }
        if self.status != ProposalStatus::Approved {
            return Err(AppError::invalid_transition(format!(
                "execução exige status APPROVED, encontrado {:?}",
                self.status
            )));
        }
        self.status_history.0.push(StatusChange {
            from: self.status,
            to: ProposalStatus::Executed,
            actor_id: Some(actor.id),
            at: now,
            note: None,
        });
        self.status = ProposalStatus::Executed;
        self.executed_by = Some(actor.id);
        self.executed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: StaffRole) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            name: "Ator de Teste".to_string(),
            role,
            has_override_authority: false,
        }
    }

    fn proposal() -> DeductionProposal {
        DeductionProposal {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            amount: Decimal::new(10000, 2), // 100.00
            currency: "BRL".to_string(),
            deduction_type: DeductionType::Absence,
            period_start: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            year: 2025,
            month: 6,
            explanation: Json(DeductionExplanation {
                reason_code: "absence".to_string(),
                reason_text: "Falta sem justificativa".to_string(),
                formula: "salario_mensal / 30".to_string(),
                inputs: vec![],
            }),
            source_records: Json(vec![]),
            status: ProposalStatus::Pending,
            created_by: None,
            reviewed_by: None,
            reviewed_at: None,
            executed_by: None,
            executed_at: None,
            finance_ledger_id: None,
            status_history: Json(vec![]),
            created_at: None,
        }
    }

    #[test]
    fn executed_only_via_create_approve_execute() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        let executor = actor(StaffRole::Stas);
        let now = Utc::now();

        p.review(&reviewer, true, Some("ok"), now).unwrap();
        assert_eq!(p.status, ProposalStatus::Approved);

        let ledger_id = Uuid::new_v4();
        p.mark_executed(&executor, ledger_id, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Executed);
        assert_eq!(p.finance_ledger_id, Some(ledger_id));
        assert_eq!(p.status_history.0.len(), 2);
    }

    #[test]
    fn execute_pending_fails_and_ledger_stays_null() {
        let mut p = proposal();
        let executor = actor(StaffRole::Stas);
        let err = p.mark_executed(&executor, Uuid::new_v4(), Utc::now());
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
        assert_eq!(p.status, ProposalStatus::Pending);
        assert!(p.finance_ledger_id.is_none());
    }

    #[test]
    fn execute_rejected_fails() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        let executor = actor(StaffRole::Stas);
        let now = Utc::now();

        p.review(&reviewer, false, None, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Rejected);

        let err = p.mark_executed(&executor, Uuid::new_v4(), now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
        assert!(p.finance_ledger_id.is_none());
    }

    #[test]
    fn review_twice_fails() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        let now = Utc::now();
        p.review(&reviewer, true, None, now).unwrap();
        let err = p.review(&reviewer, true, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn reviewer_cannot_execute() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        let now = Utc::now();
        p.review(&reviewer, true, None, now).unwrap();
        // O papel revisor não tem autoridade de execução.
        let err = p.mark_executed(&reviewer, Uuid::new_v4(), now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn subject_employee_cannot_review() {
        let mut p = proposal();
        let mut reviewer = actor(StaffRole::Operations);
        reviewer.id = p.employee_id;
        let err = p.review(&reviewer, true, None, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn creator_cannot_review_own_proposal() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        p.created_by = Some(reviewer.id);
        let err = p.review(&reviewer, true, None, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn cancel_only_from_pending() {
        let mut p = proposal();
        let reviewer = actor(StaffRole::Operations);
        let now = Utc::now();
        p.review(&reviewer, true, None, now).unwrap();
        let err = p.cancel(&reviewer, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn warning_follows_same_discipline() {
        let mut w = WarningRecord {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            warning_type: WarningType::FirstWarning,
            violation_type: ViolationType::ConsecutiveAbsence,
            reason: "3 faltas consecutivas".to_string(),
            period_year: 2025,
            details: Json(WarningDetails {
                threshold_days: 3,
                observed_days: 4,
            }),
            source_records: Json(vec![]),
            status: ProposalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            executed_by: None,
            executed_at: None,
            status_history: Json(vec![]),
            created_at: None,
        };
        let now = Utc::now();
        let executor = actor(StaffRole::Stas);
        assert!(w.mark_executed(&executor, now).is_err());

        let reviewer = actor(StaffRole::Operations);
        w.review(&reviewer, true, None, now).unwrap();
        w.mark_executed(&executor, now).unwrap();
        assert_eq!(w.status, ProposalStatus::Executed);
    }
}
