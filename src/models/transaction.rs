// src/models/transaction.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::hr::{Actor, Employee, StaffRole};

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    LeaveRequest,
    MissionRequest,
    ForgottenPunch,
    PermissionRequest,
    LateExcuse,
    EarlyLeaveExcuse,
    FinancialCustody,
}

impl TransactionKind {
    /// Cadeia de etapas padrão por tipo de transação.
    pub fn base_workflow(self) -> Vec<Stage> {
        match self {
            TransactionKind::FinancialCustody => {
                vec![Stage::Finance, Stage::Ceo, Stage::Stas]
            }
            _ => vec![Stage::Supervisor, Stage::Operations, Stage::Stas],
        }
    }
}

/// Etapa de aprovação. O mapa etapa→papel é uma tabela tipada, verificada
/// por exaustividade em tempo de compilação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_stage", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Supervisor,
    Operations,
    Finance,
    Ceo,
    Stas,
}

impl Stage {
    pub fn authorized_role(self) -> StaffRole {
        match self {
            Stage::Supervisor => StaffRole::Supervisor,
            Stage::Operations => StaffRole::Operations,
            Stage::Finance => StaffRole::Finance,
            Stage::Ceo => StaffRole::Ceo,
            Stage::Stas => StaffRole::Stas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    PendingSupervisor,
    PendingOperations,
    PendingFinance,
    PendingCeo,
    PendingStas,
    Executed,
    Rejected,
    Cancelled,
}

impl TransactionStatus {
    pub fn pending(stage: Stage) -> Self {
        match stage {
            Stage::Supervisor => TransactionStatus::PendingSupervisor,
            Stage::Operations => TransactionStatus::PendingOperations,
            Stage::Finance => TransactionStatus::PendingFinance,
            Stage::Ceo => TransactionStatus::PendingCeo,
            Stage::Stas => TransactionStatus::PendingStas,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Executed
                | TransactionStatus::Rejected
                | TransactionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    Approve,
    Reject,
    Escalate,
    Execute,
    Cancel,
}

// --- Payloads por tipo ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveKind {
    Regular,
    Administrative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub leave_kind: LeaveKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPayload {
    pub hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgottenPunchPayload {
    pub claimed_check_in: NaiveTime,
    pub claimed_check_out: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcusePayload {
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyPayload {
    pub amount: Decimal,
    pub purpose: String,
}

// --- Auditoria ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub event: String,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub stage: Option<Stage>,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    pub stage: Stage,
    pub approver_id: Uuid,
    pub approver_name: String,
    pub status: String,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

// --- Montagem do workflow ---

#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    pub stages: Vec<Stage>,
    pub skipped: Vec<Stage>,
    pub escalated: bool,
}

/// Monta a cadeia de etapas para uma instância, aplicando as regras de poda:
/// - a etapa de supervisor cai quando o solicitante não tem supervisor, é o
///   próprio supervisor, ou o supervisor nominal não carrega o papel;
/// - requisição própria de solicitante privilegiado sobe direto ao CEO,
///   pulando Operações e preservando STAS como etapa final.
pub fn build_workflow(
    kind: TransactionKind,
    requester: &Employee,
    supervisor: Option<&Employee>,
) -> WorkflowPlan {
    let mut stages = kind.base_workflow();
    let mut skipped = Vec::new();

    if matches!(requester.role, StaffRole::Operations | StaffRole::Ceo)
        && stages.contains(&Stage::Operations)
    {
        skipped = stages
            .iter()
            .copied()
            .filter(|s| *s != Stage::Stas)
            .collect();
        return WorkflowPlan {
            stages: vec![Stage::Ceo, Stage::Stas],
            skipped,
            escalated: true,
        };
    }

    if stages.first() == Some(&Stage::Supervisor) {
        let skip = match (requester.supervisor_id, supervisor) {
            (None, _) => true,
            (Some(sid), _) if sid == requester.id => true,
            (Some(_), Some(sup)) => sup.role != StaffRole::Supervisor,
            (Some(_), None) => true,
        };
        if skip {
            stages.remove(0);
            skipped.push(Stage::Supervisor);
        }
    }

    WorkflowPlan {
        stages,
        skipped,
        escalated: false,
    }
}

// --- A transação ---

/// Unidade genérica de workflow. Invariantes:
/// - exatamente uma etapa atual por vez;
/// - timeline e approval_chain são append-only;
/// - após executed/rejected/cancelled o registro é imutável.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub ref_no: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub current_stage: Option<Stage>,
    pub workflow: Json<Vec<Stage>>,
    pub workflow_skipped_stages: Json<Vec<Stage>>,
    pub escalated: bool,

    // Papel do ator que escalou: congelado de agir enquanto o status
    // refletir a etapa de CEO.
    pub escalated_by_role: Option<StaffRole>,

    pub created_by: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data: Json<serde_json::Value>,
    pub timeline: Json<Vec<TimelineEvent>>,
    pub approval_chain: Json<Vec<ApprovalEntry>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Cria a transação já na primeira etapa da cadeia (possivelmente podada).
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        ref_no: String,
        kind: TransactionKind,
        employee: &Employee,
        supervisor: Option<&Employee>,
        created_by: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let plan = build_workflow(kind, employee, supervisor);
        let first = *plan.stages.first().ok_or_else(|| {
            AppError::invalid_transition("cadeia de etapas vazia para a transação")
        })?;

        let mut tx = Self {
            id: Uuid::new_v4(),
            ref_no,
            kind,
            status: TransactionStatus::pending(first),
            current_stage: Some(first),
            workflow: Json(plan.stages),
            workflow_skipped_stages: Json(plan.skipped),
            escalated: plan.escalated,
            escalated_by_role: None,
            created_by,
            employee_id: employee.id,
            start_date,
            end_date,
            data: Json(data),
            timeline: Json(vec![]),
            approval_chain: Json(vec![]),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tx.timeline.0.push(TimelineEvent {
            event: "created".to_string(),
            actor_id: created_by,
            actor_name: employee.full_name.clone(),
            stage: Some(first),
            at: now,
            note: None,
        });
        Ok(tx)
    }

    fn terminal_stage(&self) -> Stage {
        self.workflow.0.last().copied().unwrap_or(Stage::Stas)
    }

    /// Próxima etapa depois da atual. Quando a etapa atual não pertence à
    /// cadeia (escalada em meio de fluxo para o CEO), a próxima é a final.
    fn next_stage(&self, stage: Stage) -> Stage {
        match self.workflow.0.iter().position(|s| *s == stage) {
            Some(i) if i + 1 < self.workflow.0.len() => self.workflow.0[i + 1],
            _ => self.terminal_stage(),
        }
    }

    /// Autorização centralizada: a capacidade de override é verificada uma
    /// única vez aqui, nunca re-derivada por chamada.
    fn authorize(
        &self,
        actor: &Actor,
        stage: Stage,
        action: WorkflowAction,
    ) -> Result<(), AppError> {
        if matches!(
            action,
            WorkflowAction::Approve | WorkflowAction::Execute | WorkflowAction::Escalate
        ) && actor.id == self.created_by
        {
            return Err(AppError::invalid_transition(
                "auto-aprovação: o criador não pode aprovar a própria transação",
            ));
        }

        // O escalador fica congelado enquanto o status reflete a etapa de CEO.
        if stage == Stage::Ceo && self.escalated_by_role == Some(actor.role) {
            return Err(AppError::invalid_transition(
                "papel congelado: quem escalou não age enquanto a transação está com o CEO",
            ));
        }

        let terminal = self.terminal_stage();
        if stage == terminal {
            // Exclusividade da etapa final: nenhum outro papel executa ou
            // cancela, nem mesmo com override.
            if actor.role != terminal.authorized_role() {
                return Err(AppError::invalid_transition(format!(
                    "a etapa final aceita apenas o papel {:?}, ator tem {:?}",
                    terminal.authorized_role(),
                    actor.role
                )));
            }
            return Ok(());
        }

        if actor.has_override_authority {
            return Ok(());
        }
        if actor.role != stage.authorized_role() {
            return Err(AppError::invalid_transition(format!(
                "a etapa {:?} aceita o papel {:?}, ator tem {:?}",
                stage,
                stage.authorized_role(),
                actor.role
            )));
        }
        Ok(())
    }

    fn push_timeline(
        &mut self,
        event: &str,
        actor: &Actor,
        stage: Option<Stage>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.timeline.0.push(TimelineEvent {
            event: event.to_string(),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            stage,
            at: now,
            note: note.map(|n| n.to_string()),
        });
    }

    fn push_approval(
        &mut self,
        stage: Stage,
        actor: &Actor,
        status: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.approval_chain.0.push(ApprovalEntry {
            stage,
            approver_id: actor.id,
            approver_name: actor.name.clone(),
            status: status.to_string(),
            at: now,
            note: note.map(|n| n.to_string()),
        });
    }

    /// Aplica uma ação de workflow. Toda recusa nomeia a invariante violada.
    pub fn apply(
        &mut self,
        actor: &Actor,
        action: WorkflowAction,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "transação {} imutável: status terminal {:?}",
                self.ref_no, self.status
            )));
        }
        let stage = self.current_stage.ok_or_else(|| {
            AppError::invalid_transition("transação pendente sem etapa atual")
        })?;
        self.authorize(actor, stage, action)?;

        match action {
            WorkflowAction::Approve => {
                if stage == self.terminal_stage() {
                    return Err(AppError::invalid_transition(
                        "a etapa final não aprova: use executar, rejeitar ou cancelar",
                    ));
                }
                let next = self.next_stage(stage);
                self.push_approval(stage, actor, "APPROVED", note, now);
                self.push_timeline("approved", actor, Some(stage), note, now);
                self.current_stage = Some(next);
                self.status = TransactionStatus::pending(next);
            }
            WorkflowAction::Escalate => {
                if self.escalated {
                    return Err(AppError::invalid_transition(
                        "transação já escalada uma vez",
                    ));
                }
                if stage == Stage::Ceo || stage == self.terminal_stage() {
                    return Err(AppError::invalid_transition(
                        "escalada só é permitida em etapa intermediária",
                    ));
                }
                self.escalated = true;
                self.escalated_by_role = Some(actor.role);
                self.push_approval(stage, actor, "ESCALATED", note, now);
                self.push_timeline("escalated", actor, Some(stage), note, now);
                self.current_stage = Some(Stage::Ceo);
                self.status = TransactionStatus::PendingCeo;
            }
            WorkflowAction::Reject => {
                self.push_approval(stage, actor, "REJECTED", note, now);
                if stage == Stage::Ceo && self.escalated_by_role.is_some() {
                    // O único retrocesso permitido em toda a máquina de
                    // estados: rejeição do CEO devolve para Operações.
                    self.push_timeline("returned_to_operations", actor, Some(stage), note, now);
                    self.current_stage = Some(Stage::Operations);
                    self.status = TransactionStatus::PendingOperations;
                } else {
                    self.push_timeline("rejected", actor, Some(stage), note, now);
                    self.current_stage = None;
                    self.status = TransactionStatus::Rejected;
                }
            }
            WorkflowAction::Execute => {
                if stage != self.terminal_stage() {
                    return Err(AppError::invalid_transition(
                        "execução só é permitida na etapa final",
                    ));
                }
                self.push_approval(stage, actor, "EXECUTED", note, now);
                self.push_timeline("executed", actor, Some(stage), note, now);
                self.current_stage = None;
                self.status = TransactionStatus::Executed;
            }
            WorkflowAction::Cancel => {
                if stage != self.terminal_stage() {
                    return Err(AppError::invalid_transition(
                        "cancelamento só é permitido na etapa final",
                    ));
                }
                self.push_timeline("cancelled", actor, Some(stage), note, now);
                self.current_stage = None;
                self.status = TransactionStatus::Cancelled;
            }
        }

        self.updated_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(role: StaffRole, supervisor_id: Option<Uuid>) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            full_name: "Funcionário Teste".to_string(),
            role,
            supervisor_id,
            work_location_id: Uuid::new_v4(),
            is_active: true,
            created_at: None,
        }
    }

    fn actor(role: StaffRole) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            name: format!("Ator {:?}", role),
            role,
            has_override_authority: false,
        }
    }

    fn leave_tx(emp: &Employee, sup: Option<&Employee>) -> Transaction {
        Transaction::create(
            "TRX-000001".to_string(),
            TransactionKind::LeaveRequest,
            emp,
            sup,
            emp.id,
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            serde_json::json!({ "leaveKind": "REGULAR" }),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn full_chain_supervisor_ops_stas() {
        let sup_emp = employee(StaffRole::Supervisor, None);
        let emp = employee(StaffRole::Employee, Some(sup_emp.id));
        let mut tx = leave_tx(&emp, Some(&sup_emp));

        assert_eq!(tx.status, TransactionStatus::PendingSupervisor);
        assert_eq!(tx.current_stage, Some(Stage::Supervisor));

        let now = Utc::now();
        tx.apply(&actor(StaffRole::Supervisor), WorkflowAction::Approve, None, now)
            .unwrap();
        assert_eq!(tx.current_stage, Some(Stage::Operations));
        assert_eq!(tx.status, TransactionStatus::PendingOperations);

        tx.apply(&actor(StaffRole::Operations), WorkflowAction::Approve, None, now)
            .unwrap();
        assert_eq!(tx.current_stage, Some(Stage::Stas));

        tx.apply(&actor(StaffRole::Stas), WorkflowAction::Execute, None, now)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Executed);
        assert_eq!(tx.approval_chain.0.len(), 3);

        // Imutável depois de executada.
        let err = tx.apply(&actor(StaffRole::Stas), WorkflowAction::Cancel, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn supervisor_stage_trimmed_without_supervisor() {
        let emp = employee(StaffRole::Employee, None);
        let tx = leave_tx(&emp, None);
        assert_eq!(tx.status, TransactionStatus::PendingOperations);
        assert_eq!(tx.workflow.0, vec![Stage::Operations, Stage::Stas]);
        assert_eq!(tx.workflow_skipped_stages.0, vec![Stage::Supervisor]);
    }

    #[test]
    fn supervisor_stage_trimmed_when_nominal_supervisor_lacks_role() {
        let fake_sup = employee(StaffRole::Employee, None);
        let emp = employee(StaffRole::Employee, Some(fake_sup.id));
        let tx = leave_tx(&emp, Some(&fake_sup));
        assert_eq!(tx.status, TransactionStatus::PendingOperations);
    }

    #[test]
    fn privileged_self_request_escalates_to_ceo() {
        let emp = employee(StaffRole::Operations, None);
        let tx = leave_tx(&emp, None);
        assert!(tx.escalated);
        assert_eq!(tx.workflow.0, vec![Stage::Ceo, Stage::Stas]);
        assert_eq!(tx.status, TransactionStatus::PendingCeo);
    }

    #[test]
    fn self_approval_rejected() {
        let sup_emp = employee(StaffRole::Supervisor, None);
        let emp = employee(StaffRole::Employee, Some(sup_emp.id));
        let mut tx = leave_tx(&emp, Some(&sup_emp));

        // Mesmo com o papel certo, o criador não aprova o que criou.
        let creator = Actor {
            id: emp.id,
            name: emp.full_name.clone(),
            role: StaffRole::Supervisor,
            has_override_authority: false,
        };
        let err = tx.apply(&creator, WorkflowAction::Approve, None, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn wrong_role_rejected_with_reason() {
        let sup_emp = employee(StaffRole::Supervisor, None);
        let emp = employee(StaffRole::Employee, Some(sup_emp.id));
        let mut tx = leave_tx(&emp, Some(&sup_emp));

        let err = tx.apply(&actor(StaffRole::Finance), WorkflowAction::Approve, None, Utc::now());
        match err {
            Err(AppError::InvalidStateTransition(msg)) => {
                assert!(msg.contains("Supervisor"));
            }
            other => panic!("esperava InvalidStateTransition, veio {:?}", other),
        }
    }

    #[test]
    fn override_acts_on_any_mid_stage_but_not_terminal() {
        let sup_emp = employee(StaffRole::Supervisor, None);
        let emp = employee(StaffRole::Employee, Some(sup_emp.id));
        let mut tx = leave_tx(&emp, Some(&sup_emp));

        let mut admin = actor(StaffRole::Ceo);
        admin.has_override_authority = true;
        let now = Utc::now();

        tx.apply(&admin, WorkflowAction::Approve, None, now).unwrap();
        tx.apply(&admin, WorkflowAction::Approve, None, now).unwrap();
        assert_eq!(tx.current_stage, Some(Stage::Stas));

        // A etapa final continua exclusiva do papel STAS.
        let err = tx.apply(&admin, WorkflowAction::Execute, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn escalation_freezes_escalator_and_ceo_reject_returns_to_ops() {
        let emp = employee(StaffRole::Employee, None);
        let mut tx = leave_tx(&emp, None); // supervisor podado, começa em Operações

        let ops = actor(StaffRole::Operations);
        let now = Utc::now();
        tx.apply(&ops, WorkflowAction::Escalate, Some("caso sensível"), now)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::PendingCeo);
        assert!(tx.escalated);

        // O papel que escalou está congelado enquanto o CEO decide.
        let other_ops = actor(StaffRole::Operations);
        let err = tx.apply(&other_ops, WorkflowAction::Approve, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));

        // Rejeição do CEO: o único retrocesso permitido.
        tx.apply(&actor(StaffRole::Ceo), WorkflowAction::Reject, None, now)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::PendingOperations);
        assert_eq!(tx.current_stage, Some(Stage::Operations));

        // De volta em Operações, o fluxo segue normalmente até o fim.
        tx.apply(&ops, WorkflowAction::Approve, None, now).unwrap();
        assert_eq!(tx.current_stage, Some(Stage::Stas));
        tx.apply(&actor(StaffRole::Stas), WorkflowAction::Execute, None, now)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Executed);
    }

    #[test]
    fn ceo_approve_after_escalation_lands_on_terminal_stage() {
        let emp = employee(StaffRole::Employee, None);
        let mut tx = leave_tx(&emp, None);
        let now = Utc::now();

        tx.apply(&actor(StaffRole::Operations), WorkflowAction::Escalate, None, now)
            .unwrap();
        tx.apply(&actor(StaffRole::Ceo), WorkflowAction::Approve, None, now)
            .unwrap();
        assert_eq!(tx.current_stage, Some(Stage::Stas));
        assert_eq!(tx.status, TransactionStatus::PendingStas);
    }

    #[test]
    fn escalate_twice_rejected() {
        let emp = employee(StaffRole::Employee, None);
        let mut tx = leave_tx(&emp, None);
        let now = Utc::now();

        tx.apply(&actor(StaffRole::Operations), WorkflowAction::Escalate, None, now)
            .unwrap();
        tx.apply(&actor(StaffRole::Ceo), WorkflowAction::Reject, None, now)
            .unwrap();
        let err = tx.apply(&actor(StaffRole::Operations), WorkflowAction::Escalate, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn mid_stage_reject_is_terminal() {
        let sup_emp = employee(StaffRole::Supervisor, None);
        let emp = employee(StaffRole::Employee, Some(sup_emp.id));
        let mut tx = leave_tx(&emp, Some(&sup_emp));
        let now = Utc::now();

        tx.apply(&actor(StaffRole::Supervisor), WorkflowAction::Reject, None, now)
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Rejected);

        let err = tx.apply(&actor(StaffRole::Operations), WorkflowAction::Approve, None, now);
        assert!(matches!(err, Err(AppError::InvalidStateTransition(_))));
    }

    #[test]
    fn approval_chain_never_shrinks() {
        let emp = employee(StaffRole::Employee, None);
        let mut tx = leave_tx(&emp, None);
        let now = Utc::now();
        let mut last_len = tx.approval_chain.0.len();

        tx.apply(&actor(StaffRole::Operations), WorkflowAction::Approve, None, now)
            .unwrap();
        assert!(tx.approval_chain.0.len() >= last_len);
        last_len = tx.approval_chain.0.len();

        tx.apply(&actor(StaffRole::Stas), WorkflowAction::Reject, None, now)
            .unwrap();
        assert!(tx.approval_chain.0.len() >= last_len);
    }

    #[test]
    fn financial_custody_uses_finance_chain() {
        let emp = employee(StaffRole::Employee, None);
        let tx = Transaction::create(
            "TRX-000002".to_string(),
            TransactionKind::FinancialCustody,
            &emp,
            None,
            emp.id,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            serde_json::json!({ "amount": 500.0, "purpose": "adiantamento" }),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(tx.workflow.0, vec![Stage::Finance, Stage::Ceo, Stage::Stas]);
        assert_eq!(tx.status, TransactionStatus::PendingFinance);
    }
}
