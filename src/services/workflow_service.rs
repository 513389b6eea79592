// src/services/workflow_service.rs

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{HrRepository, TransactionRepository},
    models::{
        hr::Actor,
        transaction::{
            CustodyPayload, ExcusePayload, ForgottenPunchPayload, LeavePayload, PermissionPayload,
            Transaction, TransactionKind, WorkflowAction,
        },
    },
};

/// Valida o payload tipado do tipo de transação antes de criar a instância.
/// Dados malformados são recusados na porta, não no momento da execução.
fn validate_payload(kind: TransactionKind, data: &serde_json::Value) -> Result<(), AppError> {
    let invalid =
        |e: serde_json::Error| AppError::invalid_transition(format!("payload inválido para {:?}: {}", kind, e));

    match kind {
        TransactionKind::LeaveRequest => {
            serde_json::from_value::<LeavePayload>(data.clone()).map_err(invalid)?;
        }
        TransactionKind::MissionRequest => {}
        TransactionKind::ForgottenPunch => {
            serde_json::from_value::<ForgottenPunchPayload>(data.clone()).map_err(invalid)?;
        }
        TransactionKind::PermissionRequest => {
            let payload =
                serde_json::from_value::<PermissionPayload>(data.clone()).map_err(invalid)?;
            if payload.hours <= 0.0 {
                return Err(AppError::invalid_transition(
                    "horas de permissão devem ser positivas",
                ));
            }
        }
        TransactionKind::LateExcuse | TransactionKind::EarlyLeaveExcuse => {
            serde_json::from_value::<ExcusePayload>(data.clone()).map_err(invalid)?;
        }
        TransactionKind::FinancialCustody => {
            serde_json::from_value::<CustodyPayload>(data.clone()).map_err(invalid)?;
        }
    }
    Ok(())
}

/// Porta de entrada do motor de workflow: cria instâncias já na primeira
/// etapa da cadeia podada e aplica ações com trava otimista por id.
#[derive(Clone)]
pub struct WorkflowService {
    pool: PgPool,
    hr_repo: HrRepository,
    transaction_repo: TransactionRepository,
}

impl WorkflowService {
    pub fn new(pool: PgPool, hr_repo: HrRepository, transaction_repo: TransactionRepository) -> Self {
        Self {
            pool,
            hr_repo,
            transaction_repo,
        }
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        self.transaction_repo
            .get(&self.pool, id)
            .await?
            .ok_or(AppError::TransactionNotFound)
    }

    pub async fn create_transaction(
        &self,
        created_by: Uuid,
        employee_id: Uuid,
        kind: TransactionKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        data: serde_json::Value,
    ) -> Result<Transaction, AppError> {
        if start_date > end_date {
            return Err(AppError::invalid_transition(
                "data inicial posterior à data final",
            ));
        }
        validate_payload(kind, &data)?;

        let employee = self
            .hr_repo
            .get_employee(&self.pool, employee_id)
            .await?
            .ok_or(AppError::EmployeeNotFound)?;
        let supervisor = match employee.supervisor_id {
            Some(supervisor_id) => self.hr_repo.get_employee(&self.pool, supervisor_id).await?,
            None => None,
        };

        let ref_no = self.transaction_repo.next_ref_no(&self.pool).await?;
        let transaction = Transaction::create(
            ref_no,
            kind,
            &employee,
            supervisor.as_ref(),
            created_by,
            start_date,
            end_date,
            data,
            Utc::now(),
        )?;
        self.transaction_repo.insert(&transaction).await?;

        tracing::info!(
            ref_no = %transaction.ref_no,
            kind = ?kind,
            employee = %employee_id,
            status = ?transaction.status,
            "transação criada"
        );
        Ok(transaction)
    }

    /// Aplica uma ação de workflow com trava otimista: se outra aprovação
    /// avançou a instância entre a leitura e a escrita, o chamador recebe
    /// um conflito e deve reler.
    pub async fn advance_transaction(
        &self,
        id: Uuid,
        actor: &Actor,
        action: WorkflowAction,
        note: Option<&str>,
    ) -> Result<Transaction, AppError> {
        let mut transaction = self.get_transaction(id).await?;
        let expected = transaction.status;
        transaction.apply(actor, action, note, Utc::now())?;
        self.transaction_repo
            .update_guarded(&transaction, expected)
            .await?;

        tracing::info!(
            ref_no = %transaction.ref_no,
            action = ?action,
            actor = %actor.id,
            status = ?transaction.status,
            "ação de workflow aplicada"
        );
        Ok(transaction)
    }
}
