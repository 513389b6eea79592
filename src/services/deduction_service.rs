// src/services/deduction_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::PolicyConfig,
    db::{DeductionRepository, FinanceRepository, HrRepository},
    models::{
        deduction::{
            CalcInput, DeductionExplanation, DeductionProposal, DeductionType, ProposalStatus,
        },
        hr::Actor,
    },
    services::monthly_service::month_bounds,
};

/// Valor da dedução por um dia de falta: salário mensal dividido pelo
/// divisor de política (30 por padrão).
pub fn absence_amount(monthly_salary: Decimal, divisor_days: u32) -> Decimal {
    (monthly_salary / Decimal::from(divisor_days)).round_dp(2)
}

/// Valor da dedução por déficit de horas: valor-hora (salário / 240 por
/// padrão) multiplicado pelas horas em débito.
pub fn deficit_amount(
    monthly_salary: Decimal,
    divisor_hours: u32,
    deficit_hours: f64,
) -> Result<Decimal, AppError> {
    let hourly = monthly_salary / Decimal::from(divisor_hours);
    let deficit = Decimal::try_from(deficit_hours).map_err(anyhow::Error::from)?;
    Ok((hourly * deficit).round_dp(2))
}

/// Ciclo de vida propor→revisar→executar das deduções. Este serviço é o
/// único caminho do núcleo que escreve na razão financeira.
#[derive(Clone)]
pub struct DeductionService {
    pool: PgPool,
    hr_repo: HrRepository,
    deduction_repo: DeductionRepository,
    finance_repo: FinanceRepository,
    policy: PolicyConfig,
}

impl DeductionService {
    pub fn new(
        pool: PgPool,
        hr_repo: HrRepository,
        deduction_repo: DeductionRepository,
        finance_repo: FinanceRepository,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            pool,
            hr_repo,
            deduction_repo,
            finance_repo,
            policy,
        }
    }

    pub async fn get_proposal(&self, id: Uuid) -> Result<DeductionProposal, AppError> {
        self.deduction_repo
            .get_proposal(&self.pool, id)
            .await?
            .ok_or(AppError::ProposalNotFound)
    }

    /// Proposta por um dia ABSENT. Idempotente: reprocessar o mesmo dia não
    /// duplica (propostas canceladas não contam como existentes).
    pub async fn create_absence_proposal(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
        source_record_id: Uuid,
    ) -> Result<Option<DeductionProposal>, AppError> {
        if self
            .deduction_repo
            .exists_absence_proposal(&self.pool, employee_id, date)
            .await?
        {
            tracing::debug!(employee = %employee_id, %date, "proposta de falta já existe, pulando");
            return Ok(None);
        }

        let contract = self
            .hr_repo
            .get_active_contract(&self.pool, employee_id)
            .await?
            .ok_or(AppError::ContractNotFound)?;

        let divisor = self.policy.absence_divisor_days;
        let amount = absence_amount(contract.monthly_salary, divisor);

        use chrono::Datelike;
        let proposal = DeductionProposal {
            id: Uuid::new_v4(),
            employee_id,
            amount,
            currency: self.policy.currency.clone(),
            deduction_type: DeductionType::Absence,
            period_start: date,
            period_end: date,
            year: date.year(),
            month: date.month() as i32,
            explanation: Json(DeductionExplanation {
                reason_code: "absence".to_string(),
                reason_text: format!("Falta sem justificativa em {}", date),
                formula: format!("salario_mensal / {}", divisor),
                inputs: vec![
                    CalcInput {
                        name: "salario_mensal".to_string(),
                        value: contract.monthly_salary.to_string(),
                    },
                    CalcInput {
                        name: "divisor_dias".to_string(),
                        value: divisor.to_string(),
                    },
                ],
            }),
            source_records: Json(vec![source_record_id]),
            status: ProposalStatus::Pending,
            created_by: None,
            reviewed_by: None,
            reviewed_at: None,
            executed_by: None,
            executed_at: None,
            finance_ledger_id: None,
            status_history: Json(vec![]),
            created_at: None,
        };

        self.deduction_repo.insert_proposal(&proposal).await?;
        tracing::info!(
            employee = %employee_id,
            %date,
            amount = %proposal.amount,
            "proposta de dedução por falta criada"
        );
        Ok(Some(proposal))
    }

    /// Proposta pelo déficit de horas de um mês finalizado. Idempotente por
    /// (funcionário, ano, mês).
    pub async fn create_deficit_proposal(
        &self,
        employee_id: Uuid,
        year: i32,
        month: i32,
        deficit_hours: f64,
        source_record_id: Uuid,
    ) -> Result<Option<DeductionProposal>, AppError> {
        if deficit_hours <= 0.0 {
            return Ok(None);
        }
        if self
            .deduction_repo
            .exists_deficit_proposal(&self.pool, employee_id, year, month)
            .await?
        {
            tracing::debug!(employee = %employee_id, year, month, "proposta de déficit já existe, pulando");
            return Ok(None);
        }

        let contract = self
            .hr_repo
            .get_active_contract(&self.pool, employee_id)
            .await?
            .ok_or(AppError::ContractNotFound)?;

        let divisor = self.policy.monthly_hours_divisor;
        let amount = deficit_amount(contract.monthly_salary, divisor, deficit_hours)?;
        let (period_start, period_end) = month_bounds(year, month)?;

        let proposal = DeductionProposal {
            id: Uuid::new_v4(),
            employee_id,
            amount,
            currency: self.policy.currency.clone(),
            deduction_type: DeductionType::HoursDeficit,
            period_start,
            period_end,
            year,
            month,
            explanation: Json(DeductionExplanation {
                reason_code: "hours_deficit".to_string(),
                reason_text: format!(
                    "Déficit de {:.2} horas no mês {}/{:02}",
                    deficit_hours, year, month
                ),
                formula: format!("(salario_mensal / {}) * horas_em_deficit", divisor),
                inputs: vec![
                    CalcInput {
                        name: "salario_mensal".to_string(),
                        value: contract.monthly_salary.to_string(),
                    },
                    CalcInput {
                        name: "divisor_horas".to_string(),
                        value: divisor.to_string(),
                    },
                    CalcInput {
                        name: "horas_em_deficit".to_string(),
                        value: format!("{:.2}", deficit_hours),
                    },
                ],
            }),
            source_records: Json(vec![source_record_id]),
            status: ProposalStatus::Pending,
            created_by: None,
            reviewed_by: None,
            reviewed_at: None,
            executed_by: None,
            executed_at: None,
            finance_ledger_id: None,
            status_history: Json(vec![]),
            created_at: None,
        };

        self.deduction_repo.insert_proposal(&proposal).await?;
        tracing::info!(
            employee = %employee_id,
            year,
            month,
            amount = %proposal.amount,
            "proposta de dedução por déficit criada"
        );
        Ok(Some(proposal))
    }

    pub async fn review_proposal(
        &self,
        id: Uuid,
        actor: &Actor,
        approve: bool,
        note: Option<&str>,
    ) -> Result<DeductionProposal, AppError> {
        let mut proposal = self.get_proposal(id).await?;
        let expected = proposal.status;
        proposal.review(actor, approve, note, Utc::now())?;
        self.deduction_repo
            .update_proposal_guarded(&self.pool, &proposal, expected)
            .await?;
        Ok(proposal)
    }

    pub async fn cancel_proposal(
        &self,
        id: Uuid,
        actor: &Actor,
        note: Option<&str>,
    ) -> Result<DeductionProposal, AppError> {
        let mut proposal = self.get_proposal(id).await?;
        let expected = proposal.status;
        proposal.cancel(actor, note, Utc::now())?;
        self.deduction_repo
            .update_proposal_guarded(&self.pool, &proposal, expected)
            .await?;
        Ok(proposal)
    }

    /// Executa uma proposta APPROVED: lançamento na razão e carimbo EXECUTED
    /// na mesma transação de banco. Ou os dois efeitos acontecem, ou nenhum.
    pub async fn execute_proposal(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<DeductionProposal, AppError> {
        let mut proposal = self.get_proposal(id).await?;
        proposal.ensure_executable(actor)?;
        let expected = proposal.status;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let description = format!(
            "{} ({}/{:02})",
            proposal.explanation.0.reason_text, proposal.year, proposal.month
        );
        let ledger_id = self
            .finance_repo
            .insert_ledger_entry(
                &mut *tx,
                proposal.employee_id,
                proposal.amount,
                &proposal.currency,
                &description,
                proposal.id,
            )
            .await?;

        proposal.mark_executed(actor, ledger_id, now)?;
        self.deduction_repo
            .update_proposal_guarded(&mut *tx, &proposal, expected)
            .await?;

        tx.commit().await?;
        tracing::info!(
            proposal = %proposal.id,
            ledger = %ledger_id,
            amount = %proposal.amount,
            "dedução executada e lançada na razão"
        );
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_amount_is_salary_over_divisor() {
        let salary = Decimal::new(600000, 2); // 6000.00
        assert_eq!(absence_amount(salary, 30), Decimal::new(20000, 2)); // 200.00
    }

    #[test]
    fn absence_amount_rounds_to_cents() {
        let salary = Decimal::new(100000, 2); // 1000.00
        assert_eq!(absence_amount(salary, 30), Decimal::new(3333, 2)); // 33.33
    }

    #[test]
    fn deficit_amount_uses_hourly_rate() {
        let salary = Decimal::new(600000, 2); // 6000.00
        // 6000 / 240 = 25.00 por hora; 10 horas em débito = 250.00.
        let amount = deficit_amount(salary, 240, 10.0).unwrap();
        assert_eq!(amount, Decimal::new(25000, 2));
    }

    #[test]
    fn deficit_amount_fractional_hours() {
        let salary = Decimal::new(480000, 2); // 4800.00
        // 4800 / 240 = 20.00 por hora; 2.5 horas = 50.00.
        let amount = deficit_amount(salary, 240, 2.5).unwrap();
        assert_eq!(amount, Decimal::new(5000, 2));
    }
}
