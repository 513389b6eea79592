// src/services/job_service.rs

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::PolicyConfig,
    db::{HrRepository, JobRepository},
    models::{
        attendance::DayStatus,
        hr::Actor,
        job::{JobFailure, JobRun},
    },
    services::{
        day_resolver::DayResolverService, deduction_service::DeductionService,
        monthly_service::MonthlyService,
    },
};

/// Mês civil anterior ao dia dado.
pub fn previous_month(today: NaiveDate) -> Result<(i32, i32), AppError> {
    let last_of_previous = today
        .with_day(1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::invalid_transition("não há mês anterior à data mínima"))?;
    Ok((last_of_previous.year(), last_of_previous.month() as i32))
}

/// Varreduras em lote sobre a folha de funcionários ativos, com concorrência
/// limitada. A falha de um funcionário nunca aborta o lote: entra no sumário
/// e a varredura segue.
#[derive(Clone)]
pub struct JobService {
    hr_repo: HrRepository,
    job_repo: JobRepository,
    day_resolver: DayResolverService,
    deduction_service: DeductionService,
    monthly_service: MonthlyService,
    policy: PolicyConfig,
}

impl JobService {
    pub fn new(
        hr_repo: HrRepository,
        job_repo: JobRepository,
        day_resolver: DayResolverService,
        deduction_service: DeductionService,
        monthly_service: MonthlyService,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            hr_repo,
            job_repo,
            day_resolver,
            deduction_service,
            monthly_service,
            policy,
        }
    }

    async fn collect_and_persist(
        &self,
        job_kind: &str,
        target_period: String,
        processed: i32,
        started_at: chrono::DateTime<Utc>,
        mut set: JoinSet<(Uuid, Result<(), AppError>)>,
    ) -> Result<JobRun, AppError> {
        let mut succeeded = 0i32;
        let mut failures: Vec<JobFailure> = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => succeeded += 1,
                Ok((employee_id, Err(e))) => {
                    tracing::warn!(employee = %employee_id, error = %e, job_kind, "falha no lote");
                    failures.push(JobFailure {
                        employee_id,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    failures.push(JobFailure {
                        employee_id: Uuid::nil(),
                        error: format!("tarefa abortada: {}", e),
                    });
                }
            }
        }

        let finished_at = Utc::now();
        let run = JobRun {
            id: Uuid::new_v4(),
            job_kind: job_kind.to_string(),
            target_period,
            processed,
            succeeded,
            failed: failures.len() as i32,
            failures: sqlx::types::Json(failures),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        };
        self.job_repo.insert_run(&run).await?;

        tracing::info!(
            job_kind,
            period = %run.target_period,
            processed = run.processed,
            succeeded = run.succeeded,
            failed = run.failed,
            duration_ms = run.duration_ms,
            "✅ varredura concluída"
        );
        Ok(run)
    }

    /// Varredura diária: resolve e persiste o dia de cada funcionário ativo e
    /// abre proposta de dedução para cada falta não abonada. Sem data, cobre
    /// o dia de ontem.
    pub async fn run_daily_job(&self, date: Option<NaiveDate>) -> Result<JobRun, AppError> {
        let date = match date {
            Some(d) => d,
            None => Utc::now().date_naive() - Duration::days(1),
        };
        let started_at = Utc::now();

        let employees = self
            .hr_repo
            .list_active_employees(self.hr_repo.pool())
            .await?;
        tracing::info!(%date, employees = employees.len(), "🚀 iniciando varredura diária");

        let semaphore = Arc::new(Semaphore::new(self.policy.batch_concurrency));
        let mut set: JoinSet<(Uuid, Result<(), AppError>)> = JoinSet::new();

        for employee in &employees {
            let employee_id = employee.id;
            let resolver = self.day_resolver.clone();
            let deductions = self.deduction_service.clone();
            let semaphore = semaphore.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (employee_id, Err(anyhow::Error::from(e).into())),
                };
                let result = async {
                    let status = resolver.resolve_and_persist_day(employee_id, date).await?;
                    if status.final_status == DayStatus::Absent && !status.deduction_exempt {
                        deductions
                            .create_absence_proposal(employee_id, date, status.id)
                            .await?;
                    }
                    Ok::<(), AppError>(())
                }
                .await;
                (employee_id, result)
            });
        }

        self.collect_and_persist(
            "daily_attendance",
            date.to_string(),
            employees.len() as i32,
            started_at,
            set,
        )
        .await
    }

    /// Varredura mensal: recomputa (ou finaliza, quando há um finalizador) o
    /// balanço de horas de cada funcionário ativo. Sem período, cobre o mês
    /// anterior.
    pub async fn run_monthly_job(
        &self,
        year: Option<i32>,
        month: Option<i32>,
        finalizer: Option<&Actor>,
    ) -> Result<JobRun, AppError> {
        let (year, month) = match (year, month) {
            (Some(y), Some(m)) => (y, m),
            _ => previous_month(Utc::now().date_naive())?,
        };
        let started_at = Utc::now();

        let employees = self
            .hr_repo
            .list_active_employees(self.hr_repo.pool())
            .await?;
        tracing::info!(
            year,
            month,
            employees = employees.len(),
            finalize = finalizer.is_some(),
            "🚀 iniciando varredura mensal"
        );

        let semaphore = Arc::new(Semaphore::new(self.policy.batch_concurrency));
        let mut set: JoinSet<(Uuid, Result<(), AppError>)> = JoinSet::new();

        for employee in &employees {
            let employee_id = employee.id;
            let monthly = self.monthly_service.clone();
            let finalizer = finalizer.cloned();
            let semaphore = semaphore.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (employee_id, Err(anyhow::Error::from(e).into())),
                };
                let result = async {
                    match &finalizer {
                        Some(actor) => {
                            monthly
                                .finalize_month(employee_id, year, month, actor)
                                .await?;
                        }
                        None => {
                            monthly
                                .compute_monthly_hours(employee_id, year, month)
                                .await?;
                        }
                    }
                    Ok::<(), AppError>(())
                }
                .await;
                (employee_id, result)
            });
        }

        self.collect_and_persist(
            "monthly_hours",
            format!("{}-{:02}", year, month),
            employees.len() as i32,
            started_at,
            set,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_month_within_year() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(previous_month(today).unwrap(), (2025, 5));
    }

    #[test]
    fn previous_month_crosses_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert_eq!(previous_month(today).unwrap(), (2024, 12));
    }
}
