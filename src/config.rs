// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::db::{
    AttendanceRepository, DeductionRepository, FinanceRepository, HrRepository, JobRepository,
    PunchRepository, TransactionRepository,
};
use crate::models::deduction::WarningType;
use crate::services::{
    day_resolver::DayResolverService, deduction_service::DeductionService,
    job_service::JobService, monthly_service::MonthlyService, penalty_service::PenaltyService,
    workflow_service::WorkflowService,
};

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.parse().ok()
}

/// Botões de política do núcleo. Os padrões refletem a política vigente;
/// cada um pode ser sobrescrito por variável de ambiente sem recompilar.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub currency: String,
    pub absence_divisor_days: u32,
    pub monthly_hours_divisor: u32,
    pub deficit_day_hours: f64,
    pub compensation_netting_enabled: bool,

    // Escadas de advertência por faltas no ano. A consecutiva chega ao caso
    // de desligamento; a dispersa para na terceira advertência.
    pub consecutive_thresholds: Vec<(u32, WarningType)>,
    pub scattered_thresholds: Vec<(u32, WarningType)>,

    pub batch_concurrency: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            currency: "BRL".to_string(),
            absence_divisor_days: 30,
            monthly_hours_divisor: 240,
            deficit_day_hours: 8.0,
            compensation_netting_enabled: true,
            consecutive_thresholds: vec![
                (3, WarningType::FirstWarning),
                (5, WarningType::SecondWarning),
                (10, WarningType::ThirdWarning),
                (15, WarningType::TerminationCase),
            ],
            scattered_thresholds: vec![
                (10, WarningType::FirstWarning),
                (20, WarningType::SecondWarning),
                (30, WarningType::ThirdWarning),
            ],
            batch_concurrency: 8,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(currency) = env::var("POLICY_CURRENCY") {
            config.currency = currency;
        }
        if let Some(v) = env_parse("POLICY_ABSENCE_DIVISOR_DAYS") {
            config.absence_divisor_days = v;
        }
        if let Some(v) = env_parse("POLICY_MONTHLY_HOURS_DIVISOR") {
            config.monthly_hours_divisor = v;
        }
        if let Some(v) = env_parse("POLICY_DEFICIT_DAY_HOURS") {
            config.deficit_day_hours = v;
        }
        if let Some(v) = env_parse("POLICY_COMPENSATION_NETTING") {
            config.compensation_netting_enabled = v;
        }
        if let Some(v) = env_parse("POLICY_BATCH_CONCURRENCY") {
            config.batch_concurrency = v;
        }
        config
    }
}

/// Estado compartilhado da aplicação: pool, política e serviços montados.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub policy: PolicyConfig,
    pub day_resolver_service: DayResolverService,
    pub monthly_service: MonthlyService,
    pub deduction_service: DeductionService,
    pub penalty_service: PenaltyService,
    pub workflow_service: WorkflowService,
    pub job_service: JobService,
}

impl AppState {
    pub async fn new() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").context("variável de ambiente DATABASE_URL não definida")?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await
            .context("falha ao conectar ao banco de dados")?;
        tracing::info!("✅ Conexão com o banco de dados estabelecida.");

        let policy = PolicyConfig::from_env();

        let hr_repo = HrRepository::new(pool.clone());
        let punch_repo = PunchRepository::new(pool.clone());
        let attendance_repo = AttendanceRepository::new(pool.clone());
        let deduction_repo = DeductionRepository::new(pool.clone());
        let transaction_repo = TransactionRepository::new(pool.clone());
        let finance_repo = FinanceRepository::new(pool.clone());
        let job_repo = JobRepository::new(pool.clone());

        let day_resolver_service = DayResolverService::new(
            pool.clone(),
            hr_repo.clone(),
            punch_repo.clone(),
            transaction_repo.clone(),
            attendance_repo.clone(),
        );
        let deduction_service = DeductionService::new(
            pool.clone(),
            hr_repo.clone(),
            deduction_repo.clone(),
            finance_repo.clone(),
            policy.clone(),
        );
        let monthly_service = MonthlyService::new(
            pool.clone(),
            attendance_repo.clone(),
            deduction_service.clone(),
            policy.clone(),
        );
        let penalty_service = PenaltyService::new(
            pool.clone(),
            attendance_repo.clone(),
            deduction_repo.clone(),
            policy.clone(),
        );
        let workflow_service =
            WorkflowService::new(pool.clone(), hr_repo.clone(), transaction_repo.clone());
        let job_service = JobService::new(
            hr_repo,
            job_repo,
            day_resolver_service.clone(),
            deduction_service.clone(),
            monthly_service.clone(),
            policy.clone(),
        );

        Ok(Self {
            pool,
            policy,
            day_resolver_service,
            monthly_service,
            deduction_service,
            penalty_service,
            workflow_service,
            job_service,
        })
    }
}
