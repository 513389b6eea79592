// src/services/penalty_service.rs

use chrono::{Duration, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::PolicyConfig,
    db::{AttendanceRepository, DeductionRepository},
    models::{
        deduction::{ViolationType, WarningDetails, WarningRecord, WarningType},
        hr::Actor,
    },
};

/// Resumo das faltas de um período: total e maior sequência de dias de
/// calendário adjacentes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceSummary {
    pub total_days: u32,
    pub longest_consecutive: u32,
}

/// Varre as datas de falta (ordenadas) e mede a maior sequência contígua.
/// Fim de semana ou feriado no meio quebram a sequência: o que conta é a
/// adjacência de calendário entre dias ABSENT.
pub fn analyze_absences(dates: &[NaiveDate]) -> AbsenceSummary {
    let mut longest = 0u32;
    let mut current = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        current = match previous {
            Some(prev) if date == prev + Duration::days(1) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(date);
    }

    AbsenceSummary {
        total_days: dates.len() as u32,
        longest_consecutive: longest,
    }
}

/// Maior degrau da escada cruzado pelo valor observado, se houver.
fn ladder_hit(thresholds: &[(u32, WarningType)], observed: u32) -> Option<(u32, WarningType)> {
    thresholds
        .iter()
        .copied()
        .filter(|(threshold, _)| observed >= *threshold)
        .max_by_key(|(threshold, _)| *threshold)
}

/// Avaliador de penalidades por falta: escadas de advertência sobre faltas
/// consecutivas e dispersas do ano. Produz advertências PENDING que seguem
/// a mesma disciplina propor→revisar→executar das deduções.
#[derive(Clone)]
pub struct PenaltyService {
    pool: PgPool,
    attendance_repo: AttendanceRepository,
    deduction_repo: DeductionRepository,
    policy: PolicyConfig,
}

impl PenaltyService {
    pub fn new(
        pool: PgPool,
        attendance_repo: AttendanceRepository,
        deduction_repo: DeductionRepository,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            pool,
            attendance_repo,
            deduction_repo,
            policy,
        }
    }

    pub async fn get_warning(&self, id: Uuid) -> Result<WarningRecord, AppError> {
        self.deduction_repo
            .get_warning(&self.pool, id)
            .await?
            .ok_or(AppError::WarningNotFound)
    }

    /// Avalia as duas escadas para o ano e cria as advertências que ainda não
    /// existem. Idempotente por (funcionário, tipo, ano): reavaliar devolve
    /// apenas o que foi criado agora.
    pub async fn evaluate_warnings(
        &self,
        employee_id: Uuid,
        year: i32,
    ) -> Result<Vec<WarningRecord>, AppError> {
        let from = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| AppError::invalid_transition(format!("ano inválido: {}", year)))?;
        let to = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| AppError::invalid_transition(format!("ano inválido: {}", year)))?;

        let absent_days = self
            .attendance_repo
            .list_absent_days(&self.pool, employee_id, from, to)
            .await?;
        let dates: Vec<NaiveDate> = absent_days.iter().map(|d| d.date).collect();
        let source_ids: Vec<Uuid> = absent_days.iter().map(|d| d.id).collect();
        let summary = analyze_absences(&dates);

        let mut candidates: Vec<(ViolationType, u32, u32, WarningType)> = Vec::new();
        if let Some((threshold, warning_type)) = ladder_hit(
            &self.policy.consecutive_thresholds,
            summary.longest_consecutive,
        ) {
            candidates.push((
                ViolationType::ConsecutiveAbsence,
                threshold,
                summary.longest_consecutive,
                warning_type,
            ));
        }
        if let Some((threshold, warning_type)) =
            ladder_hit(&self.policy.scattered_thresholds, summary.total_days)
        {
            candidates.push((
                ViolationType::ScatteredAbsence,
                threshold,
                summary.total_days,
                warning_type,
            ));
        }

        let mut created = Vec::new();
        let mut seen_types: Vec<WarningType> = Vec::new();
        for (violation_type, threshold, observed, warning_type) in candidates {
            // As duas escadas podem apontar o mesmo degrau no mesmo ano.
            if seen_types.contains(&warning_type) {
                continue;
            }
            seen_types.push(warning_type);

            if self
                .deduction_repo
                .exists_warning(&self.pool, employee_id, warning_type, year)
                .await?
            {
                continue;
            }

            let reason = match violation_type {
                ViolationType::ConsecutiveAbsence => format!(
                    "{} faltas consecutivas em {} (limite: {})",
                    observed, year, threshold
                ),
                ViolationType::ScatteredAbsence => format!(
                    "{} faltas dispersas em {} (limite: {})",
                    observed, year, threshold
                ),
            };

            let warning = WarningRecord {
                id: Uuid::new_v4(),
                employee_id,
                warning_type,
                violation_type,
                reason,
                period_year: year,
                details: Json(WarningDetails {
                    threshold_days: threshold,
                    observed_days: observed,
                }),
                source_records: Json(source_ids.clone()),
                status: crate::models::deduction::ProposalStatus::Pending,
                reviewed_by: None,
                reviewed_at: None,
                executed_by: None,
                executed_at: None,
                status_history: Json(vec![]),
                created_at: None,
            };
            self.deduction_repo.insert_warning(&warning).await?;
            tracing::info!(
                employee = %employee_id,
                year,
                warning = ?warning_type,
                violation = ?violation_type,
                "advertência proposta"
            );
            created.push(warning);
        }

        Ok(created)
    }

    pub async fn review_warning(
        &self,
        id: Uuid,
        actor: &Actor,
        approve: bool,
        note: Option<&str>,
    ) -> Result<WarningRecord, AppError> {
        let mut warning = self.get_warning(id).await?;
        let expected = warning.status;
        warning.review(actor, approve, note, Utc::now())?;
        self.deduction_repo
            .update_warning_guarded(&warning, expected)
            .await?;
        Ok(warning)
    }

    /// Executa uma advertência aprovada. Nunca toca na razão financeira:
    /// o efeito é a notificação formal ao funcionário.
    pub async fn execute_warning(&self, id: Uuid, actor: &Actor) -> Result<WarningRecord, AppError> {
        let mut warning = self.get_warning(id).await?;
        let expected = warning.status;
        warning.mark_executed(actor, Utc::now())?;
        self.deduction_repo
            .update_warning_guarded(&warning, expected)
            .await?;
        tracing::info!(
            employee = %warning.employee_id,
            warning = ?warning.warning_type,
            "advertência executada; funcionário notificado"
        );
        Ok(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn empty_absences_yield_zero() {
        let summary = analyze_absences(&[]);
        assert_eq!(summary.total_days, 0);
        assert_eq!(summary.longest_consecutive, 0);
    }

    #[test]
    fn adjacent_dates_form_a_run() {
        let dates = vec![d(6, 2), d(6, 3), d(6, 4), d(6, 10)];
        let summary = analyze_absences(&dates);
        assert_eq!(summary.total_days, 4);
        assert_eq!(summary.longest_consecutive, 3);
    }

    #[test]
    fn gap_breaks_the_run() {
        // Sexta ausente, fim de semana no meio, segunda ausente: duas
        // sequências de 1, não uma de 2.
        let dates = vec![d(6, 13), d(6, 16)];
        let summary = analyze_absences(&dates);
        assert_eq!(summary.longest_consecutive, 1);
    }

    #[test]
    fn run_crossing_month_boundary() {
        let dates = vec![d(6, 29), d(6, 30), d(7, 1)];
        let summary = analyze_absences(&dates);
        assert_eq!(summary.longest_consecutive, 3);
    }

    #[test]
    fn consecutive_ladder_picks_highest_crossed_rung() {
        let policy = crate::config::PolicyConfig::default();
        assert_eq!(ladder_hit(&policy.consecutive_thresholds, 2), None);
        assert_eq!(
            ladder_hit(&policy.consecutive_thresholds, 3),
            Some((3, WarningType::FirstWarning))
        );
        assert_eq!(
            ladder_hit(&policy.consecutive_thresholds, 6),
            Some((5, WarningType::SecondWarning))
        );
        assert_eq!(
            ladder_hit(&policy.consecutive_thresholds, 12),
            Some((10, WarningType::ThirdWarning))
        );
        assert_eq!(
            ladder_hit(&policy.consecutive_thresholds, 15),
            Some((15, WarningType::TerminationCase))
        );
    }

    #[test]
    fn scattered_ladder_never_reaches_termination() {
        let policy = crate::config::PolicyConfig::default();
        assert_eq!(ladder_hit(&policy.scattered_thresholds, 9), None);
        assert_eq!(
            ladder_hit(&policy.scattered_thresholds, 10),
            Some((10, WarningType::FirstWarning))
        );
        assert_eq!(
            ladder_hit(&policy.scattered_thresholds, 25),
            Some((20, WarningType::SecondWarning))
        );
        // Mesmo com muitas faltas dispersas, o teto é a terceira advertência.
        assert_eq!(
            ladder_hit(&policy.scattered_thresholds, 100),
            Some((30, WarningType::ThirdWarning))
        );
    }
}
