// src/services/monthly_service.rs

use chrono::{Months, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::PolicyConfig,
    db::AttendanceRepository,
    models::{
        attendance::{DailyStatus, DayStatus, MonthlyHours},
        hr::{Actor, StaffRole},
    },
    services::deduction_service::DeductionService,
};

/// Primeiro e último dia do mês civil.
pub fn month_bounds(year: i32, month: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = NaiveDate::from_ymd_opt(year, month as u32, 1)
        .ok_or_else(|| AppError::invalid_transition(format!("período inválido: {}/{}", year, month)))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::invalid_transition(format!("período inválido: {}/{}", year, month)))?;
    Ok((start, end))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Agregação pura dos DailyStatus do mês. O registro mensal é inteiramente
/// derivado: nenhuma informação nova entra aqui, só soma e contagem.
///
/// Horas contadas por dia são limitadas à jornada; o excedente vira
/// compensação e só abate o déficit quando a política de netting permite.
/// Horas de permissão valem como horas trabalhadas do dia, de modo que os
/// campos gravados sempre satisfazem:
///   net_hours     = actual + compensation − required
///   deficit_hours = max(0, required − actual − compensation)
pub fn aggregate_month(
    employee_id: Uuid,
    year: i32,
    month: i32,
    days: &[DailyStatus],
    policy: &PolicyConfig,
) -> MonthlyHours {
    let mut working_days = 0i32;
    let mut present_days = 0i32;
    let mut absent_days = 0i32;
    let mut leave_days = 0i32;
    let mut mission_days = 0i32;
    let mut holiday_days = 0i32;
    let mut weekend_days = 0i32;
    let mut late_days = 0i32;

    let mut required = 0.0f64;
    let mut counted_actual = 0.0f64;
    let mut compensation = 0.0f64;
    let mut permission = 0.0f64;

    for day in days {
        match day.final_status {
            DayStatus::Holiday => holiday_days += 1,
            DayStatus::Weekend => weekend_days += 1,
            DayStatus::OnLeave | DayStatus::OnAdminLeave => leave_days += 1,
            DayStatus::OnMission => mission_days += 1,
            DayStatus::Present | DayStatus::EarlyLeave => present_days += 1,
            DayStatus::Late => {
                present_days += 1;
                late_days += 1;
            }
            DayStatus::Permission => {}
            DayStatus::Absent => absent_days += 1,
        }

        if day.is_expected_working_day() {
            working_days += 1;
            required += day.required_hours;

            let punched = day.actual_hours.unwrap_or(0.0);
            // Permissão conta como hora trabalhada do dia; o excedente de
            // jornada vem só do ponto real.
            counted_actual += (punched + day.permission_hours).min(day.required_hours);
            compensation += (punched - day.required_hours).max(0.0);
            permission += day.permission_hours;
        }
    }

    let offset = if policy.compensation_netting_enabled {
        compensation
    } else {
        0.0
    };
    let net_hours = round2(counted_actual + compensation - required);
    let deficit_hours = round2((required - counted_actual - offset).max(0.0));
    let deficit_days = round2(deficit_hours / policy.deficit_day_hours);

    MonthlyHours {
        id: Uuid::new_v4(),
        employee_id,
        year,
        month,
        required_hours: round2(required),
        actual_hours: round2(counted_actual),
        permission_hours: round2(permission),
        compensation_hours: round2(compensation),
        net_hours,
        deficit_hours,
        deficit_days,
        working_days,
        present_days,
        absent_days,
        leave_days,
        mission_days,
        holiday_days,
        weekend_days,
        late_days,
        is_finalized: false,
        finalized_by: None,
        finalized_at: None,
        computed_at: Utc::now(),
    }
}

#[derive(Clone)]
pub struct MonthlyService {
    pool: PgPool,
    attendance_repo: AttendanceRepository,
    deduction_service: DeductionService,
    policy: PolicyConfig,
}

impl MonthlyService {
    pub fn new(
        pool: PgPool,
        attendance_repo: AttendanceRepository,
        deduction_service: DeductionService,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            pool,
            attendance_repo,
            deduction_service,
            policy,
        }
    }

    /// (Re)computa o balanço do mês a partir dos dias. Um mês já finalizado
    /// é imutável: devolve o retrato existente sem recomputar.
    pub async fn compute_monthly_hours(
        &self,
        employee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<MonthlyHours, AppError> {
        if let Some(existing) = self
            .attendance_repo
            .get_monthly_hours(&self.pool, employee_id, year, month)
            .await?
        {
            if existing.is_finalized {
                return Ok(existing);
            }
        }

        let (from, to) = month_bounds(year, month)?;
        let days = self
            .attendance_repo
            .list_range(&self.pool, employee_id, from, to)
            .await?;
        let record = aggregate_month(employee_id, year, month, &days, &self.policy);
        let saved = self.attendance_repo.upsert_monthly_hours(&record).await?;
        Ok(saved)
    }

    /// Finalização de mão única: recomputa, marca o mês como finalizado,
    /// tranca os dias contra correção e abre a proposta de déficit quando
    /// couber. Chamar duas vezes devolve o mesmo retrato, sem duplicar nada.
    pub async fn finalize_month(
        &self,
        employee_id: Uuid,
        year: i32,
        month: i32,
        actor: &Actor,
    ) -> Result<MonthlyHours, AppError> {
        if actor.role != StaffRole::Operations && !actor.has_override_authority {
            return Err(AppError::invalid_transition(format!(
                "papel {:?} não pode finalizar o mês",
                actor.role
            )));
        }

        let fresh = self.compute_monthly_hours(employee_id, year, month).await?;
        if fresh.is_finalized {
            // Uma chamada anterior pode ter falhado depois do portão, deixando
            // o mês finalizado sem a proposta de déficit. Reapresentar aqui é
            // inócuo: o guarda por (funcionário, ano, mês) impede duplicata.
            self.ensure_deficit_proposal(&fresh).await?;
            return Ok(fresh);
        }

        let finalized = match self
            .attendance_repo
            .finalize_monthly_hours(employee_id, year, month, actor.id)
            .await?
        {
            Some(record) => record,
            // Outro ator finalizou entre a leitura e o UPDATE.
            None => {
                let existing = self
                    .attendance_repo
                    .get_monthly_hours(&self.pool, employee_id, year, month)
                    .await?
                    .ok_or(AppError::MonthlyHoursNotFound)?;
                self.ensure_deficit_proposal(&existing).await?;
                return Ok(existing);
            }
        };

        let (from, to) = month_bounds(year, month)?;
        let locked = self.attendance_repo.lock_range(employee_id, from, to).await?;
        tracing::info!(
            employee = %employee_id,
            year,
            month,
            locked_days = locked,
            deficit_hours = finalized.deficit_hours,
            "mês finalizado"
        );

        self.ensure_deficit_proposal(&finalized).await?;

        Ok(finalized)
    }

    /// Abre a proposta de déficit de um mês finalizado, se devida e ainda
    /// inexistente. Chamada em todos os caminhos de retorno da finalização
    /// para que uma falha transitória não perca o efeito obrigatório.
    async fn ensure_deficit_proposal(&self, record: &MonthlyHours) -> Result<(), AppError> {
        if record.deficit_hours > 0.0 {
            self.deduction_service
                .create_deficit_proposal(
                    record.employee_id,
                    record.year,
                    record.month,
                    record.deficit_hours,
                    record.id,
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
    }

    fn day(date: NaiveDate, status: DayStatus, required: f64, actual: Option<f64>) -> DailyStatus {
        DailyStatus {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            date,
            final_status: status,
            decision_source: "punch".to_string(),
            reason: String::new(),
            check_in_time: None,
            check_out_time: None,
            actual_hours: actual,
            required_hours: required,
            late_minutes: 0,
            early_leave_minutes: 0,
            permission_hours: 0.0,
            deduction_exempt: false,
            source_refs: Json(Default::default()),
            trace_log: Json(vec![]),
            lock_status: crate::models::attendance::LockStatus::Open,
            corrections: Json(vec![]),
            created_at: None,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (from, to) = month_bounds(2025, 6).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());

        let (from, to) = month_bounds(2024, 2).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn month_bounds_rejects_invalid_month() {
        assert!(month_bounds(2025, 13).is_err());
        assert!(month_bounds(2025, 0).is_err());
    }

    #[test]
    fn deficit_from_required_minus_actual() {
        // 20 dias úteis de 8h = 160h exigidas; 7.5h reais por dia = 150h.
        let days: Vec<DailyStatus> = (1..=20)
            .map(|d| day(date(d), DayStatus::Present, 8.0, Some(7.5)))
            .collect();
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());
        assert_eq!(record.required_hours, 160.0);
        assert_eq!(record.actual_hours, 150.0);
        assert_eq!(record.net_hours, -10.0);
        assert_eq!(record.deficit_hours, 10.0);
        assert_eq!(record.deficit_days, 1.25);
        assert_eq!(record.working_days, 20);
        assert_eq!(record.present_days, 20);
    }

    #[test]
    fn leave_and_holiday_days_do_not_generate_required_hours() {
        let days = vec![
            day(date(2), DayStatus::Holiday, 0.0, None),
            day(date(3), DayStatus::OnLeave, 0.0, None),
            day(date(4), DayStatus::OnMission, 0.0, None),
            day(date(5), DayStatus::Present, 8.0, Some(8.0)),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());
        assert_eq!(record.required_hours, 8.0);
        assert_eq!(record.working_days, 1);
        assert_eq!(record.leave_days, 1);
        assert_eq!(record.mission_days, 1);
        assert_eq!(record.holiday_days, 1);
        assert_eq!(record.deficit_hours, 0.0);
    }

    #[test]
    fn absent_day_counts_toward_required_and_deficit() {
        let days = vec![
            day(date(2), DayStatus::Present, 8.0, Some(8.0)),
            day(date(3), DayStatus::Absent, 8.0, None),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());
        assert_eq!(record.required_hours, 16.0);
        assert_eq!(record.absent_days, 1);
        assert_eq!(record.deficit_hours, 8.0);
        assert_eq!(record.deficit_days, 1.0);
    }

    #[test]
    fn surplus_offsets_deficit_when_netting_enabled() {
        // Um dia com 2h a mais, outro com 2h a menos.
        let days = vec![
            day(date(2), DayStatus::Present, 8.0, Some(10.0)),
            day(date(3), DayStatus::Present, 8.0, Some(6.0)),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());
        assert_eq!(record.compensation_hours, 2.0);
        assert_eq!(record.deficit_hours, 0.0);
    }

    #[test]
    fn surplus_ignored_when_netting_disabled() {
        let mut p = policy();
        p.compensation_netting_enabled = false;
        let days = vec![
            day(date(2), DayStatus::Present, 8.0, Some(10.0)),
            day(date(3), DayStatus::Present, 8.0, Some(6.0)),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &p);
        assert_eq!(record.compensation_hours, 2.0);
        assert_eq!(record.deficit_hours, 2.0);
    }

    #[test]
    fn permission_hours_fold_into_actual() {
        // 6h de ponto + 2h de permissão fecham a jornada de 8h: o crédito
        // entra em actual_hours, preservando a fórmula do balanço.
        let mut d = day(date(2), DayStatus::Permission, 8.0, Some(6.0));
        d.permission_hours = 2.0;
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &[d], &policy());
        assert_eq!(record.permission_hours, 2.0);
        assert_eq!(record.actual_hours, 8.0);
        assert_eq!(record.net_hours, 0.0);
        assert_eq!(record.deficit_hours, 0.0);
    }

    #[test]
    fn balance_fields_satisfy_their_formulas() {
        // Mês misto: um dia completo, um incompleto, um com permissão parcial
        // e um com excedente. Os campos gravados têm de fechar entre si.
        let mut with_permission = day(date(4), DayStatus::Permission, 8.0, Some(4.0));
        with_permission.permission_hours = 2.0;
        let days = vec![
            day(date(2), DayStatus::Present, 8.0, Some(8.0)),
            day(date(3), DayStatus::Present, 8.0, Some(6.0)),
            with_permission,
            day(date(5), DayStatus::Present, 8.0, Some(9.0)),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());

        // required 32, actual 8+6+6+8 = 28, compensation 1.
        assert_eq!(record.required_hours, 32.0);
        assert_eq!(record.actual_hours, 28.0);
        assert_eq!(record.compensation_hours, 1.0);
        assert_eq!(
            record.net_hours,
            record.actual_hours + record.compensation_hours - record.required_hours
        );
        assert_eq!(
            record.deficit_hours,
            (record.required_hours - record.actual_hours - record.compensation_hours).max(0.0)
        );
        assert_eq!(record.net_hours, -3.0);
        assert_eq!(record.deficit_hours, 3.0);
    }

    #[test]
    fn late_days_counted_as_present_and_late() {
        let days = vec![
            day(date(2), DayStatus::Late, 8.0, Some(7.7)),
            day(date(3), DayStatus::Present, 8.0, Some(8.0)),
        ];
        let record = aggregate_month(Uuid::new_v4(), 2025, 6, &days, &policy());
        assert_eq!(record.present_days, 2);
        assert_eq!(record.late_days, 1);
    }
}
