// src/services/day_resolver.rs

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{AttendanceRepository, HrRepository, PunchRepository, TransactionRepository},
    models::{
        attendance::{Correction, DailyStatus, DayStatus, LockStatus, SourceRefs, TraceEntry},
        hr::{Actor, Contract, Employee, Holiday, PunchEvent, WorkLocation},
        transaction::{
            ForgottenPunchPayload, LeaveKind, LeavePayload, PermissionPayload, Transaction,
            TransactionKind,
        },
    },
};

/// Evidência pré-carregada para resolver um (funcionário, dia).
/// As regras da cadeia são funções puras sobre esta struct.
#[derive(Debug, Clone)]
pub struct DayEvidence {
    pub employee: Employee,
    pub contract: Contract,
    pub location: WorkLocation,
    pub date: NaiveDate,
    pub holiday: Option<Holiday>,
    pub leave: Option<Transaction>,
    pub mission: Option<Transaction>,
    pub forgotten_punch: Option<Transaction>,
    pub permission: Option<Transaction>,
    pub excuses: Vec<Transaction>,
    pub check_in: Option<PunchEvent>,
    pub check_out: Option<PunchEvent>,
}

/// Decisão parcial produzida por uma regra que casou.
#[derive(Debug, Clone)]
struct DayDecision {
    status: DayStatus,
    source: &'static str,
    reason: String,
    check_in_time: Option<chrono::NaiveTime>,
    check_out_time: Option<chrono::NaiveTime>,
    actual_hours: Option<f64>,
    late_minutes: i64,
    early_leave_minutes: i64,
    permission_hours: f64,
    deduction_exempt: bool,
    refs: SourceRefs,
}

impl DayDecision {
    fn new(status: DayStatus, source: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status,
            source,
            reason: reason.into(),
            check_in_time: None,
            check_out_time: None,
            actual_hours: None,
            late_minutes: 0,
            early_leave_minutes: 0,
            permission_hours: 0.0,
            deduction_exempt: false,
            refs: SourceRefs::default(),
        }
    }

    /// O dia entra nas horas exigidas? Feriado/fim de semana/licença/missão
    /// ficam de fora.
    fn counts_required_hours(&self) -> bool {
        !matches!(
            self.status,
            DayStatus::Holiday
                | DayStatus::Weekend
                | DayStatus::OnLeave
                | DayStatus::OnAdminLeave
                | DayStatus::OnMission
        )
    }
}

struct RuleOutcome {
    trace: TraceEntry,
    decision: Option<DayDecision>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
//  A CADEIA DE REGRAS (prioridade fixa, parada no primeiro casamento)
// ---------------------------------------------------------------------------

fn rule_holiday(ev: &DayEvidence) -> RuleOutcome {
    match &ev.holiday {
        Some(h) => {
            let mut d = DayDecision::new(
                DayStatus::Holiday,
                "holiday",
                format!("feriado oficial: {}", h.name),
            );
            d.refs.holiday_id = Some(h.id);
            RuleOutcome {
                trace: TraceEntry::new("holiday", true, format!("feriado '{}' cobre a data", h.name)),
                decision: Some(d),
            }
        }
        None => RuleOutcome {
            trace: TraceEntry::new("holiday", false, "nenhum feriado cadastrado para a data"),
            decision: None,
        },
    }
}

fn rule_weekend(ev: &DayEvidence) -> RuleOutcome {
    if ev.location.is_weekend(ev.date) {
        let d = DayDecision::new(
            DayStatus::Weekend,
            "weekend",
            format!("fim de semana do local '{}'", ev.location.name),
        );
        RuleOutcome {
            trace: TraceEntry::new(
                "weekend",
                true,
                format!("dia da semana pertence ao padrão {:?}", ev.location.weekend_days),
            ),
            decision: Some(d),
        }
    } else {
        RuleOutcome {
            trace: TraceEntry::new("weekend", false, "dia útil no calendário do local"),
            decision: None,
        }
    }
}

fn rule_leave(ev: &DayEvidence) -> RuleOutcome {
    match &ev.leave {
        Some(tx) => {
            let kind = serde_json::from_value::<LeavePayload>(tx.data.0.clone())
                .map(|p| p.leave_kind)
                .unwrap_or(LeaveKind::Regular);
            let status = match kind {
                LeaveKind::Regular => DayStatus::OnLeave,
                LeaveKind::Administrative => DayStatus::OnAdminLeave,
            };
            let mut d = DayDecision::new(
                status,
                "leave",
                format!("licença executada {} cobre a data", tx.ref_no),
            );
            d.refs.leave_transaction_id = Some(tx.id);
            RuleOutcome {
                trace: TraceEntry::new(
                    "leave",
                    true,
                    format!("licença {} ({:?}) de {} a {}", tx.ref_no, kind, tx.start_date, tx.end_date),
                ),
                decision: Some(d),
            }
        }
        None => RuleOutcome {
            trace: TraceEntry::new("leave", false, "nenhuma licença executada cobre a data"),
            decision: None,
        },
    }
}

fn rule_mission(ev: &DayEvidence) -> RuleOutcome {
    match &ev.mission {
        Some(tx) => {
            let mut d = DayDecision::new(
                DayStatus::OnMission,
                "mission",
                format!("missão externa executada {} cobre a data", tx.ref_no),
            );
            d.refs.mission_transaction_id = Some(tx.id);
            RuleOutcome {
                trace: TraceEntry::new("mission", true, format!("missão {} cobre a data", tx.ref_no)),
                decision: Some(d),
            }
        }
        None => RuleOutcome {
            trace: TraceEntry::new("mission", false, "nenhuma missão executada cobre a data"),
            decision: None,
        },
    }
}

fn rule_forgotten_punch(ev: &DayEvidence) -> RuleOutcome {
    match &ev.forgotten_punch {
        Some(tx) => {
            let payload = serde_json::from_value::<ForgottenPunchPayload>(tx.data.0.clone()).ok();
            let mut d = DayDecision::new(
                DayStatus::Present,
                "forgotten_punch",
                format!("correção de ponto esquecido executada {}", tx.ref_no),
            );
            if let Some(p) = payload {
                d.check_in_time = Some(p.claimed_check_in);
                d.check_out_time = p.claimed_check_out;
                if let Some(out) = p.claimed_check_out {
                    let minutes = (out - p.claimed_check_in).num_minutes();
                    d.actual_hours = Some(round2(minutes as f64 / 60.0));
                }
            }
            d.refs.forgotten_punch_transaction_id = Some(tx.id);
            RuleOutcome {
                trace: TraceEntry::new(
                    "forgotten_punch",
                    true,
                    format!("correção {} aceita com horários alegados", tx.ref_no),
                ),
                decision: Some(d),
            }
        }
        None => RuleOutcome {
            trace: TraceEntry::new("forgotten_punch", false, "nenhuma correção executada para a data"),
            decision: None,
        },
    }
}

fn rule_punch(ev: &DayEvidence) -> RuleOutcome {
    let Some(check_in) = &ev.check_in else {
        return RuleOutcome {
            trace: TraceEntry::new("punch", false, "nenhum check-in registrado"),
            decision: None,
        };
    };

    let loc = &ev.location;
    let grace_in = Duration::minutes(loc.grace_checkin_min as i64);
    let late_minutes = if check_in.time > loc.work_start + grace_in {
        (check_in.time - loc.work_start).num_minutes()
    } else {
        0
    };

    let mut check_out_time = None;
    let mut actual_hours = None;
    let mut early_leave_minutes = 0i64;
    if let Some(check_out) = &ev.check_out {
        let grace_out = Duration::minutes(loc.grace_checkout_min as i64);
        if check_out.time < loc.work_end - grace_out {
            early_leave_minutes = (loc.work_end - check_out.time).num_minutes();
        }
        actual_hours = Some(round2(
            (check_out.time - check_in.time).num_minutes() as f64 / 60.0,
        ));
        check_out_time = Some(check_out.time);
    }

    let (status, reason) = match (late_minutes > 0, early_leave_minutes > 0) {
        (true, true) => (
            DayStatus::Late,
            format!(
                "atraso de {} min e saída antecipada de {} min",
                late_minutes, early_leave_minutes
            ),
        ),
        (true, false) => (DayStatus::Late, format!("atraso de {} min", late_minutes)),
        (false, true) => (
            DayStatus::EarlyLeave,
            format!("saída antecipada de {} min", early_leave_minutes),
        ),
        (false, false) => (DayStatus::Present, "presença dentro da jornada".to_string()),
    };

    let mut d = DayDecision::new(status, "punch", reason);
    d.check_in_time = Some(check_in.time);
    d.check_out_time = check_out_time;
    d.actual_hours = actual_hours;
    d.late_minutes = late_minutes;
    d.early_leave_minutes = early_leave_minutes;
    d.refs.punch_ids.push(check_in.id);
    if let Some(co) = &ev.check_out {
        d.refs.punch_ids.push(co.id);
    }

    RuleOutcome {
        trace: TraceEntry::new(
            "punch",
            true,
            format!(
                "check-in {} / check-out {}",
                check_in.time,
                check_out_time.map_or("ausente".to_string(), |t| t.to_string())
            ),
        ),
        decision: Some(d),
    }
}

// A ordem importa: permissão só conta como status positivo quando não há
// check-in. Com check-in, a regra 6 já decidiu antes desta rodar.
fn rule_permission(ev: &DayEvidence) -> RuleOutcome {
    if ev.check_in.is_some() {
        return RuleOutcome {
            trace: TraceEntry::new("permission", false, "há check-in; permissão não decide o dia"),
            decision: None,
        };
    }
    match &ev.permission {
        Some(tx) => {
            let hours = serde_json::from_value::<PermissionPayload>(tx.data.0.clone())
                .map(|p| p.hours)
                .unwrap_or(0.0);
            let mut d = DayDecision::new(
                DayStatus::Permission,
                "permission",
                format!("permissão parcial executada {} ({} h)", tx.ref_no, hours),
            );
            d.permission_hours = hours;
            d.refs.permission_transaction_id = Some(tx.id);
            RuleOutcome {
                trace: TraceEntry::new("permission", true, format!("permissão {} cobre a data", tx.ref_no)),
                decision: Some(d),
            }
        }
        None => RuleOutcome {
            trace: TraceEntry::new("permission", false, "nenhuma permissão executada cobre a data"),
            decision: None,
        },
    }
}

fn absent_decision() -> DayDecision {
    DayDecision::new(
        DayStatus::Absent,
        "absent",
        "no leave, mission, punch, or holiday found",
    )
}

fn rule_absent(_ev: &DayEvidence) -> RuleOutcome {
    RuleOutcome {
        trace: TraceEntry::new("absent", true, "nenhuma regra anterior casou"),
        decision: Some(absent_decision()),
    }
}

type Rule = fn(&DayEvidence) -> RuleOutcome;

// Cadeia de prioridade fixa. Reordenar aqui muda a semântica do resolvedor;
// o driver não precisa mudar.
const RULE_CHAIN: &[Rule] = &[
    rule_holiday,
    rule_weekend,
    rule_leave,
    rule_mission,
    rule_forgotten_punch,
    rule_punch,
    rule_permission,
    rule_absent,
];

/// Regra 8: abonos executados suprimem a consequência de dedução de um
/// LATE/EARLY_LEAVE, sem mudar o status final. Evidência apenas.
fn apply_excuses(ev: &DayEvidence, d: &mut DayDecision, trace: &mut Vec<TraceEntry>) {
    let mut has_late_excuse = false;
    let mut has_early_excuse = false;
    for tx in &ev.excuses {
        match tx.kind {
            TransactionKind::LateExcuse => has_late_excuse = true,
            TransactionKind::EarlyLeaveExcuse => has_early_excuse = true,
            _ => continue,
        }
        d.refs.excuse_transaction_ids.push(tx.id);
    }

    let late_covered = d.late_minutes == 0 || has_late_excuse;
    let early_covered = d.early_leave_minutes == 0 || has_early_excuse;
    let exempt = (d.late_minutes > 0 || d.early_leave_minutes > 0) && late_covered && early_covered;
    d.deduction_exempt = exempt;

    trace.push(TraceEntry::new(
        "excuse",
        exempt,
        if exempt {
            "abono executado cobre a ocorrência; dedução suprimida".to_string()
        } else {
            format!("{} abono(s) encontrado(s); ocorrência não coberta", ev.excuses.len())
        },
    ));
}

/// O driver da cadeia: executa as regras em ordem, para no primeiro
/// casamento, mas registra uma entrada de trace para cada regra tentada.
pub fn resolve_from_evidence(ev: &DayEvidence, preamble: Vec<TraceEntry>) -> DailyStatus {
    let mut trace = preamble;
    let mut decision: Option<DayDecision> = None;

    for rule in RULE_CHAIN {
        let outcome = rule(ev);
        trace.push(outcome.trace);
        if outcome.decision.is_some() {
            decision = outcome.decision;
            break;
        }
    }

    // rule_absent sempre casa; o fallback existe só para manter o driver total.
    let mut d = decision.unwrap_or_else(absent_decision);

    if matches!(d.status, DayStatus::Late | DayStatus::EarlyLeave) {
        apply_excuses(ev, &mut d, &mut trace);
    }

    let required_hours = if d.counts_required_hours() {
        ev.location.daily_hours
    } else {
        0.0
    };

    DailyStatus {
        id: Uuid::new_v4(),
        employee_id: ev.employee.id,
        date: ev.date,
        final_status: d.status,
        decision_source: d.source.to_string(),
        reason: d.reason,
        check_in_time: d.check_in_time,
        check_out_time: d.check_out_time,
        actual_hours: d.actual_hours,
        required_hours,
        late_minutes: d.late_minutes,
        early_leave_minutes: d.early_leave_minutes,
        permission_hours: d.permission_hours,
        deduction_exempt: d.deduction_exempt,
        source_refs: sqlx::types::Json(d.refs),
        trace_log: sqlx::types::Json(trace),
        lock_status: LockStatus::Open,
        corrections: sqlx::types::Json(vec![]),
        created_at: Some(Utc::now()),
    }
}

// ---------------------------------------------------------------------------
//  O SERVIÇO
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DayResolverService {
    pool: PgPool,
    hr_repo: HrRepository,
    punch_repo: PunchRepository,
    transaction_repo: TransactionRepository,
    attendance_repo: AttendanceRepository,
}

impl DayResolverService {
    pub fn new(
        pool: PgPool,
        hr_repo: HrRepository,
        punch_repo: PunchRepository,
        transaction_repo: TransactionRepository,
        attendance_repo: AttendanceRepository,
    ) -> Self {
        Self {
            pool,
            hr_repo,
            punch_repo,
            transaction_repo,
            attendance_repo,
        }
    }

    /// Carrega a evidência do dia. Falha de dado de referência vira
    /// ResolutionIncomplete com o trace parcial, nunca ABSENT.
    async fn gather_evidence(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<(DayEvidence, Vec<TraceEntry>), AppError> {
        let mut preamble = Vec::new();

        let employee = self.hr_repo.get_employee(&self.pool, employee_id).await?;
        preamble.push(TraceEntry::new(
            "load_employee",
            employee.is_some(),
            format!("consulta de funcionário {}", employee_id),
        ));
        let Some(employee) = employee else {
            return Err(AppError::ResolutionIncomplete {
                reason: "funcionário não encontrado".to_string(),
                partial_trace: preamble,
            });
        };

        let contract = self
            .hr_repo
            .get_active_contract(&self.pool, employee_id)
            .await?;
        preamble.push(TraceEntry::new(
            "load_contract",
            contract.is_some(),
            "consulta de contrato ativo",
        ));
        let Some(contract) = contract else {
            return Err(AppError::ResolutionIncomplete {
                reason: "contrato ativo não encontrado".to_string(),
                partial_trace: preamble,
            });
        };

        let location = self
            .hr_repo
            .get_work_location(&self.pool, employee.work_location_id)
            .await?;
        preamble.push(TraceEntry::new(
            "load_work_location",
            location.is_some(),
            "consulta de configuração do local de trabalho",
        ));
        let Some(location) = location else {
            return Err(AppError::ResolutionIncomplete {
                reason: "local de trabalho não encontrado".to_string(),
                partial_trace: preamble,
            });
        };

        let holiday = self.hr_repo.get_holiday_for(&self.pool, date).await?;
        let leave = self
            .transaction_repo
            .find_executed_covering(&self.pool, employee_id, TransactionKind::LeaveRequest, date)
            .await?;
        let mission = self
            .transaction_repo
            .find_executed_covering(&self.pool, employee_id, TransactionKind::MissionRequest, date)
            .await?;
        let forgotten_punch = self
            .transaction_repo
            .find_executed_covering(&self.pool, employee_id, TransactionKind::ForgottenPunch, date)
            .await?;
        let permission = self
            .transaction_repo
            .find_executed_covering(
                &self.pool,
                employee_id,
                TransactionKind::PermissionRequest,
                date,
            )
            .await?;
        let excuses = self
            .transaction_repo
            .list_executed_covering(
                &self.pool,
                employee_id,
                &[TransactionKind::LateExcuse, TransactionKind::EarlyLeaveExcuse],
                date,
            )
            .await?;
        let check_in = self
            .punch_repo
            .first_check_in(&self.pool, employee_id, date)
            .await?;
        let check_out = self
            .punch_repo
            .last_check_out(&self.pool, employee_id, date)
            .await?;

        Ok((
            DayEvidence {
                employee,
                contract,
                location,
                date,
                holiday,
                leave,
                mission,
                forgotten_punch,
                permission,
                excuses,
                check_in,
                check_out,
            },
            preamble,
        ))
    }

    pub async fn resolve_day(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<DailyStatus, AppError> {
        let (evidence, preamble) = self.gather_evidence(employee_id, date).await?;
        Ok(resolve_from_evidence(&evidence, preamble))
    }

    pub async fn resolve_and_persist_day(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<DailyStatus, AppError> {
        let status = self.resolve_day(employee_id, date).await?;
        self.attendance_repo.replace_daily_status(&status).await?;
        tracing::debug!(
            employee = %employee_id,
            %date,
            status = ?status.final_status,
            "status diário resolvido e persistido"
        );
        Ok(status)
    }

    /// Correção manual por ator privilegiado: entrada append-only, só em
    /// registros ainda abertos.
    pub async fn apply_correction(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
        actor: &Actor,
        new_status: DayStatus,
        reason: &str,
    ) -> Result<DailyStatus, AppError> {
        if !actor.has_override_authority {
            return Err(AppError::invalid_transition(
                "correção manual exige autoridade de override",
            ));
        }
        let mut status = self
            .attendance_repo
            .get_daily_status(&self.pool, employee_id, date)
            .await?
            .ok_or(AppError::DailyStatusNotFound)?;

        if status.lock_status == LockStatus::Locked {
            return Err(AppError::invalid_transition(
                "registro trancado: o mês já foi finalizado",
            ));
        }

        status.corrections.0.push(Correction {
            actor_id: actor.id,
            reason: reason.to_string(),
            previous_status: status.final_status,
            new_status,
            at: Utc::now(),
        });
        status.final_status = new_status;
        status.reason = format!("correção manual: {}", reason);

        self.attendance_repo.update_correction(&status).await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hr::{PunchType, StaffRole};
    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    fn location(grace_in: i32) -> WorkLocation {
        WorkLocation {
            id: Uuid::new_v4(),
            name: "Matriz".to_string(),
            work_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            grace_checkin_min: grace_in,
            grace_checkout_min: 15,
            daily_hours: 8.0,
            weekend_days: vec![5, 6], // Sexta + Sábado
            created_at: None,
        }
    }

    fn evidence(date: NaiveDate, loc: WorkLocation) -> DayEvidence {
        let employee = Employee {
            id: Uuid::new_v4(),
            full_name: "Funcionário Teste".to_string(),
            role: StaffRole::Employee,
            supervisor_id: None,
            work_location_id: loc.id,
            is_active: true,
            created_at: None,
        };
        let contract = Contract {
            id: Uuid::new_v4(),
            employee_id: employee.id,
            monthly_salary: Decimal::new(600000, 2), // 6000.00
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            is_active: true,
            created_at: None,
        };
        DayEvidence {
            employee,
            contract,
            location: loc,
            date,
            holiday: None,
            leave: None,
            mission: None,
            forgotten_punch: None,
            permission: None,
            excuses: vec![],
            check_in: None,
            check_out: None,
        }
    }

    fn punch(ev: &DayEvidence, punch_type: PunchType, h: u32, m: u32) -> PunchEvent {
        PunchEvent {
            id: Uuid::new_v4(),
            employee_id: ev.employee.id,
            date: ev.date,
            punch_type,
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            created_at: None,
        }
    }

    fn executed_tx(ev: &DayEvidence, kind: TransactionKind, data: serde_json::Value) -> Transaction {
        use crate::models::transaction::{Stage, TransactionStatus};
        Transaction {
            id: Uuid::new_v4(),
            ref_no: "TRX-000099".to_string(),
            kind,
            status: TransactionStatus::Executed,
            current_stage: None,
            workflow: sqlx::types::Json(vec![Stage::Operations, Stage::Stas]),
            workflow_skipped_stages: sqlx::types::Json(vec![]),
            escalated: false,
            escalated_by_role: None,
            created_by: ev.employee.id,
            employee_id: ev.employee.id,
            start_date: ev.date,
            end_date: ev.date,
            data: sqlx::types::Json(data),
            timeline: sqlx::types::Json(vec![]),
            approval_chain: sqlx::types::Json(vec![]),
            created_at: None,
            updated_at: None,
        }
    }

    // Terça-feira comum.
    fn workday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn holiday_wins_over_everything() {
        let mut ev = evidence(workday(), location(15));
        ev.holiday = Some(Holiday {
            id: Uuid::new_v4(),
            name: "Feriado Nacional".to_string(),
            start_date: ev.date,
            end_date: ev.date,
            created_at: None,
        });
        // Mesmo com punch e licença presentes, o feriado decide.
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 0));
        ev.leave = Some(executed_tx(&ev, TransactionKind::LeaveRequest, serde_json::json!({})));

        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Holiday);
        assert_eq!(status.decision_source, "holiday");
        assert_eq!(status.required_hours, 0.0);
        // Só a primeira regra foi tentada.
        assert_eq!(status.trace_log.0.len(), 1);
    }

    #[test]
    fn weekend_from_location_pattern() {
        // 2025-06-13 é uma sexta-feira.
        let friday = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        let ev = evidence(friday, location(15));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Weekend);
        assert_eq!(status.trace_log.0.len(), 2);
    }

    #[test]
    fn executed_leave_never_absent() {
        let mut ev = evidence(workday(), location(15));
        ev.leave = Some(executed_tx(
            &ev,
            TransactionKind::LeaveRequest,
            serde_json::json!({ "leaveKind": "REGULAR" }),
        ));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::OnLeave);
        assert_eq!(status.decision_source, "leave");
    }

    #[test]
    fn administrative_leave_subtype() {
        let mut ev = evidence(workday(), location(15));
        ev.leave = Some(executed_tx(
            &ev,
            TransactionKind::LeaveRequest,
            serde_json::json!({ "leaveKind": "ADMINISTRATIVE" }),
        ));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::OnAdminLeave);
    }

    #[test]
    fn check_in_at_grace_boundary_is_not_late() {
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 15));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 16, 0));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Present);
        assert_eq!(status.late_minutes, 0);
    }

    #[test]
    fn one_minute_past_zero_grace_is_late_by_one() {
        let mut ev = evidence(workday(), location(0));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 1));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 16, 0));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Late);
        assert_eq!(status.late_minutes, 1);
    }

    #[test]
    fn late_twenty_minutes_scenario() {
        // check_in=08:20, work_start=08:00, grace=15min → LATE, 20 min.
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 20));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 16, 0));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Late);
        assert_eq!(status.late_minutes, 20);
        assert_eq!(status.actual_hours, Some(7.67));
    }

    #[test]
    fn missing_check_out_leaves_actual_hours_unset() {
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 0));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Present);
        assert!(status.actual_hours.is_none());
        assert_eq!(status.early_leave_minutes, 0);
    }

    #[test]
    fn early_leave_against_grace() {
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 0));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 15, 30));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::EarlyLeave);
        assert_eq!(status.early_leave_minutes, 30);
    }

    #[test]
    fn absent_when_nothing_matches() {
        let ev = evidence(workday(), location(15));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Absent);
        assert_eq!(status.decision_source, "absent");
        assert_eq!(status.reason, "no leave, mission, punch, or holiday found");
        // Todas as oito regras foram tentadas e registradas.
        assert_eq!(status.trace_log.0.len(), 8);
    }

    #[test]
    fn permission_without_check_in_decides_the_day() {
        let mut ev = evidence(workday(), location(15));
        ev.permission = Some(executed_tx(
            &ev,
            TransactionKind::PermissionRequest,
            serde_json::json!({ "hours": 2.0 }),
        ));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Permission);
        assert_eq!(status.permission_hours, 2.0);
    }

    #[test]
    fn forgotten_punch_correction_yields_present() {
        let mut ev = evidence(workday(), location(15));
        ev.forgotten_punch = Some(executed_tx(
            &ev,
            TransactionKind::ForgottenPunch,
            serde_json::json!({ "claimedCheckIn": "08:00:00", "claimedCheckOut": "16:00:00" }),
        ));
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Present);
        assert_eq!(status.decision_source, "forgotten_punch");
        assert_eq!(status.actual_hours, Some(8.0));
    }

    #[test]
    fn executed_excuse_suppresses_deduction_but_keeps_status() {
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 30));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 16, 0));
        ev.excuses = vec![executed_tx(
            &ev,
            TransactionKind::LateExcuse,
            serde_json::json!({ "justification": "consulta médica" }),
        )];
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Late);
        assert!(status.deduction_exempt);
        assert_eq!(status.source_refs.0.excuse_transaction_ids.len(), 1);
    }

    #[test]
    fn wrong_kind_of_excuse_does_not_suppress() {
        let mut ev = evidence(workday(), location(15));
        ev.check_in = Some(punch(&ev, PunchType::CheckIn, 8, 30));
        ev.check_out = Some(punch(&ev, PunchType::CheckOut, 16, 0));
        ev.excuses = vec![executed_tx(
            &ev,
            TransactionKind::EarlyLeaveExcuse,
            serde_json::json!({ "justification": "n/a" }),
        )];
        let status = resolve_from_evidence(&ev, vec![]);
        assert_eq!(status.final_status, DayStatus::Late);
        assert!(!status.deduction_exempt);
    }
}
