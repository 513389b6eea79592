// src/common/error.rs

use thiserror::Error;

use crate::models::attendance::TraceEntry;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// A taxonomia segue as quatro famílias do núcleo: NotFound,
// InvalidStateTransition, ResolutionIncomplete e ConcurrencyConflict.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Funcionário não encontrado")]
    EmployeeNotFound,

    #[error("Contrato ativo não encontrado para o funcionário")]
    ContractNotFound,

    #[error("Local de trabalho não encontrado")]
    WorkLocationNotFound,

    #[error("Transação não encontrada")]
    TransactionNotFound,

    #[error("Proposta de dedução não encontrada")]
    ProposalNotFound,

    #[error("Advertência não encontrada")]
    WarningNotFound,

    #[error("Registro de horas mensais não encontrado")]
    MonthlyHoursNotFound,

    #[error("Status diário não encontrado")]
    DailyStatusNotFound,

    // Violação de regra de negócio: a invariante violada vai na mensagem,
    // porque o revisor precisa ver o motivo exato da recusa.
    #[error("Transição de estado inválida: {0}")]
    InvalidStateTransition(String),

    // O Day Resolver não conseguiu carregar os dados de referência.
    // Carrega o trace parcial coletado até o ponto da falha.
    #[error("Resolução incompleta: {reason}")]
    ResolutionIncomplete {
        reason: String,
        partial_trace: Vec<TraceEntry>,
    },

    // O pré-estado esperado não bate mais (corrida perdida).
    // O chamador deve reler o registro e tentar de novo.
    #[error("Conflito de concorrência: o registro mudou desde a leitura")]
    ConcurrencyConflict,

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Atalho para violações de regra de negócio com mensagem formatada.
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        AppError::InvalidStateTransition(msg.into())
    }
}
