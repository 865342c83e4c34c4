use dues_domain::PaymentStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Billing period not found: {0}")]
    PeriodNotFound(Uuid),
    #[error("Payment record not found: `{player}` in period {period_id}")]
    RecordNotFound { period_id: Uuid, player: String },
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("Scheduled billing not found: {0}")]
    ScheduleNotFound(Uuid),
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn record_not_found(period_id: Uuid, player: &str) -> Self {
        CoreError::RecordNotFound {
            period_id,
            player: player.to_string(),
        }
    }

    /// Returns `true` for the lookup failures callers usually treat as a soft miss.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::PeriodNotFound(_)
                | CoreError::RecordNotFound { .. }
                | CoreError::EntryNotFound(_)
                | CoreError::ScheduleNotFound(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
