use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("budget exhausted: budget={budget} attempted={attempted}")]
    Exhausted { budget: u64, attempted: u64 },

    #[error("reservation token not found (already settled or released)")]
    UnknownReservation,
}

impl BudgetError {
    /// Budget exhaustion is always a permanent failure for the job (spec §7).
    pub fn is_transient(&self) -> bool {
        false
    }
}
