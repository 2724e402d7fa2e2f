//! Budget Ledger — per-job token accounting with pre-flight reservation
//! (spec §4.6).
//!
//! The ledger is per-job, single-owner state: the engine drives one job's
//! steps sequentially, so access here needs no fine-grained locking, only
//! `&mut self`.

mod error;

pub use error::BudgetError;

use tracing::{debug, info, warn};
use uuid::Uuid;

/// A handle returned by [`BudgetLedger::reserve`], redeemed by `settle` or
/// `release`. Opaque to callers beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationToken(Uuid);

struct Reservation {
    token: ReservationToken,
    estimated_cost: u64,
}

/// Tracks tokens spent against a single job's budget.
///
/// `used + outstanding reservations` must never exceed `budget`; `reserve`
/// enforces this at the point of call.
pub struct BudgetLedger {
    budget: u64,
    used: u64,
    reservations: Vec<Reservation>,
}

impl BudgetLedger {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            used: 0,
            reservations: Vec::new(),
        }
    }

    /// Restores a ledger whose `used` total was already recorded in a
    /// checkpoint (used when resuming a job).
    pub fn resume(budget: u64, tokens_used: u64) -> Self {
        Self {
            budget,
            used: tokens_used,
            reservations: Vec::new(),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    fn outstanding(&self) -> u64 {
        self.reservations.iter().map(|r| r.estimated_cost).sum()
    }

    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used + self.outstanding())
    }

    /// Registers a reservation for `estimated_cost` tokens, failing if doing
    /// so would exceed the job's budget.
    pub fn reserve(&mut self, estimated_cost: u64) -> Result<ReservationToken, BudgetError> {
        debug!(estimated_cost, used = self.used, budget = self.budget, "BudgetLedger::reserve: called");
        let projected = self.used + self.outstanding() + estimated_cost;
        if projected > self.budget {
            warn!(projected, budget = self.budget, "BudgetLedger::reserve: budget would be exceeded");
            return Err(BudgetError::Exhausted {
                budget: self.budget,
                attempted: projected,
            });
        }
        let token = ReservationToken(Uuid::new_v4());
        self.reservations.push(Reservation {
            token,
            estimated_cost,
        });
        Ok(token)
    }

    /// Cancels the reservation and charges `actual_cost` to `used`.
    pub fn settle(&mut self, token: ReservationToken, actual_cost: u64) -> Result<(), BudgetError> {
        self.take_reservation(token)?;
        self.used = self.used.saturating_add(actual_cost);
        info!(actual_cost, used = self.used, "BudgetLedger::settle: charged");
        Ok(())
    }

    /// Cancels the reservation without charging anything — used when a call
    /// fails before incurring cost.
    pub fn release(&mut self, token: ReservationToken) -> Result<(), BudgetError> {
        self.take_reservation(token)?;
        debug!("BudgetLedger::release: reservation released without charge");
        Ok(())
    }

    fn take_reservation(&mut self, token: ReservationToken) -> Result<Reservation, BudgetError> {
        let pos = self
            .reservations
            .iter()
            .position(|r| r.token == token)
            .ok_or(BudgetError::UnknownReservation)?;
        Ok(self.reservations.remove(pos))
    }

    /// Whether at least `minimum_headroom` tokens remain unreserved and
    /// unspent — the pre-flight check the engine runs before each step
    /// (spec §4.1 step 3).
    pub fn has_headroom(&self, minimum_headroom: u64) -> bool {
        self.remaining() >= minimum_headroom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_within_budget_succeeds() {
        let mut ledger = BudgetLedger::new(1000);
        let token = ledger.reserve(400).unwrap();
        assert_eq!(ledger.remaining(), 600);
        ledger.settle(token, 350).unwrap();
        assert_eq!(ledger.used(), 350);
        assert_eq!(ledger.remaining(), 650);
    }

    #[test]
    fn test_reserve_exceeding_budget_fails() {
        let mut ledger = BudgetLedger::new(100);
        let err = ledger.reserve(200).unwrap_err();
        assert!(matches!(err, BudgetError::Exhausted { .. }));
    }

    #[test]
    fn test_release_does_not_charge() {
        let mut ledger = BudgetLedger::new(1000);
        let token = ledger.reserve(400).unwrap();
        ledger.release(token).unwrap();
        assert_eq!(ledger.used(), 0);
        assert_eq!(ledger.remaining(), 1000);
    }

    #[test]
    fn test_double_settle_fails() {
        let mut ledger = BudgetLedger::new(1000);
        let token = ledger.reserve(100).unwrap();
        ledger.settle(token, 100).unwrap();
        assert!(matches!(ledger.settle(token, 100), Err(BudgetError::UnknownReservation)));
    }

    #[test]
    fn test_outstanding_reservations_count_against_headroom() {
        let mut ledger = BudgetLedger::new(1000);
        let _token = ledger.reserve(900).unwrap();
        assert!(!ledger.has_headroom(200));
        assert!(ledger.has_headroom(100));
    }

    #[test]
    fn test_resume_restores_prior_usage() {
        let ledger = BudgetLedger::resume(1000, 600);
        assert_eq!(ledger.used(), 600);
        assert_eq!(ledger.remaining(), 400);
    }
}
