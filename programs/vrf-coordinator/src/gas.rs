//! Gas metering and the bounded-budget call used for consumer callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

use crate::errors::{CoordinatorError, Result};

/// Gas reserved to check the budget and dispatch a bounded call.
pub const GAS_FOR_CALL_EXACT_CHECK: u64 = 5_000;

/// Raised when a meter is asked for more gas than it has left.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("out of gas: limit {limit}, wanted {wanted}")]
pub struct OutOfGas {
    pub limit: u64,
    pub wanted: u64,
}

/// A gas allowance that is drawn down as work is charged against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Charge `amount`. Exhausting the meter burns whatever was left.
    pub fn consume(&mut self, amount: u64) -> std::result::Result<(), OutOfGas> {
        if amount > self.remaining() {
            self.used = self.limit;
            return Err(OutOfGas {
                limit: self.limit,
                wanted: amount,
            });
        }
        self.used += amount;
        Ok(())
    }
}

/// Prices of the coordinator's own work, supplied by the execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    pub proof_verification: u64,
    pub storage_read: u64,
    pub storage_write: u64,
    pub per_random_word: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            proof_verification: 120_000,
            storage_read: 2_100,
            storage_write: 5_000,
            per_random_word: 150,
        }
    }
}

/// Run `call` with exactly `budget` gas and capture its outcome as a bool.
///
/// Fails the enclosing operation only when the caller cannot cover the check
/// itself or cannot forward the full budget after the 1/64 retention. The
/// callee's own error, its gas exhaustion, and its panic all come back as
/// `Ok(false)`. Gas the callee burned is charged to `meter`.
pub fn call_with_exact_gas<F, E>(meter: &mut GasMeter, budget: u64, call: F) -> Result<bool>
where
    F: FnOnce(&mut GasMeter) -> std::result::Result<(), E>,
{
    let available = meter.remaining();
    if available < GAS_FOR_CALL_EXACT_CHECK {
        return Err(CoordinatorError::InsufficientGasForConsumer {
            have: available,
            want: GAS_FOR_CALL_EXACT_CHECK,
        });
    }
    meter.consume(GAS_FOR_CALL_EXACT_CHECK)?;

    let left = meter.remaining();
    let forwardable = left - left / 64;
    if forwardable <= budget {
        return Err(CoordinatorError::InsufficientGasForConsumer {
            have: forwardable,
            want: budget,
        });
    }

    let mut budgeted = GasMeter::new(budget);
    let outcome = catch_unwind(AssertUnwindSafe(|| call(&mut budgeted)));
    meter.consume(budgeted.used())?;

    Ok(matches!(outcome, Ok(Ok(()))))
}
