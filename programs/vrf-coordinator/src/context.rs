use std::sync::Arc;

use anchor_lang::prelude::Pubkey;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::gas::{GasMeter, OutOfGas};
use crate::Coordinator;

/// Per-transaction execution context handed to every mutating operation.
#[derive(Debug, Clone)]
pub struct TxContext {
    /// Identity on whose behalf the operation runs.
    pub caller: Pubkey,
    /// Height of the block the operation executes in.
    pub block_number: u64,
    /// Unix timestamp (seconds) of that block.
    pub timestamp: u64,
    /// Price per unit of gas, in wei.
    pub gas_price: u128,
    pub gas: GasMeter,
}

impl TxContext {
    pub fn new(caller: Pubkey, block_number: u64, timestamp: u64, gas_price: u128, gas_limit: u64) -> Self {
        Self {
            caller,
            block_number,
            timestamp,
            gas_price,
            gas: GasMeter::new(gas_limit),
        }
    }

    /// Context for a nested call made by `caller`, funded with whatever gas is left.
    pub fn nested(&self, caller: Pubkey) -> TxContext {
        TxContext {
            caller,
            block_number: self.block_number,
            timestamp: self.timestamp,
            gas_price: self.gas_price,
            gas: GasMeter::new(self.gas.remaining()),
        }
    }

    /// Charge the gas a nested call used back to this context.
    pub fn absorb(&mut self, nested: &TxContext) -> Result<(), OutOfGas> {
        self.gas.consume(nested.gas.used())
    }
}

/// What a consumer sees while its fulfillment callback runs.
pub struct CallbackContext<'a> {
    /// The coordinator delivering the words. Calls made through it from
    /// inside the callback are subject to its reentrancy guard.
    pub coordinator: &'a Coordinator,
    /// The callback's own budget, exactly the request's callback gas limit.
    pub gas: &'a mut GasMeter,
    pub block_number: u64,
    pub timestamp: u64,
    pub gas_price: u128,
}

impl CallbackContext<'_> {
    /// Identity of the coordinator invoking the callback.
    pub fn caller(&self) -> Pubkey {
        self.coordinator.id()
    }

    /// Context for a call from the consumer (`caller`) back into a coordinator.
    pub fn nested(&self, caller: Pubkey) -> TxContext {
        TxContext {
            caller,
            block_number: self.block_number,
            timestamp: self.timestamp,
            gas_price: self.gas_price,
            gas: GasMeter::new(self.gas.remaining()),
        }
    }

    pub fn absorb(&mut self, nested: &TxContext) -> Result<(), OutOfGas> {
        self.gas.consume(nested.gas.used())
    }
}

/// Serializes operations across every coordinator holding a clone of it.
///
/// A coordinator takes this lock before its own, so coordinators that call
/// into one another (migration, consumer callbacks) always lock in the same
/// order. Reentrant: a thread already inside an operation may start another.
#[derive(Clone, Default)]
pub struct ExecutionLock(Arc<ReentrantMutex<()>>);

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.0.lock()
    }

    /// Whether `self` and `other` are the same lock.
    pub fn is_shared_with(&self, other: &ExecutionLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ExecutionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLock").finish_non_exhaustive()
    }
}
