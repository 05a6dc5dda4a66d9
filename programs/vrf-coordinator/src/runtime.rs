//! Transaction machinery shared by every coordinator operation.
//!
//! Operations run with the environment's execution lock and then the
//! coordinator lock held for their whole duration, so operations from
//! different threads never interleave, on this coordinator or on any other
//! sharing the environment. Both locks are reentrant: a consumer callback
//! running on the same thread can call back into a coordinator, where
//! guarded operations refuse it.
//!
//! Each operation mutates a working copy of the state that replaces the
//! committed state only if the operation succeeds. Events are queued and
//! reach the log when the outermost operation returns `Ok`.

use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::CoordinatorEvent;
use crate::interfaces::Environment;
use crate::state::CoordinatorState;
use crate::Coordinator;

pub(crate) struct Inner {
    pub(crate) state: RefCell<CoordinatorState>,
    queued: RefCell<Vec<CoordinatorEvent>>,
    pub(crate) log: RefCell<Vec<CoordinatorEvent>>,
    entered: Cell<bool>,
    depth: Cell<u32>,
}

impl Inner {
    pub(crate) fn new(state: CoordinatorState) -> Self {
        Self {
            state: RefCell::new(state),
            queued: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
            entered: Cell::new(false),
            depth: Cell::new(0),
        }
    }
}

/// Held while a guarded operation runs.
struct ReentrancyGuard<'a>(&'a Cell<bool>);

impl<'a> ReentrancyGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Result<Self> {
        if flag.get() {
            return Err(CoordinatorError::Reentrant);
        }
        flag.set(true);
        Ok(Self(flag))
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Nesting level of coordinator operations on the lock-holding thread.
struct DepthScope<'a>(&'a Cell<u32>);

impl<'a> DepthScope<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }

    fn is_outermost(&self) -> bool {
        self.0.get() == 1
    }
}

impl Drop for DepthScope<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// What an operation body sees: its working copy of the state, the
/// transaction it runs in, and the collaborators.
pub(crate) struct Context<'a> {
    pub state: &'a mut CoordinatorState,
    pub tx: &'a mut TxContext,
    pub env: &'a Environment,
    events: &'a mut Vec<CoordinatorEvent>,
}

impl Context<'_> {
    pub fn emit(&mut self, event: impl Into<CoordinatorEvent>) {
        self.events.push(event.into());
    }

    pub fn only_owner(&self) -> Result<()> {
        if self.tx.caller != self.state.owner {
            return Err(CoordinatorError::OnlyCallableByOwner);
        }
        Ok(())
    }

    pub fn only_sub_owner(&self, sub_id: u64) -> Result<()> {
        self.state.only_sub_owner(sub_id, &self.tx.caller)
    }

    /// Charge `amount` gas to the transaction.
    pub fn charge(&mut self, amount: u64) -> Result<()> {
        self.tx.gas.consume(amount)?;
        Ok(())
    }

    pub fn charge_reads(&mut self, count: u64) -> Result<()> {
        self.charge(self.env.gas_schedule.storage_read * count)
    }

    pub fn charge_writes(&mut self, count: u64) -> Result<()> {
        self.charge(self.env.gas_schedule.storage_write * count)
    }
}

impl Coordinator {
    /// Lock the environment then this coordinator, optionally enter the reentrancy guard, and run `op`. Events
    /// queued by a failed `op` are dropped; the outermost successful
    /// operation publishes the queue to the log.
    fn run<T>(&self, guarded: bool, op: impl FnOnce(&Inner) -> Result<T>) -> Result<T> {
        let _serial = self.env.execution_lock.enter();
        let inner = self.inner.lock();
        let _guard = if guarded {
            Some(ReentrancyGuard::enter(&inner.entered)?)
        } else {
            None
        };
        let depth = DepthScope::enter(&inner.depth);
        let mark = inner.queued.borrow().len();

        let result = op(&inner);
        if result.is_err() {
            inner.queued.borrow_mut().truncate(mark);
        }
        if depth.is_outermost() {
            let published: Vec<CoordinatorEvent> = inner.queued.borrow_mut().drain(..).collect();
            let mut log = inner.log.borrow_mut();
            for event in published {
                debug!(seq = log.len(), event = event.name(), "Event published");
                log.push(event);
            }
        }
        result
    }

    /// Run `op` against a working copy of the state and commit it on success.
    pub(crate) fn transact<T>(
        &self,
        tx: &mut TxContext,
        guarded: bool,
        op: impl FnOnce(&mut Context<'_>) -> Result<T>,
    ) -> Result<T> {
        self.run(guarded, |inner| {
            let mut working = inner.state.borrow().clone();
            let mut events = Vec::new();
            let value = op(&mut Context {
                state: &mut working,
                tx,
                env: &self.env,
                events: &mut events,
            })?;
            *inner.state.borrow_mut() = working;
            inner.queued.borrow_mut().extend(events);
            Ok(value)
        })
    }

    /// Run a multi-stage operation that calls out to external code between
    /// its stages. If any stage fails, the state is restored to what it was
    /// on entry, including changes made by nested operations in between.
    pub(crate) fn atomic<T>(&self, guarded: bool, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.run(guarded, |inner| {
            let snapshot = inner.state.borrow().clone();
            let result = op();
            if result.is_err() {
                *inner.state.borrow_mut() = snapshot;
            }
            result
        })
    }

    /// One committed step of an [`atomic`](Self::atomic) operation.
    pub(crate) fn stage<T>(
        &self,
        tx: &mut TxContext,
        op: impl FnOnce(&mut Context<'_>) -> Result<T>,
    ) -> Result<T> {
        self.transact(tx, false, op)
    }

    /// Read the committed state.
    pub(crate) fn view<T>(&self, f: impl FnOnce(&CoordinatorState) -> T) -> T {
        let inner = self.inner.lock();
        let state = inner.state.borrow();
        f(&state)
    }
}
