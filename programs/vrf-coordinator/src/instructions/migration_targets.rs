use anchor_lang::prelude::Pubkey;
use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::{CoordinatorDeregistered, CoordinatorRegistered};
use crate::Coordinator;

/// Allow subscriptions to migrate to `target` (owner-only).
pub fn register(coordinator: &Coordinator, tx: &mut TxContext, target: Pubkey) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_owner()?;
        if target == Pubkey::default() {
            return Err(CoordinatorError::ZeroAddressNotAllowed);
        }
        if ctx.state.is_migration_target(&target) {
            return Err(CoordinatorError::CoordinatorAlreadyRegistered(target));
        }

        ctx.charge_writes(1)?;
        ctx.state.migration_targets.push(target);

        ctx.emit(CoordinatorRegistered { coordinator: target });
        info!(%target, "Migration target registered");
        Ok(())
    })
}

/// Stop allowing migrations to `target` (owner-only). Order of the remaining targets is not kept.
pub fn deregister(coordinator: &Coordinator, tx: &mut TxContext, target: Pubkey) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_owner()?;

        let targets = &mut ctx.state.migration_targets;
        let i = targets
            .iter()
            .position(|t| *t == target)
            .ok_or(CoordinatorError::CoordinatorNotRegistered(target))?;
        targets.swap_remove(i);
        ctx.charge_writes(1)?;

        ctx.emit(CoordinatorDeregistered { coordinator: target });
        info!(%target, "Migration target deregistered");
        Ok(())
    })
}
