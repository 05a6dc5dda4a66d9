use anchor_lang::prelude::Pubkey;
use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::{SubscriptionOwnerTransferRequested, SubscriptionOwnerTransferred};
use crate::Coordinator;

/// First step of an ownership transfer: propose `new_owner` (subscription-owner only).
pub fn request(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, new_owner: Pubkey) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_sub_owner(sub_id)?;
        let from = ctx.tx.caller;
        let sub = ctx.state.subscription_mut(sub_id)?;
        if sub.requested_owner == Some(new_owner) {
            return Ok(());
        }
        sub.requested_owner = Some(new_owner);
        ctx.charge_writes(1)?;

        ctx.emit(SubscriptionOwnerTransferRequested { sub_id, from, to: new_owner });
        Ok(())
    })
}

/// Second step: the proposed owner takes over `sub_id`.
pub fn accept(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        let caller = ctx.tx.caller;
        let sub = ctx.state.subscription_mut(sub_id)?;
        match sub.requested_owner {
            Some(requested) if requested == caller => {}
            requested => {
                return Err(CoordinatorError::MustBeRequestedOwner(requested.unwrap_or_default()));
            }
        }
        let from = sub.owner;
        sub.owner = caller;
        sub.requested_owner = None;
        ctx.charge_writes(2)?;

        ctx.emit(SubscriptionOwnerTransferred { sub_id, from, to: caller });
        info!(sub_id, %from, to = %caller, "Subscription owner transferred");
        Ok(())
    })
}
