use anchor_lang::prelude::Pubkey;
use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::SubscriptionConsumerRemoved;
use crate::Coordinator;

/// Revoke `consumer` from `sub_id` (subscription-owner only).
///
/// Refused while a request is pending. The consumer list is swap-removed, so
/// its order changes.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, consumer: Pubkey) -> Result<()> {
    coordinator.transact(tx, true, |ctx| {
        ctx.only_sub_owner(sub_id)?;
        if ctx.state.pending_request_exists(sub_id) {
            return Err(CoordinatorError::PendingRequestExists);
        }
        if ctx.state.consumer_nonce(&consumer, sub_id) == 0 {
            return Err(CoordinatorError::InvalidConsumer { sub_id, consumer });
        }

        let sub = ctx.state.subscription_mut(sub_id)?;
        if let Some(i) = sub.consumers.iter().position(|c| *c == consumer) {
            sub.consumers.swap_remove(i);
        }
        ctx.state.consumer_nonces.remove(&(consumer, sub_id));
        ctx.charge_writes(2)?;

        ctx.emit(SubscriptionConsumerRemoved { sub_id, consumer });
        info!(sub_id, %consumer, "Consumer removed");
        Ok(())
    })
}
