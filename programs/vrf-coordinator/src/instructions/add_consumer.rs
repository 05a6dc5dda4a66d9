use anchor_lang::prelude::Pubkey;
use tracing::{debug, info};

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::SubscriptionConsumerAdded;
use crate::state::MAX_CONSUMERS;
use crate::Coordinator;

/// Authorize `consumer` to request against `sub_id` (subscription-owner only).
///
/// Adding a consumer that is already registered changes nothing.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, consumer: Pubkey) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_sub_owner(sub_id)?;
        ctx.charge_reads(1)?;

        if ctx.state.consumer_nonce(&consumer, sub_id) != 0 {
            debug!(sub_id, %consumer, "Consumer already registered");
            return Ok(());
        }
        let sub = ctx.state.subscription_mut(sub_id)?;
        if sub.consumers.len() >= MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers);
        }
        sub.consumers.push(consumer);
        // A live consumer always has a nonzero nonce.
        ctx.state.consumer_nonces.insert((consumer, sub_id), 1);
        ctx.charge_writes(2)?;

        ctx.emit(SubscriptionConsumerAdded { sub_id, consumer });
        info!(sub_id, %consumer, "Consumer added");
        Ok(())
    })
}
