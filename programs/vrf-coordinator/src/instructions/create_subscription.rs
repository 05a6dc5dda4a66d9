use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::SubscriptionCreated;
use crate::state::Subscription;
use crate::Coordinator;

/// Create an empty subscription owned by the caller and return its id.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext) -> Result<u64> {
    coordinator.transact(tx, false, |ctx| {
        let sub_id = ctx
            .state
            .current_sub_id
            .checked_add(1)
            .ok_or(CoordinatorError::CounterOverflow)?;
        let owner = ctx.tx.caller;

        ctx.charge_writes(2)?;
        ctx.state.current_sub_id = sub_id;
        ctx.state.subscriptions.insert(sub_id, Subscription::new(owner));

        ctx.emit(SubscriptionCreated { sub_id, owner });
        info!(sub_id, %owner, "Subscription created");
        Ok(sub_id)
    })
}
