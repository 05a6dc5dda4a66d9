use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::{SubscriptionFunded, SubscriptionFundedWithNative};
use crate::Coordinator;

/// Pull `amount` fee tokens from the caller into `sub_id`.
pub fn with_link(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, amount: u128) -> Result<()> {
    let token = coordinator.env.link_token.clone().ok_or(CoordinatorError::LinkNotSet)?;
    coordinator.atomic(false, || {
        coordinator.stage(tx, |ctx| {
            ctx.charge_writes(2)?;
            let sub = ctx.state.subscription_mut(sub_id)?;
            let old_balance = sub.balance;
            sub.balance = old_balance
                .checked_add(amount)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            let new_balance = sub.balance;
            ctx.state.total_balance = ctx
                .state
                .total_balance
                .checked_add(amount)
                .ok_or(CoordinatorError::BalanceOverflow)?;

            ctx.emit(SubscriptionFunded { sub_id, old_balance, new_balance });
            info!(sub_id, amount, new_balance, "Subscription funded");
            Ok(())
        })?;
        token
            .transfer(&tx.caller, &coordinator.id(), amount)
            .map_err(CoordinatorError::TransferFailed)
    })
}

/// Pull `amount` native tokens from the caller into `sub_id`.
pub fn with_native(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, amount: u128) -> Result<()> {
    let token = coordinator.env.native_token.clone();
    coordinator.atomic(false, || {
        coordinator.stage(tx, |ctx| {
            ctx.charge_writes(2)?;
            let sub = ctx.state.subscription_mut(sub_id)?;
            let old_native_balance = sub.native_balance;
            sub.native_balance = old_native_balance
                .checked_add(amount)
                .ok_or(CoordinatorError::BalanceOverflow)?;
            let new_native_balance = sub.native_balance;
            ctx.state.total_native_balance = ctx
                .state
                .total_native_balance
                .checked_add(amount)
                .ok_or(CoordinatorError::BalanceOverflow)?;

            ctx.emit(SubscriptionFundedWithNative {
                sub_id,
                old_native_balance,
                new_native_balance,
            });
            info!(sub_id, amount, new_native_balance, "Subscription funded with native");
            Ok(())
        })?;
        token
            .transfer(&tx.caller, &coordinator.id(), amount)
            .map_err(CoordinatorError::TransferFailed)
    })
}
