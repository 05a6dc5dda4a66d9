use anchor_lang::prelude::Pubkey;
use tracing::info;

use super::ensure_held;
use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::SubscriptionCanceled;
use crate::Coordinator;

/// Close `sub_id` and send its balances to `to` (subscription-owner only).
/// Refused while a request is pending.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64, to: Pubkey) -> Result<()> {
    coordinator.atomic(true, || {
        let refund = coordinator.stage(tx, |ctx| {
            ctx.only_sub_owner(sub_id)?;
            if ctx.state.pending_request_exists(sub_id) {
                return Err(CoordinatorError::PendingRequestExists);
            }
            close(ctx, sub_id, to)
        })?;
        release(coordinator, refund, to)
    })
}

/// Close `sub_id` regardless of pending requests and refund its owner
/// (coordinator-owner only).
pub fn owner_cancel(coordinator: &Coordinator, tx: &mut TxContext, sub_id: u64) -> Result<()> {
    coordinator.atomic(true, || {
        let (refund, to) = coordinator.stage(tx, |ctx| {
            ctx.only_owner()?;
            let to = ctx.state.subscription(sub_id)?.owner;
            Ok((close(ctx, sub_id, to)?, to))
        })?;
        release(coordinator, refund, to)
    })
}

#[derive(Debug, Clone, Copy)]
struct Refund {
    link: u128,
    native: u128,
}

fn close(ctx: &mut crate::runtime::Context<'_>, sub_id: u64, to: Pubkey) -> Result<Refund> {
    let sub = ctx.state.delete_subscription(sub_id)?;
    ctx.state.total_balance = ctx
        .state
        .total_balance
        .checked_sub(sub.balance)
        .ok_or(CoordinatorError::BalanceOverflow)?;
    ctx.state.total_native_balance = ctx
        .state
        .total_native_balance
        .checked_sub(sub.native_balance)
        .ok_or(CoordinatorError::BalanceOverflow)?;
    ctx.charge_writes(1 + sub.consumers.len() as u64)?;

    ctx.emit(SubscriptionCanceled {
        sub_id,
        to,
        amount_link: sub.balance,
        amount_native: sub.native_balance,
    });
    info!(sub_id, %to, link = sub.balance, native = sub.native_balance, "Subscription canceled");
    Ok(Refund {
        link: sub.balance,
        native: sub.native_balance,
    })
}

/// Pay `refund` out to `to`. Both balances are checked before either moves.
fn release(coordinator: &Coordinator, refund: Refund, to: Pubkey) -> Result<()> {
    let from = coordinator.id();
    let env = &coordinator.env;
    let link_token = match refund.link {
        0 => None,
        _ => Some(env.link_token.clone().ok_or(CoordinatorError::LinkNotSet)?),
    };
    if let Some(token) = &link_token {
        ensure_held(token.as_ref(), &from, refund.link)?;
    }
    ensure_held(env.native_token.as_ref(), &from, refund.native)?;

    if let Some(token) = &link_token {
        token
            .transfer(&from, &to, refund.link)
            .map_err(CoordinatorError::TransferFailed)?;
    }
    if refund.native > 0 {
        env.native_token
            .transfer(&from, &to, refund.native)
            .map_err(CoordinatorError::TransferFailed)?;
    }
    Ok(())
}
