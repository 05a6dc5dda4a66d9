use anchor_lang::prelude::Pubkey;
use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::FundsWithdrawn;
use crate::Coordinator;

/// Send the caller's fee-token earnings to `recipient` and return the amount.
pub fn link(coordinator: &Coordinator, tx: &mut TxContext, recipient: Pubkey) -> Result<u128> {
    let token = coordinator.env.link_token.clone().ok_or(CoordinatorError::LinkNotSet)?;
    coordinator.atomic(false, || {
        let amount = coordinator.stage(tx, |ctx| take_earnings(ctx, recipient, false))?;
        token
            .transfer(&coordinator.id(), &recipient, amount)
            .map_err(CoordinatorError::TransferFailed)?;
        Ok(amount)
    })
}

/// Send the caller's native earnings to `recipient` and return the amount.
pub fn native(coordinator: &Coordinator, tx: &mut TxContext, recipient: Pubkey) -> Result<u128> {
    let token = coordinator.env.native_token.clone();
    coordinator.atomic(false, || {
        let amount = coordinator.stage(tx, |ctx| take_earnings(ctx, recipient, true))?;
        token
            .transfer(&coordinator.id(), &recipient, amount)
            .map_err(CoordinatorError::TransferFailed)?;
        Ok(amount)
    })
}

fn take_earnings(ctx: &mut crate::runtime::Context<'_>, recipient: Pubkey, native: bool) -> Result<u128> {
    let oracle = ctx.tx.caller;
    let (earnings, total) = if native {
        (&mut ctx.state.withdrawable_native, &mut ctx.state.total_native_balance)
    } else {
        (&mut ctx.state.withdrawable_tokens, &mut ctx.state.total_balance)
    };
    let amount = earnings.remove(&oracle).unwrap_or(0);
    if amount == 0 {
        return Err(CoordinatorError::InsufficientBalance);
    }
    *total = total.checked_sub(amount).ok_or(CoordinatorError::BalanceOverflow)?;
    ctx.charge_writes(2)?;

    ctx.emit(FundsWithdrawn { oracle, recipient, amount, native });
    info!(%oracle, %recipient, amount, native, "Earnings withdrawn");
    Ok(amount)
}
