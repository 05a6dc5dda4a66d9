use anchor_lang::prelude::Pubkey;
use tracing::info;

use crate::commitment::{hash_of_key, Hash};
use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::{ProvingKeyDeregistered, ProvingKeyRegistered};
use crate::Coordinator;

/// Authorize `oracle` to fulfill with `public_key` (owner-only).
pub fn register(
    coordinator: &Coordinator,
    tx: &mut TxContext,
    oracle: Pubkey,
    public_key: [u8; 32],
) -> Result<Hash> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_owner()?;
        if oracle == Pubkey::default() {
            return Err(CoordinatorError::ZeroAddressNotAllowed);
        }

        let key_hash = hash_of_key(&public_key);
        if ctx.state.proving_keys.contains_key(&key_hash) {
            return Err(CoordinatorError::ProvingKeyAlreadyRegistered(key_hash));
        }

        ctx.charge_writes(2)?;
        ctx.state.proving_keys.insert(key_hash, oracle);
        ctx.state.proving_key_hashes.push(key_hash);

        ctx.emit(ProvingKeyRegistered { key_hash, oracle });
        info!(key_hash = %hex::encode(key_hash), %oracle, "Proving key registered");
        Ok(key_hash)
    })
}

/// Revoke `public_key` (owner-only). Requests made against it can no longer be fulfilled.
pub fn deregister(coordinator: &Coordinator, tx: &mut TxContext, public_key: [u8; 32]) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_owner()?;

        let key_hash = hash_of_key(&public_key);
        let oracle = ctx
            .state
            .proving_keys
            .remove(&key_hash)
            .ok_or(CoordinatorError::NoSuchProvingKey(key_hash))?;
        if let Some(i) = ctx.state.proving_key_hashes.iter().position(|h| *h == key_hash) {
            ctx.state.proving_key_hashes.swap_remove(i);
        }
        ctx.charge_writes(2)?;

        ctx.emit(ProvingKeyDeregistered { key_hash, oracle });
        info!(key_hash = %hex::encode(key_hash), %oracle, "Proving key deregistered");
        Ok(())
    })
}
