use anchor_lang::prelude::Pubkey;
use tracing::{info, warn};

use crate::commitment::{actual_seed, hash_of_key, request_id_from_seed, Hash, RequestCommitment, RequestId};
use crate::context::{CallbackContext, TxContext};
use crate::errors::{CoordinatorError, Result};
use crate::events::RandomWordsFulfilled;
use crate::gas::call_with_exact_gas;
use crate::interfaces::CallbackError;
use crate::payment::{calculate_payment_amount, GasCost};
use crate::proof::{expand_randomness, Proof};
use crate::runtime::Context;
use crate::state::BLOCKHASH_WINDOW;
use crate::Coordinator;

/// Result of a fulfillment, as reported to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentOutcome {
    pub request_id: RequestId,
    /// Amount credited to the oracle, in the request's payment currency.
    pub payment: u128,
    pub native_payment: bool,
    /// Whether the consumer callback completed within its budget.
    pub success: bool,
}

/// What survives verification and is handed to delivery and settlement.
struct Verified {
    request_id: RequestId,
    oracle: Pubkey,
    randomness: Hash,
    words: Vec<Hash>,
}

/// Verify `proof` against the stored commitment, deliver the words to the
/// consumer under its gas budget, and pay the oracle.
///
/// 1. **Verify**: fingerprint, commitment digest, block hash, proof.
/// 2. **Consume**: the commitment is deleted before the consumer runs, so
///    the request can never be fulfilled twice.
/// 3. **Deliver**: the consumer callback runs with exactly
///    `callback_gas_limit` gas; its failure is reported, not propagated.
/// 4. **Settle**: the subscription is charged for the gas used so far and
///    the oracle credited.
///
/// Any failure in 1, 2 or 4 restores the ledger to its state on entry.
pub fn handler(
    coordinator: &Coordinator,
    tx: &mut TxContext,
    proof: &Proof,
    rc: &RequestCommitment,
) -> Result<FulfillmentOutcome> {
    let gas_at_start = tx.gas.used();
    coordinator.atomic(true, || {
        let verified = coordinator.stage(tx, |ctx| verify_and_consume(ctx, proof, rc))?;

        let success = deliver(coordinator, tx, rc, &verified)?;
        if !success {
            warn!(
                request_id = %hex::encode(verified.request_id),
                consumer = %rc.sender,
                "Consumer callback failed"
            );
        }

        let payment = coordinator.stage(tx, |ctx| settle(ctx, rc, &verified, gas_at_start, success))?;
        Ok(FulfillmentOutcome {
            request_id: verified.request_id,
            payment,
            native_payment: rc.native_payment,
            success,
        })
    })
}

fn verify_and_consume(ctx: &mut Context<'_>, proof: &Proof, rc: &RequestCommitment) -> Result<Verified> {
    let key_hash = hash_of_key(&proof.public_key);
    ctx.charge_reads(1)?;
    let oracle = *ctx
        .state
        .proving_keys
        .get(&key_hash)
        .ok_or(CoordinatorError::NoSuchProvingKey(key_hash))?;

    let request_id = request_id_from_seed(&key_hash, &proof.seed);
    ctx.charge_reads(1)?;
    let stored = *ctx
        .state
        .request_commitments
        .get(&request_id)
        .ok_or(CoordinatorError::NoCorrespondingRequest)?;
    if stored != rc.digest(&request_id) {
        return Err(CoordinatorError::IncorrectCommitment);
    }

    let block_hash = resolve_block_hash(ctx, rc.block_number)?;
    let seed = actual_seed(&proof.seed, &block_hash);

    ctx.charge(ctx.env.gas_schedule.proof_verification)?;
    let randomness = ctx
        .env
        .verifier
        .verify(proof, &seed)
        .map_err(|e| CoordinatorError::ProofVerificationFailed(e.to_string()))?;

    ctx.charge(ctx.env.gas_schedule.per_random_word * rc.num_words as u64)?;
    let words = expand_randomness(&randomness, rc.num_words);

    ctx.charge_writes(1)?;
    ctx.state.request_commitments.remove(&request_id);

    Ok(Verified {
        request_id,
        oracle,
        randomness,
        words,
    })
}

/// Live hash when the height is inside the recent window, otherwise the
/// historical store.
fn resolve_block_hash(ctx: &mut Context<'_>, height: u64) -> Result<Hash> {
    let current = ctx.tx.block_number;
    let live = if height < current && current - height <= BLOCKHASH_WINDOW {
        ctx.env.recent_blocks.block_hash(height)
    } else {
        None
    };
    if let Some(hash) = live {
        return Ok(hash);
    }
    ctx.charge_reads(1)?;
    ctx.env
        .blockhash_store
        .get_blockhash(height)
        .ok_or(CoordinatorError::BlockhashNotInStore(height))
}

fn deliver(coordinator: &Coordinator, tx: &mut TxContext, rc: &RequestCommitment, verified: &Verified) -> Result<bool> {
    let consumer = coordinator.env.contracts.consumer(&rc.sender);
    let (block_number, timestamp, gas_price) = (tx.block_number, tx.timestamp, tx.gas_price);

    call_with_exact_gas(&mut tx.gas, rc.callback_gas_limit as u64, |gas| {
        let Some(consumer) = consumer else {
            return Err(CallbackError::NotDeployed(rc.sender));
        };
        let mut ctx = CallbackContext {
            coordinator,
            gas,
            block_number,
            timestamp,
            gas_price,
        };
        consumer.raw_fulfill_random_words(&mut ctx, verified.request_id, &verified.words)
    })
}

fn settle(
    ctx: &mut Context<'_>,
    rc: &RequestCommitment,
    verified: &Verified,
    gas_at_start: u64,
    success: bool,
) -> Result<u128> {
    let cost = GasCost {
        gas_used: ctx.tx.gas.used() - gas_at_start,
        gas_price: ctx.tx.gas_price,
        l1_data_fee: ctx.env.chain_cost.current_tx_data_fee(),
    };
    let payment = calculate_payment_amount(
        &ctx.state.config,
        &cost,
        rc.native_payment,
        ctx.env.link_native_feed.as_deref(),
        ctx.tx.timestamp,
    )?;

    let sub = ctx.state.subscription_mut(rc.sub_id)?;
    let balance = if rc.native_payment {
        &mut sub.native_balance
    } else {
        &mut sub.balance
    };
    *balance = balance
        .checked_sub(payment)
        .ok_or(CoordinatorError::InsufficientBalance)?;
    sub.req_count += 1;

    let earnings = if rc.native_payment {
        &mut ctx.state.withdrawable_native
    } else {
        &mut ctx.state.withdrawable_tokens
    };
    let credited = earnings.entry(verified.oracle).or_insert(0);
    *credited = credited
        .checked_add(payment)
        .ok_or(CoordinatorError::BalanceOverflow)?;

    ctx.emit(RandomWordsFulfilled {
        request_id: verified.request_id,
        output_seed: verified.randomness,
        sub_id: rc.sub_id,
        payment,
        native_payment: rc.native_payment,
        success,
    });
    info!(
        request_id = %hex::encode(verified.request_id),
        sub_id = rc.sub_id,
        oracle = %verified.oracle,
        payment,
        native_payment = rc.native_payment,
        success,
        "Random words fulfilled"
    );
    Ok(payment)
}
