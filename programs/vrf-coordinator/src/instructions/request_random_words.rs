use tracing::info;

use crate::commitment::{compute_request_id, Hash, RequestCommitment, RequestId};
use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::RandomWordsRequested;
use crate::extra_args::ExtraArgsV1;
use crate::state::{MAX_NUM_WORDS, MAX_REQUEST_CONFIRMATIONS};
use crate::Coordinator;

/// Parameters of a randomness request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsRequest {
    /// Fingerprint of the proving key that should serve the request. Not
    /// checked against the registry; unknown keys are simply never fulfilled.
    pub key_hash: Hash,
    pub sub_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// Empty, or an [`ExtraArgsV1`] encoding.
    pub extra_args: Vec<u8>,
}

/// Record a request from the calling consumer and return its id.
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, req: RandomWordsRequest) -> Result<RequestId> {
    coordinator.transact(tx, true, |ctx| {
        let sender = ctx.tx.caller;
        ctx.charge_reads(3)?;

        ctx.state.subscription(req.sub_id)?;
        let current_nonce = ctx.state.consumer_nonce(&sender, req.sub_id);
        if current_nonce == 0 {
            return Err(CoordinatorError::InvalidConsumer {
                sub_id: req.sub_id,
                consumer: sender,
            });
        }

        let config = ctx.state.config;
        if req.request_confirmations < config.minimum_request_confirmations
            || req.request_confirmations > MAX_REQUEST_CONFIRMATIONS
        {
            return Err(CoordinatorError::InvalidRequestConfirmations {
                have: req.request_confirmations,
                min: config.minimum_request_confirmations,
                max: MAX_REQUEST_CONFIRMATIONS,
            });
        }
        if req.callback_gas_limit > config.max_gas_limit {
            return Err(CoordinatorError::GasLimitTooBig {
                have: req.callback_gas_limit,
                want: config.max_gas_limit,
            });
        }
        if req.num_words > MAX_NUM_WORDS {
            return Err(CoordinatorError::NumWordsTooBig {
                have: req.num_words,
                want: MAX_NUM_WORDS,
            });
        }
        let native_payment = ExtraArgsV1::decode(&req.extra_args)?.native_payment;

        let nonce = current_nonce.checked_add(1).ok_or(CoordinatorError::CounterOverflow)?;
        let (request_id, pre_seed) = compute_request_id(&req.key_hash, &sender, req.sub_id, nonce);

        let commitment = RequestCommitment {
            block_number: ctx.tx.block_number,
            sub_id: req.sub_id,
            callback_gas_limit: req.callback_gas_limit,
            num_words: req.num_words,
            sender,
            native_payment,
        };
        ctx.charge_writes(2)?;
        ctx.state
            .request_commitments
            .insert(request_id, commitment.digest(&request_id));

        ctx.emit(RandomWordsRequested {
            key_hash: req.key_hash,
            request_id,
            pre_seed,
            sub_id: req.sub_id,
            minimum_request_confirmations: req.request_confirmations,
            callback_gas_limit: req.callback_gas_limit,
            num_words: req.num_words,
            native_payment,
            block_number: ctx.tx.block_number,
            sender,
        });
        ctx.state.consumer_nonces.insert((sender, req.sub_id), nonce);

        info!(
            request_id = %hex::encode(request_id),
            sub_id = req.sub_id,
            %sender,
            num_words = req.num_words,
            native_payment,
            "Random words requested"
        );
        Ok(request_id)
    })
}
