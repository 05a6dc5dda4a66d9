//! Oracle-side proof computation.
//!
//! The oracle signs `actual_seed = H(pre_seed || block_hash)` with its
//! proving key. Ed25519 signatures are deterministic, so the output for a
//! request is fixed once its block is sealed, yet unpredictable to anyone
//! without the key.

use ed25519_dalek::SigningKey;
use vrf_coordinator::proof::prove;
use vrf_coordinator::{Hash, Proof, RandomWordsRequested, RequestCommitment};

/// Build the proof answering `event`, whose block hashes to `block_hash`.
pub fn compute_proof(oracle_key: &SigningKey, event: &RandomWordsRequested, block_hash: &Hash) -> Proof {
    prove(oracle_key, &event.pre_seed, block_hash)
}

/// The plaintext commitment the coordinator re-checks against its digest.
pub fn commitment_for(event: &RandomWordsRequested) -> RequestCommitment {
    RequestCommitment {
        block_number: event.block_number,
        sub_id: event.sub_id,
        callback_gas_limit: event.callback_gas_limit,
        num_words: event.num_words,
        sender: event.sender,
        native_payment: event.native_payment,
    }
}
