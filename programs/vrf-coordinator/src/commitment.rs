//! Request identifiers and commitments.
//!
//! Only a digest of each request is kept by the coordinator. The fulfiller
//! resupplies the plaintext [`RequestCommitment`] and the coordinator
//! re-hashes it against the stored value.

use anchor_lang::prelude::Pubkey;
use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Identifier of a randomness request, `H(key_hash || pre_seed)`.
pub type RequestId = Hash;

/// Fingerprint of a proving key, used as its registry key.
pub fn hash_of_key(public_key: &[u8; 32]) -> Hash {
    Sha256::digest(public_key).into()
}

/// Derive `(request_id, pre_seed)` for a request made by `sender` against
/// `sub_id` with the given nonce.
///
/// ```text
/// pre_seed   = H(key_hash || sender || sub_id_le || nonce_le)
/// request_id = H(key_hash || pre_seed)
/// ```
pub fn compute_request_id(
    key_hash: &Hash,
    sender: &Pubkey,
    sub_id: u64,
    nonce: u64,
) -> (RequestId, Hash) {
    let mut hasher = Sha256::new();
    hasher.update(key_hash);
    hasher.update(sender.as_ref());
    hasher.update(sub_id.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    let pre_seed: Hash = hasher.finalize().into();
    (request_id_from_seed(key_hash, &pre_seed), pre_seed)
}

/// Recompute a request id from the key fingerprint and the pre-seed carried
/// in a proof.
pub fn request_id_from_seed(key_hash: &Hash, pre_seed: &Hash) -> RequestId {
    let mut hasher = Sha256::new();
    hasher.update(key_hash);
    hasher.update(pre_seed);
    hasher.finalize().into()
}

/// Seed actually fed to the proof: the pre-seed bound to the hash of the
/// block the request landed in.
pub fn actual_seed(pre_seed: &Hash, block_hash: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(pre_seed);
    hasher.update(block_hash);
    hasher.finalize().into()
}

/// Plaintext request parameters, resupplied by the fulfiller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestCommitment {
    /// Block height at which the request was recorded.
    pub block_number: u64,
    pub sub_id: u64,
    /// Gas budget handed to the consumer callback.
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// The consumer that made the request and receives the callback.
    pub sender: Pubkey,
    /// Debit the native balance instead of the fee-token balance.
    pub native_payment: bool,
}

impl RequestCommitment {
    /// The value stored under `request_id` while the request is outstanding.
    pub fn digest(&self, request_id: &RequestId) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(request_id);
        hasher.update(self.block_number.to_le_bytes());
        hasher.update(self.sub_id.to_le_bytes());
        hasher.update(self.callback_gas_limit.to_le_bytes());
        hasher.update(self.num_words.to_le_bytes());
        hasher.update(self.sender.as_ref());
        hasher.update([self.native_payment as u8]);
        hasher.finalize().into()
    }
}
