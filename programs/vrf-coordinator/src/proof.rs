//! Randomness proofs.
//!
//! The oracle signs the request's actual seed with its Ed25519 proving key;
//! the randomness is the hash of that signature. Verification is a strict
//! Ed25519 check of the signature over the seed, against the public key the
//! proof carries (whose fingerprint must be registered).

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::commitment::{actual_seed, Hash};

/// Domain tag mixed into the randomness derived from a signature.
const OUTPUT_DOMAIN: &[u8] = b"vrf-output";

/// A fulfillment proof as submitted by an oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    /// Ed25519 proving key of the oracle.
    pub public_key: [u8; 32],
    /// The request's pre-seed, as published in the request event.
    pub seed: Hash,
    /// Signature over `actual_seed(seed, block_hash)`.
    pub signature: [u8; 64],
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed proving key")]
    MalformedPublicKey,
    #[error("signature does not verify for seed")]
    BadSignature,
}

/// The verifiable-randomness primitive.
pub trait ProofVerifier: Send + Sync {
    /// Return the randomness for `proof` if it is valid for `actual_seed`.
    fn verify(&self, proof: &Proof, actual_seed: &Hash) -> Result<Hash, VerificationError>;
}

/// [`ProofVerifier`] over Ed25519 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519ProofVerifier;

impl ProofVerifier for Ed25519ProofVerifier {
    fn verify(&self, proof: &Proof, actual_seed: &Hash) -> Result<Hash, VerificationError> {
        let key = VerifyingKey::from_bytes(&proof.public_key)
            .map_err(|_| VerificationError::MalformedPublicKey)?;
        let signature = Signature::from_bytes(&proof.signature);
        key.verify_strict(actual_seed, &signature)
            .map_err(|_| VerificationError::BadSignature)?;
        Ok(randomness_from_signature(&proof.signature))
    }
}

fn randomness_from_signature(signature: &[u8; 64]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(OUTPUT_DOMAIN);
    hasher.update(signature);
    hasher.finalize().into()
}

/// Oracle side: build the proof for a request whose pre-seed is `pre_seed`
/// and which landed in the block hashing to `block_hash`.
pub fn prove(signing_key: &SigningKey, pre_seed: &Hash, block_hash: &Hash) -> Proof {
    let seed = actual_seed(pre_seed, block_hash);
    let signature = signing_key.sign(&seed);
    Proof {
        public_key: signing_key.verifying_key().to_bytes(),
        seed: *pre_seed,
        signature: signature.to_bytes(),
    }
}

/// The randomness a valid proof yields, without verifying it.
pub fn output_of(proof: &Proof) -> Hash {
    randomness_from_signature(&proof.signature)
}

/// Expand base randomness into multiple words: `word[i] = SHA256(randomness || i_le_bytes)`.
pub fn expand_randomness(base_randomness: &Hash, num_words: u32) -> Vec<Hash> {
    let mut words = Vec::with_capacity(num_words as usize);
    for i in 0..num_words {
        let mut hasher = Sha256::new();
        hasher.update(base_randomness);
        hasher.update(i.to_le_bytes());
        words.push(hasher.finalize().into());
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn valid_proof_verifies_and_yields_output() {
        let key = oracle_key();
        let proof = prove(&key, &[1u8; 32], &[2u8; 32]);
        let seed = actual_seed(&proof.seed, &[2u8; 32]);
        let randomness = Ed25519ProofVerifier.verify(&proof, &seed).unwrap();
        assert_eq!(randomness, output_of(&proof));
    }

    #[test]
    fn proof_is_bound_to_block_hash() {
        let proof = prove(&oracle_key(), &[1u8; 32], &[2u8; 32]);
        let wrong_seed = actual_seed(&proof.seed, &[3u8; 32]);
        assert_eq!(
            Ed25519ProofVerifier.verify(&proof, &wrong_seed),
            Err(VerificationError::BadSignature)
        );
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut proof = prove(&oracle_key(), &[1u8; 32], &[2u8; 32]);
        proof.signature[10] ^= 0x01;
        let seed = actual_seed(&proof.seed, &[2u8; 32]);
        assert!(Ed25519ProofVerifier.verify(&proof, &seed).is_err());
    }

    #[test]
    fn proving_is_deterministic() {
        let a = prove(&oracle_key(), &[1u8; 32], &[2u8; 32]);
        let b = prove(&oracle_key(), &[1u8; 32], &[2u8; 32]);
        assert_eq!(a, b);
    }

    #[test]
    fn expansion_hashes_index() {
        let words = expand_randomness(&[9u8; 32], 500);
        assert_eq!(words.len(), 500);
        let mut hasher = Sha256::new();
        hasher.update([9u8; 32]);
        hasher.update(499u32.to_le_bytes());
        let last: Hash = hasher.finalize().into();
        assert_eq!(words[499], last);
        assert_ne!(words[0], words[1]);
    }
}
