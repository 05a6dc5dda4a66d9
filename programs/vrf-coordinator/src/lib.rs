//! Subscription-funded verifiable randomness coordinator.
//!
//! Consumers registered on a subscription request random words; an oracle
//! holding a registered proving key answers with a proof bound to the hash of
//! the block the request landed in. The coordinator verifies the proof,
//! delivers the words to the consumer under a fixed gas budget, and pays the
//! oracle out of the subscription in either the fee token or the native token.
//!
//! ## Request lifecycle
//!
//! 1. **Request**: a consumer calls [`Coordinator::request_random_words`];
//!    only a digest of the request parameters is stored, and a
//!    [`RandomWordsRequested`] event carries the plaintext to oracles.
//! 2. **Fulfill**: the oracle submits [`Coordinator::fulfill_random_words`]
//!    with a [`Proof`] and the plaintext [`RequestCommitment`]; the digest is
//!    re-checked, the proof verified, and the commitment deleted.
//! 3. **Callback**: the consumer's [`VrfConsumer::raw_fulfill_random_words`]
//!    runs with exactly the requested gas; its failure does not undo the
//!    fulfillment.
//! 4. **Payment**: the subscription is debited for the measured gas plus a
//!    flat fee and the oracle credited; a short balance undoes everything.
//!
//! Every operation is atomic and fully serialized: it runs under the
//! environment's [`ExecutionLock`] and the coordinator lock, against a
//! working copy of the state that is committed only on success. Token
//! movements an operation made before failing are undone or never started.

use parking_lot::ReentrantMutex;

pub mod commitment;
pub mod context;
pub mod errors;
pub mod events;
pub mod extra_args;
pub mod gas;
pub mod instructions;
pub mod interfaces;
pub mod memory;
pub mod payment;
pub mod price;
pub mod proof;
mod runtime;
pub mod state;

pub use anchor_lang::prelude::Pubkey;
pub use commitment::{Hash, RequestCommitment, RequestId};
pub use context::{CallbackContext, ExecutionLock, TxContext};
pub use errors::{CoordinatorError, ErrorKind, Result};
pub use events::{CoordinatorEvent, LoggedEvent, RandomWordsFulfilled, RandomWordsRequested};
pub use extra_args::ExtraArgsV1;
pub use instructions::{FulfillmentOutcome, MigrationData, RandomWordsRequest, MIGRATION_VERSION};
pub use interfaces::{
    BlockhashStore, CallbackError, ChainCost, Contracts, Environment, MigrationRefund, MigrationTarget,
    PriceFeed, RecentBlocks, RoundData, TokenLedger, VrfConsumer,
};
pub use proof::{Ed25519ProofVerifier, Proof, ProofVerifier};
pub use state::{CoordinatorConfig, FeeConfig, Subscription};

use runtime::Inner;
use state::CoordinatorState;

/// One coordinator instance: its ledger, registries and event log.
///
/// `Coordinator` is `Send + Sync`; share it behind an `Arc`. Mutating
/// operations take the caller's [`TxContext`] and charge their gas to it.
pub struct Coordinator {
    id: Pubkey,
    pub(crate) env: Environment,
    inner: ReentrantMutex<Inner>,
}

impl Coordinator {
    /// A coordinator living at `id`, administered by `owner`.
    pub fn new(id: Pubkey, owner: Pubkey, env: Environment) -> Self {
        Self {
            id,
            env,
            inner: ReentrantMutex::new(Inner::new(CoordinatorState::new(owner))),
        }
    }

    /// Identity the coordinator holds funds under and calls consumers as.
    pub fn id(&self) -> Pubkey {
        self.id
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    // ------------------------------------------------------------------
    // Administration (coordinator owner)
    // ------------------------------------------------------------------

    /// Replace the global configuration.
    ///
    /// Rejects minimum confirmations above the protocol cap and a
    /// non-positive fallback price.
    pub fn set_config(&self, tx: &mut TxContext, config: CoordinatorConfig) -> Result<()> {
        instructions::set_config::handler(self, tx, config)
    }

    /// Authorize `oracle` to fulfill with `public_key`; returns the key's fingerprint.
    pub fn register_proving_key(&self, tx: &mut TxContext, oracle: Pubkey, public_key: [u8; 32]) -> Result<Hash> {
        instructions::proving_keys::register(self, tx, oracle, public_key)
    }

    pub fn deregister_proving_key(&self, tx: &mut TxContext, public_key: [u8; 32]) -> Result<()> {
        instructions::proving_keys::deregister(self, tx, public_key)
    }

    /// Allow subscriptions to migrate to `target`, and accept migrations from it.
    pub fn register_migratable_coordinator(&self, tx: &mut TxContext, target: Pubkey) -> Result<()> {
        instructions::migration_targets::register(self, tx, target)
    }

    pub fn deregister_migratable_coordinator(&self, tx: &mut TxContext, target: Pubkey) -> Result<()> {
        instructions::migration_targets::deregister(self, tx, target)
    }

    /// Close a subscription without the pending-request check and refund its owner.
    pub fn owner_cancel_subscription(&self, tx: &mut TxContext, sub_id: u64) -> Result<()> {
        instructions::cancel_subscription::owner_cancel(self, tx, sub_id)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn create_subscription(&self, tx: &mut TxContext) -> Result<u64> {
        instructions::create_subscription::handler(self, tx)
    }

    pub fn add_consumer(&self, tx: &mut TxContext, sub_id: u64, consumer: Pubkey) -> Result<()> {
        instructions::add_consumer::handler(self, tx, sub_id, consumer)
    }

    /// Refused while a request is pending on the subscription.
    pub fn remove_consumer(&self, tx: &mut TxContext, sub_id: u64, consumer: Pubkey) -> Result<()> {
        instructions::remove_consumer::handler(self, tx, sub_id, consumer)
    }

    pub fn fund_subscription(&self, tx: &mut TxContext, sub_id: u64, amount: u128) -> Result<()> {
        instructions::fund_subscription::with_link(self, tx, sub_id, amount)
    }

    pub fn fund_subscription_with_native(&self, tx: &mut TxContext, sub_id: u64, amount: u128) -> Result<()> {
        instructions::fund_subscription::with_native(self, tx, sub_id, amount)
    }

    pub fn request_subscription_owner_transfer(&self, tx: &mut TxContext, sub_id: u64, new_owner: Pubkey) -> Result<()> {
        instructions::subscription_owner_transfer::request(self, tx, sub_id, new_owner)
    }

    pub fn accept_subscription_owner_transfer(&self, tx: &mut TxContext, sub_id: u64) -> Result<()> {
        instructions::subscription_owner_transfer::accept(self, tx, sub_id)
    }

    /// Close the subscription and send both balances to `to`.
    pub fn cancel_subscription(&self, tx: &mut TxContext, sub_id: u64, to: Pubkey) -> Result<()> {
        instructions::cancel_subscription::handler(self, tx, sub_id, to)
    }

    /// Move a subscription to a registered successor; returns its id there.
    pub fn migrate(&self, tx: &mut TxContext, sub_id: u64, new_coordinator: Pubkey) -> Result<u64> {
        instructions::migrate::handler(self, tx, sub_id, new_coordinator)
    }

    // ------------------------------------------------------------------
    // Requests and fulfillment
    // ------------------------------------------------------------------

    /// Record a request from `tx.caller` and return its id.
    pub fn request_random_words(&self, tx: &mut TxContext, req: RandomWordsRequest) -> Result<RequestId> {
        instructions::request_random_words::handler(self, tx, req)
    }

    /// Fulfill the request `proof` answers. See
    /// [`instructions::fulfill_random_words::handler`].
    pub fn fulfill_random_words(
        &self,
        tx: &mut TxContext,
        proof: &Proof,
        commitment: &RequestCommitment,
    ) -> Result<FulfillmentOutcome> {
        instructions::fulfill_random_words::handler(self, tx, proof, commitment)
    }

    // ------------------------------------------------------------------
    // Oracle payouts
    // ------------------------------------------------------------------

    pub fn withdraw(&self, tx: &mut TxContext, recipient: Pubkey) -> Result<u128> {
        instructions::withdraw::link(self, tx, recipient)
    }

    pub fn withdraw_native(&self, tx: &mut TxContext, recipient: Pubkey) -> Result<u128> {
        instructions::withdraw::native(self, tx, recipient)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn owner(&self) -> Pubkey {
        self.view(|s| s.owner)
    }

    pub fn get_config(&self) -> CoordinatorConfig {
        self.view(|s| s.config)
    }

    pub fn get_subscription(&self, sub_id: u64) -> Result<Subscription> {
        self.view(|s| s.subscription(sub_id).cloned())
    }

    pub fn pending_request_exists(&self, sub_id: u64) -> bool {
        self.view(|s| s.pending_request_exists(sub_id))
    }

    /// Stored digest of the outstanding request `request_id`, if any.
    pub fn commitment_of(&self, request_id: &RequestId) -> Option<Hash> {
        self.view(|s| s.request_commitments.get(request_id).copied())
    }

    pub fn consumer_nonce(&self, consumer: &Pubkey, sub_id: u64) -> u64 {
        self.view(|s| s.consumer_nonce(consumer, sub_id))
    }

    pub fn withdrawable_tokens(&self, oracle: &Pubkey) -> u128 {
        self.view(|s| s.withdrawable_tokens.get(oracle).copied().unwrap_or(0))
    }

    pub fn withdrawable_native(&self, oracle: &Pubkey) -> u128 {
        self.view(|s| s.withdrawable_native.get(oracle).copied().unwrap_or(0))
    }

    /// Fee-token and native amounts held for subscriptions and oracles.
    pub fn total_balances(&self) -> (u128, u128) {
        self.view(|s| (s.total_balance, s.total_native_balance))
    }

    pub fn proving_key_hashes(&self) -> Vec<Hash> {
        self.view(|s| s.proving_key_hashes.clone())
    }

    /// Oracle identity registered for `key_hash`.
    pub fn oracle_of(&self, key_hash: &Hash) -> Option<Pubkey> {
        self.view(|s| s.proving_keys.get(key_hash).copied())
    }

    pub fn migratable_coordinators(&self) -> Vec<Pubkey> {
        self.view(|s| s.migration_targets.clone())
    }

    /// Published events starting at sequence number `cursor`.
    pub fn events_since(&self, cursor: u64) -> Vec<LoggedEvent> {
        let inner = self.inner.lock();
        let log = inner.log.borrow();
        log.iter()
            .enumerate()
            .skip(cursor as usize)
            .map(|(seq, event)| LoggedEvent {
                seq: seq as u64,
                event: event.clone(),
            })
            .collect()
    }
}

impl MigrationTarget for Coordinator {
    fn on_migration(&self, tx: &mut TxContext, native_amount: u128, payload: &[u8]) -> Result<u64> {
        instructions::migrate::receive(self, tx, native_amount, payload)
    }

    fn abort_migration(&self, tx: &mut TxContext, sub_id: u64, refund: MigrationRefund) -> Result<()> {
        instructions::migrate::abort(self, tx, sub_id, refund)
    }
}
