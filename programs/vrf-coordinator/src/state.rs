use std::collections::HashMap;

use anchor_lang::prelude::Pubkey;

use crate::commitment::{compute_request_id, Hash, RequestId};
use crate::errors::{CoordinatorError, Result};

/// Protocol-wide cap on request confirmations.
pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;
/// Maximum number of random words a single request may ask for.
pub const MAX_NUM_WORDS: u32 = 500;
/// Maximum number of consumers per subscription.
pub const MAX_CONSUMERS: usize = 100;
/// How far back live block hashes are available.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Flat per-fulfillment fees, in parts-per-million of one whole token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeConfig {
    pub fulfillment_flat_fee_link_ppm: u32,
    pub fulfillment_flat_fee_native_ppm: u32,
}

/// Global coordinator configuration, mutated only through `set_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Lower bound on request confirmations; at most [`MAX_REQUEST_CONFIRMATIONS`].
    pub minimum_request_confirmations: u16,
    /// Upper bound on a request's callback gas limit.
    pub max_gas_limit: u32,
    /// Price-feed answers older than this fall back to the configured price. 0 disables.
    pub staleness_seconds: u32,
    /// Gas charged for the accounting that runs after payment is measured.
    pub gas_after_payment_calculation: u32,
    /// Wei per whole fee token used when the feed is stale or unset. Must be positive.
    pub fallback_wei_per_unit_link: i128,
    pub fee: FeeConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            minimum_request_confirmations: 3,
            max_gas_limit: 2_500_000,
            staleness_seconds: 0,
            gas_after_payment_calculation: 33_285,
            fallback_wei_per_unit_link: 5_000_000_000_000_000,
            fee: FeeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub owner: Pubkey,
    /// Proposed new owner, set by the first step of an ownership transfer.
    pub requested_owner: Option<Pubkey>,
    /// Authorized consumers. Order is not preserved across removals.
    pub consumers: Vec<Pubkey>,
    /// Fee-token balance, in juels.
    pub balance: u128,
    /// Native-token balance, in wei.
    pub native_balance: u128,
    /// Fulfillments paid from this subscription.
    pub req_count: u64,
}

impl Subscription {
    pub fn new(owner: Pubkey) -> Self {
        Self {
            owner,
            requested_owner: None,
            consumers: Vec::new(),
            balance: 0,
            native_balance: 0,
            req_count: 0,
        }
    }
}

/// The ledger and registries of one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorState {
    /// Identity allowed to run administrative operations.
    pub owner: Pubkey,
    pub config: CoordinatorConfig,

    /// Fingerprint -> oracle identity.
    pub proving_keys: HashMap<Hash, Pubkey>,
    /// Registered fingerprints, for enumeration.
    pub proving_key_hashes: Vec<Hash>,

    /// Last subscription id handed out; ids start at 1.
    pub current_sub_id: u64,
    pub subscriptions: HashMap<u64, Subscription>,
    /// (consumer, sub_id) -> nonce of its last request. Absent means not authorized.
    pub consumer_nonces: HashMap<(Pubkey, u64), u64>,

    /// Request id -> commitment digest of the outstanding request.
    pub request_commitments: HashMap<RequestId, Hash>,

    /// Oracle earnings, by oracle identity.
    pub withdrawable_tokens: HashMap<Pubkey, u128>,
    pub withdrawable_native: HashMap<Pubkey, u128>,

    /// Everything held on behalf of subscriptions and oracles.
    pub total_balance: u128,
    pub total_native_balance: u128,

    /// Successor coordinators subscriptions may migrate to.
    pub migration_targets: Vec<Pubkey>,
    /// Subscription id -> coordinator it migrated in from.
    pub inbound_migrations: HashMap<u64, Pubkey>,
}

impl CoordinatorState {
    pub fn new(owner: Pubkey) -> Self {
        Self {
            owner,
            config: CoordinatorConfig::default(),
            proving_keys: HashMap::new(),
            proving_key_hashes: Vec::new(),
            current_sub_id: 0,
            subscriptions: HashMap::new(),
            consumer_nonces: HashMap::new(),
            request_commitments: HashMap::new(),
            withdrawable_tokens: HashMap::new(),
            withdrawable_native: HashMap::new(),
            total_balance: 0,
            total_native_balance: 0,
            migration_targets: Vec::new(),
            inbound_migrations: HashMap::new(),
        }
    }

    pub fn subscription(&self, sub_id: u64) -> Result<&Subscription> {
        self.subscriptions
            .get(&sub_id)
            .ok_or(CoordinatorError::InvalidSubscription)
    }

    pub fn subscription_mut(&mut self, sub_id: u64) -> Result<&mut Subscription> {
        self.subscriptions
            .get_mut(&sub_id)
            .ok_or(CoordinatorError::InvalidSubscription)
    }

    /// Fails unless `caller` owns `sub_id`.
    pub fn only_sub_owner(&self, sub_id: u64, caller: &Pubkey) -> Result<()> {
        let owner = self.subscription(sub_id)?.owner;
        if owner != *caller {
            return Err(CoordinatorError::MustBeSubOwner(owner));
        }
        Ok(())
    }

    /// Current nonce of `consumer` on `sub_id`; 0 when not a consumer.
    pub fn consumer_nonce(&self, consumer: &Pubkey, sub_id: u64) -> u64 {
        self.consumer_nonces
            .get(&(*consumer, sub_id))
            .copied()
            .unwrap_or(0)
    }

    /// Whether any consumer of `sub_id` has a request outstanding at its
    /// current nonce, under any registered proving key.
    ///
    /// Only the request implied by each consumer's latest nonce is checked,
    /// so an older request that is still outstanding after a newer one was
    /// made goes unnoticed.
    pub fn pending_request_exists(&self, sub_id: u64) -> bool {
        let Some(sub) = self.subscriptions.get(&sub_id) else {
            return false;
        };
        sub.consumers.iter().any(|consumer| {
            let nonce = self.consumer_nonce(consumer, sub_id);
            self.proving_key_hashes.iter().any(|key_hash| {
                let (request_id, _) = compute_request_id(key_hash, consumer, sub_id, nonce);
                self.request_commitments.contains_key(&request_id)
            })
        })
    }

    /// Remove `sub_id` and every consumer nonce attached to it.
    pub fn delete_subscription(&mut self, sub_id: u64) -> Result<Subscription> {
        let sub = self
            .subscriptions
            .remove(&sub_id)
            .ok_or(CoordinatorError::InvalidSubscription)?;
        for consumer in &sub.consumers {
            self.consumer_nonces.remove(&(*consumer, sub_id));
        }
        self.inbound_migrations.remove(&sub_id);
        Ok(sub)
    }

    pub fn is_migration_target(&self, coordinator: &Pubkey) -> bool {
        self.migration_targets.contains(coordinator)
    }
}
