//! In-memory implementations of the collaborator ports, used by tests and
//! by the devnet node.

use std::collections::HashMap;
use std::sync::Arc;

use anchor_lang::prelude::Pubkey;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::commitment::Hash;
use crate::context::ExecutionLock;
use crate::gas::GasSchedule;
use crate::interfaces::{
    BlockhashStore, ChainCost, Contracts, Environment, MigrationTarget, PriceFeed, RecentBlocks,
    RoundData, TokenLedger, VrfConsumer,
};
use crate::proof::Ed25519ProofVerifier;

/// A chain of synthetic block hashes, `hash(n) = H(hash(n-1) || n)`.
#[derive(Default)]
pub struct MemoryBlocks {
    hashes: RwLock<HashMap<u64, Hash>>,
}

impl MemoryBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal block `height` and return its hash.
    pub fn produce(&self, height: u64) -> Hash {
        let mut hashes = self.hashes.write();
        let parent = height
            .checked_sub(1)
            .and_then(|h| hashes.get(&h).copied())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(parent);
        hasher.update(height.to_le_bytes());
        let hash: Hash = hasher.finalize().into();
        hashes.insert(height, hash);
        hash
    }

    /// Forget blocks older than `height`, as a node pruning its history would.
    pub fn prune_below(&self, height: u64) {
        self.hashes.write().retain(|h, _| *h >= height);
    }
}

impl RecentBlocks for MemoryBlocks {
    fn block_hash(&self, height: u64) -> Option<Hash> {
        self.hashes.read().get(&height).copied()
    }
}

#[derive(Default)]
pub struct MemoryBlockhashStore {
    hashes: RwLock<HashMap<u64, Hash>>,
}

impl MemoryBlockhashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, height: u64, hash: Hash) {
        self.hashes.write().insert(height, hash);
    }
}

impl BlockhashStore for MemoryBlockhashStore {
    fn get_blockhash(&self, height: u64) -> Option<Hash> {
        self.hashes.read().get(&height).copied()
    }
}

/// A feed whose answer is set by hand.
pub struct FixedPriceFeed {
    round: RwLock<Result<RoundData, String>>,
}

impl FixedPriceFeed {
    pub fn new(round: RoundData) -> Self {
        Self {
            round: RwLock::new(Ok(round)),
        }
    }

    pub fn set(&self, round: RoundData) {
        *self.round.write() = Ok(round);
    }

    /// Make every read fail with `reason` until the next [`set`](Self::set).
    pub fn fail(&self, reason: &str) {
        *self.round.write() = Err(reason.to_string());
    }
}

impl PriceFeed for FixedPriceFeed {
    fn latest_round_data(&self) -> Result<RoundData, String> {
        self.round.read().clone()
    }
}

#[derive(Default)]
pub struct FixedChainCost {
    fee: RwLock<u128>,
}

impl FixedChainCost {
    pub fn new(fee: u128) -> Self {
        Self { fee: RwLock::new(fee) }
    }

    pub fn set(&self, fee: u128) {
        *self.fee.write() = fee;
    }
}

impl ChainCost for FixedChainCost {
    fn current_tx_data_fee(&self) -> u128 {
        *self.fee.read()
    }
}

#[derive(Default)]
pub struct MemoryTokenLedger {
    balances: Mutex<HashMap<Pubkey, u128>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, to: &Pubkey, amount: u128) {
        *self.balances.lock().entry(*to).or_insert(0) += amount;
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn transfer(&self, from: &Pubkey, to: &Pubkey, amount: u128) -> Result<(), String> {
        let mut balances = self.balances.lock();
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(format!("{from} holds {available}, needs {amount}"));
        }
        balances.insert(*from, available - amount);
        *balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn balance_of(&self, owner: &Pubkey) -> u128 {
        self.balances.lock().get(owner).copied().unwrap_or(0)
    }
}

/// Directory of deployed consumers and migration targets.
#[derive(Default)]
pub struct MemoryContracts {
    consumers: RwLock<HashMap<Pubkey, Arc<dyn VrfConsumer>>>,
    targets: RwLock<HashMap<Pubkey, Arc<dyn MigrationTarget>>>,
}

impl MemoryContracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy_consumer(&self, id: Pubkey, consumer: Arc<dyn VrfConsumer>) {
        self.consumers.write().insert(id, consumer);
    }

    pub fn deploy_target(&self, id: Pubkey, target: Arc<dyn MigrationTarget>) {
        self.targets.write().insert(id, target);
    }
}

impl Contracts for MemoryContracts {
    fn consumer(&self, id: &Pubkey) -> Option<Arc<dyn VrfConsumer>> {
        self.consumers.read().get(id).cloned()
    }

    fn migration_target(&self, id: &Pubkey) -> Option<Arc<dyn MigrationTarget>> {
        self.targets.read().get(id).cloned()
    }
}

/// A complete set of in-memory collaborators that several coordinators can share.
#[derive(Clone)]
pub struct MemoryWorld {
    pub blocks: Arc<MemoryBlocks>,
    pub blockhash_store: Arc<MemoryBlockhashStore>,
    pub price_feed: Arc<FixedPriceFeed>,
    pub chain_cost: Arc<FixedChainCost>,
    pub link: Arc<MemoryTokenLedger>,
    pub native: Arc<MemoryTokenLedger>,
    pub contracts: Arc<MemoryContracts>,
    pub execution_lock: ExecutionLock,
}

impl MemoryWorld {
    /// A world whose feed reports `wei_per_unit_link`, updated at time 0.
    pub fn new(wei_per_unit_link: i128) -> Self {
        Self {
            blocks: Arc::new(MemoryBlocks::new()),
            blockhash_store: Arc::new(MemoryBlockhashStore::new()),
            price_feed: Arc::new(FixedPriceFeed::new(RoundData {
                answer: wei_per_unit_link,
                updated_at: 0,
            })),
            chain_cost: Arc::new(FixedChainCost::default()),
            link: Arc::new(MemoryTokenLedger::new()),
            native: Arc::new(MemoryTokenLedger::new()),
            contracts: Arc::new(MemoryContracts::new()),
            execution_lock: ExecutionLock::new(),
        }
    }

    /// An [`Environment`] wired to this world, with the Ed25519 verifier.
    pub fn environment(&self) -> Environment {
        Environment {
            verifier: Arc::new(Ed25519ProofVerifier),
            recent_blocks: self.blocks.clone(),
            blockhash_store: self.blockhash_store.clone(),
            link_native_feed: Some(self.price_feed.clone()),
            chain_cost: self.chain_cost.clone(),
            link_token: Some(self.link.clone()),
            native_token: self.native.clone(),
            contracts: self.contracts.clone(),
            gas_schedule: GasSchedule::default(),
            execution_lock: self.execution_lock.clone(),
        }
    }
}
