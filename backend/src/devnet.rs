//! Single-process development network.
//!
//! Hosts the coordinator, the in-memory collaborators it talks to, and a
//! dice game consumer with a funded subscription. A background task seals a
//! block every `BLOCK_TIME_MS` and copies each hash into the block-hash
//! store, so requests older than the live window stay fulfillable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use roll_dice::{DiceGame, GameConfig, RollDiceError};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use vrf_coordinator::commitment::hash_of_key;
use vrf_coordinator::memory::MemoryWorld;
use vrf_coordinator::state::BLOCKHASH_WINDOW;
use vrf_coordinator::{
    BlockhashStore, Coordinator, CoordinatorError, FulfillmentOutcome, Hash, Proof, Pubkey, RecentBlocks,
    RequestCommitment, RequestId, TxContext,
};

use crate::config::AppConfig;

/// Blocks sealed before the node accepts traffic.
const GENESIS_BLOCKS: u64 = 10;
/// Gas the dice game gives its callback.
const DICE_CALLBACK_GAS: u32 = 100_000;

/// Stable identity derived from a human-readable label.
pub fn identity(label: &str) -> Pubkey {
    let digest: [u8; 32] = Sha256::digest(label.as_bytes()).into();
    Pubkey::new_from_array(digest)
}

pub struct Devnet {
    pub world: MemoryWorld,
    pub coordinator: Arc<Coordinator>,
    pub dice: Arc<DiceGame>,
    pub owner: Pubkey,
    pub oracle: Pubkey,
    pub sub_id: u64,
    head: AtomicU64,
    gas_limit: u64,
    gas_price: u128,
}

impl Devnet {
    /// Seal genesis, configure the coordinator, register the oracle key, and
    /// open a funded subscription for the dice game.
    pub fn bootstrap(config: &AppConfig) -> Result<Self> {
        let world = MemoryWorld::new(config.coordinator.fallback_wei_per_unit_link);
        for height in 1..=GENESIS_BLOCKS {
            seal(&world, height);
        }

        let owner = identity("devnet/owner");
        let oracle = identity("devnet/oracle");
        let dice_id = identity("devnet/dice");
        let coordinator = Arc::new(Coordinator::new(identity("devnet/coordinator"), owner, world.environment()));
        let public_key = config.oracle_key.verifying_key().to_bytes();
        let tx = |caller| {
            TxContext::new(caller, GENESIS_BLOCKS, unix_now(), config.gas_price_wei, config.fulfillment_gas_limit)
        };

        coordinator
            .set_config(&mut tx(owner), config.coordinator)
            .context("coordinator rejected configuration")?;
        coordinator
            .register_proving_key(&mut tx(owner), oracle, public_key)
            .context("failed to register oracle proving key")?;

        let sub_id = coordinator.create_subscription(&mut tx(owner))?;
        coordinator.add_consumer(&mut tx(owner), sub_id, dice_id)?;
        if config.subscription_funding > 0 {
            world.link.mint(&owner, config.subscription_funding);
            coordinator
                .fund_subscription(&mut tx(owner), sub_id, config.subscription_funding)
                .context("failed to fund dice subscription")?;
        }

        let dice = Arc::new(DiceGame::new(dice_id, coordinator.id(), sub_id, GameConfig {
            key_hash: hash_of_key(&public_key),
            request_confirmations: config.coordinator.minimum_request_confirmations,
            callback_gas_limit: DICE_CALLBACK_GAS,
        }));
        world.contracts.deploy_consumer(dice_id, dice.clone());

        info!(
            coordinator = %coordinator.id(),
            oracle = %oracle,
            key_hash = %hex::encode(hash_of_key(&public_key)),
            sub_id,
            "Devnet bootstrapped"
        );
        Ok(Self {
            world,
            coordinator,
            dice,
            owner,
            oracle,
            sub_id,
            head: AtomicU64::new(GENESIS_BLOCKS),
            gas_limit: config.fulfillment_gas_limit,
            gas_price: config.gas_price_wei,
        })
    }

    pub fn head(&self) -> u64 {
        self.head.load(Ordering::SeqCst)
    }

    /// Seal the next block and return its height.
    pub fn produce_block(&self) -> u64 {
        let height = self.head.fetch_add(1, Ordering::SeqCst) + 1;
        seal(&self.world, height);
        height
    }

    /// A transaction by `caller` in the current head block.
    pub fn tx(&self, caller: Pubkey) -> TxContext {
        TxContext::new(caller, self.head(), unix_now(), self.gas_price, self.gas_limit)
    }

    /// Hash of block `height`, from the live window or the store.
    pub fn block_hash(&self, height: u64) -> Option<Hash> {
        self.world
            .blocks
            .block_hash(height)
            .or_else(|| self.world.blockhash_store.get_blockhash(height))
    }

    /// Submit a fulfillment as the oracle.
    pub fn fulfill(&self, proof: &Proof, rc: &RequestCommitment) -> Result<FulfillmentOutcome, CoordinatorError> {
        self.coordinator
            .fulfill_random_words(&mut self.tx(self.oracle), proof, rc)
    }

    /// Roll a die for `player`.
    pub fn roll(&self, player: Pubkey) -> Result<RequestId, RollDiceError> {
        self.dice
            .request_roll(&self.coordinator, &mut self.tx(player), player)
    }
}

/// Produce block `height`, record its hash in the store, and prune live
/// hashes that fell out of the window.
fn seal(world: &MemoryWorld, height: u64) {
    let hash = world.blocks.produce(height);
    world.blockhash_store.store(height, hash);
    if height > BLOCKHASH_WINDOW {
        world.blocks.prune_below(height - BLOCKHASH_WINDOW);
    }
    debug!(height, hash = %hex::encode(hash), "Block sealed");
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Seal a block every `block_time` forever.
pub async fn run_block_producer(devnet: Arc<Devnet>, block_time: Duration) {
    let mut interval = tokio::time::interval(block_time);
    loop {
        interval.tick().await;
        devnet.produce_block();
    }
}
