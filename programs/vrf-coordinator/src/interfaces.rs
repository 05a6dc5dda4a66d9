//! Ports to the collaborators the coordinator depends on but does not own.
//!
//! Implementations:
//! - in-memory adapters in [`crate::memory`] (tests, devnet)
//! - [`crate::Coordinator`] itself as a [`MigrationTarget`]

use std::sync::Arc;

use anchor_lang::prelude::Pubkey;
use thiserror::Error;

use crate::commitment::{Hash, RequestId};
use crate::context::{CallbackContext, ExecutionLock, TxContext};
use crate::errors::Result;
use crate::gas::{GasSchedule, OutOfGas};
use crate::proof::ProofVerifier;

/// Latest answer of a price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    /// Wei per whole fee token. Non-positive answers are invalid.
    pub answer: i128,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: u64,
}

/// Live block hashes, only consulted for recent heights.
pub trait RecentBlocks: Send + Sync {
    fn block_hash(&self, height: u64) -> Option<Hash>;
}

/// Historical block-hash store for heights outside the live window.
pub trait BlockhashStore: Send + Sync {
    fn get_blockhash(&self, height: u64) -> Option<Hash>;
}

/// Fee-token / native-token price feed.
pub trait PriceFeed: Send + Sync {
    fn latest_round_data(&self) -> std::result::Result<RoundData, String>;
}

/// Chain-specific extra cost of the current transaction (0 where inapplicable).
pub trait ChainCost: Send + Sync {
    fn current_tx_data_fee(&self) -> u128;
}

/// Balance ledger of a fungible token.
pub trait TokenLedger: Send + Sync {
    fn transfer(&self, from: &Pubkey, to: &Pubkey, amount: u128) -> std::result::Result<(), String>;
    fn balance_of(&self, owner: &Pubkey) -> u128;
}

/// Failure reported by consumer code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("only coordinator {want} can fulfill, called by {have}")]
    OnlyCoordinatorCanFulfill { have: Pubkey, want: Pubkey },
    #[error("no consumer deployed at {0}")]
    NotDeployed(Pubkey),
    #[error(transparent)]
    OutOfGas(#[from] OutOfGas),
    #[error("reverted: {0}")]
    Reverted(String),
}

/// Code living at a consumer identity.
pub trait VrfConsumer: Send + Sync {
    /// Receive the words for `request_id`. Runs under `ctx.gas`, a budget of
    /// exactly the request's callback gas limit.
    fn raw_fulfill_random_words(
        &self,
        ctx: &mut CallbackContext<'_>,
        request_id: RequestId,
        random_words: &[Hash],
    ) -> std::result::Result<(), CallbackError>;

    /// Repoint the consumer after its subscription migrated.
    fn set_coordinator(
        &self,
        caller: Pubkey,
        coordinator: Pubkey,
        sub_id: u64,
    ) -> std::result::Result<(), CallbackError>;
}

/// What a migration target hands back when a migration it accepted is undone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationRefund {
    /// Id of the subscription on the migrating coordinator.
    pub prior_sub_id: u64,
    /// Fee-token amount that reached the target.
    pub link: u128,
    /// Native amount that reached the target.
    pub native: u128,
    /// Consumers already repointed at the target, to be pointed back.
    pub repoint: Vec<Pubkey>,
}

/// Inbound side of subscription migration.
pub trait MigrationTarget: Send + Sync {
    /// Accept a migrated subscription and return its id on this system.
    /// `tx.caller` is the migrating coordinator; `native_amount` is what it
    /// transfers alongside the payload once the subscription is accepted.
    fn on_migration(&self, tx: &mut TxContext, native_amount: u128, payload: &[u8]) -> Result<u64>;

    /// Undo the migration that created `sub_id`: drop the subscription, send
    /// `refund.link` and `refund.native` back to `tx.caller`, and point the
    /// listed consumers back at it. Only the coordinator the subscription
    /// came from may call this, and only before the subscription is used.
    fn abort_migration(&self, tx: &mut TxContext, sub_id: u64, refund: MigrationRefund) -> Result<()>;
}

/// Resolves identities to the code deployed at them.
pub trait Contracts: Send + Sync {
    fn consumer(&self, id: &Pubkey) -> Option<Arc<dyn VrfConsumer>>;
    fn migration_target(&self, id: &Pubkey) -> Option<Arc<dyn MigrationTarget>>;
}

/// Everything a coordinator instance talks to.
#[derive(Clone)]
pub struct Environment {
    pub verifier: Arc<dyn ProofVerifier>,
    pub recent_blocks: Arc<dyn RecentBlocks>,
    pub blockhash_store: Arc<dyn BlockhashStore>,
    /// Fee-token price in wei. When unset, the configured fallback is used.
    pub link_native_feed: Option<Arc<dyn PriceFeed>>,
    pub chain_cost: Arc<dyn ChainCost>,
    /// Fee token. Funding and paying in it requires it to be set.
    pub link_token: Option<Arc<dyn TokenLedger>>,
    pub native_token: Arc<dyn TokenLedger>,
    pub contracts: Arc<dyn Contracts>,
    pub gas_schedule: GasSchedule,
    /// Shared by every coordinator wired to the same collaborators.
    pub execution_lock: ExecutionLock,
}
