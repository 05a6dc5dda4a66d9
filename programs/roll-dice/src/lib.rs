//! Dice game powered by the VRF coordinator.
//!
//! Demonstrates how a consumer integrates with the coordinator:
//!
//! 1. **Request**: [`DiceGame::request_roll`] asks the coordinator for one
//!    random word on the game's subscription and records a pending roll.
//! 2. **Wait**: an oracle fulfills the request after the confirmations.
//! 3. **Settle**: the coordinator calls back into the game, which maps the
//!    first 8 bytes of the word to a fair 1-6 result.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;
use vrf_coordinator::{
    CallbackContext, CallbackError, Coordinator, CoordinatorError, Hash, Pubkey, RandomWordsRequest,
    RequestId, TxContext, VrfConsumer,
};

/// Gas the callback charges for recording a result.
const SETTLE_GAS: u64 = 5_000;

/// A dice roll backed by VRF randomness.
///
/// `result` is `0` while the roll is pending and `1..=6` once settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub player: Pubkey,
    pub request_id: RequestId,
    pub result: u8,
}

impl DiceRoll {
    pub fn is_settled(&self) -> bool {
        self.result != 0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollDiceError {
    #[error("game is bound to coordinator {want}, not {have}")]
    WrongCoordinator { have: Pubkey, want: Pubkey },
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

/// Roll parameters chosen when the game is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Proving key the game's requests name.
    pub key_hash: Hash,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
}

struct GameState {
    coordinator: Pubkey,
    sub_id: u64,
    rolls: HashMap<RequestId, DiceRoll>,
}

/// A consumer living at `id` that turns random words into dice rolls.
pub struct DiceGame {
    id: Pubkey,
    config: GameConfig,
    state: Mutex<GameState>,
}

impl DiceGame {
    /// A game paying from `sub_id` on `coordinator`.
    pub fn new(id: Pubkey, coordinator: Pubkey, sub_id: u64, config: GameConfig) -> Self {
        Self {
            id,
            config,
            state: Mutex::new(GameState {
                coordinator,
                sub_id,
                rolls: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> Pubkey {
        self.id
    }

    /// Coordinator and subscription the game currently uses.
    pub fn binding(&self) -> (Pubkey, u64) {
        let state = self.state.lock();
        (state.coordinator, state.sub_id)
    }

    /// Request a roll for `player`. The request is made by the game itself,
    /// inside the player's transaction.
    pub fn request_roll(
        &self,
        coordinator: &Coordinator,
        tx: &mut TxContext,
        player: Pubkey,
    ) -> Result<RequestId, RollDiceError> {
        let (bound, sub_id) = self.binding();
        if coordinator.id() != bound {
            return Err(RollDiceError::WrongCoordinator {
                have: coordinator.id(),
                want: bound,
            });
        }

        let mut nested = tx.nested(self.id);
        let requested = coordinator.request_random_words(
            &mut nested,
            RandomWordsRequest {
                key_hash: self.config.key_hash,
                sub_id,
                request_confirmations: self.config.request_confirmations,
                callback_gas_limit: self.config.callback_gas_limit,
                num_words: 1,
                extra_args: Vec::new(),
            },
        );
        tx.absorb(&nested).map_err(CoordinatorError::from)?;
        let request_id = requested?;

        self.state.lock().rolls.insert(
            request_id,
            DiceRoll {
                player,
                request_id,
                result: 0,
            },
        );
        info!(%player, request_id = %hex::encode(request_id), "Dice roll requested");
        Ok(request_id)
    }

    pub fn roll(&self, request_id: &RequestId) -> Option<DiceRoll> {
        self.state.lock().rolls.get(request_id).copied()
    }

    pub fn rolls_of(&self, player: &Pubkey) -> Vec<DiceRoll> {
        self.state
            .lock()
            .rolls
            .values()
            .filter(|r| r.player == *player)
            .copied()
            .collect()
    }
}

/// Map a random word to a die face: first 8 bytes as u64, modulo 6, plus 1.
/// Bias is negligible at 2^64 range.
pub fn dice_value(word: &Hash) -> u8 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[..8]);
    (u64::from_le_bytes(bytes) % 6 + 1) as u8
}

impl VrfConsumer for DiceGame {
    fn raw_fulfill_random_words(
        &self,
        ctx: &mut CallbackContext<'_>,
        request_id: RequestId,
        random_words: &[Hash],
    ) -> Result<(), CallbackError> {
        let mut state = self.state.lock();
        if ctx.caller() != state.coordinator {
            return Err(CallbackError::OnlyCoordinatorCanFulfill {
                have: ctx.caller(),
                want: state.coordinator,
            });
        }
        ctx.gas.consume(SETTLE_GAS)?;

        let word = random_words
            .first()
            .ok_or_else(|| CallbackError::Reverted("no random words".into()))?;
        let roll = state
            .rolls
            .get_mut(&request_id)
            .ok_or_else(|| CallbackError::Reverted("unknown roll".into()))?;
        if roll.is_settled() {
            return Err(CallbackError::Reverted("roll already settled".into()));
        }
        roll.result = dice_value(word);

        info!(
            player = %roll.player,
            request_id = %hex::encode(request_id),
            result = roll.result,
            "Dice rolled"
        );
        Ok(())
    }

    fn set_coordinator(&self, caller: Pubkey, coordinator: Pubkey, sub_id: u64) -> Result<(), CallbackError> {
        let mut state = self.state.lock();
        if caller != state.coordinator {
            return Err(CallbackError::OnlyCoordinatorCanFulfill {
                have: caller,
                want: state.coordinator,
            });
        }
        state.coordinator = coordinator;
        state.sub_id = sub_id;
        info!(%coordinator, sub_id, "Dice game moved to new coordinator");
        Ok(())
    }
}
