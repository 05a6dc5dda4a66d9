//! In-memory harness shared by the coordinator integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use vrf_coordinator::commitment::hash_of_key;
use vrf_coordinator::memory::MemoryWorld;
use vrf_coordinator::proof::prove;
use vrf_coordinator::{
    CallbackContext, CallbackError, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorEvent,
    ExtraArgsV1, FeeConfig, FulfillmentOutcome, Hash, Proof, Pubkey, RandomWordsRequest,
    RandomWordsRequested, RecentBlocks, RequestCommitment, RequestId, Result, TxContext, VrfConsumer,
};

pub const GAS_PRICE: u128 = 1_000_000_000;
pub const TX_GAS: u64 = 5_000_000;
pub const LINK_PRICE: i128 = 5_000_000_000_000_000;
pub const ONE_LINK: u128 = 1_000_000_000_000_000_000;
pub const ONE_NATIVE: u128 = 1_000_000_000_000_000_000;
pub const CALLBACK_GAS: u32 = 200_000;

pub fn pk(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        minimum_request_confirmations: 3,
        max_gas_limit: 500_000,
        staleness_seconds: 0,
        gas_after_payment_calculation: 33_285,
        fallback_wei_per_unit_link: LINK_PRICE,
        fee: FeeConfig {
            fulfillment_flat_fee_link_ppm: 500,
            fulfillment_flat_fee_native_ppm: 500,
        },
    }
}

/// What a [`TestConsumer`] does when its words arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Accept,
    Revert,
    Panic,
    BurnGas,
    /// Try to request again from inside the callback.
    Reenter { sub_id: u64 },
    /// Open a subscription from inside the callback.
    OpenSubscription,
}

pub struct TestConsumer {
    pub id: Pubkey,
    behavior: Mutex<Behavior>,
    coordinator: Mutex<Pubkey>,
    pub fulfilled: Mutex<Vec<(RequestId, Vec<Hash>)>>,
    pub nested_errors: Mutex<Vec<CoordinatorError>>,
    pub repointed: Mutex<Vec<(Pubkey, u64)>>,
}

impl TestConsumer {
    pub fn new(id: Pubkey, coordinator: Pubkey) -> Self {
        Self {
            id,
            behavior: Mutex::new(Behavior::Accept),
            coordinator: Mutex::new(coordinator),
            fulfilled: Mutex::new(Vec::new()),
            nested_errors: Mutex::new(Vec::new()),
            repointed: Mutex::new(Vec::new()),
        }
    }

    pub fn behave(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn coordinator(&self) -> Pubkey {
        *self.coordinator.lock()
    }
}

impl VrfConsumer for TestConsumer {
    fn raw_fulfill_random_words(
        &self,
        ctx: &mut CallbackContext<'_>,
        request_id: RequestId,
        random_words: &[Hash],
    ) -> std::result::Result<(), CallbackError> {
        let want = self.coordinator();
        if ctx.caller() != want {
            return Err(CallbackError::OnlyCoordinatorCanFulfill { have: ctx.caller(), want });
        }
        ctx.gas.consume(20_000)?;

        let behavior = *self.behavior.lock();
        match behavior {
            Behavior::Accept => {}
            Behavior::Revert => return Err(CallbackError::Reverted("words rejected".into())),
            Behavior::Panic => panic!("consumer bug"),
            Behavior::BurnGas => ctx.gas.consume(u64::MAX)?,
            Behavior::Reenter { sub_id } => {
                let mut tx = ctx.nested(self.id);
                let req = RandomWordsRequest {
                    key_hash: [0u8; 32],
                    sub_id,
                    request_confirmations: 3,
                    callback_gas_limit: CALLBACK_GAS,
                    num_words: 1,
                    extra_args: Vec::new(),
                };
                if let Err(e) = ctx.coordinator.request_random_words(&mut tx, req) {
                    self.nested_errors.lock().push(e);
                }
                ctx.absorb(&tx)?;
            }
            Behavior::OpenSubscription => {
                let mut tx = ctx.nested(self.id);
                ctx.coordinator
                    .create_subscription(&mut tx)
                    .map_err(|e| CallbackError::Reverted(e.to_string()))?;
                ctx.absorb(&tx)?;
            }
        }
        self.fulfilled.lock().push((request_id, random_words.to_vec()));
        Ok(())
    }

    fn set_coordinator(
        &self,
        caller: Pubkey,
        coordinator: Pubkey,
        sub_id: u64,
    ) -> std::result::Result<(), CallbackError> {
        let want = self.coordinator();
        if caller != want {
            return Err(CallbackError::OnlyCoordinatorCanFulfill { have: caller, want });
        }
        *self.coordinator.lock() = coordinator;
        self.repointed.lock().push((coordinator, sub_id));
        Ok(())
    }
}

pub struct Harness {
    pub world: MemoryWorld,
    pub coordinator: Arc<Coordinator>,
    pub owner: Pubkey,
    pub oracle: Pubkey,
    pub oracle_key: SigningKey,
    pub key_hash: Hash,
    pub sub_owner: Pubkey,
    head: u64,
}

impl Harness {
    pub fn new() -> Self {
        let world = MemoryWorld::new(LINK_PRICE);
        let owner = pk(1);
        let oracle_key = SigningKey::from_bytes(&[42u8; 32]);
        let coordinator = Arc::new(Coordinator::new(pk(100), owner, world.environment()));

        let mut h = Self {
            world,
            coordinator,
            owner,
            oracle: pk(2),
            key_hash: hash_of_key(&oracle_key.verifying_key().to_bytes()),
            oracle_key,
            sub_owner: pk(3),
            head: 0,
        };
        h.advance(10);

        h.coordinator
            .set_config(&mut h.tx(owner), test_config())
            .unwrap();
        let public_key = h.oracle_key.verifying_key().to_bytes();
        h.coordinator
            .register_proving_key(&mut h.tx(owner), h.oracle, public_key)
            .unwrap();
        h
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Seal `n` more blocks.
    pub fn advance(&mut self, n: u64) {
        for _ in 0..n {
            self.head += 1;
            self.world.blocks.produce(self.head);
        }
    }

    /// A transaction by `caller` in the current head block.
    pub fn tx(&self, caller: Pubkey) -> TxContext {
        TxContext::new(caller, self.head, 1_700_000_000 + self.head * 12, GAS_PRICE, TX_GAS)
    }

    pub fn deploy_consumer(&self, id: Pubkey) -> Arc<TestConsumer> {
        let consumer = Arc::new(TestConsumer::new(id, self.coordinator.id()));
        self.world.contracts.deploy_consumer(id, consumer.clone());
        consumer
    }

    /// Open a subscription owned by `sub_owner`, register `consumers`, and fund it.
    pub fn subscribe(&self, consumers: &[Pubkey], link: u128, native: u128) -> u64 {
        let c = &self.coordinator;
        let sub_id = c.create_subscription(&mut self.tx(self.sub_owner)).unwrap();
        for consumer in consumers {
            c.add_consumer(&mut self.tx(self.sub_owner), sub_id, *consumer).unwrap();
        }
        if link > 0 {
            self.world.link.mint(&self.sub_owner, link);
            c.fund_subscription(&mut self.tx(self.sub_owner), sub_id, link).unwrap();
        }
        if native > 0 {
            self.world.native.mint(&self.sub_owner, native);
            c.fund_subscription_with_native(&mut self.tx(self.sub_owner), sub_id, native)
                .unwrap();
        }
        sub_id
    }

    pub fn request_params(&self, sub_id: u64, num_words: u32, native: bool) -> RandomWordsRequest {
        RandomWordsRequest {
            key_hash: self.key_hash,
            sub_id,
            request_confirmations: 3,
            callback_gas_limit: CALLBACK_GAS,
            num_words,
            extra_args: if native {
                ExtraArgsV1 { native_payment: true }.encode()
            } else {
                Vec::new()
            },
        }
    }

    /// Request from `consumer` and return the published request event.
    pub fn request(&self, consumer: Pubkey, sub_id: u64, num_words: u32, native: bool) -> RandomWordsRequested {
        let req = self.request_params(sub_id, num_words, native);
        let request_id = self
            .coordinator
            .request_random_words(&mut self.tx(consumer), req)
            .unwrap();
        self.requested(&request_id)
    }

    pub fn requested(&self, request_id: &RequestId) -> RandomWordsRequested {
        self.coordinator
            .events_since(0)
            .into_iter()
            .rev()
            .find_map(|logged| match logged.event {
                CoordinatorEvent::RandomWordsRequested(e) if e.request_id == *request_id => Some(e),
                _ => None,
            })
            .expect("request event published")
    }

    pub fn block_hash(&self, height: u64) -> Hash {
        self.world
            .blocks
            .block_hash(height)
            .expect("block produced")
    }

    pub fn commitment(&self, e: &RandomWordsRequested) -> RequestCommitment {
        RequestCommitment {
            block_number: e.block_number,
            sub_id: e.sub_id,
            callback_gas_limit: e.callback_gas_limit,
            num_words: e.num_words,
            sender: e.sender,
            native_payment: e.native_payment,
        }
    }

    pub fn proof(&self, e: &RandomWordsRequested) -> Proof {
        prove(&self.oracle_key, &e.pre_seed, &self.block_hash(e.block_number))
    }

    /// Wait out the confirmations and fulfill `e` as the oracle.
    pub fn fulfill(&mut self, e: &RandomWordsRequested) -> Result<FulfillmentOutcome> {
        self.advance(e.minimum_request_confirmations as u64);
        let (proof, rc) = (self.proof(e), self.commitment(e));
        self.submit(&proof, &rc)
    }

    pub fn submit(&self, proof: &Proof, rc: &RequestCommitment) -> Result<FulfillmentOutcome> {
        self.coordinator
            .fulfill_random_words(&mut self.tx(self.oracle), proof, rc)
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.coordinator
            .events_since(0)
            .iter()
            .map(|logged| logged.event.name())
            .collect()
    }

    /// Subscription balances plus oracle earnings, per currency.
    pub fn held(&self, sub_ids: &[u64], oracles: &[Pubkey]) -> (u128, u128) {
        let mut link = 0;
        let mut native = 0;
        for sub_id in sub_ids {
            if let Ok(sub) = self.coordinator.get_subscription(*sub_id) {
                link += sub.balance;
                native += sub.native_balance;
            }
        }
        for oracle in oracles {
            link += self.coordinator.withdrawable_tokens(oracle);
            native += self.coordinator.withdrawable_native(oracle);
        }
        (link, native)
    }
}

pub fn as_set(keys: &[Pubkey]) -> HashSet<Pubkey> {
    keys.iter().copied().collect()
}
