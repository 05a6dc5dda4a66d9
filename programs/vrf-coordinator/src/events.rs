use anchor_lang::prelude::*;

use crate::commitment::{Hash, RequestId};

/// Emitted when the coordinator owner replaces the configuration.
#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSet {
    pub minimum_request_confirmations: u16,
    pub max_gas_limit: u32,
    pub staleness_seconds: u32,
    pub gas_after_payment_calculation: u32,
    pub fallback_wei_per_unit_link: i128,
    pub fulfillment_flat_fee_link_ppm: u32,
    pub fulfillment_flat_fee_native_ppm: u32,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvingKeyRegistered {
    pub key_hash: Hash,
    pub oracle: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvingKeyDeregistered {
    pub key_hash: Hash,
    pub oracle: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCreated {
    pub sub_id: u64,
    pub owner: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConsumerAdded {
    pub sub_id: u64,
    pub consumer: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConsumerRemoved {
    pub sub_id: u64,
    pub consumer: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFunded {
    pub sub_id: u64,
    pub old_balance: u128,
    pub new_balance: u128,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFundedWithNative {
    pub sub_id: u64,
    pub old_native_balance: u128,
    pub new_native_balance: u128,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOwnerTransferRequested {
    pub sub_id: u64,
    pub from: Pubkey,
    pub to: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOwnerTransferred {
    pub sub_id: u64,
    pub from: Pubkey,
    pub to: Pubkey,
}

/// Emitted when a subscription is closed and its balances released.
#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCanceled {
    pub sub_id: u64,
    pub to: Pubkey,
    pub amount_link: u128,
    pub amount_native: u128,
}

/// Emitted when a new randomness request is recorded.
///
/// Oracle listeners pick these up, wait for `minimum_request_confirmations`
/// blocks past `block_number`, and submit a proof over `pre_seed`.
#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsRequested {
    pub key_hash: Hash,
    pub request_id: RequestId,
    pub pre_seed: Hash,
    pub sub_id: u64,
    pub minimum_request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    pub native_payment: bool,
    pub block_number: u64,
    pub sender: Pubkey,
}

/// Emitted when a request is fulfilled and the oracle paid.
#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsFulfilled {
    pub request_id: RequestId,
    pub output_seed: Hash,
    pub sub_id: u64,
    pub payment: u128,
    pub native_payment: bool,
    /// Whether the consumer callback completed within its budget.
    pub success: bool,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorRegistered {
    pub coordinator: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorDeregistered {
    pub coordinator: Pubkey,
}

#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCompleted {
    pub new_coordinator: Pubkey,
    pub sub_id: u64,
    pub new_sub_id: u64,
}

/// Emitted when an oracle withdraws its earnings.
#[event]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundsWithdrawn {
    pub oracle: Pubkey,
    pub recipient: Pubkey,
    pub amount: u128,
    pub native: bool,
}

macro_rules! coordinator_events {
    ($($name:ident),* $(,)?) => {
        /// Any event the coordinator publishes.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum CoordinatorEvent {
            $($name($name),)*
        }

        impl CoordinatorEvent {
            pub fn name(&self) -> &'static str {
                match self {
                    $(CoordinatorEvent::$name(_) => stringify!($name),)*
                }
            }

            /// Discriminator-prefixed borsh encoding of the event.
            pub fn data(&self) -> Vec<u8> {
                match self {
                    $(CoordinatorEvent::$name(e) => anchor_lang::Event::data(e),)*
                }
            }
        }

        $(
            impl From<$name> for CoordinatorEvent {
                fn from(e: $name) -> Self {
                    CoordinatorEvent::$name(e)
                }
            }
        )*
    };
}

coordinator_events!(
    ConfigSet,
    ProvingKeyRegistered,
    ProvingKeyDeregistered,
    SubscriptionCreated,
    SubscriptionConsumerAdded,
    SubscriptionConsumerRemoved,
    SubscriptionFunded,
    SubscriptionFundedWithNative,
    SubscriptionOwnerTransferRequested,
    SubscriptionOwnerTransferred,
    SubscriptionCanceled,
    RandomWordsRequested,
    RandomWordsFulfilled,
    CoordinatorRegistered,
    CoordinatorDeregistered,
    MigrationCompleted,
    FundsWithdrawn,
);

/// An event together with its position in the coordinator's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub seq: u64,
    pub event: CoordinatorEvent,
}
