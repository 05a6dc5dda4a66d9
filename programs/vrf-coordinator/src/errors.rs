use anchor_lang::prelude::Pubkey;
use thiserror::Error;

use crate::commitment::Hash;
use crate::gas::OutOfGas;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Coarse classification of a [`CoordinatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied an out-of-range argument.
    InputValidation,
    /// The request does not match authoritative ledger or registry state.
    StateConsistency,
    /// An external datum (block hash, price) is missing or unusable right now.
    Unavailable,
    /// Not enough execution budget to complete the operation.
    Resource,
    /// A funds-safety guard tripped.
    Accounting,
    /// The randomness proof did not verify.
    Verification,
    /// An external collaborator (token, migration target, consumer) refused.
    External,
}

/// Every named failure condition of the coordinator.
///
/// All of them abort the operation that raised them and leave the ledger
/// exactly as it was before the operation began.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("invalid request confirmations: have {have}, min {min}, max {max}")]
    InvalidRequestConfirmations { have: u16, min: u16, max: u16 },
    #[error("callback gas limit too big: have {have}, max {want}")]
    GasLimitTooBig { have: u32, want: u32 },
    #[error("too many random words: have {have}, max {want}")]
    NumWordsTooBig { have: u32, want: u32 },
    #[error("unrecognized extra args")]
    InvalidExtraArgsTag,
    #[error("zero address not allowed")]
    ZeroAddressNotAllowed,

    #[error("invalid subscription")]
    InvalidSubscription,
    #[error("{consumer} is not a consumer of subscription {sub_id}")]
    InvalidConsumer { sub_id: u64, consumer: Pubkey },
    #[error("no such proving key {}", hex::encode(.0))]
    NoSuchProvingKey(Hash),
    #[error("proving key {} already registered", hex::encode(.0))]
    ProvingKeyAlreadyRegistered(Hash),
    #[error("no corresponding request")]
    NoCorrespondingRequest,
    #[error("incorrect commitment")]
    IncorrectCommitment,
    #[error("coordinator {0} not registered")]
    CoordinatorNotRegistered(Pubkey),
    #[error("coordinator {0} already registered")]
    CoordinatorAlreadyRegistered(Pubkey),
    #[error("not subscription owner, owner is {0}")]
    MustBeSubOwner(Pubkey),
    #[error("must be requested owner {0}")]
    MustBeRequestedOwner(Pubkey),
    #[error("only callable by owner")]
    OnlyCallableByOwner,
    #[error("pending request exists")]
    PendingRequestExists,
    #[error("too many consumers")]
    TooManyConsumers,
    #[error("reentrant call")]
    Reentrant,
    #[error("fee token not set")]
    LinkNotSet,
    #[error("counter overflow")]
    CounterOverflow,
    #[error("invalid migration version {0}")]
    InvalidMigrationVersion(u8),
    #[error("invalid native balance: transferred {transferred}, expected {expected}")]
    InvalidNativeBalance { transferred: u128, expected: u128 },
    #[error("malformed migration payload")]
    InvalidMigrationPayload,
    #[error("migrated subscription {0} can no longer be returned")]
    MigrationNotReversible(u64),

    #[error("blockhash for height {0} not in store")]
    BlockhashNotInStore(u64),
    #[error("invalid link/wei price {0}")]
    InvalidLinkWeiPrice(i128),
    #[error("price feed unavailable: {0}")]
    PriceFeedUnavailable(String),

    #[error("insufficient gas for consumer: have {have}, want {want}")]
    InsufficientGasForConsumer { have: u64, want: u64 },
    #[error("out of gas: limit {limit}, wanted {wanted}")]
    OutOfGas { limit: u64, wanted: u64 },

    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("payment too large")]
    PaymentTooLarge,
    #[error("balance overflow")]
    BalanceOverflow,

    #[error("proof verification failed: {0}")]
    ProofVerificationFailed(String),

    #[error("token transfer failed: {0}")]
    TransferFailed(String),
    #[error("migration target rejected: {0}")]
    MigrationTargetFailed(String),
    #[error("consumer {consumer} rejected coordinator update: {reason}")]
    ConsumerNotificationFailed { consumer: Pubkey, reason: String },
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        use CoordinatorError::*;
        match self {
            InvalidRequestConfirmations { .. }
            | GasLimitTooBig { .. }
            | NumWordsTooBig { .. }
            | InvalidExtraArgsTag
            | ZeroAddressNotAllowed => ErrorKind::InputValidation,
            BlockhashNotInStore(_) | InvalidLinkWeiPrice(_) | PriceFeedUnavailable(_) => {
                ErrorKind::Unavailable
            }
            InsufficientGasForConsumer { .. } | OutOfGas { .. } => ErrorKind::Resource,
            InsufficientBalance | PaymentTooLarge | BalanceOverflow => ErrorKind::Accounting,
            ProofVerificationFailed(_) => ErrorKind::Verification,
            TransferFailed(_) | MigrationTargetFailed(_) | ConsumerNotificationFailed { .. } => {
                ErrorKind::External
            }
            _ => ErrorKind::StateConsistency,
        }
    }

    /// Whether resubmitting the same operation later can succeed without the
    /// caller changing anything. Only missing external data qualifies.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

impl From<OutOfGas> for CoordinatorError {
    fn from(e: OutOfGas) -> Self {
        CoordinatorError::OutOfGas {
            limit: e.limit,
            wanted: e.wanted,
        }
    }
}
