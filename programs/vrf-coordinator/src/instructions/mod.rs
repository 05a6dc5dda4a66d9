pub mod add_consumer;
pub mod cancel_subscription;
pub mod create_subscription;
pub mod fulfill_random_words;
pub mod fund_subscription;
pub mod migrate;
pub mod migration_targets;
pub mod proving_keys;
pub mod remove_consumer;
pub mod request_random_words;
pub mod set_config;
pub mod subscription_owner_transfer;
pub mod withdraw;

pub use fulfill_random_words::FulfillmentOutcome;
pub use migrate::{MigrationData, MIGRATION_VERSION};
pub use request_random_words::RandomWordsRequest;

use anchor_lang::prelude::Pubkey;

use crate::errors::{CoordinatorError, Result};
use crate::interfaces::TokenLedger;

/// Fail unless `holder` has at least `amount` of `token`. Checked before a
/// payout so that a multi-token payout never stops half way.
pub(crate) fn ensure_held(token: &dyn TokenLedger, holder: &Pubkey, amount: u128) -> Result<()> {
    let available = token.balance_of(holder);
    if available < amount {
        return Err(CoordinatorError::TransferFailed(format!(
            "{holder} holds {available}, needs {amount}"
        )));
    }
    Ok(())
}
