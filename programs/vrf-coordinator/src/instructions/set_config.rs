use tracing::info;

use crate::context::TxContext;
use crate::errors::{CoordinatorError, Result};
use crate::events::ConfigSet;
use crate::state::{CoordinatorConfig, MAX_REQUEST_CONFIRMATIONS};
use crate::Coordinator;

/// Replace the global configuration (owner-only).
pub fn handler(coordinator: &Coordinator, tx: &mut TxContext, config: CoordinatorConfig) -> Result<()> {
    coordinator.transact(tx, false, |ctx| {
        ctx.only_owner()?;

        if config.minimum_request_confirmations > MAX_REQUEST_CONFIRMATIONS {
            return Err(CoordinatorError::InvalidRequestConfirmations {
                have: config.minimum_request_confirmations,
                min: config.minimum_request_confirmations,
                max: MAX_REQUEST_CONFIRMATIONS,
            });
        }
        if config.fallback_wei_per_unit_link <= 0 {
            return Err(CoordinatorError::InvalidLinkWeiPrice(config.fallback_wei_per_unit_link));
        }

        ctx.charge_writes(1)?;
        ctx.state.config = config;

        ctx.emit(ConfigSet {
            minimum_request_confirmations: config.minimum_request_confirmations,
            max_gas_limit: config.max_gas_limit,
            staleness_seconds: config.staleness_seconds,
            gas_after_payment_calculation: config.gas_after_payment_calculation,
            fallback_wei_per_unit_link: config.fallback_wei_per_unit_link,
            fulfillment_flat_fee_link_ppm: config.fee.fulfillment_flat_fee_link_ppm,
            fulfillment_flat_fee_native_ppm: config.fee.fulfillment_flat_fee_native_ppm,
        });

        info!(
            min_confirmations = config.minimum_request_confirmations,
            max_gas_limit = config.max_gas_limit,
            "Config set"
        );
        Ok(())
    })
}
