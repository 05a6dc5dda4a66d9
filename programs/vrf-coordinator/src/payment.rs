//! Fulfillment pricing.
//!
//! Both formulas charge the gas consumed by the fulfillment plus a fixed
//! post-calculation overhead at the transaction's gas price, add the chain's
//! extra data fee, and add a flat fee configured in parts-per-million of one
//! whole token.

use crate::errors::{CoordinatorError, Result};
use crate::interfaces::PriceFeed;
use crate::price::link_wei_price;
use crate::state::CoordinatorConfig;

/// Total supply of the fee token in its smallest unit; no single payment may reach it.
pub const TOTAL_LINK_SUPPLY: u128 = 1_000_000_000 * ONE_TOKEN;

const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;
const PPM_TO_SMALLEST_UNIT: u128 = 1_000_000_000_000;

/// Measured inputs of one payment calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasCost {
    /// Gas consumed by the fulfillment so far.
    pub gas_used: u64,
    /// Wei per gas.
    pub gas_price: u128,
    /// Extra chain data fee in wei.
    pub l1_data_fee: u128,
}

fn gas_cost_wei(config: &CoordinatorConfig, cost: &GasCost) -> Result<u128> {
    let gas = config.gas_after_payment_calculation as u128 + cost.gas_used as u128;
    cost.gas_price
        .checked_mul(gas)
        .ok_or(CoordinatorError::PaymentTooLarge)
}

/// Payment in wei for a natively paid fulfillment.
pub fn calculate_payment_amount_native(config: &CoordinatorConfig, cost: &GasCost) -> Result<u128> {
    let flat_fee = config.fee.fulfillment_flat_fee_native_ppm as u128 * PPM_TO_SMALLEST_UNIT;
    gas_cost_wei(config, cost)?
        .checked_add(flat_fee)
        .and_then(|v| v.checked_add(cost.l1_data_fee))
        .ok_or(CoordinatorError::PaymentTooLarge)
}

/// Payment in fee-token juels, converting the wei cost at `wei_per_unit_link`.
pub fn calculate_payment_amount_link(
    config: &CoordinatorConfig,
    cost: &GasCost,
    wei_per_unit_link: i128,
) -> Result<u128> {
    if wei_per_unit_link <= 0 {
        return Err(CoordinatorError::InvalidLinkWeiPrice(wei_per_unit_link));
    }
    let wei = gas_cost_wei(config, cost)?
        .checked_add(cost.l1_data_fee)
        .ok_or(CoordinatorError::PaymentTooLarge)?;
    let payment_before_fee = ONE_TOKEN
        .checked_mul(wei)
        .ok_or(CoordinatorError::PaymentTooLarge)?
        / wei_per_unit_link as u128;

    let flat_fee = config.fee.fulfillment_flat_fee_link_ppm as u128 * PPM_TO_SMALLEST_UNIT;
    if payment_before_fee > TOTAL_LINK_SUPPLY - flat_fee {
        return Err(CoordinatorError::PaymentTooLarge);
    }
    Ok(payment_before_fee + flat_fee)
}

/// Price a fulfillment in the requested payment mode. The fee-token price is
/// re-read from the feed on every call.
pub fn calculate_payment_amount(
    config: &CoordinatorConfig,
    cost: &GasCost,
    native_payment: bool,
    feed: Option<&dyn PriceFeed>,
    now: u64,
) -> Result<u128> {
    if native_payment {
        calculate_payment_amount_native(config, cost)
    } else {
        let price = link_wei_price(config, feed, now)?;
        calculate_payment_amount_link(config, cost, price)
    }
}
