use tracing::debug;

use crate::errors::{CoordinatorError, Result};
use crate::interfaces::PriceFeed;
use crate::state::CoordinatorConfig;

/// Resolve the fee-token price in wei, falling back to the configured price
/// when the feed is unset or its last update is older than
/// `staleness_seconds`. Read on every call, never cached.
pub fn link_wei_price(config: &CoordinatorConfig, feed: Option<&dyn PriceFeed>, now: u64) -> Result<i128> {
    let Some(feed) = feed else {
        return Ok(config.fallback_wei_per_unit_link);
    };
    let round = feed
        .latest_round_data()
        .map_err(CoordinatorError::PriceFeedUnavailable)?;

    let staleness = config.staleness_seconds as u64;
    if staleness > 0 && now.saturating_sub(round.updated_at) > staleness {
        debug!(
            updated_at = round.updated_at,
            now,
            fallback = config.fallback_wei_per_unit_link,
            "Price feed stale, using fallback"
        );
        return Ok(config.fallback_wei_per_unit_link);
    }
    Ok(round.answer)
}
