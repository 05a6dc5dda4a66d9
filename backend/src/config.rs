//! Application configuration loaded from environment variables.
//!
//! Every variable is optional:
//! `HTTP_PORT`, `ORACLE_KEYPAIR_PATH`, `BLOCK_TIME_MS`, `MAX_RETRIES`,
//! `INITIAL_RETRY_DELAY_MS`, `FULFILLMENT_CONCURRENCY`, `FULFILLMENT_GAS_LIMIT`,
//! `GAS_PRICE_WEI`, `MIN_CONFIRMATIONS`, `MAX_GAS_LIMIT`, `STALENESS_SECONDS`,
//! `GAS_AFTER_PAYMENT_CALCULATION`, `FALLBACK_WEI_PER_UNIT_LINK`,
//! `FLAT_FEE_LINK_PPM`, `FLAT_FEE_NATIVE_PPM`, `SUBSCRIPTION_FUNDING`

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use std::str::FromStr;
use std::sync::Arc;
use vrf_coordinator::{CoordinatorConfig, FeeConfig};

/// Application configuration for the devnet oracle node.
#[derive(Clone)]
pub struct AppConfig {
    /// HTTP server port.
    pub http_port: u16,
    /// Ed25519 key the oracle proves with.
    pub oracle_key: Arc<SigningKey>,
    /// Interval between produced blocks.
    pub block_time_ms: u64,
    /// Maximum attempts per fulfillment.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds, doubled per attempt.
    pub initial_retry_delay_ms: u64,
    /// Maximum concurrent fulfillment tasks.
    pub fulfillment_concurrency: usize,
    /// Gas limit of each transaction the node submits.
    pub fulfillment_gas_limit: u64,
    pub gas_price_wei: u128,
    /// Configuration installed on the coordinator at startup.
    pub coordinator: CoordinatorConfig,
    /// Fee-token amount the dice subscription is funded with, in juels.
    pub subscription_funding: u128,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, reading the oracle keypair file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let keypair_path = lookup("ORACLE_KEYPAIR_PATH").unwrap_or_else(|| "~/.config/solana/id.json".into());
        let keypair_path = shellexpand::tilde(&keypair_path).to_string();
        let oracle_key = read_keypair_file(&keypair_path)
            .with_context(|| format!("failed to read keypair from {keypair_path}"))?;
        Self::with_oracle_key(lookup, oracle_key)
    }

    /// Load everything but the keypair through `lookup`.
    pub fn with_oracle_key(lookup: impl Fn(&str) -> Option<String>, oracle_key: SigningKey) -> Result<Self> {
        let defaults = CoordinatorConfig::default();

        let coordinator = CoordinatorConfig {
            minimum_request_confirmations: parse_or(&lookup, "MIN_CONFIRMATIONS", defaults.minimum_request_confirmations)?,
            max_gas_limit: parse_or(&lookup, "MAX_GAS_LIMIT", defaults.max_gas_limit)?,
            staleness_seconds: parse_or(&lookup, "STALENESS_SECONDS", defaults.staleness_seconds)?,
            gas_after_payment_calculation: parse_or(
                &lookup,
                "GAS_AFTER_PAYMENT_CALCULATION",
                defaults.gas_after_payment_calculation,
            )?,
            fallback_wei_per_unit_link: parse_or(
                &lookup,
                "FALLBACK_WEI_PER_UNIT_LINK",
                defaults.fallback_wei_per_unit_link,
            )?,
            fee: FeeConfig {
                fulfillment_flat_fee_link_ppm: parse_or(&lookup, "FLAT_FEE_LINK_PPM", 500)?,
                fulfillment_flat_fee_native_ppm: parse_or(&lookup, "FLAT_FEE_NATIVE_PPM", 500)?,
            },
        };

        Ok(Self {
            http_port: parse_or(&lookup, "HTTP_PORT", 8080)?,
            oracle_key: Arc::new(oracle_key),
            block_time_ms: parse_or(&lookup, "BLOCK_TIME_MS", 400)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", 5)?,
            initial_retry_delay_ms: parse_or(&lookup, "INITIAL_RETRY_DELAY_MS", 500)?,
            fulfillment_concurrency: parse_or(&lookup, "FULFILLMENT_CONCURRENCY", 4)?,
            fulfillment_gas_limit: parse_or(&lookup, "FULFILLMENT_GAS_LIMIT", 5_000_000)?,
            gas_price_wei: parse_or(&lookup, "GAS_PRICE_WEI", 1_000_000_000)?,
            coordinator,
            subscription_funding: parse_or(&lookup, "SUBSCRIPTION_FUNDING", 10_000_000_000_000_000_000)?,
        })
    }
}

#[cfg(test)]
impl AppConfig {
    /// Defaults with a fixed oracle key and fast retries.
    pub fn for_tests() -> Self {
        let mut config = Self::with_oracle_key(|_| None, SigningKey::from_bytes(&[11u8; 32]))
            .expect("defaults are valid");
        config.block_time_ms = 5;
        config.initial_retry_delay_ms = 5;
        config
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

/// Read a Solana CLI keypair file: a JSON array of 64 bytes whose first
/// half is the secret key.
fn read_keypair_file(path: &str) -> Result<SigningKey> {
    let raw = std::fs::read_to_string(path)?;
    let bytes: Vec<u8> = serde_json::from_str(&raw).context("keypair file is not a JSON byte array")?;
    if bytes.len() != 64 {
        anyhow::bail!("keypair must be 64 bytes, found {}", bytes.len());
    }
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&bytes[..32]);
    Ok(SigningKey::from_bytes(&secret))
}
