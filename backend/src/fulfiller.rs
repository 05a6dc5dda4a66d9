//! Fulfillment engine: consumes randomness request events, waits out their
//! confirmations, and submits proofs to the coordinator.
//!
//! Each fulfillment:
//! 1. Waits until the head is `minimum_request_confirmations` past the
//!    request's block.
//! 2. Signs the request's actual seed with the oracle key.
//! 3. Submits `fulfill_random_words`, which verifies the proof, runs the
//!    consumer callback, and pays the oracle.
//!
//! Failures the coordinator classifies as retryable (missing block hash,
//! unusable price) are retried with exponential backoff.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, instrument, warn};
use vrf_coordinator::{CoordinatorError, FulfillmentOutcome, RandomWordsRequested};

use crate::config::AppConfig;
use crate::devnet::Devnet;
use crate::metrics::Metrics;
use crate::vrf::{commitment_for, compute_proof};

/// Main fulfiller loop.
pub async fn run_fulfiller(
    devnet: Arc<Devnet>,
    config: AppConfig,
    mut rx: mpsc::Receiver<RandomWordsRequested>,
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
) {
    let semaphore = Arc::new(Semaphore::new(config.fulfillment_concurrency));

    while let Some(event) = rx.recv().await {
        metrics.record_request();
        pending_count.fetch_add(1, Ordering::Relaxed);

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                error!("Semaphore closed, stopping fulfiller");
                break;
            }
        };
        let net = devnet.clone();
        let cfg = config.clone();
        let pending = pending_count.clone();
        let met = metrics.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let start = Instant::now();
            let request_id = hex::encode(event.request_id);

            info!(
                request_id = %request_id,
                consumer = %event.sender,
                sub_id = event.sub_id,
                num_words = event.num_words,
                block = event.block_number,
                "Fulfilling randomness request"
            );

            match fulfill_request(&net, &cfg, &event).await {
                Ok(outcome) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    met.record_fulfillment(&outcome, latency_ms);
                    info!(
                        request_id = %request_id,
                        payment = %outcome.payment,
                        native_payment = outcome.native_payment,
                        callback_succeeded = outcome.success,
                        latency_ms,
                        "Fulfilled successfully"
                    );
                }
                Err(e) => handle_fulfillment_error(&request_id, e, &met),
            }

            pending.fetch_sub(1, Ordering::Relaxed);
        });
    }

    info!("Fulfiller channel closed, shutting down");
}

fn handle_fulfillment_error(request_id: &str, error: anyhow::Error, metrics: &Metrics) {
    if let Some(CoordinatorError::NoCorrespondingRequest) = error.downcast_ref::<CoordinatorError>() {
        metrics.record_skip();
        warn!(request_id, "Skipping request (already fulfilled)");
    } else {
        metrics.record_failure();
        error!(request_id, error = %format!("{error:#}"), "Failed to fulfill");
    }
}

/// Wait for confirmations, then prove and submit.
#[instrument(skip_all, fields(request_id = %hex::encode(event.request_id)))]
async fn fulfill_request(devnet: &Devnet, config: &AppConfig, event: &RandomWordsRequested) -> Result<FulfillmentOutcome> {
    let ready_at = event.block_number + event.minimum_request_confirmations as u64;
    let block_time = Duration::from_millis(config.block_time_ms);
    while devnet.head() < ready_at {
        tokio::time::sleep(block_time).await;
    }

    submit_with_retries(devnet, config, event).await
}

/// Submit with exponential backoff on retryable coordinator errors.
async fn submit_with_retries(devnet: &Devnet, config: &AppConfig, event: &RandomWordsRequested) -> Result<FulfillmentOutcome> {
    let mut retry_delay = Duration::from_millis(config.initial_retry_delay_ms);
    let rc = commitment_for(event);

    for attempt in 0..config.max_retries {
        let result = match devnet.block_hash(event.block_number) {
            Some(block_hash) => {
                let proof = compute_proof(&config.oracle_key, event, &block_hash);
                devnet.fulfill(&proof, &rc)
            }
            None => Err(CoordinatorError::BlockhashNotInStore(event.block_number)),
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt + 1 < config.max_retries => {
                warn!(
                    attempt = attempt + 1,
                    delay = ?retry_delay,
                    error = %e,
                    "Retryable failure, retrying"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2).min(Duration::from_secs(60));
            }
            Err(e) => return Err(e).context("fulfill_random_words failed"),
        }
    }

    anyhow::bail!(
        "max retries ({}) exceeded for request_id={}",
        config.max_retries,
        hex::encode(event.request_id)
    )
}
