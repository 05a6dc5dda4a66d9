//! Request listener for the coordinator's event log.
//!
//! Two complementary strategies ensure no requests are missed:
//!
//! 1. **Catch-up scan** ([`catch_up_pending_requests`]): on startup, replays
//!    the log and forwards every request whose commitment is still stored.
//!
//! 2. **Live stream** ([`listen_for_events`]): polls the log from the
//!    cursor the scan stopped at and forwards new `RandomWordsRequested`
//!    events as they are published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};
use vrf_coordinator::{CoordinatorEvent, LoggedEvent, RandomWordsRequested};

use crate::devnet::Devnet;

/// The request carried by `logged`, if it is one.
fn as_request(logged: LoggedEvent) -> Option<RandomWordsRequested> {
    match logged.event {
        CoordinatorEvent::RandomWordsRequested(e) => Some(e),
        _ => None,
    }
}

/// Forward every logged request that is still outstanding and return the
/// cursor just past the end of the log.
pub async fn catch_up_pending_requests(devnet: &Devnet, tx: &mpsc::Sender<RandomWordsRequested>) -> u64 {
    info!("Scanning for pending requests");

    let logged = devnet.coordinator.events_since(0);
    let cursor = logged.last().map(|l| l.seq + 1).unwrap_or(0);
    let pending: Vec<RandomWordsRequested> = logged
        .into_iter()
        .filter_map(as_request)
        .filter(|e| devnet.coordinator.commitment_of(&e.request_id).is_some())
        .collect();

    info!(count = pending.len(), "Found pending requests");
    for event in pending {
        info!(
            request_id = %hex::encode(event.request_id),
            consumer = %event.sender,
            block = event.block_number,
            "Queued pending request"
        );
        if tx.send(event).await.is_err() {
            error!("Channel closed while catching up pending requests");
            break;
        }
    }
    cursor
}

/// Poll the log every `poll_interval` from `cursor` on and forward new
/// requests to the fulfiller. Returns when the channel closes.
pub async fn listen_for_events(
    devnet: Arc<Devnet>,
    mut cursor: u64,
    poll_interval: Duration,
    tx: mpsc::Sender<RandomWordsRequested>,
) {
    info!(cursor, "Listening for requests");
    loop {
        for logged in devnet.coordinator.events_since(cursor) {
            cursor = logged.seq + 1;
            let Some(event) = as_request(logged) else {
                continue;
            };
            info!(
                request_id = %hex::encode(event.request_id),
                consumer = %event.sender,
                block = event.block_number,
                "Received RandomWordsRequested event"
            );
            if tx.send(event).await.is_err() {
                error!("Channel closed, stopping listener");
                return;
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
}
