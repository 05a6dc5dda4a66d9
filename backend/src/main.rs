//! VRF Oracle Devnet
//!
//! Single-process node hosting a VRF coordinator, a dice game consumer, and
//! the oracle that serves it. Runs four concurrent subsystems:
//!
//! - **Block producer**: seals a block every `BLOCK_TIME_MS`.
//! - **Listener**: catch-up scan of the event log, then live polling.
//! - **Fulfiller**: waits out confirmations and submits proofs.
//! - **HTTP server**: probes, metrics, and a dice endpoint.

use actix_web::{App, HttpResponse, HttpServer, web};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use vrf_coordinator::Pubkey;

mod config;
mod devnet;
mod fulfiller;
mod listener;
mod metrics;
mod vrf;

use config::AppConfig;
use devnet::Devnet;
use metrics::Metrics;

/// Shared application state accessible from HTTP handlers.
struct AppState {
    devnet: Arc<Devnet>,
    /// Number of fulfillments currently in-flight.
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
struct RollBody {
    /// Base58 identity of the player.
    player: String,
}

/// Liveness probe: 200 while the process is running.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Readiness / status probe.
async fn status(data: web::Data<AppState>) -> HttpResponse {
    let devnet = &data.devnet;
    let (link, native) = devnet.coordinator.total_balances();
    let sub = devnet.coordinator.get_subscription(devnet.sub_id).ok();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "head": devnet.head(),
        "pending_fulfillments": data.pending_count.load(Ordering::Relaxed),
        "coordinator": devnet.coordinator.id().to_string(),
        "sub_id": devnet.sub_id,
        "sub_balance": sub.as_ref().map(|s| s.balance.to_string()),
        "sub_requests": sub.as_ref().map(|s| s.req_count),
        "total_balance": link.to_string(),
        "total_native_balance": native.to_string(),
        "oracle_earnings": devnet.coordinator.withdrawable_tokens(&devnet.oracle).to_string(),
    }))
}

async fn metrics_handler(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.metrics.to_json())
}

/// Request a dice roll for the player in the body.
async fn roll(data: web::Data<AppState>, body: web::Json<RollBody>) -> HttpResponse {
    let Ok(player) = Pubkey::from_str(&body.player) else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "invalid player"}));
    };
    match data.devnet.roll(player) {
        Ok(request_id) => HttpResponse::Accepted().json(serde_json::json!({
            "request_id": hex::encode(request_id),
            "player": player.to_string(),
        })),
        Err(e) => {
            warn!(%player, error = %e, "Roll request rejected");
            HttpResponse::UnprocessableEntity().json(serde_json::json!({"error": e.to_string()}))
        }
    }
}

/// Look up a roll by its hex request id.
async fn get_roll(data: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let request_id: Option<[u8; 32]> = hex::decode(path.as_str())
        .ok()
        .and_then(|bytes| bytes.try_into().ok());
    let Some(request_id) = request_id else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "invalid request id"}));
    };
    match data.devnet.dice.roll(&request_id) {
        Some(roll) => HttpResponse::Ok().json(serde_json::json!({
            "request_id": hex::encode(roll.request_id),
            "player": roll.player.to_string(),
            "settled": roll.is_settled(),
            "result": roll.is_settled().then_some(roll.result),
        })),
        None => HttpResponse::NotFound().json(serde_json::json!({"error": "unknown roll"})),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,actix_server=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    let devnet = Arc::new(Devnet::bootstrap(&config).map_err(std::io::Error::other)?);
    let block_time = Duration::from_millis(config.block_time_ms);

    info!(
        coordinator = %devnet.coordinator.id(),
        oracle = %devnet.oracle,
        dice = %devnet.dice.id(),
        block_time_ms = config.block_time_ms,
        "Starting VRF devnet"
    );

    let pending_count = Arc::new(AtomicU64::new(0));
    let metrics = Arc::new(Metrics::new());
    let (tx, rx) = mpsc::channel(256);

    // Requests left over from before the listener started.
    let cursor = listener::catch_up_pending_requests(&devnet, &tx).await;

    tokio::spawn(devnet::run_block_producer(devnet.clone(), block_time));
    tokio::spawn(listener::listen_for_events(devnet.clone(), cursor, block_time, tx));
    tokio::spawn(fulfiller::run_fulfiller(
        devnet.clone(),
        config.clone(),
        rx,
        pending_count.clone(),
        metrics.clone(),
    ));

    let state = web::Data::new(AppState {
        devnet,
        pending_count,
        metrics,
    });

    let addr = ("0.0.0.0", config.http_port);
    info!(port = config.http_port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/status", web::get().to(status))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/roll", web::post().to(roll))
            .route("/roll/{request_id}", web::get().to(get_roll))
    })
    .bind(addr)?
    .run()
    .await
}
