/**
 * NSCAPI KERNEL - Point d'entrée du serveur
 *
 * RÔLE : cache en mémoire des checks passifs + API REST de reporting.
 *
 * FLUX :
 * MQTT (payload JSON) -> CheckQueue -> CacheWorker -> StatusCache
 * GET /api/reports -> snapshot StatusCache + CustomFieldStore::resolve
 */

mod cache;
mod config;
mod custom;
mod health;
mod http;
mod models;
mod mqtt;
mod queue;
mod report;

use crate::cache::StatusCache;
use crate::config::KernelConfig;
use crate::custom::CustomFieldStore;
use crate::health::HealthTracker;
use crate::http::AppState;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nscapi_kernel=info")),
        )
        .init();

    let cfg = KernelConfig::parse();

    let cache = Arc::new(StatusCache::new());

    // champs custom : chargés une fois, avant de servir la moindre requête
    let mut fields = CustomFieldStore::new();
    if let Err(e) = fields.load(&cfg.custom_fields_root).await {
        warn!("[kernel] {}, reports will carry no custom fields", e);
    }
    let fields = Arc::new(fields);

    let health_tracker = HealthTracker::new();

    // à l'arrêt, le worker vide la file avant de rendre la main
    let (queue, mut worker) = queue::channel(cache.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let worker_task = tokio::spawn(async move {
        worker
            .run_until(async {
                stop_rx.await.ok();
            })
            .await
    });

    mqtt::spawn_mqtt_listener(&cfg, queue.clone(), health_tracker.clone());

    let app_state = AppState {
        cache,
        fields,
        queue,
        health_tracker,
        templates_root: cfg.templates_root.clone(),
    };
    let app = http::build_router(app_state);

    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[kernel] listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("[kernel] shutdown signal received");
        })
        .await
        .context("http server stopped")?;

    stop_tx.send(()).ok();
    worker_task.await.context("cache worker panicked")?;
    info!("[kernel] stopped");
    Ok(())
}
