mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use nbbang_api::AppStateInner;
use nbbang_db::{Database, SqliteStore};
use nbbang_notify::{HttpPushSender, Notifier, PushSender, TracingPushSender};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbbang=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let store = Arc::new(SqliteStore::new(db.clone()));

    let push: Arc<dyn PushSender> = match &config.push.endpoint {
        Some(endpoint) => {
            info!("Push delivery via {}", endpoint);
            Arc::new(HttpPushSender::new(
                endpoint.clone(),
                config.push.server_key.clone(),
                config.push.timeout,
            )?)
        }
        None => {
            info!("NBBANG_PUSH_ENDPOINT unset, pushes will only be logged");
            Arc::new(TracingPushSender)
        }
    };

    let notifier = Notifier::new(store.clone(), store.clone(), store, push, config.notify.clone());
    info!(
        "Notifier: max {} concurrent subscribers, {}s deadline",
        config.notify.max_concurrency,
        config.notify.deadline.as_secs()
    );

    let state = Arc::new(AppStateInner { db, notifier });

    let app = Router::new()
        .route("/health", get(health))
        .merge(nbbang_api::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("N빵 notifier listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
