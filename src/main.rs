//! SafeQuest backend entry point.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use safequest_back::{
    auth::TokenTableAuthProvider,
    config::AppConfig,
    dao::session_store::memory::MemoryStore,
    routes,
    services::session_sweeper,
    state::{AppState, SharedState, StoreHandles},
};

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    if config.auth_tokens.is_empty() {
        warn!("auth token table is empty; every credential will be rejected");
    }
    let auth = Arc::new(TokenTableAuthProvider::new(config.auth_tokens.clone()));
    let state = AppState::new(config, auth);

    install_storage(&state).await;
    tokio::spawn(session_sweeper::run(state.clone()));

    let app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safequest_back=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pick the storage backend: `SAFEQUEST_STORE=memory` installs the in-memory
/// store immediately; otherwise the MongoDB supervisor owns the handles and
/// the application stays degraded until the first successful connection.
async fn install_storage(state: &SharedState) {
    if env::var("SAFEQUEST_STORE").as_deref() == Ok("memory") {
        let store = MemoryStore::new();
        state
            .install_stores(StoreHandles {
                sessions: Arc::new(store.clone()),
                scores: Arc::new(store),
            })
            .await;
        info!("using the in-memory store; nothing will survive a restart");
        return;
    }

    #[cfg(feature = "mongo-store")]
    {
        tokio::spawn(safequest_back::services::storage_supervisor::run(
            state.clone(),
        ));
    }
    #[cfg(not(feature = "mongo-store"))]
    {
        let store = MemoryStore::new();
        state
            .install_stores(StoreHandles {
                sessions: Arc::new(store.clone()),
                scores: Arc::new(store),
            })
            .await;
        warn!("built without mongo-store; falling back to the in-memory store");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
