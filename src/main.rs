//! Bracket Back binary entrypoint wiring the REST and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bracket_back::{
    config::AppConfig,
    routes,
    state::{AppState, SharedState},
};

#[cfg(feature = "mongo-store")]
use bracket_back::{
    dao::{
        match_store::{MatchStore, mongodb::MongoMatchStore},
        storage::StorageError,
    },
    services::storage_supervisor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone());
    spawn_degraded_log(&app_state);

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Supervise the MongoDB-backed store, reconnecting in the background and
/// toggling degraded mode when connectivity changes.
#[cfg(feature = "mongo-store")]
fn spawn_storage(state: SharedState) {
    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let store = MongoMatchStore::connect_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn MatchStore>)
        }
    }));
}

/// Install the in-memory store when the crate is built without MongoDB.
#[cfg(not(feature = "mongo-store"))]
fn spawn_storage(state: SharedState) {
    use bracket_back::dao::match_store::{MatchStore, memory::InMemoryMatchStore};

    tokio::spawn(async move {
        let store: Arc<dyn MatchStore> = Arc::new(InMemoryMatchStore::new());
        state.install_match_store(store).await;
        info!("in-memory store installed; state will not survive restarts");
    });
}

/// Log degraded-mode transitions so operators see storage flapping.
fn spawn_degraded_log(state: &SharedState) {
    let mut watcher = state.degraded_watcher();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            if *watcher.borrow_and_update() {
                warn!("storage degraded; lifecycle commands will be rejected");
            } else {
                info!("storage available; lifecycle commands accepted");
            }
        }
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
