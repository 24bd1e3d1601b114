//! Game Night Back binary entrypoint wiring the REST API, storage supervision and the sports feed.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_night_back::{
    config::AppConfig,
    dao::prompt_store::memory::MemoryPromptStore,
    routes,
    state::{AppState, SharedState},
};

const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    start_storage(app_state.clone()).await?;
    #[cfg(feature = "sports-feed")]
    install_sports_feed(&app_state);

    // Build the HTTP router once the shared state is ready.
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

/// Pick the storage backend from `STORAGE_BACKEND`, defaulting to MongoDB when `MONGO_URI` is set.
async fn start_storage(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var(STORAGE_BACKEND_ENV)
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| {
            if cfg!(feature = "mongo-store") && env::var("MONGO_URI").is_ok() {
                "mongo".into()
            } else {
                "memory".into()
            }
        });

    match backend.as_str() {
        "memory" => {
            warn!("using in-memory storage; data is lost on restart");
            state.install_store(Arc::new(MemoryPromptStore::new())).await;
            Ok(())
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            spawn_mongo_supervisor(state);
            Ok(())
        }
        other => anyhow::bail!("unsupported {STORAGE_BACKEND_ENV} `{other}`"),
    }
}

/// Keep a MongoDB store installed in the background, toggling degraded mode as needed.
#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) {
    use game_night_back::{
        dao::{
            prompt_store::{
                PromptStore,
                mongodb::{MongoConfig, MongoPromptStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    info!("using MongoDB storage");
    tokio::spawn(storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
        let store = MongoPromptStore::connect(config)
            .await
            .map_err(StorageError::from)?;
        Ok(Arc::new(store) as Arc<dyn PromptStore>)
    }));
}

/// Install the play-by-play client when an API key is configured.
#[cfg(feature = "sports-feed")]
fn install_sports_feed(state: &SharedState) {
    use game_night_back::services::feed_service::{FeedConfig, SportsFeedClient};

    match FeedConfig::from_env().and_then(SportsFeedClient::new) {
        Ok(client) => {
            state.install_feed(client);
            info!("sports feed configured");
        }
        Err(err) => warn!(error = %err, "sports feed disabled"),
    }
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
