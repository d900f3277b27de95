use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use mythic_core::player::{PlayerId, PlayerRecord};
use mythic_server::SessionServer;
use mythic_server::config::ServerConfig;
use mythic_server::state::Services;
use mythic_server::store::MemoryStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("MYTHIC_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on Ctrl-C, SIGTERM or SIGHUP.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (Ok(mut term), Ok(mut hup)) = (signal(SignalKind::terminate()), signal(SignalKind::hangup()))
        else {
            tracing::warn!("Failed to install unix signal handlers, only Ctrl-C stops the server");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
            _ = hup.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let fatal = mythic_server::shutdown_on_panic();

    let config = ServerConfig::load();
    config.validate();

    let store = Arc::new(MemoryStore::new());
    for id in &config.store.seed_players {
        store.insert_player(PlayerRecord::new(PlayerId::new(id.clone())));
    }
    if !config.store.seed_players.is_empty() {
        tracing::info!(count = config.store.seed_players.len(), "Seeded players");
    }

    let services = Services::from_config(&config, store);
    let grace = Duration::from_secs(config.shutdown.grace_secs);

    let server = match SessionServer::start(config, services).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            std::process::exit(1);
        },
    };

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("Shutdown signal received"),
        _ = fatal.cancelled() => tracing::error!("Fatal error, shutting down"),
    }

    tokio::select! {
        _ = server.stop() => tracing::info!("Shutdown complete"),
        _ = tokio::time::sleep(grace) => {
            tracing::error!(grace_secs = grace.as_secs(), "Graceful shutdown timed out");
            std::process::exit(1);
        },
        _ = shutdown_signal() => {
            tracing::warn!("Second signal received, exiting immediately");
            std::process::exit(1);
        },
    }
}
