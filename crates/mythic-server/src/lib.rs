pub mod config;
pub mod equipment;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod identity;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod state;
pub mod status;
pub mod store;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use heartbeat::HeartbeatMonitor;
use rate_limit::IpRateLimiter;
use state::{AppState, Services};

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const LIMITER_MAX_IDLE: Duration = Duration::from_secs(300);
/// How long `stop` waits for writers to flush their close frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the Axum router over an existing state.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .route("/ws", get(ws::ws_handler).options(status::preflight))
        .route("/status", get(status::get_status).options(status::preflight))
        .fallback(status::fallback)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A running server: listener, heartbeat and housekeeping tasks.
pub struct SessionServer {
    state: AppState,
    local_addr: SocketAddr,
    heartbeat_cancel: CancellationToken,
    shutdown: CancellationToken,
    serve_task: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl SessionServer {
    /// Bind `config.listen_addr` and start serving. Port 0 picks a free port;
    /// the bound address is written back into the config.
    pub async fn start(mut config: ServerConfig, services: Services) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        config.listen_addr = local_addr.to_string();

        let ping_interval = Duration::from_millis(config.heartbeat.ping_interval_ms);
        let pong_timeout = Duration::from_millis(config.heartbeat.pong_timeout_ms);
        let stats_interval = Duration::from_secs(config.heartbeat.stats_interval_secs);

        let state = AppState::new(config, services);
        let app = build_app(state.clone());
        let shutdown = CancellationToken::new();

        let serve_task = tokio::spawn({
            let token = shutdown.clone();
            async move {
                let served = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Server error");
                }
            }
        });

        let heartbeat_cancel = CancellationToken::new();
        let heartbeat = HeartbeatMonitor::new(Arc::clone(&state.registry), ping_interval, pong_timeout)
            .spawn(heartbeat_cancel.clone());
        let background = vec![
            heartbeat,
            spawn_limiter_cleanup(Arc::clone(&state.upgrade_limiter), shutdown.clone()),
            spawn_stats(state.clone(), stats_interval, shutdown.clone()),
        ];

        tracing::info!(
            addr = %local_addr,
            ping_interval_ms = ping_interval.as_millis() as u64,
            pong_timeout_ms = pong_timeout.as_millis() as u64,
            "Session server listening"
        );

        Ok(Self {
            state,
            local_addr,
            heartbeat_cancel,
            shutdown,
            serve_task,
            background,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop heartbeats, close every session with a normal close frame, then
    /// stop the listener. Each step proceeds even if the previous one failed.
    pub async fn stop(self) {
        tracing::info!("Stopping session server");
        self.heartbeat_cancel.cancel();

        let closed = self
            .state
            .registry
            .close_all(ws::CLOSE_NORMAL, "Server shutting down")
            .await;
        tracing::info!(closed, "Closed sessions");
        self.wait_for_drain().await;

        self.shutdown.cancel();
        if let Err(e) = self.serve_task.await {
            tracing::warn!(error = %e, "Listener task ended abnormally");
        }
        for task in self.background {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Session server stopped");
    }

    async fn wait_for_drain(&self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while self.state.ws_connection_count.load(Ordering::Relaxed) > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    open = self.state.ws_connection_count.load(Ordering::Relaxed),
                    "Connections still open after close"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Install a panic hook that logs the panic and cancels the returned token,
/// so the caller can run the graceful shutdown. Repeated panics cancel the
/// same token, so shutdown starts once.
pub fn shutdown_on_panic() -> CancellationToken {
    let fatal = CancellationToken::new();
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new({
        let fatal = fatal.clone();
        move |info| {
            tracing::error!(panic = %info, "Unhandled panic, shutting down");
            default_hook(info);
            fatal.cancel();
        }
    }));
    fatal
}

fn spawn_limiter_cleanup(limiter: Arc<IpRateLimiter>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => limiter.cleanup(LIMITER_MAX_IDLE).await,
            }
        }
    })
}

fn spawn_stats(state: AppState, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tracing::info!(
                        sessions = state.registry.len(),
                        alive = state.registry.alive_count(),
                        sockets = state.ws_connection_count.load(Ordering::Relaxed),
                        "Session stats"
                    );
                },
            }
        }
    })
}
