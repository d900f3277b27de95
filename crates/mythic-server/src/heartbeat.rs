//! Liveness probing of bound sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use mythic_core::net::messages::{ServerMessage, TimestampMsg};
use mythic_core::time::timestamp_millis;

use crate::registry::SessionRegistry;

/// Result of one sweep over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub pinged: usize,
    pub timed_out: usize,
}

pub struct HeartbeatMonitor {
    registry: Arc<SessionRegistry>,
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<SessionRegistry>, ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            registry,
            ping_interval,
            pong_timeout,
        }
    }

    /// Terminate sessions silent for longer than the pong timeout and ping
    /// the rest.
    pub async fn sweep_at(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        for session in self.registry.all() {
            let silent_for = now.saturating_duration_since(session.last_pong_at);
            if silent_for > self.pong_timeout {
                tracing::info!(
                    player_id = %session.player_id,
                    conn = %session.conn,
                    silent_ms = silent_for.as_millis() as u64,
                    "Pong timeout, terminating session"
                );
                session.handle.terminate();
                self.registry.unbind(session.conn, "pong timeout").await;
                report.timed_out += 1;
                continue;
            }

            self.registry.mark_pinged(session.conn);
            if let Err(e) = session.handle.send_ping() {
                tracing::debug!(conn = %session.conn, error = %e, "Failed to queue transport ping");
            }
            let ping = ServerMessage::Ping(TimestampMsg {
                timestamp: timestamp_millis(),
            });
            if let Err(e) = session.handle.send(&ping) {
                tracing::debug!(conn = %session.conn, error = %e, "Failed to queue ping message");
            }
            report.pinged += 1;
        }
        report
    }

    /// Run sweeps every `ping_interval` until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.ping_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let report = self.sweep_at(Instant::now()).await;
                        if report.timed_out > 0 {
                            tracing::info!(
                                pinged = report.pinged,
                                timed_out = report.timed_out,
                                "Heartbeat sweep"
                            );
                        }
                    },
                }
            }
            tracing::debug!("Heartbeat monitor stopped");
        })
    }
}
