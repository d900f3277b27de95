use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use mythic_core::player::PlayerId;

use crate::config::ServerConfig;
use crate::equipment::{EquipmentLookup, StaticLoadout};
use crate::identity::{DenyAllResolver, HmacTokenResolver, IdentityResolver, StaticIdentityResolver};
use crate::rate_limit::IpRateLimiter;
use crate::registry::SessionRegistry;
use crate::store::PlayerStore;

/// External collaborators the server is built on.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn PlayerStore>,
    pub identity: Arc<dyn IdentityResolver>,
    pub equipment: Arc<dyn EquipmentLookup>,
}

impl Services {
    /// Pick the identity resolver and equipment lookup described by `config`.
    pub fn from_config(config: &ServerConfig, store: Arc<dyn PlayerStore>) -> Self {
        let identity: Arc<dyn IdentityResolver> = match (&config.auth.token_secret, &config.auth.dev_identity) {
            (Some(secret), _) => Arc::new(HmacTokenResolver::new(secret.clone())),
            (None, Some(dev)) => Arc::new(StaticIdentityResolver::new(PlayerId::new(dev.clone()))),
            (None, None) => Arc::new(DenyAllResolver),
        };
        Self {
            store,
            identity,
            equipment: Arc::new(StaticLoadout::from_config(&config.equipment)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn PlayerStore>,
    pub identity: Arc<dyn IdentityResolver>,
    pub equipment: Arc<dyn EquipmentLookup>,
    pub upgrade_limiter: Arc<IpRateLimiter>,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, services: Services) -> Self {
        let upgrade_limiter = IpRateLimiter::new(
            config.limits.upgrade_burst as f64,
            config.limits.upgrade_per_sec,
        );
        Self {
            registry: Arc::new(SessionRegistry::new(Arc::clone(&services.store))),
            store: services.store,
            identity: services.identity,
            equipment: services.equipment,
            upgrade_limiter: Arc::new(upgrade_limiter),
            config: Arc::new(config),
            started_at: Instant::now(),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts an open WebSocket for as long as it lives.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
