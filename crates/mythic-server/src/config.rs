use serde::Deserialize;

use mythic_core::equipment::EquipmentSlot;

/// Top-level server configuration, loaded from `mythic.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub heartbeat: HeartbeatConfig,
    pub limits: LimitsConfig,
    pub auth: AuthConfig,
    pub equipment: EquipmentConfig,
    pub store: StoreConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3031".to_string(),
            heartbeat: HeartbeatConfig::default(),
            limits: LimitsConfig::default(),
            auth: AuthConfig::default(),
            equipment: EquipmentConfig::default(),
            store: StoreConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Liveness probing of connected sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub ping_interval_ms: u64,
    /// A session silent for longer than this is terminated.
    pub pong_timeout_ms: u64,
    /// Interval of the session statistics log line.
    pub stats_interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 30_000,
            pong_timeout_ms: 60_000,
            stats_interval_secs: 60,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per session before new ones are dropped.
    pub outbound_buffer: usize,
    /// Upgrade rate limit: max burst tokens per IP.
    pub upgrade_burst: usize,
    /// Upgrade rate limit: token refill rate (upgrades per second) per IP.
    pub upgrade_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 1000,
            ws_rate_limit_per_sec: 50.0,
            outbound_buffer: 256,
            upgrade_burst: 20,
            upgrade_per_sec: 2.0,
        }
    }
}

/// How connections are mapped to player identities.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret for signed session tokens.
    pub token_secret: Option<String>,
    /// Identity assigned to every connection when no secret is configured.
    /// Development only.
    pub dev_identity: Option<String>,
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            dev_identity: None,
            cookie_name: "jwt".to_string(),
        }
    }
}

/// One equipped token served by the static equipment lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EquippedSlotConfig {
    pub slot: EquipmentSlot,
    pub contract: String,
    pub token_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EquipmentConfig {
    /// Added to on-chain token ids before the metadata lookup.
    pub token_id_offset: u64,
    pub loadout: Vec<EquippedSlotConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Player ids created in the in-memory store at startup.
    pub seed_players: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Hard deadline for graceful shutdown.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

impl ServerConfig {
    /// Check the configuration, returning the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            ));
        }
        if self.heartbeat.ping_interval_ms == 0 {
            return Err("heartbeat.ping_interval_ms must be > 0".to_string());
        }
        if self.heartbeat.pong_timeout_ms == 0 {
            return Err("heartbeat.pong_timeout_ms must be > 0".to_string());
        }
        if self.heartbeat.stats_interval_secs == 0 {
            return Err("heartbeat.stats_interval_secs must be > 0".to_string());
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.outbound_buffer == 0 {
            return Err("limits.outbound_buffer must be > 0".to_string());
        }
        if self.limits.upgrade_burst == 0 {
            return Err("limits.upgrade_burst must be > 0".to_string());
        }
        if self.shutdown.grace_secs == 0 {
            return Err("shutdown.grace_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Validate configuration, logging warnings and exiting on fatal issues.
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }

        if self.heartbeat.pong_timeout_ms <= self.heartbeat.ping_interval_ms {
            tracing::warn!(
                ping_interval_ms = self.heartbeat.ping_interval_ms,
                pong_timeout_ms = self.heartbeat.pong_timeout_ms,
                "pong timeout does not exceed the ping interval; healthy sessions may be dropped"
            );
        }
        if self.auth.token_secret.is_some() {
            tracing::warn!(
                "token_secret is set in config file, use MYTHIC_TOKEN_SECRET env var in production"
            );
        }
        if self.auth.token_secret.is_none() && self.auth.dev_identity.is_some() {
            tracing::warn!("No token secret configured, every connection uses the dev identity");
        }
        if self.auth.token_secret.is_none() && self.auth.dev_identity.is_none() {
            tracing::warn!("No token secret or dev identity configured, all connections will be rejected");
        }
    }

    /// Load config from `mythic.toml` (or `MYTHIC_CONFIG`) if it exists, then
    /// apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("MYTHIC_CONFIG").unwrap_or_else(|_| "mythic.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No config file found, using defaults");
                ServerConfig::default()
            },
        };

        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("MYTHIC_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.listen_addr = with_port(&self.listen_addr, port);
        }
        if let Ok(val) = std::env::var("WS_HEARTBEAT_INTERVAL")
            && let Ok(n) = val.parse::<u64>()
        {
            self.heartbeat.ping_interval_ms = n;
        }
        if let Ok(val) = std::env::var("WS_PONG_TIMEOUT")
            && let Ok(n) = val.parse::<u64>()
        {
            self.heartbeat.pong_timeout_ms = n;
        }
        if let Ok(secret) = std::env::var("MYTHIC_TOKEN_SECRET")
            && !secret.is_empty()
        {
            self.auth.token_secret = Some(secret);
        }
        if let Ok(identity) = std::env::var("MYTHIC_DEV_IDENTITY")
            && !identity.is_empty()
        {
            self.auth.dev_identity = Some(identity);
        }
        if let Ok(val) = std::env::var("MYTHIC_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("MYTHIC_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }

    /// Port component of `listen_addr`, as reported by `/status`.
    pub fn port(&self) -> u16 {
        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .map(|a| a.port())
            .unwrap_or(0)
    }
}

/// Replace the port of a `host:port` address, keeping the host.
fn with_port(addr: &str, port: u16) -> String {
    match addr.parse::<std::net::SocketAddr>() {
        Ok(mut sock) => {
            sock.set_port(port);
            sock.to_string()
        },
        Err(_) => format!("0.0.0.0:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3031");
        assert_eq!(cfg.port(), 3031);
        assert_eq!(cfg.heartbeat.ping_interval_ms, 30_000);
        assert_eq!(cfg.heartbeat.pong_timeout_ms, 60_000);
        assert_eq!(cfg.auth.cookie_name, "jwt");
        assert!(cfg.auth.token_secret.is_none());
        assert_eq!(cfg.shutdown.grace_secs, 10);
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"

[auth]
token_secret = "secret123"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.auth.token_secret.as_deref(), Some("secret123"));
        assert_eq!(cfg.auth.cookie_name, "jwt");
        assert_eq!(cfg.heartbeat.ping_interval_ms, 30_000);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:4000"

[heartbeat]
ping_interval_ms = 10000
pong_timeout_ms = 25000
stats_interval_secs = 5

[limits]
max_ws_connections = 50
ws_rate_limit_per_sec = 20.0
outbound_buffer = 64

[auth]
dev_identity = "0xdev"
cookie_name = "session"

[equipment]
token_id_offset = 1000000
loadout = [
    { slot = "helmet", contract = "0xequip", token_id = 12 },
    { slot = "relic", contract = "0xrelic", token_id = 3 },
]

[store]
seed_players = ["0xdev", "0xother"]

[shutdown]
grace_secs = 3
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.heartbeat.ping_interval_ms, 10_000);
        assert_eq!(cfg.heartbeat.pong_timeout_ms, 25_000);
        assert_eq!(cfg.limits.max_ws_connections, 50);
        assert_eq!(cfg.limits.outbound_buffer, 64);
        assert_eq!(cfg.auth.dev_identity.as_deref(), Some("0xdev"));
        assert_eq!(cfg.auth.cookie_name, "session");
        assert_eq!(cfg.equipment.token_id_offset, 1_000_000);
        assert_eq!(cfg.equipment.loadout.len(), 2);
        assert_eq!(cfg.equipment.loadout[1].slot, EquipmentSlot::Relic);
        assert_eq!(cfg.store.seed_players, vec!["0xdev", "0xother"]);
        assert_eq!(cfg.shutdown.grace_secs, 3);
    }

    #[test]
    fn check_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(cfg.check().unwrap_err().contains("listen_addr"));
    }

    #[test]
    fn check_rejects_zero_intervals() {
        let cfg = ServerConfig {
            heartbeat: HeartbeatConfig {
                ping_interval_ms: 0,
                ..HeartbeatConfig::default()
            },
            ..ServerConfig::default()
        };
        assert!(cfg.check().is_err());

        let cfg = ServerConfig {
            limits: LimitsConfig {
                ws_rate_limit_per_sec: 0.0,
                ..LimitsConfig::default()
            },
            ..ServerConfig::default()
        };
        assert!(cfg.check().is_err());
    }

    #[test]
    fn port_override_keeps_host() {
        assert_eq!(with_port("127.0.0.1:3031", 8080), "127.0.0.1:8080");
        assert_eq!(with_port("garbage", 8080), "0.0.0.0:8080");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: ServerConfig = toml::from_str("listen_addr = \"0.0.0.0:3031\"").unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 1000);
        assert!(cfg.equipment.loadout.is_empty());
        assert!(cfg.store.seed_players.is_empty());
    }
}
