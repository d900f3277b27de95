//! Connection credential -> player identity.

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use mythic_core::player::PlayerId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    MissingCredential,
    Malformed,
    BadSignature,
    Expired,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "no credential presented"),
            Self::Malformed => write!(f, "malformed token"),
            Self::BadSignature => write!(f, "token signature mismatch"),
            Self::Expired => write!(f, "token expired"),
        }
    }
}

impl std::error::Error for IdentityError {}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: Option<&str>) -> Result<PlayerId, IdentityError>;
}

/// Verifies `<player>.<expires_unix>.<hex hmac-sha256>` tokens signed with a
/// shared secret.
pub struct HmacTokenResolver {
    secret: String,
}

impl HmacTokenResolver {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, token: &str, now_unix: i64) -> Result<PlayerId, IdentityError> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(sig), Some(expires), Some(player)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(IdentityError::Malformed);
        };
        if player.is_empty() {
            return Err(IdentityError::Malformed);
        }
        let Ok(expires_at) = expires.parse::<i64>() else {
            return Err(IdentityError::Malformed);
        };
        let Ok(expected) = hex::decode(sig) else {
            return Err(IdentityError::Malformed);
        };

        let mac = mac_for(&self.secret, player, expires_at)?;
        if mac.verify_slice(&expected).is_err() {
            return Err(IdentityError::BadSignature);
        }
        if expires_at < now_unix {
            return Err(IdentityError::Expired);
        }
        Ok(PlayerId::new(player))
    }
}

fn mac_for(secret: &str, player: &str, expires_at: i64) -> Result<HmacSha256, IdentityError> {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Err(IdentityError::BadSignature);
    };
    mac.update(format!("{player}.{expires_at}").as_bytes());
    Ok(mac)
}

/// Sign a session token for `player` valid until `expires_at` (Unix seconds).
pub fn issue_token(secret: &str, player: &PlayerId, expires_at: i64) -> String {
    let sig = match mac_for(secret, player.as_str(), expires_at) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        Err(_) => String::new(),
    };
    format!("{player}.{expires_at}.{sig}")
}

#[async_trait]
impl IdentityResolver for HmacTokenResolver {
    async fn resolve(&self, credential: Option<&str>) -> Result<PlayerId, IdentityError> {
        let token = credential.ok_or(IdentityError::MissingCredential)?;
        self.verify(token, chrono::Utc::now().timestamp())
    }
}

/// Maps every connection to one fixed identity. Development only.
pub struct StaticIdentityResolver {
    identity: PlayerId,
}

impl StaticIdentityResolver {
    pub fn new(identity: PlayerId) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, _credential: Option<&str>) -> Result<PlayerId, IdentityError> {
        Ok(self.identity.clone())
    }
}

/// Refuses every connection; used when no identity source is configured.
pub struct DenyAllResolver;

#[async_trait]
impl IdentityResolver for DenyAllResolver {
    async fn resolve(&self, _credential: Option<&str>) -> Result<PlayerId, IdentityError> {
        Err(IdentityError::MissingCredential)
    }
}

/// Extract the session credential from the named cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn credential_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string());

    from_cookie.or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}
