//! Command-line and environment configuration for the client.

use std::time::Duration;

use clap::Parser;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::{
    domain::{EngineConfig, ReconnectPolicy},
    error::ClientError,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "tegaki-client")]
#[command(about = "Terminal client for a Tegaki collaborative canvas room", long_about = None)]
pub struct ClientConfig {
    /// Room slug to join
    #[arg(short = 'r', long, env = "TEGAKI_ROOM")]
    pub room: String,

    /// Access token (JWT issued by the Tegaki API)
    #[arg(short = 't', long, env = "TEGAKI_TOKEN", hide_env_values = true)]
    pub token: String,

    /// WebSocket relay URL
    #[arg(short = 'u', long, env = "TEGAKI_URL", default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// REST API base URL used to resolve the room slug; the slug is used as-is when omitted
    #[arg(long, env = "TEGAKI_API_URL")]
    pub api_url: Option<String>,

    /// Override the identity read from the token
    #[arg(long, env = "TEGAKI_USER_ID")]
    pub user_id: Option<String>,

    #[arg(long, env = "TEGAKI_RECONNECT_BASE_MS", default_value_t = 500)]
    pub reconnect_base_ms: u64,

    #[arg(long, env = "TEGAKI_RECONNECT_MAX_MS", default_value_t = 10_000)]
    pub reconnect_max_ms: u64,

    #[arg(long, env = "TEGAKI_RECONNECT_ATTEMPTS", default_value_t = 5)]
    pub reconnect_attempts: u32,

    /// Minimum interval between cursor broadcasts
    #[arg(long, env = "TEGAKI_CURSOR_THROTTLE_MS", default_value_t = 50)]
    pub cursor_throttle_ms: u64,

    /// Remote cursors not refreshed within this window are hidden
    #[arg(long, env = "TEGAKI_CURSOR_TTL_MS", default_value_t = 10_000)]
    pub cursor_ttl_ms: u64,

    #[arg(long, env = "TEGAKI_PING_INTERVAL_SECS", default_value_t = 25)]
    pub ping_interval_secs: u64,
}

/// Who the client is, as far as sender filtering is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserIdClaim {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenClaims {
    user_id: Option<UserIdClaim>,
    #[serde(default)]
    name: Option<String>,
}

/// Read `userId` and `name` from the token without checking its signature.
///
/// The relay is the one that verifies the token; the client only needs to know
/// its own identity so it can skip the echoes of its own edits.
pub fn identity_from_token(token: &str) -> Result<LocalIdentity, ClientError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| ClientError::InvalidConfig(format!("unreadable token: {}", e)))?;

    let user_id = match data.claims.user_id {
        Some(UserIdClaim::Text(value)) if !value.trim().is_empty() => value,
        Some(UserIdClaim::Number(value)) => value.to_string(),
        _ => {
            return Err(ClientError::InvalidConfig(
                "token carries no userId claim".to_string(),
            ));
        }
    };
    let display_name = data
        .claims
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string());

    Ok(LocalIdentity {
        user_id,
        display_name,
    })
}

impl ClientConfig {
    pub fn identity(&self) -> Result<LocalIdentity, ClientError> {
        match &self.user_id {
            Some(user_id) => {
                let display_name = identity_from_token(&self.token)
                    .map(|identity| identity.display_name)
                    .unwrap_or_else(|_| user_id.clone());
                Ok(LocalIdentity {
                    user_id: user_id.clone(),
                    display_name,
                })
            }
            None => identity_from_token(&self.token),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_base_ms)),
            max_attempts: self.reconnect_attempts,
        }
    }

    pub fn engine_config(&self, identity: &LocalIdentity, room_id: &str) -> EngineConfig {
        let mut config = EngineConfig::new(
            identity.user_id.clone(),
            identity.display_name.clone(),
            room_id,
        );
        config.cursor_throttle_ms = self.cursor_throttle_ms as i64;
        config.cursor_ttl_ms = self.cursor_ttl_ms as i64;
        config
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}
