//! Relay configuration.
//!
//! Every flag can also be supplied through a `TEGAKI_*` environment variable.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tegaki_shared::sanitize::DEFAULT_MAX_CHAT_LEN;

use crate::infrastructure::message_pusher::websocket::DEFAULT_MAX_CONSECUTIVE_DROPS;

#[derive(Parser, Debug, Clone)]
#[command(name = "tegaki-server")]
#[command(about = "Real-time relay for the Tegaki collaborative canvas", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "TEGAKI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "TEGAKI_PORT", default_value = "8080")]
    pub port: u16,

    /// HS256 secret used to verify access tokens
    #[arg(long, env = "TEGAKI_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Outbound messages buffered per connection before new ones are dropped
    #[arg(long, env = "TEGAKI_QUEUE_CAPACITY", default_value_t = 256)]
    pub queue_capacity: usize,

    /// Consecutive dropped messages after which a slow connection is closed
    #[arg(long, env = "TEGAKI_MAX_DROPS", default_value_t = DEFAULT_MAX_CONSECUTIVE_DROPS)]
    pub max_consecutive_drops: usize,

    /// Maximum chat message length in characters
    #[arg(long, env = "TEGAKI_MAX_CHAT_LEN", default_value_t = DEFAULT_MAX_CHAT_LEN)]
    pub max_chat_len: usize,

    /// Append chat messages to this JSON Lines file (kept in memory when omitted)
    #[arg(long, env = "TEGAKI_CHAT_LOG")]
    pub chat_log: Option<PathBuf>,

    /// Seconds to wait for open sockets to flush on shutdown
    #[arg(long, env = "TEGAKI_DRAIN_TIMEOUT_SECS", default_value_t = 5)]
    pub drain_timeout_secs: u64,
}

impl ServerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Queue capacity of at least one slot
    pub fn outbound_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // テスト項目: 必須の secret 以外はデフォルト値が使われる
        // given (前提条件):
        let argv = ["tegaki-server", "--jwt-secret", "s3cret"];

        // when (操作):
        let config = ServerConfig::try_parse_from(argv).unwrap();

        // then (期待する結果):
        assert_eq!(config.port, 8080);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.max_consecutive_drops, 32);
        assert_eq!(config.max_chat_len, 1000);
        assert_eq!(config.drain_timeout(), Duration::from_secs(5));
        assert!(config.chat_log.is_none());
    }

    #[test]
    fn test_zero_queue_capacity_is_raised() {
        // テスト項目: キュー容量 0 は 1 に切り上げられる
        // given (前提条件):
        let argv = [
            "tegaki-server",
            "--jwt-secret",
            "s3cret",
            "--queue-capacity",
            "0",
        ];

        // when (操作):
        let config = ServerConfig::try_parse_from(argv).unwrap();

        // then (期待する結果):
        assert_eq!(config.outbound_queue_capacity(), 1);
    }
}
