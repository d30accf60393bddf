//! Logging setup shared by the relay and client binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are enabled by the default filter.
const WORKSPACE_CRATES: [&str; 3] = ["tegaki_shared", "tegaki_server", "tegaki_client"];

/// Initialize the tracing subscriber with the specified default log level.
///
/// The level applies to every workspace crate and to the binary itself.
/// `RUST_LOG` overrides the default filter entirely.
///
/// # Examples
///
/// ```no_run
/// use tegaki_shared::logger::setup_logger;
///
/// setup_logger("tegaki-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    let mut directives: Vec<String> = WORKSPACE_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, default_log_level))
        .collect();
    directives.push(format!(
        "{}={}",
        binary_name.replace('-', "_"),
        default_log_level
    ));
    directives.push(format!("tower_http={}", default_log_level));
    directives.join(",")
}
