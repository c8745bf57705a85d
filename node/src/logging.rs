//! # Node Logging
//!
//! What a running node reports, by target:
//!
//! - `locked_vault_contracts`: one `info` line per committed vault call and
//!   one `warn` per rejection, carrying the operation, the resolved sender
//!   and the `LVxx` code; signer mismatches and token pulls at `debug`.
//! - `locked_vault_node`: startup, snapshot restore, signed-call refusals
//!   (`debug`) and storage rollbacks (`error`).
//! - `locked_vault_protocol`: sled opens and snapshot commits, at `debug`
//!   and `trace`.
//! - `tower_http`: one span per API request.
//!
//! Output goes to stderr. `keygen`, `sign-withdrawal` and `sign-call` print
//! JSON or keys on stdout for piping.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter for `run` when `RUST_LOG` is unset. Request spans stay visible;
/// store internals do not.
pub const DEFAULT_RUN_FILTER: &str =
    "locked_vault_node=info,locked_vault_contracts=info,locked_vault_protocol=info,tower_http=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// `json` in any case, anything else is `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber. Panics if one is already installed.
///
/// `RUST_LOG` replaces `default_level` entirely, e.g. to watch signer
/// mismatches:
///
/// ```text
/// RUST_LOG=locked_vault_contracts=debug,locked_vault_node=debug
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::info!("logging initialized (format={:?})", format);
}
