//! # Protocol Configuration & Constants
//!
//! Every magic number in LockedVault lives here. The EIP-712 domain name
//! and version are part of every signature ever produced for a vault, so
//! changing them invalidates every outstanding authorization.

use std::time::Duration;

// ---------------------------------------------------------------------------
// EIP-712 Domain
// ---------------------------------------------------------------------------

/// Domain `name` field. Wallets show this to the user when signing.
pub const EIP712_DOMAIN_NAME: &str = "LockedVault";

/// Domain `version` field. Bump to invalidate every outstanding signature.
pub const EIP712_DOMAIN_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate version reported by the node's `/status` and `version` command.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Error Codes
// ---------------------------------------------------------------------------
//
// Stable short codes clients can match on. LV01, LV09 and LV10 keep the
// numbering deployed contracts already revert with.

pub const CODE_LOCK_DURATION_MUST_BE_POSITIVE: &str = "LV01";
pub const CODE_UNAUTHORIZED: &str = "LV02";
pub const CODE_INVALID_SIGNATURE: &str = "LV03";
pub const CODE_INSUFFICIENT_BALANCE: &str = "LV04";
pub const CODE_ASSET_TRANSFER_FAILED: &str = "LV05";
pub const CODE_UNSUPPORTED_TOKEN: &str = "LV06";
pub const CODE_ZERO_ADDRESS: &str = "LV07";
pub const CODE_BALANCE_OVERFLOW: &str = "LV08";
pub const CODE_AMOUNT_MUST_BE_POSITIVE: &str = "LV09";
pub const CODE_LOCK_NOT_MATURED: &str = "LV10";
pub const CODE_RESERVED_ADDRESS: &str = "LV11";

// ---------------------------------------------------------------------------
// Lock Durations
// ---------------------------------------------------------------------------

/// Lock applied by a freshly initialized devnet vault. Short enough to
/// exercise a full deposit/withdraw cycle by hand.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(3 * 60);

/// One year, the lock used for long-term staking deployments.
pub const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Local development chain id.
pub const CHAIN_ID_DEVNET: u64 = 31337;

pub const CHAIN_ID_GOERLI: u64 = 5;
pub const CHAIN_ID_RINKEBY: u64 = 4;
pub const CHAIN_ID_BSC_TESTNET: u64 = 97;

/// Known trusted-forwarder deployments, per chain. Devnet shares the
/// goerli forwarder address.
pub const KNOWN_FORWARDERS: &[(u64, &str)] = &[
    (CHAIN_ID_DEVNET, "0xE041608922d06a4F26C0d4c27d8bCD01daf1f792"),
    (CHAIN_ID_GOERLI, "0xE041608922d06a4F26C0d4c27d8bCD01daf1f792"),
    (CHAIN_ID_BSC_TESTNET, "0x61456BF1715C1415730076BB79ae118E806E74d2"),
    (CHAIN_ID_RINKEBY, "0xFD4973FeB2031D4409fB57afEE5dF2051b171104"),
];

/// Returns the known trusted forwarder for `chain_id`, if any.
pub fn forwarder_for_chain(chain_id: u64) -> Option<&'static str> {
    KNOWN_FORWARDERS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, addr)| *addr)
}

/// Friendly network name, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_DEVNET => "devnet".to_string(),
        CHAIN_ID_GOERLI => "goerli".to_string(),
        CHAIN_ID_RINKEBY => "rinkeby".to_string(),
        CHAIN_ID_BSC_TESTNET => "bsc-testnet".to_string(),
        other => format!("chain-{other}"),
    }
}

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default REST API port.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Capacity of the live event broadcast channel. Slow WebSocket clients
/// that fall further behind than this lose events.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum events returned by one `/events` page.
pub const MAX_EVENTS_PER_PAGE: usize = 500;
