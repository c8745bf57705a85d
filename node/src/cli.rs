//! # CLI Interface
//!
//! Defines the command-line argument structure for `locked-vault-node` using
//! `clap` derive. Supports six subcommands: `run`, `init`, `keygen`,
//! `sign-withdrawal`, `sign-call`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LockedVault service node.
///
/// Hosts a time-locked vault for native currency and one ERC20, accepts
/// relayed withdrawals authorized by EIP-712 signatures, serves the REST and
/// WebSocket API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "locked-vault-node",
    about = "LockedVault service node",
    version,
    propagate_version = true
)]
pub struct VaultNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "LOCKED_VAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault service.
    Run(RunArgs),
    /// Initialize a data directory: settings file plus a fresh owner key.
    Init(InitArgs),
    /// Print a fresh secp256k1 key and its address.
    Keygen,
    /// Sign a withdrawal authorization with a depositor key.
    SignWithdrawal(SignWithdrawalArgs),
    /// Sign a nonce-bound call (deposit, approval, administration) for
    /// submission through a node.
    SignCall(SignCallArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the settings file (TOML).
    ///
    /// When omitted, the node looks for `config.toml` in the data directory.
    #[arg(long, short = 'c', env = "LOCKED_VAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the settings file and the database.
    #[arg(
        long,
        short = 'd',
        env = "LOCKED_VAULT_DATA_DIR",
        default_value = ".locked-vault"
    )]
    pub data_dir: PathBuf,

    /// Port for the REST/WebSocket API. Overrides the settings file.
    #[arg(long, env = "LOCKED_VAULT_API_PORT")]
    pub api_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint. Overrides the settings file.
    #[arg(long, env = "LOCKED_VAULT_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize.
    #[arg(
        long,
        short = 'd',
        env = "LOCKED_VAULT_DATA_DIR",
        default_value = ".locked-vault"
    )]
    pub data_dir: PathBuf,

    /// Chain id the withdrawal signatures are bound to.
    #[arg(long, default_value_t = locked_vault_protocol::config::CHAIN_ID_DEVNET)]
    pub chain_id: u64,

    /// Vault address. A fresh one is generated when omitted.
    #[arg(long)]
    pub vault_address: Option<String>,

    /// Address of the single ERC20 the vault accepts. A fresh one is
    /// generated when omitted.
    #[arg(long)]
    pub token: Option<String>,

    /// Trusted forwarder. Defaults to the known forwarder for the chain.
    #[arg(long)]
    pub trusted_forwarder: Option<String>,

    /// Lock applied to each deposit, in seconds.
    #[arg(long, default_value_t = locked_vault_protocol::config::DEFAULT_LOCK_DURATION.as_secs())]
    pub lock_duration_secs: u64,

    /// Overwrite an existing settings file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `sign-withdrawal` subcommand.
#[derive(Parser, Debug)]
pub struct SignWithdrawalArgs {
    /// Hex-encoded secp256k1 secret key of the depositor.
    ///
    /// **Never pass this flag on a shared machine.** Prefer the environment
    /// variable.
    #[arg(long, env = "LOCKED_VAULT_SIGNER_KEY", hide_env_values = true)]
    pub key: String,

    /// Chain id of the vault.
    #[arg(long, default_value_t = locked_vault_protocol::config::CHAIN_ID_DEVNET)]
    pub chain_id: u64,

    /// Address of the vault contract.
    #[arg(long)]
    pub vault_address: String,

    /// Amount to authorize, in base units.
    #[arg(long)]
    pub amount: u128,
}

/// Arguments for the `sign-call` subcommand.
#[derive(Parser, Debug)]
pub struct SignCallArgs {
    /// Hex-encoded secp256k1 secret key of the signer.
    #[arg(long, env = "LOCKED_VAULT_SIGNER_KEY", hide_env_values = true)]
    pub key: String,

    /// Chain id of the vault's current domain.
    #[arg(long, default_value_t = locked_vault_protocol::config::CHAIN_ID_DEVNET)]
    pub chain_id: u64,

    /// Address of the vault contract in its current domain.
    #[arg(long)]
    pub vault_address: String,

    /// The signer's next nonce, as reported by `GET /accounts/:address`.
    #[arg(long)]
    pub nonce: u64,

    #[command(subcommand)]
    pub action: CallAction,
}

/// The call to sign.
#[derive(Subcommand, Debug)]
pub enum CallAction {
    /// Stake native currency, or the token when `--asset` is given.
    Deposit {
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        amount: u128,
    },
    /// Token allowance for the vault.
    Approve {
        #[arg(long)]
        amount: u128,
    },
    /// Owner only.
    SetLockDuration {
        #[arg(long)]
        secs: u64,
    },
    /// Owner only.
    TransferOwnership {
        #[arg(long)]
        new_owner: String,
    },
    /// Owner only. Signed under the domain being replaced.
    Reconfigure {
        #[arg(long)]
        new_chain_id: u64,
        #[arg(long)]
        new_vault_address: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        VaultNodeCli::command().debug_assert();
    }

    #[test]
    fn parses_sign_withdrawal() {
        let cli = VaultNodeCli::try_parse_from([
            "locked-vault-node",
            "sign-withdrawal",
            "--key",
            "0x01",
            "--vault-address",
            "0x1111111111111111111111111111111111111111",
            "--amount",
            "1000000000000000000",
        ])
        .unwrap();
        match cli.command {
            Commands::SignWithdrawal(args) => {
                assert_eq!(args.amount, 1_000_000_000_000_000_000);
                assert_eq!(args.chain_id, 31337);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn run_port_overrides_are_optional() {
        let cli = VaultNodeCli::try_parse_from(["locked-vault-node", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert!(args.api_port.is_none());
                assert!(args.metrics_port.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_sign_call_with_action() {
        let cli = VaultNodeCli::try_parse_from([
            "locked-vault-node",
            "sign-call",
            "--key",
            "0x01",
            "--vault-address",
            "0x1111111111111111111111111111111111111111",
            "--nonce",
            "4",
            "set-lock-duration",
            "--secs",
            "60",
        ])
        .unwrap();
        match cli.command {
            Commands::SignCall(args) => {
                assert_eq!(args.nonce, 4);
                assert!(matches!(args.action, CallAction::SetLockDuration { secs: 60 }));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn sign_call_requires_nonce() {
        let parsed = VaultNodeCli::try_parse_from([
            "locked-vault-node",
            "sign-call",
            "--key",
            "0x01",
            "--vault-address",
            "0x1111111111111111111111111111111111111111",
            "deposit",
            "--amount",
            "5",
        ]);
        assert!(parsed.is_err());
    }
}
