// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # LockedVault Node
//!
//! Entry point for the `locked-vault-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the vault from disk, and serves
//! the HTTP/WS API.
//!
//! The binary supports six subcommands:
//!
//! - `run`             serve the vault
//! - `init`            write a settings file and an owner key
//! - `keygen`          print a fresh key and its address
//! - `sign-withdrawal` sign a withdrawal authorization offline
//! - `sign-call`       sign a deposit, approval or admin call offline
//! - `version`         print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod service;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use locked_vault_contracts::VaultConfig;
use locked_vault_protocol::config::{forwarder_for_chain, network_name, EVENT_CHANNEL_CAPACITY};
use locked_vault_protocol::crypto::{
    CallAuthorization, Eip712Domain, NodeCall, TypedDataPayload, VaultKeypair,
    WithdrawAuthorization,
};
use locked_vault_protocol::storage::VaultDb;
use locked_vault_protocol::{Address, SystemClock};

use cli::{CallAction, Commands, VaultNodeCli};
use logging::LogFormat;
use metrics::VaultMetrics;
use service::VaultService;
use settings::{NodeSettings, SETTINGS_FILE};

/// File the owner key is written to by `init`.
const OWNER_KEY_FILE: &str = "owner.key";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VaultNodeCli::parse();
    let format = LogFormat::from_str_lossy(&cli.log_format);

    match cli.command {
        Commands::Run(args) => run_node(args, format).await,
        Commands::Init(args) => init_node(args, format),
        Commands::Keygen => keygen(),
        Commands::SignWithdrawal(args) => sign_withdrawal(args),
        Commands::SignCall(args) => sign_call(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the vault service: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs, format: LogFormat) -> Result<()> {
    logging::init_logging(logging::DEFAULT_RUN_FILTER, format);

    // --- Settings ---
    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(SETTINGS_FILE));
    let settings =
        NodeSettings::load(&settings_path)?.with_overrides(args.api_port, args.metrics_port);

    tracing::info!(
        api_port = settings.api_port,
        metrics_port = settings.metrics_port,
        chain_id = settings.vault.chain_id,
        vault = %settings.vault.vault_address,
        data_dir = %args.data_dir.display(),
        "starting locked-vault-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = VaultDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new().context("failed to register metrics")?);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Vault ---
    let service = Arc::new(
        VaultService::open(
            &settings,
            db,
            Arc::new(SystemClock::new()),
            Arc::clone(&vault_metrics),
            event_tx,
        )
        .context("failed to open vault")?,
    );

    // --- Application state ---
    let network = service.read(|vault| network_name(vault.domain().chain_id));
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            locked_vault_protocol::config::PROTOCOL_VERSION,
        ),
        network,
        service,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", settings.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = format!("0.0.0.0:{}", settings.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("locked-vault-node stopped");
    Ok(())
}

/// Initializes a data directory: settings file plus a fresh owner key.
fn init_node(args: cli::InitArgs, format: LogFormat) -> Result<()> {
    logging::init_logging("locked_vault_node=info", format);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), chain_id = args.chain_id, "initializing node");

    let settings_path = data_dir.join(SETTINGS_FILE);
    if settings_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            settings_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let owner = VaultKeypair::generate();
    let vault_address = address_or_fresh(args.vault_address.as_deref(), "vault address")?;
    let token = address_or_fresh(args.token.as_deref(), "token")?;

    let mut config = VaultConfig::new(args.chain_id, vault_address, token, owner.address())
        .with_lock_duration(args.lock_duration_secs);
    let forwarder = match args.trusted_forwarder.as_deref() {
        Some(raw) => Some(parse_address(raw, "trusted forwarder")?),
        None => forwarder_for_chain(args.chain_id)
            .map(|raw| parse_address(raw, "trusted forwarder"))
            .transpose()?,
    };
    if let Some(forwarder) = forwarder {
        config = config.with_trusted_forwarder(forwarder);
    }
    config.validate().context("invalid vault configuration")?;

    // Write the owner key to a file inside the data directory.
    let key_path = data_dir.join(OWNER_KEY_FILE);
    write_secret(&key_path, &owner.secret_key_hex())?;

    let settings = NodeSettings::new(config);
    settings.save(&settings_path)?;

    tracing::info!(
        owner = %owner.address(),
        key_path = %key_path.display(),
        "owner keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", network_name(args.chain_id));
    println!("  Vault address  : {}", settings.vault.vault_address);
    println!("  Token          : {}", settings.vault.token);
    println!("  Owner          : {}", owner.address());
    println!("  Owner key      : {}", key_path.display());
    match settings.vault.trusted_forwarder {
        Some(forwarder) => println!("  Forwarder      : {}", forwarder),
        None => println!("  Forwarder      : none"),
    }

    Ok(())
}

/// Prints a fresh key and its address as JSON.
fn keygen() -> Result<()> {
    let keypair = VaultKeypair::generate();
    let out = serde_json::json!({
        "address": keypair.address().to_checksum(),
        "secret_key": keypair.secret_key_hex(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Signs `WithdrawMetaTransaction{stakerAddress, amount}` for the key's own
/// address and prints the signature the vault expects.
fn sign_withdrawal(args: cli::SignWithdrawalArgs) -> Result<()> {
    let keypair = VaultKeypair::from_hex(&args.key).context("invalid signer key")?;
    let vault_address = parse_address(&args.vault_address, "vault address")?;

    let domain = Eip712Domain::locked_vault(args.chain_id, vault_address);
    let message = WithdrawAuthorization::new(keypair.address(), args.amount);
    let digest = message.signing_digest(&domain);
    let signature = keypair
        .sign_digest(&digest)
        .context("failed to sign withdrawal")?;

    let out = serde_json::json!({
        "staker": keypair.address(),
        "amount": args.amount.to_string(),
        "chain_id": args.chain_id,
        "vault_address": vault_address,
        "digest": locked_vault_protocol::crypto::to_hex_prefixed(&digest),
        "signature": signature,
        "packed": signature.to_hex(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Prints a signed node call, ready to be merged into the request body.
fn sign_call(args: cli::SignCallArgs) -> Result<()> {
    let keypair = VaultKeypair::from_hex(&args.key).context("invalid signer key")?;
    let vault_address = parse_address(&args.vault_address, "vault address")?;
    let call = match args.action {
        CallAction::Deposit { asset, amount } => NodeCall::Deposit {
            asset: match asset {
                Some(raw) => parse_address(&raw, "asset")?,
                None => Address::ZERO,
            },
            amount,
        },
        CallAction::Approve { amount } => NodeCall::Approve { amount },
        CallAction::SetLockDuration { secs } => NodeCall::SetLockDuration {
            lock_duration_secs: secs,
        },
        CallAction::TransferOwnership { new_owner } => NodeCall::TransferOwnership {
            new_owner: parse_address(&new_owner, "new owner")?,
        },
        CallAction::Reconfigure {
            new_chain_id,
            new_vault_address,
        } => NodeCall::Reconfigure {
            chain_id: new_chain_id,
            vault_address: parse_address(&new_vault_address, "new vault address")?,
        },
    };

    let domain = Eip712Domain::locked_vault(args.chain_id, vault_address);
    let auth = CallAuthorization::new(keypair.address(), args.nonce, call);
    let digest = auth.signing_digest(&domain);
    let signature = keypair
        .sign_digest(&digest)
        .context("failed to sign call")?;

    let out = serde_json::json!({
        "signer": keypair.address(),
        "nonce": args.nonce,
        "call": call,
        "digest": locked_vault_protocol::crypto::to_hex_prefixed(&digest),
        "signature": signature,
        "typed_data": TypedDataPayload::call(&domain, &auth),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn parse_address(raw: &str, what: &str) -> Result<Address> {
    raw.parse()
        .with_context(|| format!("invalid {}: {}", what, raw))
}

/// Parses `raw` when given, otherwise makes up a fresh address for devnet use.
fn address_or_fresh(raw: Option<&str>, what: &str) -> Result<Address> {
    match raw {
        Some(raw) => parse_address(raw, what),
        None => Ok(VaultKeypair::generate().address()),
    }
}

/// Writes a key file that is owner-only from the moment it exists.
fn write_secret(path: &Path, contents: &str) -> Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create key file {}", path.display()))?;

    // `mode` only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }

    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write key to {}", path.display()))?;
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("locked-vault-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol          {}", locked_vault_protocol::config::PROTOCOL_VERSION);
    println!(
        "eip712 domain     {} v{}",
        locked_vault_protocol::config::EIP712_DOMAIN_NAME,
        locked_vault_protocol::config::EIP712_DOMAIN_VERSION
    );
    println!("rustc             {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
