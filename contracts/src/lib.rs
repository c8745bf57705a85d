//! # LockedVault Contracts
//!
//! The accounting-and-authorization core of LockedVault: depositors stake
//! native currency or one whitelisted ERC20, every deposit is time-locked,
//! and withdrawals are authorized by an EIP-712 signature that a relayer
//! may submit on the depositor's behalf.
//!
//! - **ledger**: per-depositor balances with exact rollback.
//! - **time_lock**: unlock timestamps and the relock policy.
//! - **authorization**: stateless signature check for withdrawals.
//! - **locked_vault**: the engine composing the above.
//! - **custody**: the boundary where value actually moves.
//! - **forwarder**: ERC-2771 style sender resolution for relayed calls.
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked. Overflow is an error, never a wrap.
//! 2. A rejected call leaves no trace: no balance change, no lock change,
//!    no event.
//! 3. Funds only ever move to the depositor the signature names.
//! 4. Every piece of engine state is serializable so a node can persist it.

pub mod asset;
pub mod authorization;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod ledger;
pub mod locked_vault;
pub mod time_lock;

pub use asset::Asset;
pub use config::VaultConfig;
pub use custody::{AssetCustody, CustodyError, InMemoryCustody};
pub use error::VaultError;
pub use events::{EventRecord, VaultEvent};
pub use forwarder::CallContext;
pub use ledger::{AssetLedger, AssetTotals, LedgerEntry};
pub use locked_vault::{AccountView, LockedVault, VaultSnapshot};
pub use time_lock::{RelockPolicy, TimeLockPolicy};
