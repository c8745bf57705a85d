//! # Vault Errors
//!
//! Every way a vault call can be refused. All of them are terminal for the
//! call that triggered them and leave ledger state untouched.
//!
//! Each kind maps to a stable `LVxx` code (see
//! [`locked_vault_protocol::config`]) so clients can tell "try later"
//! (`LockNotMatured`) from "forged" (`InvalidSignature`) from "not enough
//! money" (`InsufficientBalance`) without parsing messages.

use locked_vault_protocol::address::Address;
use locked_vault_protocol::config::{
    CODE_AMOUNT_MUST_BE_POSITIVE, CODE_ASSET_TRANSFER_FAILED, CODE_BALANCE_OVERFLOW,
    CODE_INSUFFICIENT_BALANCE, CODE_INVALID_SIGNATURE, CODE_LOCK_DURATION_MUST_BE_POSITIVE,
    CODE_LOCK_NOT_MATURED, CODE_RESERVED_ADDRESS, CODE_UNAUTHORIZED, CODE_UNSUPPORTED_TOKEN, CODE_ZERO_ADDRESS,
};
use thiserror::Error;

use crate::asset::Asset;

/// Errors returned by vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Deposits and withdrawals of zero are rejected.
    #[error("amount should be higher than zero")]
    AmountMustBePositive,

    /// Withdrawal exceeds the depositor's balance of that asset.
    #[error("insufficient balance for {depositor} in {asset}: available {available}, requested {requested}")]
    InsufficientBalance {
        depositor: Address,
        asset: Asset,
        available: u128,
        requested: u128,
    },

    /// The depositor's lock has not matured yet.
    #[error("unlock time not completed for {depositor}: unlocks at {unlock_time}, now {now}")]
    LockNotMatured {
        depositor: Address,
        unlock_time: u64,
        now: u64,
    },

    /// Lock duration must be strictly positive.
    #[error("unlock time should be higher than zero")]
    LockDurationMustBePositive,

    /// The signature does not recover to the depositor it claims to act for.
    #[error("invalid withdrawal signature for {claimed}: {reason}")]
    InvalidSignature { claimed: Address, reason: String },

    /// Administrative call from someone other than the owner.
    #[error("caller {caller} is not the owner")]
    Unauthorized { caller: Address },

    /// Custody refused or failed to move the asset.
    #[error("asset transfer failed for {asset}: {reason}")]
    AssetTransferFailed { asset: Asset, reason: String },

    /// Token other than the one this vault was deployed for.
    #[error("unsupported token {0}")]
    UnsupportedToken(Address),

    /// Credit would overflow a balance or a running total.
    #[error("balance overflow for {depositor} in {asset}")]
    BalanceOverflow { depositor: Address, asset: Asset },

    /// The zero address is not a valid owner, vault or token.
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),

    /// The vault's own address cannot stake or withdraw.
    #[error("address {0} is reserved and cannot hold a balance")]
    ReservedAddress(Address),
}

impl VaultError {
    /// Stable short code, e.g. `LV09`.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::AmountMustBePositive => CODE_AMOUNT_MUST_BE_POSITIVE,
            VaultError::InsufficientBalance { .. } => CODE_INSUFFICIENT_BALANCE,
            VaultError::LockNotMatured { .. } => CODE_LOCK_NOT_MATURED,
            VaultError::LockDurationMustBePositive => CODE_LOCK_DURATION_MUST_BE_POSITIVE,
            VaultError::InvalidSignature { .. } => CODE_INVALID_SIGNATURE,
            VaultError::Unauthorized { .. } => CODE_UNAUTHORIZED,
            VaultError::AssetTransferFailed { .. } => CODE_ASSET_TRANSFER_FAILED,
            VaultError::UnsupportedToken(_) => CODE_UNSUPPORTED_TOKEN,
            VaultError::BalanceOverflow { .. } => CODE_BALANCE_OVERFLOW,
            VaultError::ZeroAddress(_) => CODE_ZERO_ADDRESS,
            VaultError::ReservedAddress(_) => CODE_RESERVED_ADDRESS,
        }
    }

    /// The error kind name, as reported in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::AmountMustBePositive => "AmountMustBePositive",
            VaultError::InsufficientBalance { .. } => "InsufficientBalance",
            VaultError::LockNotMatured { .. } => "LockNotMatured",
            VaultError::LockDurationMustBePositive => "LockDurationMustBePositive",
            VaultError::InvalidSignature { .. } => "InvalidSignature",
            VaultError::Unauthorized { .. } => "Unauthorized",
            VaultError::AssetTransferFailed { .. } => "AssetTransferFailed",
            VaultError::UnsupportedToken(_) => "UnsupportedToken",
            VaultError::BalanceOverflow { .. } => "BalanceOverflow",
            VaultError::ZeroAddress(_) => "ZeroAddress",
            VaultError::ReservedAddress(_) => "ReservedAddress",
        }
    }

    /// Revert-style string, `CODE: MESSAGE`.
    pub fn revert_reason(&self) -> String {
        format!("{}: {}", self.code(), self)
    }
}
