//! # Asset Custody
//!
//! The ledger says who owns what; custody is where the value actually sits.
//! On a chain that is the vault contract's own native balance and its
//! balance in the token contract. The engine talks to custody through the
//! [`AssetCustody`] trait and never assumes a transfer succeeds.
//!
//! [`InMemoryCustody`] is a self-contained simulation of that collaborator:
//! native account balances, one ERC20 with balances and allowances, and the
//! vault's reserve of each. It backs the node and the tests, and can be
//! told to fail its next transfer.

use std::collections::HashMap;

use locked_vault_protocol::address::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::asset::Asset;

/// Why custody refused to move an asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("insufficient funds in {account} for {asset}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        asset: Asset,
        available: u128,
        requested: u128,
    },

    #[error("insufficient allowance from {owner}: approved {approved}, requested {requested}")]
    InsufficientAllowance {
        owner: Address,
        approved: u128,
        requested: u128,
    },

    #[error("unknown token {0}")]
    UnknownToken(Address),

    #[error("balance overflow crediting {account}")]
    Overflow { account: Address },

    #[error("transfer rejected: {0}")]
    Rejected(String),

    #[error("transfer from {0} to itself")]
    SelfTransfer(Address),
}

/// Moves assets between accounts and the vault's reserve.
pub trait AssetCustody {
    /// Pulls `amount` of `asset` from `from` into the vault reserve.
    fn transfer_in(&mut self, from: &Address, asset: &Asset, amount: u128) -> Result<(), CustodyError>;

    /// Pays `amount` of `asset` out of the vault reserve to `to`.
    fn transfer_out(&mut self, to: &Address, asset: &Asset, amount: u128) -> Result<(), CustodyError>;

    /// What the vault currently holds of `asset`.
    fn reserve(&self, asset: &Asset) -> u128;
}

/// An in-process native ledger plus a single ERC20.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryCustody {
    vault: Address,
    token: Address,
    native: HashMap<Address, u128>,
    token_balances: HashMap<Address, u128>,
    /// owner -> amount the vault may pull
    allowances: HashMap<Address, u128>,
    #[serde(skip)]
    fail_next: Option<String>,
}

impl InMemoryCustody {
    pub fn new(vault: Address, token: Address) -> Self {
        Self {
            vault,
            token,
            native: HashMap::new(),
            token_balances: HashMap::new(),
            allowances: HashMap::new(),
            fail_next: None,
        }
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Follows the vault to a new address, carrying its reserve along.
    pub fn relocate_vault(&mut self, vault: Address) {
        if vault == self.vault {
            return;
        }
        let native = self.native.remove(&self.vault).unwrap_or(0);
        let token = self.token_balances.remove(&self.vault).unwrap_or(0);
        self.vault = vault;
        let slot = self.native.entry(vault).or_default();
        *slot = slot.saturating_add(native);
        let slot = self.token_balances.entry(vault).or_default();
        *slot = slot.saturating_add(token);
    }

    pub fn balance_of(&self, account: &Address, asset: &Asset) -> u128 {
        match asset {
            Asset::Native => self.native.get(account).copied().unwrap_or(0),
            Asset::Token(_) => self.token_balances.get(account).copied().unwrap_or(0),
        }
    }

    /// Creates `amount` of `asset` out of thin air for `account`.
    pub fn mint(&mut self, account: &Address, asset: &Asset, amount: u128) -> Result<u128, CustodyError> {
        self.check_token(asset)?;
        let book = self.book_mut(asset);
        let balance = book.entry(*account).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { account: *account })?;
        Ok(*balance)
    }

    /// ERC20 `approve(vault, amount)` on behalf of `owner`. Replaces any
    /// earlier allowance.
    pub fn approve(&mut self, owner: &Address, amount: u128) {
        self.allowances.insert(*owner, amount);
    }

    pub fn allowance(&self, owner: &Address) -> u128 {
        self.allowances.get(owner).copied().unwrap_or(0)
    }

    /// Makes the next `transfer_in` or `transfer_out` fail with `reason`.
    pub fn fail_next_transfer(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    fn check_token(&self, asset: &Asset) -> Result<(), CustodyError> {
        match asset {
            Asset::Token(t) if *t != self.token => Err(CustodyError::UnknownToken(*t)),
            _ => Ok(()),
        }
    }

    fn book_mut(&mut self, asset: &Asset) -> &mut HashMap<Address, u128> {
        match asset {
            Asset::Native => &mut self.native,
            Asset::Token(_) => &mut self.token_balances,
        }
    }

    fn injected_failure(&mut self) -> Result<(), CustodyError> {
        match self.fail_next.take() {
            Some(reason) => Err(CustodyError::Rejected(reason)),
            None => Ok(()),
        }
    }

    /// Moves `amount` between two distinct accounts of the same book.
    /// Checks both sides before touching either.
    fn move_funds(&mut self, from: &Address, to: &Address, asset: &Asset, amount: u128) -> Result<(), CustodyError> {
        if from == to {
            return Err(CustodyError::SelfTransfer(*from));
        }
        let available = self.balance_of(from, asset);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                account: *from,
                asset: *asset,
                available,
                requested: amount,
            });
        }
        let credited = self
            .balance_of(to, asset)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { account: *to })?;

        let book = self.book_mut(asset);
        book.insert(*from, available - amount);
        book.insert(*to, credited);
        Ok(())
    }
}

impl AssetCustody for InMemoryCustody {
    fn transfer_in(&mut self, from: &Address, asset: &Asset, amount: u128) -> Result<(), CustodyError> {
        self.check_token(asset)?;
        self.injected_failure()?;

        if asset.is_native() {
            // Native value arrives with the call itself.
            let vault = self.vault;
            return self.move_funds(from, &vault, asset, amount);
        }

        // transferFrom(from, vault, amount)
        let approved = self.allowance(from);
        if approved < amount {
            return Err(CustodyError::InsufficientAllowance {
                owner: *from,
                approved,
                requested: amount,
            });
        }
        let vault = self.vault;
        self.move_funds(from, &vault, asset, amount)?;
        self.allowances.insert(*from, approved - amount);
        debug!(%from, amount, "token pulled into vault");
        Ok(())
    }

    fn transfer_out(&mut self, to: &Address, asset: &Asset, amount: u128) -> Result<(), CustodyError> {
        self.check_token(asset)?;
        self.injected_failure()?;
        let vault = self.vault;
        self.move_funds(&vault, to, asset, amount)
    }

    fn reserve(&self, asset: &Asset) -> u128 {
        self.balance_of(&self.vault, asset)
    }
}
