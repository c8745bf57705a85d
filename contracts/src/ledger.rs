//! # Asset Ledger
//!
//! Per-depositor balances for native currency and tokens. Balances start at
//! zero on first touch, grow on deposit, shrink on withdrawal, and are never
//! deleted; zero is a perfectly good terminal state.
//!
//! Every mutation hands back a [`LedgerEntry`] recording the balance before
//! and after, whether the depositor had an entry at all, and the asset totals
//! as they stood. The engine moves the asset *after* mutating the ledger, and
//! if that movement fails it feeds the entry to [`AssetLedger::rollback`],
//! which leaves the ledger equal to what it was before the call.
//!
//! Running totals per asset (`deposited`, `withdrawn`) make conservation
//! checkable at any time:
//!
//! ```text
//! sum(balances[asset]) + withdrawn[asset] == deposited[asset]
//! ```

use std::collections::HashMap;

use locked_vault_protocol::address::Address;
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::VaultError;

/// Lifetime inflow and outflow of one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTotals {
    pub deposited: u128,
    pub withdrawn: u128,
}

impl AssetTotals {
    /// Value currently held for depositors.
    pub fn locked(&self) -> u128 {
        self.deposited.saturating_sub(self.withdrawn)
    }
}

/// A single committed balance change, sufficient to undo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub depositor: Address,
    pub asset: Asset,
    pub previous: u128,
    pub current: u128,
    /// Whether the depositor had a balance entry for `asset` before.
    pub had_entry: bool,
    /// Totals for `asset` before the change; `None` if it had none.
    pub previous_totals: Option<AssetTotals>,
}

impl LedgerEntry {
    pub fn is_credit(&self) -> bool {
        self.current > self.previous
    }

    /// Size of the change, regardless of direction.
    pub fn amount(&self) -> u128 {
        self.current.abs_diff(self.previous)
    }
}

/// Balance book for every depositor and asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLedger {
    native: HashMap<Address, u128>,
    /// depositor -> token -> amount
    tokens: HashMap<Address, HashMap<Address, u128>>,
    totals: HashMap<Asset, AssetTotals>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance, zero for depositors never seen.
    pub fn balance_of(&self, depositor: &Address, asset: &Asset) -> u128 {
        match asset {
            Asset::Native => self.native.get(depositor).copied().unwrap_or(0),
            Asset::Token(token) => self
                .tokens
                .get(depositor)
                .and_then(|per_token| per_token.get(token))
                .copied()
                .unwrap_or(0),
        }
    }

    /// Adds `amount` to the depositor's balance.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountMustBePositive`] for zero and
    /// [`VaultError::BalanceOverflow`] if either the balance or the asset's
    /// deposited total would overflow.
    pub fn credit(
        &mut self,
        depositor: Address,
        asset: Asset,
        amount: u128,
    ) -> Result<LedgerEntry, VaultError> {
        if amount == 0 {
            return Err(VaultError::AmountMustBePositive);
        }

        let had_entry = self.has_entry(&depositor, &asset);
        let previous = self.balance_of(&depositor, &asset);
        let previous_totals = self.totals.get(&asset).copied();
        let overflow = VaultError::BalanceOverflow { depositor, asset };
        let current = previous.checked_add(amount).ok_or(overflow.clone())?;
        let totals = previous_totals.unwrap_or_default();
        let deposited = totals.deposited.checked_add(amount).ok_or(overflow)?;

        self.set_balance(depositor, asset, current);
        self.totals.insert(
            asset,
            AssetTotals {
                deposited,
                ..totals
            },
        );

        Ok(LedgerEntry {
            depositor,
            asset,
            previous,
            current,
            had_entry,
            previous_totals,
        })
    }

    /// Subtracts `amount` from the depositor's balance.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountMustBePositive`] for zero and
    /// [`VaultError::InsufficientBalance`] if the balance is too small.
    pub fn debit(
        &mut self,
        depositor: Address,
        asset: Asset,
        amount: u128,
    ) -> Result<LedgerEntry, VaultError> {
        if amount == 0 {
            return Err(VaultError::AmountMustBePositive);
        }

        let previous = self.balance_of(&depositor, &asset);
        if amount > previous {
            return Err(VaultError::InsufficientBalance {
                depositor,
                asset,
                available: previous,
                requested: amount,
            });
        }
        let current = previous - amount;
        let previous_totals = self.totals.get(&asset).copied();

        self.set_balance(depositor, asset, current);
        let totals = self.totals.entry(asset).or_default();
        totals.withdrawn = totals.withdrawn.saturating_add(amount);
        // A non-zero debit implies a prior credit, so the entry existed.
        let had_entry = true;

        Ok(LedgerEntry {
            depositor,
            asset,
            previous,
            current,
            had_entry,
            previous_totals,
        })
    }

    /// Undoes the most recent credit or debit returned by this ledger,
    /// including any balance or totals entry it created.
    pub fn rollback(&mut self, entry: &LedgerEntry) {
        if entry.had_entry {
            self.set_balance(entry.depositor, entry.asset, entry.previous);
        } else {
            self.remove_balance(&entry.depositor, &entry.asset);
        }
        match entry.previous_totals {
            Some(totals) => {
                self.totals.insert(entry.asset, totals);
            }
            None => {
                self.totals.remove(&entry.asset);
            }
        }
    }

    pub fn totals(&self, asset: &Asset) -> AssetTotals {
        self.totals.get(asset).copied().unwrap_or_default()
    }

    /// Sum of every depositor's balance of `asset`.
    pub fn sum_balances(&self, asset: &Asset) -> u128 {
        match asset {
            Asset::Native => self.native.values().fold(0u128, |acc, v| acc.saturating_add(*v)),
            Asset::Token(token) => self
                .tokens
                .values()
                .filter_map(|per_token| per_token.get(token))
                .fold(0u128, |acc, v| acc.saturating_add(*v)),
        }
    }

    /// `sum(balances) + withdrawn == deposited` for `asset`.
    pub fn is_conserved(&self, asset: &Asset) -> bool {
        let totals = self.totals(asset);
        self.sum_balances(asset).checked_add(totals.withdrawn) == Some(totals.deposited)
    }

    /// Number of depositors that have ever held `asset`.
    pub fn depositor_count(&self, asset: &Asset) -> usize {
        match asset {
            Asset::Native => self.native.len(),
            Asset::Token(token) => self
                .tokens
                .values()
                .filter(|per_token| per_token.contains_key(token))
                .count(),
        }
    }

    fn has_entry(&self, depositor: &Address, asset: &Asset) -> bool {
        match asset {
            Asset::Native => self.native.contains_key(depositor),
            Asset::Token(token) => self
                .tokens
                .get(depositor)
                .is_some_and(|per_token| per_token.contains_key(token)),
        }
    }

    fn remove_balance(&mut self, depositor: &Address, asset: &Asset) {
        match asset {
            Asset::Native => {
                self.native.remove(depositor);
            }
            Asset::Token(token) => {
                if let Some(per_token) = self.tokens.get_mut(depositor) {
                    per_token.remove(token);
                    if per_token.is_empty() {
                        self.tokens.remove(depositor);
                    }
                }
            }
        }
    }

    fn set_balance(&mut self, depositor: Address, asset: Asset, amount: u128) {
        match asset {
            Asset::Native => {
                self.native.insert(depositor, amount);
            }
            Asset::Token(token) => {
                self.tokens.entry(depositor).or_default().insert(token, amount);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::new([0xA1; 20])
    }

    fn bob() -> Address {
        Address::new([0xB0; 20])
    }

    fn token() -> Asset {
        Asset::Token(Address::new([0x70; 20]))
    }

    #[test]
    fn unknown_depositor_has_zero_balance() {
        let ledger = AssetLedger::new();
        assert_eq!(ledger.balance_of(&alice(), &Asset::Native), 0);
        assert_eq!(ledger.balance_of(&alice(), &token()), 0);
    }

    #[test]
    fn credit_accumulates_per_asset() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), Asset::Native, 100).unwrap();
        ledger.credit(alice(), Asset::Native, 50).unwrap();
        ledger.credit(alice(), token(), 5).unwrap();

        assert_eq!(ledger.balance_of(&alice(), &Asset::Native), 150);
        assert_eq!(ledger.balance_of(&alice(), &token()), 5);
        assert_eq!(ledger.totals(&Asset::Native).deposited, 150);
    }

    #[test]
    fn zero_amounts_rejected_without_mutation() {
        let mut ledger = AssetLedger::new();
        assert_eq!(
            ledger.credit(alice(), Asset::Native, 0),
            Err(VaultError::AmountMustBePositive)
        );
        assert_eq!(
            ledger.debit(alice(), Asset::Native, 0),
            Err(VaultError::AmountMustBePositive)
        );
        assert_eq!(ledger, AssetLedger::new());
    }

    #[test]
    fn debit_beyond_balance_rejected() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), token(), 10).unwrap();

        let err = ledger.debit(alice(), token(), 11).unwrap_err();
        assert_eq!(
            err,
            VaultError::InsufficientBalance {
                depositor: alice(),
                asset: token(),
                available: 10,
                requested: 11,
            }
        );
        assert_eq!(ledger.balance_of(&alice(), &token()), 10);
    }

    #[test]
    fn overflow_rejected() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), Asset::Native, u128::MAX).unwrap();
        assert!(matches!(
            ledger.credit(alice(), Asset::Native, 1),
            Err(VaultError::BalanceOverflow { .. })
        ));
        // The running total overflows even when a fresh depositor's balance
        // would not.
        assert!(matches!(
            ledger.credit(bob(), Asset::Native, 1),
            Err(VaultError::BalanceOverflow { .. })
        ));
        assert_eq!(ledger.balance_of(&bob(), &Asset::Native), 0);
    }

    #[test]
    fn rollback_restores_credit_and_debit() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), Asset::Native, 100).unwrap();
        let before = ledger.clone();

        let credit = ledger.credit(alice(), Asset::Native, 20).unwrap();
        assert_eq!(credit.amount(), 20);
        assert!(credit.is_credit());
        ledger.rollback(&credit);
        assert_eq!(ledger, before);

        let debit = ledger.debit(alice(), Asset::Native, 30).unwrap();
        assert!(!debit.is_credit());
        ledger.rollback(&debit);
        assert_eq!(ledger, before);
    }

    #[test]
    fn rollback_of_first_credit_leaves_no_entry_behind() {
        let mut ledger = AssetLedger::new();
        ledger.credit(bob(), Asset::Native, 3).unwrap();
        let before = ledger.clone();

        let native = ledger.credit(alice(), Asset::Native, 5).unwrap();
        assert!(!native.had_entry);
        ledger.rollback(&native);
        assert_eq!(ledger, before);
        assert_eq!(ledger.depositor_count(&Asset::Native), 1);

        // First ever touch of the token: both the balance and the totals
        // entry must disappear again.
        let tok = ledger.credit(alice(), token(), 8).unwrap();
        assert_eq!(tok.previous_totals, None);
        ledger.rollback(&tok);
        assert_eq!(ledger, before);
        assert_eq!(ledger.depositor_count(&token()), 0);
    }

    #[test]
    fn conservation_holds_across_mixed_operations() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), Asset::Native, 100).unwrap();
        ledger.credit(bob(), Asset::Native, 40).unwrap();
        ledger.debit(alice(), Asset::Native, 60).unwrap();
        ledger.credit(bob(), token(), 9).unwrap();
        ledger.debit(bob(), token(), 9).unwrap();

        assert!(ledger.is_conserved(&Asset::Native));
        assert!(ledger.is_conserved(&token()));
        assert_eq!(ledger.sum_balances(&Asset::Native), 80);
        assert_eq!(ledger.totals(&Asset::Native).locked(), 80);
        assert_eq!(ledger.sum_balances(&token()), 0);
        assert_eq!(ledger.depositor_count(&token()), 1);
    }

    #[test]
    fn balances_are_independent_per_depositor() {
        let mut ledger = AssetLedger::new();
        ledger.credit(alice(), Asset::Native, 7).unwrap();
        assert_eq!(ledger.balance_of(&bob(), &Asset::Native), 0);
    }
}
