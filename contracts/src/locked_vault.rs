//! # LockedVault Engine
//!
//! The single entry point for deposits, withdrawals and administration. It
//! composes the [`AssetLedger`], the [`TimeLockPolicy`] and withdrawal
//! [`authorization`](crate::authorization), and drives an [`AssetCustody`]
//! to move the actual value.
//!
//! ## Ordering
//!
//! Every call is atomic: `&mut self` serializes them, and each one either
//! commits fully or leaves no trace. Deposits and withdrawals both follow
//! *mutate, then transfer, roll back on failure*:
//!
//! ```text
//! deposit:   amount > 0 → token supported → depositor allowed → credit
//!            → record lock → transfer_in
//! withdraw:  amount > 0 → token supported → depositor allowed → signature
//!            → lock matured → debit → transfer_out
//! ```
//!
//! Neither the zero address nor the vault's own address may act as a
//! depositor: custody cannot move value from the vault to itself, so such a
//! balance would have nothing behind it.
//!
//! If custody refuses the transfer the ledger entry and the previous unlock
//! time are restored and [`VaultError::AssetTransferFailed`] is returned.
//! Events are only produced once a call has committed.
//!
//! ## Who is acting
//!
//! Every call carries a [`CallContext`]. The depositor (or the would-be
//! owner, for admin calls) is the context's effective sender under the
//! configured trusted forwarder. Withdrawn funds always go to that
//! depositor, never to the relayer that submitted the call.

use std::sync::Arc;

use locked_vault_protocol::address::Address;
use locked_vault_protocol::clock::Clock;
use locked_vault_protocol::crypto::signatures::Signature;
use locked_vault_protocol::crypto::typed_data::Eip712Domain;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asset::Asset;
use crate::authorization;
use crate::config::VaultConfig;
use crate::custody::AssetCustody;
use crate::error::VaultError;
use crate::events::{EventRecord, VaultEvent};
use crate::forwarder::CallContext;
use crate::ledger::{AssetLedger, AssetTotals};
use crate::time_lock::{RelockPolicy, TimeLockPolicy};

// ---------------------------------------------------------------------------
// Snapshot & Views
// ---------------------------------------------------------------------------

/// Complete mutable state of an engine, minus custody and clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub domain: Eip712Domain,
    pub token: Address,
    pub trusted_forwarder: Option<Address>,
    pub owner: Address,
    pub ledger: AssetLedger,
    pub locks: TimeLockPolicy,
    pub next_seq: u64,
}

/// Everything a client wants to know about one depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub address: Address,
    pub native_balance: u128,
    pub token_balance: u128,
    pub unlock_time: u64,
    pub locked: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A time-locked vault for native currency and one ERC20.
pub struct LockedVault<C: AssetCustody> {
    domain: Eip712Domain,
    token: Address,
    trusted_forwarder: Option<Address>,
    owner: Address,
    ledger: AssetLedger,
    locks: TimeLockPolicy,
    custody: C,
    clock: Arc<dyn Clock>,
    next_seq: u64,
    pending: Vec<EventRecord>,
}

impl<C: AssetCustody> LockedVault<C> {
    /// Creates an empty vault.
    ///
    /// # Errors
    ///
    /// Any [`VaultConfig::validate`] failure.
    pub fn new(config: VaultConfig, custody: C, clock: Arc<dyn Clock>) -> Result<Self, VaultError> {
        config.validate()?;
        let locks = TimeLockPolicy::new(config.lock_duration_secs, config.relock_policy)?;
        info!(
            chain_id = config.chain_id,
            vault = %config.vault_address,
            token = %config.token,
            owner = %config.owner,
            lock_duration_secs = config.lock_duration_secs,
            "vault created"
        );
        Ok(Self {
            domain: config.domain(),
            token: config.token,
            trusted_forwarder: config.trusted_forwarder,
            owner: config.owner,
            ledger: AssetLedger::new(),
            locks,
            custody,
            clock,
            next_seq: 1,
            pending: Vec::new(),
        })
    }

    /// Rebuilds a vault from a persisted snapshot and the custody state it
    /// was taken with.
    pub fn from_snapshot(snapshot: VaultSnapshot, custody: C, clock: Arc<dyn Clock>) -> Self {
        Self {
            domain: snapshot.domain,
            token: snapshot.token,
            trusted_forwarder: snapshot.trusted_forwarder,
            owner: snapshot.owner,
            ledger: snapshot.ledger,
            locks: snapshot.locks,
            custody,
            clock,
            next_seq: snapshot.next_seq,
            pending: Vec::new(),
        }
    }

    // -- Deposits -----------------------------------------------------------

    /// Stakes `amount` of native currency for the context's sender.
    pub fn deposit_native(&mut self, ctx: &CallContext, amount: u128) -> Result<EventRecord, VaultError> {
        let result = self.deposit(ctx, Asset::Native, amount);
        self.logged("deposit_native", ctx, result)
    }

    /// Stakes `amount` of `token` for the context's sender. The sender must
    /// have approved the vault for at least `amount`.
    pub fn deposit_token(
        &mut self,
        ctx: &CallContext,
        token: Address,
        amount: u128,
    ) -> Result<EventRecord, VaultError> {
        let result = self.deposit(ctx, Asset::Token(token), amount);
        self.logged("deposit_token", ctx, result)
    }

    fn deposit(&mut self, ctx: &CallContext, asset: Asset, amount: u128) -> Result<EventRecord, VaultError> {
        let depositor = self.sender(ctx);
        if amount == 0 {
            return Err(VaultError::AmountMustBePositive);
        }
        self.check_asset(&asset)?;
        self.check_depositor(&depositor)?;

        let now = self.clock.now();
        let entry = self.ledger.credit(depositor, asset, amount)?;
        let previous_unlock = self.locks.record_deposit(&depositor, now);

        if let Err(e) = self.custody.transfer_in(&depositor, &asset, amount) {
            self.ledger.rollback(&entry);
            self.locks.restore(&depositor, previous_unlock);
            return Err(VaultError::AssetTransferFailed {
                asset,
                reason: e.to_string(),
            });
        }

        let unlock_time = self.locks.unlock_time(&depositor);
        let event = match asset {
            Asset::Native => VaultEvent::StakeNative {
                staker: depositor,
                amount,
                unlock_time,
            },
            Asset::Token(token) => VaultEvent::StakeToken {
                staker: depositor,
                token,
                amount,
                unlock_time,
            },
        };
        Ok(self.emit(now, event))
    }

    // -- Withdrawals --------------------------------------------------------

    /// Withdraws `amount` of native currency to the context's sender,
    /// authorized by the sender's signature.
    pub fn withdraw_native(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        signature: &Signature,
    ) -> Result<EventRecord, VaultError> {
        let result = self.withdraw(ctx, Asset::Native, amount, signature);
        self.logged("withdraw_native", ctx, result)
    }

    /// Withdraws `amount` of `token` to the context's sender.
    pub fn withdraw_token(
        &mut self,
        ctx: &CallContext,
        token: Address,
        amount: u128,
        signature: &Signature,
    ) -> Result<EventRecord, VaultError> {
        let result = self.withdraw(ctx, Asset::Token(token), amount, signature);
        self.logged("withdraw_token", ctx, result)
    }

    fn withdraw(
        &mut self,
        ctx: &CallContext,
        asset: Asset,
        amount: u128,
        signature: &Signature,
    ) -> Result<EventRecord, VaultError> {
        let depositor = self.sender(ctx);
        if amount == 0 {
            return Err(VaultError::AmountMustBePositive);
        }
        self.check_asset(&asset)?;
        self.check_depositor(&depositor)?;

        authorization::verify(&depositor, amount, signature, &self.domain)?;

        let now = self.clock.now();
        if !self.locks.is_unlocked(&depositor, now) {
            return Err(VaultError::LockNotMatured {
                depositor,
                unlock_time: self.locks.unlock_time(&depositor),
                now,
            });
        }

        let entry = self.ledger.debit(depositor, asset, amount)?;

        if let Err(e) = self.custody.transfer_out(&depositor, &asset, amount) {
            self.ledger.rollback(&entry);
            return Err(VaultError::AssetTransferFailed {
                asset,
                reason: e.to_string(),
            });
        }

        let event = match asset {
            Asset::Native => VaultEvent::WithdrawalNative {
                staker: depositor,
                amount,
            },
            Asset::Token(token) => VaultEvent::WithdrawalToken {
                staker: depositor,
                token,
                amount,
            },
        };
        Ok(self.emit(now, event))
    }

    // -- Administration -----------------------------------------------------

    /// Changes the lock applied to future deposits. Owner only.
    pub fn set_lock_duration(&mut self, ctx: &CallContext, secs: u64) -> Result<EventRecord, VaultError> {
        let result = self.only_owner(ctx).and_then(|_| {
            let previous = self.locks.set_lock_duration(secs)?;
            let now = self.clock.now();
            Ok(self.emit(
                now,
                VaultEvent::UnlockTimeChanged {
                    previous,
                    current: secs,
                },
            ))
        });
        self.logged("set_lock_duration", ctx, result)
    }

    /// Hands the vault to `new_owner`. Owner only.
    pub fn transfer_ownership(
        &mut self,
        ctx: &CallContext,
        new_owner: Address,
    ) -> Result<EventRecord, VaultError> {
        let result = self.only_owner(ctx).and_then(|previous_owner| {
            if new_owner.is_zero() {
                return Err(VaultError::ZeroAddress("owner"));
            }
            self.owner = new_owner;
            let now = self.clock.now();
            Ok(self.emit(
                now,
                VaultEvent::OwnershipTransferred {
                    previous_owner,
                    new_owner,
                },
            ))
        });
        self.logged("transfer_ownership", ctx, result)
    }

    /// Rebinds the signing domain to another chain id or vault address.
    /// Signatures made under the old domain stop verifying. Owner only.
    pub fn reconfigure(
        &mut self,
        ctx: &CallContext,
        chain_id: u64,
        vault_address: Address,
    ) -> Result<EventRecord, VaultError> {
        let result = self.only_owner(ctx).and_then(|_| {
            if vault_address.is_zero() {
                return Err(VaultError::ZeroAddress("vault"));
            }
            self.domain = Eip712Domain::locked_vault(chain_id, vault_address);
            let now = self.clock.now();
            Ok(self.emit(
                now,
                VaultEvent::DomainReconfigured {
                    chain_id,
                    verifying_contract: vault_address,
                },
            ))
        });
        self.logged("reconfigure", ctx, result)
    }

    // -- Queries ------------------------------------------------------------

    pub fn native_balance(&self, depositor: &Address) -> u128 {
        self.ledger.balance_of(depositor, &Asset::Native)
    }

    pub fn token_balance(&self, depositor: &Address, token: &Address) -> u128 {
        self.ledger.balance_of(depositor, &Asset::Token(*token))
    }

    pub fn balance(&self, depositor: &Address, asset: &Asset) -> u128 {
        self.ledger.balance_of(depositor, asset)
    }

    /// Unlock timestamp of the depositor's lock, 0 if none.
    pub fn unlock_time(&self, depositor: &Address) -> u64 {
        self.locks.unlock_time(depositor)
    }

    pub fn is_unlocked(&self, depositor: &Address) -> bool {
        self.locks.is_unlocked(depositor, self.clock.now())
    }

    pub fn account(&self, depositor: &Address) -> AccountView {
        AccountView {
            address: *depositor,
            native_balance: self.native_balance(depositor),
            token_balance: self.token_balance(depositor, &self.token),
            unlock_time: self.unlock_time(depositor),
            locked: !self.is_unlocked(depositor),
        }
    }

    pub fn lock_duration(&self) -> u64 {
        self.locks.lock_duration()
    }

    pub fn relock_policy(&self) -> RelockPolicy {
        self.locks.relock_policy()
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn trusted_forwarder(&self) -> Option<Address> {
        self.trusted_forwarder
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn totals(&self, asset: &Asset) -> AssetTotals {
        self.ledger.totals(asset)
    }

    pub fn ledger(&self) -> &AssetLedger {
        &self.ledger
    }

    /// Ledger conservation holds and custody holds at least what the
    /// ledger owes depositors.
    pub fn is_solvent(&self, asset: &Asset) -> bool {
        self.ledger.is_conserved(asset) && self.custody.reserve(asset) >= self.ledger.sum_balances(asset)
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // -- Events & state -----------------------------------------------------

    /// Drains events committed since the last call.
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Sequence number the next event will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            domain: self.domain.clone(),
            token: self.token,
            trusted_forwarder: self.trusted_forwarder,
            owner: self.owner,
            ledger: self.ledger.clone(),
            locks: self.locks.clone(),
            next_seq: self.next_seq,
        }
    }

    /// Rewinds to `snapshot`. Pending events newer than the snapshot are
    /// discarded.
    pub fn restore(&mut self, snapshot: VaultSnapshot) {
        self.domain = snapshot.domain;
        self.token = snapshot.token;
        self.trusted_forwarder = snapshot.trusted_forwarder;
        self.owner = snapshot.owner;
        self.ledger = snapshot.ledger;
        self.locks = snapshot.locks;
        self.next_seq = snapshot.next_seq;
        let cutoff = self.next_seq;
        self.pending.retain(|record| record.seq < cutoff);
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    // -- Internals ----------------------------------------------------------

    fn sender(&self, ctx: &CallContext) -> Address {
        ctx.sender(self.trusted_forwarder.as_ref())
    }

    fn check_asset(&self, asset: &Asset) -> Result<(), VaultError> {
        match asset {
            Asset::Token(token) if *token != self.token => Err(VaultError::UnsupportedToken(*token)),
            _ => Ok(()),
        }
    }

    fn check_depositor(&self, depositor: &Address) -> Result<(), VaultError> {
        if depositor.is_zero() {
            return Err(VaultError::ZeroAddress("depositor"));
        }
        if *depositor == self.domain.verifying_contract {
            return Err(VaultError::ReservedAddress(*depositor));
        }
        Ok(())
    }

    fn only_owner(&self, ctx: &CallContext) -> Result<Address, VaultError> {
        let caller = self.sender(ctx);
        if caller != self.owner {
            return Err(VaultError::Unauthorized { caller });
        }
        Ok(self.owner)
    }

    fn emit(&mut self, timestamp: u64, event: VaultEvent) -> EventRecord {
        let record = EventRecord {
            seq: self.next_seq,
            timestamp,
            event,
        };
        self.next_seq += 1;
        self.pending.push(record.clone());
        record
    }

    fn logged<T>(&self, op: &'static str, ctx: &CallContext, result: Result<T, VaultError>) -> Result<T, VaultError> {
        let sender = self.sender(ctx);
        match &result {
            Ok(_) => info!(op, %sender, relayed = ctx.is_relayed(self.trusted_forwarder.as_ref()), "vault call committed"),
            Err(e) => warn!(op, %sender, code = e.code(), error = %e, "vault call rejected"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
