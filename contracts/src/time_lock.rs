//! # Time Lock Policy
//!
//! Each depositor has one unlock timestamp. A withdrawal is allowed once
//! `now >= unlock_time`. Depositors who never deposited have no lock.
//!
//! What a *second* deposit does to an existing lock is a policy choice:
//!
//! - [`RelockPolicy::ResetOnDeposit`] (default) restarts the lock from the
//!   latest deposit, so topping up re-locks the whole balance.
//! - [`RelockPolicy::PreserveActiveLock`] leaves a still-running lock alone
//!   and only starts a new one once the previous lock has matured.

use std::collections::HashMap;

use locked_vault_protocol::address::Address;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// How a deposit interacts with a lock that is already running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelockPolicy {
    #[default]
    ResetOnDeposit,
    PreserveActiveLock,
}

/// Unlock timestamps per depositor plus the process-wide lock duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockPolicy {
    lock_duration: u64,
    relock: RelockPolicy,
    unlock_times: HashMap<Address, u64>,
}

impl TimeLockPolicy {
    /// # Errors
    ///
    /// [`VaultError::LockDurationMustBePositive`] for a zero duration.
    pub fn new(lock_duration: u64, relock: RelockPolicy) -> Result<Self, VaultError> {
        if lock_duration == 0 {
            return Err(VaultError::LockDurationMustBePositive);
        }
        Ok(Self {
            lock_duration,
            relock,
            unlock_times: HashMap::new(),
        })
    }

    /// Records a deposit at `now` and returns the previous unlock time
    /// (`None` if there was none) for [`restore`](Self::restore).
    pub fn record_deposit(&mut self, depositor: &Address, now: u64) -> Option<u64> {
        let previous = self.unlock_times.get(depositor).copied();
        let fresh = now.saturating_add(self.lock_duration);

        let next = match (self.relock, previous) {
            (RelockPolicy::PreserveActiveLock, Some(active)) if active > now => active,
            _ => fresh,
        };
        self.unlock_times.insert(*depositor, next);
        previous
    }

    /// Puts back the value [`record_deposit`](Self::record_deposit) returned.
    pub fn restore(&mut self, depositor: &Address, previous: Option<u64>) {
        match previous {
            Some(ts) => {
                self.unlock_times.insert(*depositor, ts);
            }
            None => {
                self.unlock_times.remove(depositor);
            }
        }
    }

    pub fn is_unlocked(&self, depositor: &Address, now: u64) -> bool {
        now >= self.unlock_time(depositor)
    }

    /// Recorded unlock timestamp, 0 when the depositor has none.
    pub fn unlock_time(&self, depositor: &Address) -> u64 {
        self.unlock_times.get(depositor).copied().unwrap_or(0)
    }

    /// Changes the duration applied to future deposits. Existing locks keep
    /// their timestamps. Returns the previous duration.
    ///
    /// # Errors
    ///
    /// [`VaultError::LockDurationMustBePositive`] for zero.
    pub fn set_lock_duration(&mut self, duration: u64) -> Result<u64, VaultError> {
        if duration == 0 {
            return Err(VaultError::LockDurationMustBePositive);
        }
        Ok(std::mem::replace(&mut self.lock_duration, duration))
    }

    pub fn lock_duration(&self) -> u64 {
        self.lock_duration
    }

    pub fn relock_policy(&self) -> RelockPolicy {
        self.relock
    }
}
