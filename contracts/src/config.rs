//! # Vault Configuration
//!
//! Everything fixed when a vault is deployed: which chain and address the
//! signatures are bound to, which token it accepts, who the owner is, who
//! may forward calls, and how long deposits stay locked.

use locked_vault_protocol::address::Address;
use locked_vault_protocol::config::DEFAULT_LOCK_DURATION;
use locked_vault_protocol::crypto::typed_data::Eip712Domain;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::time_lock::RelockPolicy;

/// Deployment parameters of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub chain_id: u64,
    pub vault_address: Address,
    /// The single ERC20 the vault accepts.
    pub token: Address,
    #[serde(default)]
    pub trusted_forwarder: Option<Address>,
    pub owner: Address,
    pub lock_duration_secs: u64,
    #[serde(default)]
    pub relock_policy: RelockPolicy,
}

impl VaultConfig {
    /// A config with the default lock duration and relock policy and no
    /// forwarder.
    pub fn new(chain_id: u64, vault_address: Address, token: Address, owner: Address) -> Self {
        Self {
            chain_id,
            vault_address,
            token,
            trusted_forwarder: None,
            owner,
            lock_duration_secs: DEFAULT_LOCK_DURATION.as_secs(),
            relock_policy: RelockPolicy::default(),
        }
    }

    pub fn with_lock_duration(mut self, secs: u64) -> Self {
        self.lock_duration_secs = secs;
        self
    }

    pub fn with_trusted_forwarder(mut self, forwarder: Address) -> Self {
        self.trusted_forwarder = Some(forwarder);
        self
    }

    pub fn with_relock_policy(mut self, policy: RelockPolicy) -> Self {
        self.relock_policy = policy;
        self
    }

    /// # Errors
    ///
    /// [`VaultError::ZeroAddress`] for a zero vault, token or owner, and
    /// [`VaultError::LockDurationMustBePositive`] for a zero lock.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.vault_address.is_zero() {
            return Err(VaultError::ZeroAddress("vault"));
        }
        if self.token.is_zero() {
            return Err(VaultError::ZeroAddress("token"));
        }
        if self.owner.is_zero() {
            return Err(VaultError::ZeroAddress("owner"));
        }
        if self.lock_duration_secs == 0 {
            return Err(VaultError::LockDurationMustBePositive);
        }
        Ok(())
    }

    /// The EIP-712 domain withdrawal signatures must be made under.
    pub fn domain(&self) -> Eip712Domain {
        Eip712Domain::locked_vault(self.chain_id, self.vault_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> VaultConfig {
        VaultConfig::new(
            31337,
            Address::new([0x5A; 20]),
            Address::new([0x70; 20]),
            Address::new([0x01; 20]),
        )
    }

    #[test]
    fn defaults_validate() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.lock_duration_secs, 180);
        assert_eq!(cfg.relock_policy, RelockPolicy::ResetOnDeposit);
    }

    #[test]
    fn zero_addresses_rejected() {
        let mut cfg = valid();
        cfg.owner = Address::ZERO;
        assert_eq!(cfg.validate(), Err(VaultError::ZeroAddress("owner")));

        let mut cfg = valid();
        cfg.token = Address::ZERO;
        assert_eq!(cfg.validate(), Err(VaultError::ZeroAddress("token")));
    }

    #[test]
    fn zero_lock_rejected() {
        let cfg = valid().with_lock_duration(0);
        assert_eq!(cfg.validate(), Err(VaultError::LockDurationMustBePositive));
    }

    #[test]
    fn domain_binds_chain_and_vault() {
        let domain = valid().domain();
        assert_eq!(domain.chain_id, 31337);
        assert_eq!(domain.verifying_contract, Address::new([0x5A; 20]));
        assert_eq!(domain.name, "LockedVault");
    }
}
