//! # Vault Events
//!
//! One event per committed operation. Rejected calls emit nothing. Names of
//! the deposit and withdrawal events match the ones indexers already
//! listen for.

use locked_vault_protocol::address::Address;
use serde::{Deserialize, Serialize};

/// Something that happened to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    #[serde(rename = "StakeEth")]
    StakeNative {
        staker: Address,
        amount: u128,
        unlock_time: u64,
    },

    #[serde(rename = "StakeERC20")]
    StakeToken {
        staker: Address,
        token: Address,
        amount: u128,
        unlock_time: u64,
    },

    #[serde(rename = "WithdrawalEth")]
    WithdrawalNative { staker: Address, amount: u128 },

    #[serde(rename = "WithdrawalERC20")]
    WithdrawalToken {
        staker: Address,
        token: Address,
        amount: u128,
    },

    UnlockTimeChanged { previous: u64, current: u64 },

    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },

    DomainReconfigured {
        chain_id: u64,
        verifying_contract: Address,
    },
}

impl VaultEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::StakeNative { .. } => "StakeEth",
            VaultEvent::StakeToken { .. } => "StakeERC20",
            VaultEvent::WithdrawalNative { .. } => "WithdrawalEth",
            VaultEvent::WithdrawalToken { .. } => "WithdrawalERC20",
            VaultEvent::UnlockTimeChanged { .. } => "UnlockTimeChanged",
            VaultEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            VaultEvent::DomainReconfigured { .. } => "DomainReconfigured",
        }
    }

    /// The depositor the event concerns, for deposit and withdrawal events.
    pub fn staker(&self) -> Option<Address> {
        match self {
            VaultEvent::StakeNative { staker, .. }
            | VaultEvent::StakeToken { staker, .. }
            | VaultEvent::WithdrawalNative { staker, .. }
            | VaultEvent::WithdrawalToken { staker, .. } => Some(*staker),
            _ => None,
        }
    }
}

/// A committed event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing, starting at 1.
    pub seq: u64,
    /// Engine clock at commit, seconds since epoch.
    pub timestamp: u64,
    pub event: VaultEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_indexer_event_names() {
        let event = VaultEvent::StakeToken {
            staker: Address::new([1; 20]),
            token: Address::new([2; 20]),
            amount: 5,
            unlock_time: 600,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("StakeERC20").is_some());
        assert_eq!(json["StakeERC20"]["amount"], 5);
        assert_eq!(event.name(), "StakeERC20");
    }

    #[test]
    fn record_survives_bincode() {
        let record = EventRecord {
            seq: 3,
            timestamp: 1_700_000_000,
            event: VaultEvent::WithdrawalNative {
                staker: Address::new([9; 20]),
                amount: u128::MAX,
            },
        };
        let bytes = bincode::serialize(&record).unwrap();
        let back: EventRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn staker_only_for_balance_events() {
        let e = VaultEvent::UnlockTimeChanged {
            previous: 1,
            current: 2,
        };
        assert_eq!(e.staker(), None);
        let w = VaultEvent::WithdrawalNative {
            staker: Address::new([4; 20]),
            amount: 1,
        };
        assert_eq!(w.staker(), Some(Address::new([4; 20])));
    }
}
