//! # Trusted Forwarder
//!
//! Relayers submit calls on a depositor's behalf through a trusted
//! forwarder contract (ERC-2771). The forwarder appends the original
//! sender to the call; the vault believes that appended sender only when
//! the immediate caller *is* the trusted forwarder. Anyone else claiming to
//! forward is treated as acting for themselves.

use locked_vault_protocol::address::Address;
use serde::{Deserialize, Serialize};

/// Who is calling, and on whose behalf they say they are calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The immediate caller (`msg.sender`).
    pub caller: Address,
    /// Sender appended by a forwarder, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_sender: Option<Address>,
}

impl CallContext {
    /// A call made directly by `caller`.
    pub fn direct(caller: Address) -> Self {
        Self {
            caller,
            forwarded_sender: None,
        }
    }

    /// A call relayed by `forwarder` for `sender`.
    pub fn forwarded(forwarder: Address, sender: Address) -> Self {
        Self {
            caller: forwarder,
            forwarded_sender: Some(sender),
        }
    }

    /// The effective sender (`_msgSender()`): the forwarded sender when the
    /// caller is the trusted forwarder, otherwise the caller.
    pub fn sender(&self, trusted_forwarder: Option<&Address>) -> Address {
        match (self.forwarded_sender, trusted_forwarder) {
            (Some(sender), Some(trusted)) if self.caller == *trusted => sender,
            _ => self.caller,
        }
    }

    pub fn is_relayed(&self, trusted_forwarder: Option<&Address>) -> bool {
        self.sender(trusted_forwarder) != self.caller
    }
}
