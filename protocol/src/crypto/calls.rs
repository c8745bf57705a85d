//! # Signed Node Calls
//!
//! Withdrawals carry their own authorization. Every other state-changing
//! request a node accepts on someone's behalf (staking their funds,
//! approving the vault, administering it) is authorized the same way: the
//! acting account signs an EIP-712 message under the vault's domain, and
//! the node recovers the signer instead of trusting a claimed address.
//!
//! Each message carries a per-signer `nonce`. A node accepts a message only
//! when its nonce equals the next one it expects for that signer, so a
//! captured request cannot be submitted twice.
//!
//! Native currency is encoded as the zero address in the `asset` field of
//! `Deposit`.

use serde::Serialize;

use super::hash::{keccak256, keccak256_concat};
use super::typed_data::{typed_data_digest, uint256_word, Eip712Domain, TypedDataPayload};
use crate::address::Address;

pub const DEPOSIT_TYPE: &str = "Deposit(address depositor,address asset,uint256 amount,uint256 nonce)";
pub const APPROVE_TYPE: &str = "Approve(address owner,uint256 amount,uint256 nonce)";
pub const SET_LOCK_DURATION_TYPE: &str =
    "SetLockDuration(address caller,uint256 lockDuration,uint256 nonce)";
pub const TRANSFER_OWNERSHIP_TYPE: &str =
    "TransferOwnership(address caller,address newOwner,uint256 nonce)";
pub const RECONFIGURE_TYPE: &str =
    "Reconfigure(address caller,uint256 chainId,address vaultAddress,uint256 nonce)";

/// What a signed call asks the node to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NodeCall {
    /// Stake `amount` of `asset` (zero address for native currency).
    Deposit { asset: Address, amount: u128 },
    /// Let the vault pull up to `amount` of the token.
    Approve { amount: u128 },
    SetLockDuration { lock_duration_secs: u64 },
    TransferOwnership { new_owner: Address },
    Reconfigure { chain_id: u64, vault_address: Address },
}

impl NodeCall {
    /// EIP-712 primary type name.
    pub fn primary_type(&self) -> &'static str {
        match self {
            NodeCall::Deposit { .. } => "Deposit",
            NodeCall::Approve { .. } => "Approve",
            NodeCall::SetLockDuration { .. } => "SetLockDuration",
            NodeCall::TransferOwnership { .. } => "TransferOwnership",
            NodeCall::Reconfigure { .. } => "Reconfigure",
        }
    }

    fn type_string(&self) -> &'static str {
        match self {
            NodeCall::Deposit { .. } => DEPOSIT_TYPE,
            NodeCall::Approve { .. } => APPROVE_TYPE,
            NodeCall::SetLockDuration { .. } => SET_LOCK_DURATION_TYPE,
            NodeCall::TransferOwnership { .. } => TRANSFER_OWNERSHIP_TYPE,
            NodeCall::Reconfigure { .. } => RECONFIGURE_TYPE,
        }
    }

    /// Name of the field holding the signer, as it appears in the type.
    fn signer_field(&self) -> &'static str {
        match self {
            NodeCall::Deposit { .. } => "depositor",
            NodeCall::Approve { .. } => "owner",
            _ => "caller",
        }
    }
}

/// A [`NodeCall`] bound to its signer and nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallAuthorization {
    pub signer: Address,
    pub nonce: u64,
    pub call: NodeCall,
}

impl CallAuthorization {
    pub fn new(signer: Address, nonce: u64, call: NodeCall) -> Self {
        Self {
            signer,
            nonce,
            call,
        }
    }

    /// `hashStruct(message)`.
    pub fn struct_hash(&self) -> [u8; 32] {
        let typehash = keccak256(self.call.type_string().as_bytes());
        let signer = self.signer.to_abi_word();
        let nonce = uint256_word(self.nonce as u128);

        match self.call {
            NodeCall::Deposit { asset, amount } => keccak256_concat(&[
                &typehash,
                &signer,
                &asset.to_abi_word(),
                &uint256_word(amount),
                &nonce,
            ]),
            NodeCall::Approve { amount } => {
                keccak256_concat(&[&typehash, &signer, &uint256_word(amount), &nonce])
            }
            NodeCall::SetLockDuration { lock_duration_secs } => keccak256_concat(&[
                &typehash,
                &signer,
                &uint256_word(lock_duration_secs as u128),
                &nonce,
            ]),
            NodeCall::TransferOwnership { new_owner } => {
                keccak256_concat(&[&typehash, &signer, &new_owner.to_abi_word(), &nonce])
            }
            NodeCall::Reconfigure {
                chain_id,
                vault_address,
            } => keccak256_concat(&[
                &typehash,
                &signer,
                &uint256_word(chain_id as u128),
                &vault_address.to_abi_word(),
                &nonce,
            ]),
        }
    }

    /// The digest the signer signs under `domain`.
    pub fn signing_digest(&self, domain: &Eip712Domain) -> [u8; 32] {
        typed_data_digest(&domain.separator(), &self.struct_hash())
    }
}

impl TypedDataPayload {
    /// Builds the wallet payload for a signed node call.
    pub fn call(domain: &Eip712Domain, auth: &CallAuthorization) -> Self {
        let signer_field = auth.call.signer_field();
        let (fields, message) = match auth.call {
            NodeCall::Deposit { asset, amount } => (
                serde_json::json!([
                    { "name": signer_field, "type": "address" },
                    { "name": "asset", "type": "address" },
                    { "name": "amount", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" }
                ]),
                serde_json::json!({
                    signer_field: auth.signer,
                    "asset": asset,
                    "amount": amount.to_string(),
                    "nonce": auth.nonce.to_string(),
                }),
            ),
            NodeCall::Approve { amount } => (
                serde_json::json!([
                    { "name": signer_field, "type": "address" },
                    { "name": "amount", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" }
                ]),
                serde_json::json!({
                    signer_field: auth.signer,
                    "amount": amount.to_string(),
                    "nonce": auth.nonce.to_string(),
                }),
            ),
            NodeCall::SetLockDuration { lock_duration_secs } => (
                serde_json::json!([
                    { "name": signer_field, "type": "address" },
                    { "name": "lockDuration", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" }
                ]),
                serde_json::json!({
                    signer_field: auth.signer,
                    "lockDuration": lock_duration_secs.to_string(),
                    "nonce": auth.nonce.to_string(),
                }),
            ),
            NodeCall::TransferOwnership { new_owner } => (
                serde_json::json!([
                    { "name": signer_field, "type": "address" },
                    { "name": "newOwner", "type": "address" },
                    { "name": "nonce", "type": "uint256" }
                ]),
                serde_json::json!({
                    signer_field: auth.signer,
                    "newOwner": new_owner,
                    "nonce": auth.nonce.to_string(),
                }),
            ),
            NodeCall::Reconfigure {
                chain_id,
                vault_address,
            } => (
                serde_json::json!([
                    { "name": signer_field, "type": "address" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "vaultAddress", "type": "address" },
                    { "name": "nonce", "type": "uint256" }
                ]),
                serde_json::json!({
                    signer_field: auth.signer,
                    "chainId": chain_id.to_string(),
                    "vaultAddress": vault_address,
                    "nonce": auth.nonce.to_string(),
                }),
            ),
        };

        let mut types = serde_json::json!({
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ]
        });
        types[auth.call.primary_type()] = fields;

        Self {
            types,
            primary_type: auth.call.primary_type().to_string(),
            domain: domain.clone(),
            message,
        }
    }
}
