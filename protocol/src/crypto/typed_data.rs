//! # EIP-712 Typed Data
//!
//! Withdrawal authorizations are signed as EIP-712 structured data. The
//! digest a depositor signs is
//!
//! ```text
//! keccak256(0x19 0x01 || domainSeparator || hashStruct(message))
//! ```
//!
//! where the domain binds the signature to one vault contract on one chain,
//! and the message is `WithdrawMetaTransaction(address stakerAddress,uint256
//! amount)`. A signature produced for another vault, another chain, or
//! another scheme version hashes to a different digest and recovers to an
//! unrelated address.
//!
//! The encoding here must stay byte-identical to what wallets compute for
//! `eth_signTypedData_v4`, otherwise no real signature would ever verify.

use serde::{Deserialize, Serialize};

use super::hash::{keccak256, keccak256_concat};
use crate::address::Address;
use crate::config::{EIP712_DOMAIN_NAME, EIP712_DOMAIN_VERSION};

/// Canonical type string of the EIP-712 domain we use.
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Canonical type string of the withdrawal authorization.
pub const WITHDRAW_TYPE: &str = "WithdrawMetaTransaction(address stakerAddress,uint256 amount)";

/// Primary type name, as wallets expect it in the typed-data payload.
pub const WITHDRAW_PRIMARY_TYPE: &str = "WithdrawMetaTransaction";

/// Encodes an unsigned integer as a 32-byte big-endian `uint256` word.
pub fn uint256_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// The EIP-712 domain: who the signature is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// A domain with arbitrary name and version.
    pub fn new(name: &str, version: &str, chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            chain_id,
            verifying_contract,
        }
    }

    /// The `LockedVault` / `1` domain for a given chain and vault address.
    pub fn locked_vault(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new(
            EIP712_DOMAIN_NAME,
            EIP712_DOMAIN_VERSION,
            chain_id,
            verifying_contract,
        )
    }

    /// `hashStruct(domain)`, a.k.a. the domain separator.
    pub fn separator(&self) -> [u8; 32] {
        let typehash = keccak256(EIP712_DOMAIN_TYPE.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());
        let chain_id = uint256_word(self.chain_id as u128);
        let contract = self.verifying_contract.to_abi_word();

        keccak256_concat(&[&typehash, &name_hash, &version_hash, &chain_id, &contract])
    }
}

/// The signed message authorizing a withdrawal of `amount` for
/// `staker_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawAuthorization {
    pub staker_address: Address,
    pub amount: u128,
}

impl WithdrawAuthorization {
    pub fn new(staker_address: Address, amount: u128) -> Self {
        Self {
            staker_address,
            amount,
        }
    }

    /// `hashStruct(message)`.
    pub fn struct_hash(&self) -> [u8; 32] {
        let typehash = keccak256(WITHDRAW_TYPE.as_bytes());
        let staker = self.staker_address.to_abi_word();
        let amount = uint256_word(self.amount);
        keccak256_concat(&[&typehash, &staker, &amount])
    }

    /// The final digest a wallet signs for this message under `domain`.
    pub fn signing_digest(&self, domain: &Eip712Domain) -> [u8; 32] {
        typed_data_digest(&domain.separator(), &self.struct_hash())
    }
}

/// `keccak256(0x19 0x01 || domainSeparator || structHash)`.
pub fn typed_data_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[&[0x19, 0x01], domain_separator, struct_hash])
}

/// A JSON typed-data payload in the shape `eth_signTypedData_v4` accepts.
///
/// Served to clients so they can sign exactly what the vault verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataPayload {
    pub types: serde_json::Value,
    pub primary_type: String,
    pub domain: Eip712Domain,
    pub message: serde_json::Value,
}

impl TypedDataPayload {
    /// Builds the payload for a withdrawal authorization.
    ///
    /// The amount is rendered as a decimal string, which is how wallets
    /// accept `uint256` values beyond JavaScript's safe integer range.
    pub fn withdrawal(domain: &Eip712Domain, message: &WithdrawAuthorization) -> Self {
        let types = serde_json::json!({
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            WITHDRAW_PRIMARY_TYPE: [
                { "name": "stakerAddress", "type": "address" },
                { "name": "amount", "type": "uint256" }
            ]
        });

        Self {
            types,
            primary_type: WITHDRAW_PRIMARY_TYPE.to_string(),
            domain: domain.clone(),
            message: serde_json::json!({
                "stakerAddress": message.staker_address,
                "amount": message.amount.to_string(),
            }),
        }
    }
}
