//! # Cryptographic Primitives for LockedVault
//!
//! Everything a withdrawal authorization depends on lives here:
//!
//! - **Keccak-256** for addresses, type hashes and digests.
//! - **secp256k1 ECDSA** with public-key recovery for signatures.
//! - **EIP-712** typed-data encoding, which binds a signed message to one
//!   vault on one chain.
//! - **Signed node calls**, the nonce-bound messages that authorize
//!   deposits, approvals and administration submitted through a node.
//!
//! All of it is a thin, typed layer over `k256` and `sha3`. The encodings
//! must match what Ethereum wallets produce byte for byte, so changes here
//! need a test vector.

pub mod calls;
pub mod hash;
pub mod keys;
pub mod signatures;
pub mod typed_data;

pub use calls::{CallAuthorization, NodeCall};
pub use hash::{keccak256, keccak256_concat, to_hex_prefixed};
pub use keys::{address_of, KeyError, VaultKeypair};
pub use signatures::{recover_address, verify_signer, Signature, SignatureError};
pub use typed_data::{Eip712Domain, TypedDataPayload, WithdrawAuthorization};
