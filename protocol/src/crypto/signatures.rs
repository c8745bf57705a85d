//! # Recoverable Signatures
//!
//! secp256k1 ECDSA signatures in the `(r, s, v)` form wallets hand back from
//! `eth_signTypedData`. Verification in LockedVault is *recovery*: given a
//! digest and a signature, compute the address that must have signed it,
//! then compare against the address the caller claims to act for.
//!
//! ## Strictness
//!
//! We follow the rules OpenZeppelin's `ECDSA.recover` enforces on-chain:
//!
//! 1. `v` must be 27 or 28 (0 and 1 are accepted and normalized, since some
//!    signers emit the raw recovery id).
//! 2. `s` must be in the lower half of the curve order. For every valid
//!    `(r, s, v)` there is a twin `(r, n - s, v ^ 1)` that recovers to the
//!    same key; accepting both would let anyone mint a second valid
//!    signature without the key.
//! 3. `r` and `s` must be non-zero scalars below the curve order.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::address_of;
use crate::address::Address;

/// Length of a packed `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors during signature parsing and recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("invalid signature bytes")]
    InvalidSignatureBytes,

    #[error("signature s value is not in the lower half order")]
    MalleableSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signing failed")]
    SigningFailed,
}

/// An Ethereum-style recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The `r` scalar, big-endian.
    #[serde(with = "word_hex")]
    pub r: [u8; 32],
    /// The `s` scalar, big-endian.
    #[serde(with = "word_hex")]
    pub s: [u8; 32],
    /// Recovery byte, 27 or 28.
    pub v: u8,
}

impl Signature {
    /// Splits a packed 65-byte `r || s || v` signature, the format returned
    /// by `eth_signTypedData_v4`. A `v` of 0 or 1 is lifted to 27 or 28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidSignatureBytes);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = match bytes[64] {
            v @ (0 | 1) => v + 27,
            v => v,
        };
        Ok(Self { r, s, v })
    }

    /// Parses packed hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| SignatureError::InvalidSignatureBytes)?;
        Self::from_bytes(&bytes)
    }

    /// Packs into `r || s || v`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// Packed hex with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    fn recovery_id(&self) -> Result<RecoveryId, SignatureError> {
        let raw = match self.v {
            27 | 28 => self.v - 27,
            0 | 1 => self.v,
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        };
        RecoveryId::from_byte(raw).ok_or(SignatureError::InvalidRecoveryId(self.v))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Recover the address that produced `signature` over `digest`.
///
/// # Errors
///
/// Any of the strictness rules in the module docs, or a point that does not
/// recover to a valid public key.
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address, SignatureError> {
    let recovery_id = signature.recovery_id()?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = EcdsaSignature::from_slice(&rs).map_err(|_| SignatureError::InvalidSignatureBytes)?;

    if sig.normalize_s().is_some() {
        return Err(SignatureError::MalleableSignature);
    }

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    let address = address_of(&key);
    if address.is_zero() {
        return Err(SignatureError::RecoveryFailed);
    }
    Ok(address)
}

/// Returns `true` iff `signature` over `digest` recovers to `expected`.
///
/// Parsing and recovery failures collapse to `false`; callers that need
/// the reason should use [`recover_address`].
pub fn verify_signer(digest: &[u8; 32], signature: &Signature, expected: &Address) -> bool {
    matches!(recover_address(digest, signature), Ok(addr) if addr == *expected)
}

/// Serde helper for 32-byte words as `0x` hex strings.
pub(crate) mod word_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(word: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(word)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(stripped).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "expected 32-byte word, got {} bytes",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}
