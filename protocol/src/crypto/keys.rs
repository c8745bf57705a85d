//! # Key Management
//!
//! secp256k1 keypairs for depositors, owners and relayers.
//!
//! The vault never needs a private key to do its job: withdrawals are
//! authorized by recovering an address from a signature. Keys show up on
//! the *client* side (the session controller that signs withdrawal
//! authorizations) and in tests. The node's `keygen`, `init` and
//! `sign-withdrawal` commands use this module.
//!
//! ## Security considerations
//!
//! - Signing uses RFC 6979 deterministic nonces (k256 does this for us),
//!   so a weak RNG at signing time cannot leak the key.
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged, and `Debug` prints only the address.

use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use thiserror::Error;

use super::signatures::{Signature, SignatureError};
use crate::address::Address;

/// Secret key length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Errors that can occur during key operations.
///
/// Deliberately vague about why key material was rejected.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid secp256k1 point")]
    InvalidPublicKey,
}

/// A secp256k1 signing keypair.
pub struct VaultKeypair {
    signing_key: SigningKey,
}

impl VaultKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from a 32-byte big-endian secret scalar.
    ///
    /// Fails for zero and for values at or above the curve order.
    pub fn from_bytes(secret_key_bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_slice(secret_key_bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Reconstruct a keypair from hex, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut arr = [0u8; SECRET_KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        Self::from_bytes(&arr)
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest, producing a recoverable `(r, s, v)` signature
    /// with `v` in Ethereum's 27/28 convention and a low `s`.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SignatureError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|_| SignatureError::SigningFailed)?;

        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(Signature {
            r,
            s,
            v: 27 + recovery_id.to_byte(),
        })
    }

    /// Exports the raw 32-byte secret scalar. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        let mut out = [0u8; SECRET_KEY_LENGTH];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// Secret key as lowercase hex with a `0x` prefix.
    pub fn secret_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret_key_bytes()))
    }
}

impl Clone for VaultKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl fmt::Debug for VaultKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKeypair(address={})", self.address())
    }
}

/// Derive the account address of a verifying key.
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let encoded = verifying_key.to_encoded_point(false);
    let mut uncompressed = [0u8; 64];
    // Skip the 0x04 SEC1 tag.
    uncompressed.copy_from_slice(&encoded.as_bytes()[1..65]);
    Address::from_public_key_bytes(&uncompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(last_byte: u8) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = last_byte;
        k
    }

    #[test]
    fn secret_key_one_has_well_known_address() {
        let kp = VaultKeypair::from_bytes(&scalar(1)).unwrap();
        assert_eq!(
            kp.address().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn from_hex_accepts_prefix() {
        let kp = VaultKeypair::from_hex(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();
        assert_eq!(
            kp.address().to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }

    #[test]
    fn zero_secret_rejected() {
        assert!(VaultKeypair::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(VaultKeypair::from_hex("0xdeadbeef").is_err());
        assert!(VaultKeypair::from_hex("not hex at all").is_err());
    }

    #[test]
    fn secret_roundtrip_preserves_address() {
        let kp = VaultKeypair::generate();
        let restored = VaultKeypair::from_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = VaultKeypair::from_bytes(&scalar(7)).unwrap();
        let dbg = format!("{:?}", kp);
        assert!(dbg.starts_with("VaultKeypair(address="));
        assert!(!dbg.contains(&hex::encode(kp.secret_key_bytes())));
    }

    #[test]
    fn sign_digest_produces_ethereum_v() {
        let kp = VaultKeypair::generate();
        let sig = kp.sign_digest(&[0x11; 32]).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
    }
}
