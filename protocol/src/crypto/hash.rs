//! # Hashing Utilities
//!
//! Keccak-256 is the only hash function LockedVault needs. It derives
//! addresses from public keys, hashes EIP-712 type strings and structs, and
//! produces the final digest a depositor signs.
//!
//! ## Keccak-256 is not SHA3-256
//!
//! Ethereum standardized on the original Keccak submission, before NIST
//! changed the padding byte for FIPS-202. The two produce different digests
//! for the same input. We use `sha3::Keccak256`, never `sha3::Sha3_256`.

use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use locked_vault_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash the concatenation of several byte slices without allocating an
/// intermediate buffer.
///
/// Used when encoding typed structs, where the preimage is a sequence of
/// 32-byte ABI words.
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hex-encode a digest with a `0x` prefix, for logs and API responses.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_empty_input_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak_is_not_sha3() {
        // SHA3-256("") starts with a7ffc6f8. If this ever matches, someone
        // swapped the hasher.
        assert!(!hex::encode(keccak256(b"")).starts_with("a7ffc6f8"));
    }

    #[test]
    fn concat_matches_single_buffer() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let mut joined = Vec::new();
        joined.extend_from_slice(&a);
        joined.extend_from_slice(&b);
        assert_eq!(keccak256_concat(&[&a, &b]), keccak256(&joined));
    }

    #[test]
    fn eip712_domain_typehash_vector() {
        let typehash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        assert_eq!(
            hex::encode(typehash),
            "8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f"
        );
    }

    #[test]
    fn hex_prefixed_format() {
        assert_eq!(to_hex_prefixed(&[0xde, 0xad]), "0xdead");
    }
}
