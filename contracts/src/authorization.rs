//! # Withdrawal Authorization
//!
//! A withdrawal is authorized by a signature over
//! `WithdrawMetaTransaction { stakerAddress, amount }` under the vault's
//! EIP-712 domain. The relayer who submits the call never needs the
//! depositor's key, and cannot change the amount or the beneficiary without
//! invalidating the signature.
//!
//! Verification is a pure function: rebuild the digest, recover the signer,
//! compare with the claimed depositor.

use locked_vault_protocol::address::Address;
use locked_vault_protocol::crypto::signatures::{recover_address, Signature};
use locked_vault_protocol::crypto::typed_data::{Eip712Domain, WithdrawAuthorization};
use tracing::debug;

use crate::error::VaultError;

/// The digest a depositor signs to authorize withdrawing `amount`.
pub fn withdrawal_digest(depositor: &Address, amount: u128, domain: &Eip712Domain) -> [u8; 32] {
    WithdrawAuthorization::new(*depositor, amount).signing_digest(domain)
}

/// Checks that `signature` authorizes `claimed` to withdraw `amount` under
/// `domain`.
///
/// # Errors
///
/// [`VaultError::InvalidSignature`] when the signature is malformed,
/// malleable, unrecoverable, or recovers to any address other than
/// `claimed`.
pub fn verify(
    claimed: &Address,
    amount: u128,
    signature: &Signature,
    domain: &Eip712Domain,
) -> Result<(), VaultError> {
    let digest = withdrawal_digest(claimed, amount, domain);

    let recovered = recover_address(&digest, signature).map_err(|e| VaultError::InvalidSignature {
        claimed: *claimed,
        reason: e.to_string(),
    })?;

    if recovered != *claimed {
        debug!(%claimed, %recovered, "withdrawal signer mismatch");
        return Err(VaultError::InvalidSignature {
            claimed: *claimed,
            reason: "signer does not match depositor".to_string(),
        });
    }
    Ok(())
}
