//! Integration tests for the LockedVault engine.
//!
//! These drive the public API end to end: deposits through custody, lock
//! maturity against a manual clock, withdrawals signed with real secp256k1
//! keys and submitted directly or through a relayer.

use std::sync::Arc;

use locked_vault_contracts::authorization::withdrawal_digest;
use locked_vault_contracts::{
    Asset, AssetCustody, CallContext, InMemoryCustody, LockedVault, RelockPolicy, VaultConfig,
    VaultError, VaultEvent,
};
use locked_vault_protocol::address::Address;
use locked_vault_protocol::clock::ManualClock;
use locked_vault_protocol::crypto::keys::VaultKeypair;
use locked_vault_protocol::crypto::signatures::Signature;
use locked_vault_protocol::crypto::typed_data::Eip712Domain;

const CHAIN_ID: u64 = 31337;
const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

fn vault_address() -> Address {
    Address::new([0x5A; 20])
}

fn token_address() -> Address {
    Address::new([0x70; 20])
}

fn forwarder_address() -> Address {
    Address::new([0xF0; 20])
}

struct Harness {
    vault: LockedVault<InMemoryCustody>,
    clock: Arc<ManualClock>,
    owner: VaultKeypair,
}

/// Helper: a vault at t=0 with the given lock and a trusted forwarder.
fn harness_with(lock: u64, relock: RelockPolicy) -> Harness {
    let owner = VaultKeypair::generate();
    let clock = Arc::new(ManualClock::new(0));
    let config = VaultConfig::new(CHAIN_ID, vault_address(), token_address(), owner.address())
        .with_lock_duration(lock)
        .with_trusted_forwarder(forwarder_address())
        .with_relock_policy(relock);
    let custody = InMemoryCustody::new(vault_address(), token_address());
    let vault = LockedVault::new(config, custody, clock.clone()).unwrap();
    Harness {
        vault,
        clock,
        owner,
    }
}

fn harness(lock: u64) -> Harness {
    harness_with(lock, RelockPolicy::ResetOnDeposit)
}

impl Harness {
    fn fund_native(&mut self, who: &Address, amount: u128) {
        self.vault
            .custody_mut()
            .mint(who, &Asset::Native, amount)
            .unwrap();
    }

    fn fund_token(&mut self, who: &Address, amount: u128) {
        let custody = self.vault.custody_mut();
        custody.mint(who, &Asset::Token(token_address()), amount).unwrap();
        custody.approve(who, amount);
    }

    fn sign(&self, kp: &VaultKeypair, amount: u128) -> Signature {
        sign_under(kp, amount, self.vault.domain())
    }
}

fn sign_under(kp: &VaultKeypair, amount: u128, domain: &Eip712Domain) -> Signature {
    kp.sign_digest(&withdrawal_digest(&kp.address(), amount, domain))
        .unwrap()
}

fn direct(who: &VaultKeypair) -> CallContext {
    CallContext::direct(who.address())
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[test]
fn native_deposit_sets_balance_and_unlock_time() {
    let mut h = harness(600);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), ONE_ETHER);

    let record = h.vault.deposit_native(&direct(&alice), ONE_ETHER).unwrap();

    assert_eq!(h.vault.native_balance(&alice.address()), ONE_ETHER);
    assert_eq!(h.vault.unlock_time(&alice.address()), 600);
    assert_eq!(
        record.event,
        VaultEvent::StakeNative {
            staker: alice.address(),
            amount: ONE_ETHER,
            unlock_time: 600,
        }
    );
}

#[test]
fn two_native_deposits_accumulate() {
    let mut h = harness(600);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 2 * ONE_ETHER);

    h.vault.deposit_native(&direct(&alice), ONE_ETHER).unwrap();
    h.vault.deposit_native(&direct(&alice), ONE_ETHER).unwrap();

    assert_eq!(h.vault.native_balance(&alice.address()), 2 * ONE_ETHER);
}

#[test]
fn zero_deposits_fail_without_mutation() {
    let mut h = harness(600);
    let alice = VaultKeypair::generate();
    h.fund_token(&alice.address(), 10);
    let before = h.vault.snapshot();

    assert_eq!(
        h.vault.deposit_native(&direct(&alice), 0),
        Err(VaultError::AmountMustBePositive)
    );
    assert_eq!(
        h.vault.deposit_token(&direct(&alice), token_address(), 0),
        Err(VaultError::AmountMustBePositive)
    );
    assert_eq!(h.vault.snapshot(), before);
    assert_eq!(h.vault.unlock_time(&alice.address()), 0);
}

#[test]
fn token_deposits_accumulate_and_relock_from_latest() {
    let mut h = harness(100);
    let alice = VaultKeypair::generate();
    h.fund_token(&alice.address(), 10);

    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();
    h.clock.set(40);
    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();

    assert_eq!(h.vault.token_balance(&alice.address(), &token_address()), 10);
    assert_eq!(h.vault.unlock_time(&alice.address()), 140);
    assert_eq!(h.vault.custody().reserve(&Asset::Token(token_address())), 10);
}

#[test]
fn preserve_policy_keeps_first_lock() {
    let mut h = harness_with(100, RelockPolicy::PreserveActiveLock);
    let alice = VaultKeypair::generate();
    h.fund_token(&alice.address(), 10);

    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();
    h.clock.set(40);
    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();

    assert_eq!(h.vault.unlock_time(&alice.address()), 100);
}

#[test]
fn token_deposit_without_allowance_fails_cleanly() {
    let mut h = harness(100);
    let alice = VaultKeypair::generate();
    h.vault
        .custody_mut()
        .mint(&alice.address(), &Asset::Token(token_address()), 10)
        .unwrap();
    let before = h.vault.snapshot();

    let err = h
        .vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap_err();
    assert!(matches!(err, VaultError::AssetTransferFailed { .. }));
    assert_eq!(h.vault.snapshot(), before);
    assert!(h.vault.take_events().is_empty());
}

#[test]
fn failed_first_deposit_leaves_no_trace() {
    let mut h = harness(100);
    let alice = VaultKeypair::generate();
    let token = Asset::Token(token_address());
    let before = h.vault.snapshot();

    // Nothing minted: custody refuses both transfers.
    assert!(h.vault.deposit_native(&direct(&alice), 5).is_err());
    assert!(h
        .vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .is_err());

    assert_eq!(h.vault.snapshot(), before);
    assert_eq!(h.vault.ledger().depositor_count(&Asset::Native), 0);
    assert_eq!(h.vault.ledger().depositor_count(&token), 0);
    assert_eq!(h.vault.totals(&token).deposited, 0);
    assert_eq!(h.vault.unlock_time(&alice.address()), 0);
    assert_eq!(h.vault.next_seq(), 1);
}

#[test]
fn vault_and_zero_address_cannot_stake() {
    let mut h = harness(100);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 100);
    h.vault.deposit_native(&direct(&alice), 100).unwrap();
    let before = h.vault.snapshot();

    let as_vault = CallContext::direct(vault_address());
    let vault_via_forwarder = CallContext::forwarded(forwarder_address(), vault_address());
    for ctx in [as_vault, vault_via_forwarder] {
        assert_eq!(
            h.vault.deposit_native(&ctx, 100),
            Err(VaultError::ReservedAddress(vault_address()))
        );
    }
    assert_eq!(
        h.vault
            .deposit_token(&CallContext::direct(Address::ZERO), token_address(), 1),
        Err(VaultError::ZeroAddress("depositor"))
    );

    assert_eq!(h.vault.snapshot(), before);
    assert_eq!(h.vault.ledger().sum_balances(&Asset::Native), 100);
    assert_eq!(h.vault.custody().reserve(&Asset::Native), 100);
    assert!(h.vault.is_solvent(&Asset::Native));
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn withdrawal_matures_exactly_at_unlock_time() {
    let mut h = harness(600);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 1);
    h.vault.deposit_native(&direct(&alice), 1).unwrap();
    let sig = h.sign(&alice, 1);

    h.clock.set(599);
    assert!(matches!(
        h.vault.withdraw_native(&direct(&alice), 1, &sig),
        Err(VaultError::LockNotMatured { .. })
    ));
    assert_eq!(h.vault.native_balance(&alice.address()), 1);

    h.clock.set(600);
    h.vault.withdraw_native(&direct(&alice), 1, &sig).unwrap();
    assert_eq!(h.vault.native_balance(&alice.address()), 0);
    assert_eq!(h.vault.custody().balance_of(&alice.address(), &Asset::Native), 1);
}

#[test]
fn immature_lock_rejects_even_valid_signature_and_balance() {
    let mut h = harness(365 * 24 * 60 * 60);
    let alice = VaultKeypair::generate();
    h.fund_token(&alice.address(), 10);
    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();

    let sig = h.sign(&alice, 5);
    let err = h
        .vault
        .withdraw_token(&direct(&alice), token_address(), 5, &sig)
        .unwrap_err();
    assert_eq!(err.code(), "LV10");
}

#[test]
fn partial_token_withdrawal() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_token(&alice.address(), 10);
    h.vault
        .deposit_token(&direct(&alice), token_address(), 5)
        .unwrap();
    h.clock.set(10);

    let sig = h.sign(&alice, 2);
    h.vault
        .withdraw_token(&direct(&alice), token_address(), 2, &sig)
        .unwrap();

    let token = Asset::Token(token_address());
    assert_eq!(h.vault.token_balance(&alice.address(), &token_address()), 3);
    assert_eq!(h.vault.custody().balance_of(&alice.address(), &token), 7);
}

#[test]
fn over_balance_withdrawal_rejected() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 5);
    h.vault.deposit_native(&direct(&alice), 5).unwrap();
    h.clock.set(10);

    let sig = h.sign(&alice, 6);
    let err = h.vault.withdraw_native(&direct(&alice), 6, &sig).unwrap_err();
    assert_eq!(
        err,
        VaultError::InsufficientBalance {
            depositor: alice.address(),
            asset: Asset::Native,
            available: 5,
            requested: 6,
        }
    );
    assert_eq!(h.vault.native_balance(&alice.address()), 5);
}

#[test]
fn zero_withdrawal_rejected_before_signature_check() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    let garbage = Signature {
        r: [0; 32],
        s: [0; 32],
        v: 0,
    };
    assert_eq!(
        h.vault.withdraw_native(&direct(&alice), 0, &garbage),
        Err(VaultError::AmountMustBePositive)
    );
}

#[test]
fn signature_for_a_claimed_for_b_rejected() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    let bob = VaultKeypair::generate();
    h.fund_native(&bob.address(), 5);
    h.vault.deposit_native(&direct(&bob), 5).unwrap();
    h.clock.set(10);

    let alices_sig = h.sign(&alice, 5);
    let err = h
        .vault
        .withdraw_native(&direct(&bob), 5, &alices_sig)
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidSignature");
    assert_eq!(h.vault.native_balance(&bob.address()), 5);
}

#[test]
fn signature_for_other_domain_rejected() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 5);
    h.vault.deposit_native(&direct(&alice), 5).unwrap();
    h.clock.set(10);

    let other_chain = Eip712Domain::locked_vault(CHAIN_ID + 1, vault_address());
    let other_vault = Eip712Domain::locked_vault(CHAIN_ID, Address::new([0x5B; 20]));
    for domain in [other_chain, other_vault] {
        let sig = sign_under(&alice, 5, &domain);
        let err = h
            .vault
            .withdraw_native(&direct(&alice), 5, &sig)
            .unwrap_err();
        assert_eq!(err.code(), "LV03");
    }
}

#[test]
fn failed_payout_restores_balance() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 5);
    h.vault.deposit_native(&direct(&alice), 5).unwrap();
    h.vault.take_events();
    h.clock.set(10);

    let sig = h.sign(&alice, 5);
    h.vault.custody_mut().fail_next_transfer("out of gas");
    let before = h.vault.snapshot();
    let err = h.vault.withdraw_native(&direct(&alice), 5, &sig).unwrap_err();

    assert!(matches!(err, VaultError::AssetTransferFailed { .. }));
    assert_eq!(h.vault.snapshot(), before);
    assert!(h.vault.take_events().is_empty());
    assert_eq!(h.vault.custody().reserve(&Asset::Native), 5);
}

// ---------------------------------------------------------------------------
// Relayed calls
// ---------------------------------------------------------------------------

#[test]
fn relayer_withdraws_for_depositor_and_never_receives_funds() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 5);
    h.vault.deposit_native(&direct(&alice), 5).unwrap();
    h.clock.set(10);

    let sig = h.sign(&alice, 5);
    let relayed = CallContext::forwarded(forwarder_address(), alice.address());
    let record = h.vault.withdraw_native(&relayed, 5, &sig).unwrap();

    assert_eq!(record.event.staker(), Some(alice.address()));
    assert_eq!(h.vault.custody().balance_of(&alice.address(), &Asset::Native), 5);
    assert_eq!(
        h.vault
            .custody()
            .balance_of(&forwarder_address(), &Asset::Native),
        0
    );
}

#[test]
fn untrusted_forwarder_cannot_act_for_depositor() {
    let mut h = harness(10);
    let alice = VaultKeypair::generate();
    h.fund_native(&alice.address(), 5);
    h.vault.deposit_native(&direct(&alice), 5).unwrap();
    h.clock.set(10);

    let mallory = Address::new([0x66; 20]);
    let sig = h.sign(&alice, 5);
    let spoofed = CallContext::forwarded(mallory, alice.address());
    let err = h.vault.withdraw_native(&spoofed, 5, &sig).unwrap_err();

    // Mallory is treated as the depositor, and Alice's signature does not
    // recover to Mallory.
    assert_eq!(err.kind(), "InvalidSignature");
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn lock_duration_admin() {
    let mut h = harness(600);
    let stranger = VaultKeypair::generate();
    let owner_ctx = direct(&h.owner);

    assert!(matches!(
        h.vault.set_lock_duration(&direct(&stranger), 10),
        Err(VaultError::Unauthorized { .. })
    ));
    assert_eq!(
        h.vault.set_lock_duration(&owner_ctx, 0),
        Err(VaultError::LockDurationMustBePositive)
    );

    let record = h.vault.set_lock_duration(&owner_ctx, 30).unwrap();
    assert_eq!(
        record.event,
        VaultEvent::UnlockTimeChanged {
            previous: 600,
            current: 30
        }
    );
    assert_eq!(h.vault.lock_duration(), 30);
}

#[test]
fn owner_can_act_through_forwarder() {
    let mut h = harness(600);
    let relayed = CallContext::forwarded(forwarder_address(), h.owner.address());
    h.vault.set_lock_duration(&relayed, 60).unwrap();
    assert_eq!(h.vault.lock_duration(), 60);
}

// ---------------------------------------------------------------------------
// Conservation
// ---------------------------------------------------------------------------

#[test]
fn conservation_holds_across_a_busy_session() {
    let mut h = harness(50);
    let users: Vec<VaultKeypair> = (0..4).map(|_| VaultKeypair::generate()).collect();
    let token = Asset::Token(token_address());

    for (i, user) in users.iter().enumerate() {
        let amount = (i as u128 + 1) * 100;
        h.fund_native(&user.address(), amount);
        h.fund_token(&user.address(), amount);
        h.vault.deposit_native(&direct(user), amount).unwrap();
        h.vault
            .deposit_token(&direct(user), token_address(), amount)
            .unwrap();
    }

    h.clock.set(50);
    for user in users.iter().step_by(2) {
        let sig = h.sign(user, 50);
        h.vault.withdraw_native(&direct(user), 50, &sig).unwrap();
        h.vault
            .withdraw_token(&direct(user), token_address(), 50, &sig)
            .unwrap();
    }

    // Rejected calls in between must not move anything.
    let stranger = VaultKeypair::generate();
    assert!(h.vault.deposit_native(&direct(&stranger), 7).is_err());
    assert!(h
        .vault
        .deposit_native(&CallContext::direct(vault_address()), 7)
        .is_err());
    let greedy = h.sign(&users[0], 10_000);
    assert!(h
        .vault
        .withdraw_native(&direct(&users[0]), 10_000, &greedy)
        .is_err());
    h.vault.custody_mut().fail_next_transfer("reverted");
    let sig = h.sign(&users[1], 10);
    assert!(h
        .vault
        .withdraw_token(&direct(&users[1]), token_address(), 10, &sig)
        .is_err());

    for asset in [Asset::Native, token] {
        assert_eq!(
            h.vault.custody().reserve(&asset),
            h.vault.ledger().sum_balances(&asset)
        );
        let totals = h.vault.totals(&asset);
        assert_eq!(totals.deposited, 1000);
        assert_eq!(totals.withdrawn, 100);
        assert!(h.vault.ledger().is_conserved(&asset));
        assert_eq!(h.vault.custody().reserve(&asset), 900);
        assert!(h.vault.is_solvent(&asset));
    }
}
