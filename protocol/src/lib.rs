// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # LockedVault Protocol: Core Primitives
//!
//! The building blocks the vault engine and the node share: account
//! addresses, Keccak-256, secp256k1 keys and recoverable signatures, the
//! EIP-712 encoding of withdrawal authorizations, a clock abstraction, and
//! a sled-backed store for snapshots and the event log.
//!
//! ## Modules
//!
//! - **address**: 20-byte account addresses with EIP-55 display.
//! - **crypto**: hashing, keys, signature recovery, typed data.
//! - **clock**: where "now" comes from. Wall time in production, a hand
//!   cranked clock in tests.
//! - **storage**: durable snapshots and an append-only event log.
//! - **config**: protocol constants: domain name, error codes, defaults.
//!
//! Nothing in this crate knows what a balance is. That lives in
//! `locked-vault-contracts`.

pub mod address;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod storage;

pub use address::Address;
pub use clock::{Clock, ManualClock, SystemClock};
