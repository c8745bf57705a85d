//! # Storage Module
//!
//! Durable state for a LockedVault node. The engine itself is an in-memory
//! state machine; this module makes it survive restarts.
//!
//! Two kinds of record are kept:
//!
//! - the latest **snapshot** of the engine (ledger, locks, owner, domain)
//!   together with the custody state it reconciles against, and
//! - an append-only **event log** of every committed operation.
//!
//! Both are written in one atomic batch per operation, so a crash can never
//! leave a snapshot that disagrees with the log.

pub mod db;

pub use db::{DbError, DbResult, VaultDb};
