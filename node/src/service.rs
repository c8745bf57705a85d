//! # Vault Service
//!
//! Owns the one [`LockedVault`] a node hosts and makes every call durable.
//!
//! A call holds the state mutex across the engine operation *and* the sled
//! write, so no two operations interleave and the persisted snapshot always
//! matches memory. If either fails, the engine, its custody and the nonce
//! book are rolled back to the state captured before the call; nothing is
//! broadcast.
//!
//! Calls a node makes on someone's behalf are authenticated here. The
//! account signs a [`CallAuthorization`] under the vault's current domain;
//! the service recovers the signer, checks the nonce against its book, and
//! hands the engine a context whose sender is the recovered account. A
//! nonce is consumed only when the call commits.
//!
//! Committed events go to the durable log first and to the live broadcast
//! channel second.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use locked_vault_contracts::{
    Asset, CallContext, CustodyError, EventRecord, InMemoryCustody, LockedVault, VaultError,
    VaultSnapshot,
};
use locked_vault_protocol::clock::Clock;
use locked_vault_protocol::config::CODE_UNAUTHORIZED;
use locked_vault_protocol::crypto::{recover_address, CallAuthorization, Signature};
use locked_vault_protocol::storage::{DbError, VaultDb};
use locked_vault_protocol::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::SharedMetrics;
use crate::settings::NodeSettings;

/// The vault engine the node runs.
pub type NodeVault = LockedVault<InMemoryCustody>;

/// Metrics label for calls refused over a reused or skipped nonce.
const STALE_NONCE_LABEL: &str = "stale_nonce";

/// What gets persisted after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub vault: VaultSnapshot,
    pub custody: InMemoryCustody,
    /// Next expected call nonce per signer.
    pub nonces: BTreeMap<Address, u64>,
}

/// Why a call could not be attributed to its claimed signer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("call is not signed")]
    Unsigned,

    #[error("signature does not prove {claimed}: {reason}")]
    BadSignature { claimed: Address, reason: String },

    #[error("nonce {got} for {signer} is not the expected {expected}")]
    StaleNonce {
        signer: Address,
        expected: u64,
        got: u64,
    },
}

impl AuthError {
    /// Label under which the rejection is counted.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unsigned | AuthError::BadSignature { .. } => CODE_UNAUTHORIZED,
            AuthError::StaleNonce { .. } => STALE_NONCE_LABEL,
        }
    }
}

/// Why a service call failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl ServiceError {
    fn rejection_code(&self) -> Option<&'static str> {
        match self {
            ServiceError::Vault(e) => Some(e.code()),
            ServiceError::Auth(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Everything the mutex guards.
struct NodeState {
    vault: NodeVault,
    nonces: BTreeMap<Address, u64>,
}

impl NodeState {
    fn capture(&self) -> NodeSnapshot {
        NodeSnapshot {
            vault: self.vault.snapshot(),
            custody: self.vault.custody().clone(),
            nonces: self.nonces.clone(),
        }
    }

    fn apply(&mut self, snapshot: NodeSnapshot) {
        self.vault.restore(snapshot.vault);
        *self.vault.custody_mut() = snapshot.custody;
        self.nonces = snapshot.nonces;
    }

    fn nonce(&self, signer: &Address) -> u64 {
        self.nonces.get(signer).copied().unwrap_or(0)
    }

    /// Proves `auth` came from its signer and consumes its nonce.
    fn authenticate(
        &mut self,
        auth: &CallAuthorization,
        signature: Option<&Signature>,
    ) -> Result<(), AuthError> {
        let signature = signature.ok_or(AuthError::Unsigned)?;
        let digest = auth.signing_digest(self.vault.domain());
        let recovered =
            recover_address(&digest, signature).map_err(|e| AuthError::BadSignature {
                claimed: auth.signer,
                reason: e.to_string(),
            })?;
        if recovered != auth.signer {
            return Err(AuthError::BadSignature {
                claimed: auth.signer,
                reason: format!("recovered {}", recovered),
            });
        }

        let expected = self.nonce(&auth.signer);
        if auth.nonce != expected {
            return Err(AuthError::StaleNonce {
                signer: auth.signer,
                expected,
                got: auth.nonce,
            });
        }
        self.nonces.insert(auth.signer, expected.saturating_add(1));
        Ok(())
    }

    /// The context a relayed call runs under. Through the trusted forwarder
    /// when one is configured, so the engine sees the node as a relayer.
    fn relay_context(&self, sender: Address) -> CallContext {
        match self.vault.trusted_forwarder() {
            Some(forwarder) => CallContext::forwarded(forwarder, sender),
            None => CallContext::direct(sender),
        }
    }
}

/// Serialized, persisted access to the vault.
pub struct VaultService {
    state: Mutex<NodeState>,
    db: VaultDb,
    events: broadcast::Sender<EventRecord>,
    metrics: SharedMetrics,
}

impl VaultService {
    /// Restores the vault from `db`, or deploys a fresh one from `settings`
    /// when the database is empty.
    ///
    /// # Errors
    ///
    /// Unreadable snapshot, invalid settings for a fresh deployment, or a
    /// failed initial write.
    pub fn open(
        settings: &NodeSettings,
        db: VaultDb,
        clock: Arc<dyn Clock>,
        metrics: SharedMetrics,
        events: broadcast::Sender<EventRecord>,
    ) -> Result<Self, ServiceError> {
        let state = match db.load_snapshot::<NodeSnapshot>()? {
            Some(snapshot) => {
                info!(
                    next_seq = snapshot.vault.next_seq,
                    owner = %snapshot.vault.owner,
                    "vault restored from snapshot"
                );
                if snapshot.vault.domain != settings.vault.domain() {
                    warn!(
                        persisted_chain_id = snapshot.vault.domain.chain_id,
                        configured_chain_id = settings.vault.chain_id,
                        "persisted domain differs from settings, keeping persisted domain"
                    );
                }
                NodeState {
                    vault: LockedVault::from_snapshot(snapshot.vault, snapshot.custody, clock),
                    nonces: snapshot.nonces,
                }
            }
            None => {
                let custody =
                    InMemoryCustody::new(settings.vault.vault_address, settings.vault.token);
                let state = NodeState {
                    vault: LockedVault::new(settings.vault.clone(), custody, clock)?,
                    nonces: BTreeMap::new(),
                };
                db.commit::<_, EventRecord>(&state.capture(), &[])?;
                info!("fresh vault deployed");
                state
            }
        };

        let service = Self {
            state: Mutex::new(state),
            db,
            events,
            metrics,
        };
        service.refresh_gauges(&service.state.lock().vault);
        Ok(service)
    }

    /// Runs a vault operation on behalf of the signer of `auth`.
    ///
    /// The signature must recover to `auth.signer` under the vault's current
    /// domain and `auth.nonce` must be the signer's next nonce. The
    /// operation receives the relay context for the signer.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Auth`] when the call cannot be attributed, otherwise
    /// as [`VaultService::execute_relayed`].
    pub fn execute_signed<F>(
        &self,
        operation: &str,
        auth: &CallAuthorization,
        signature: Option<&Signature>,
        op: F,
    ) -> Result<EventRecord, ServiceError>
    where
        F: FnOnce(&mut NodeVault, &CallContext) -> Result<EventRecord, VaultError>,
    {
        self.run(operation, |state| {
            state.authenticate(auth, signature)?;
            let ctx = state.relay_context(auth.signer);
            Ok(op(&mut state.vault, &ctx)?)
        })
    }

    /// Relays a call for `sender` whose payload carries its own proof of
    /// origin, such as a signed withdrawal. Nothing is checked here.
    ///
    /// # Errors
    ///
    /// The operation's own [`VaultError`], or [`ServiceError::Storage`] when
    /// the result could not be persisted (in which case it was undone).
    pub fn execute_relayed<F>(
        &self,
        operation: &str,
        sender: Address,
        op: F,
    ) -> Result<EventRecord, ServiceError>
    where
        F: FnOnce(&mut NodeVault, &CallContext) -> Result<EventRecord, VaultError>,
    {
        self.run(operation, |state| {
            let ctx = state.relay_context(sender);
            Ok(op(&mut state.vault, &ctx)?)
        })
    }

    /// Runs a custody-only operation (the faucet) and persists it. Custody
    /// operations produce no vault events.
    ///
    /// # Errors
    ///
    /// The custody error, or a storage failure (the change is undone).
    pub fn custody<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut InMemoryCustody) -> Result<T, CustodyError>,
    {
        self.run("custody", |state| Ok(op(state.vault.custody_mut())?))
    }

    /// Custody operation on behalf of the signer of `auth`, who is passed
    /// to `op`.
    ///
    /// # Errors
    ///
    /// As [`VaultService::execute_signed`] and [`VaultService::custody`].
    pub fn custody_signed<T, F>(
        &self,
        auth: &CallAuthorization,
        signature: Option<&Signature>,
        op: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut InMemoryCustody, Address) -> Result<T, CustodyError>,
    {
        self.run("custody", |state| {
            state.authenticate(auth, signature)?;
            Ok(op(state.vault.custody_mut(), auth.signer)?)
        })
    }

    /// Read-only access to the vault.
    pub fn read<R>(&self, f: impl FnOnce(&NodeVault) -> R) -> R {
        f(&self.state.lock().vault)
    }

    /// The nonce the next signed call from `signer` must carry.
    pub fn nonce(&self, signer: &Address) -> u64 {
        self.state.lock().nonce(signer)
    }

    /// Up to `limit` logged events starting at `from_seq`.
    pub fn events_from(&self, from_seq: u64, limit: usize) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self.db.events_from(from_seq, limit)?)
    }

    /// A receiver for events committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    /// Applies `op` under the lock, persists the result, then publishes the
    /// events it committed. Any failure restores the captured state.
    fn run<T, F>(&self, operation: &str, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut NodeState) -> Result<T, ServiceError>,
    {
        let started = Instant::now();
        let mut state = self.state.lock();
        let before = state.capture();

        let value = match op(&mut *state) {
            Ok(value) => value,
            Err(e) => {
                state.apply(before);
                if let Some(code) = e.rejection_code() {
                    debug!(operation, code, error = %e, "call rejected");
                    self.metrics.record_rejection(code);
                }
                return Err(e);
            }
        };

        let committed = state.vault.take_events();
        let log: Vec<(u64, EventRecord)> = committed
            .iter()
            .map(|record| (record.seq, record.clone()))
            .collect();

        if let Err(e) = self.db.commit(&state.capture(), &log) {
            error!(operation, error = %e, "failed to persist operation, rolling back");
            state.apply(before);
            return Err(e.into());
        }

        for record in &committed {
            self.metrics.record_event(&record.event);
        }
        self.refresh_gauges(&state.vault);
        drop(state);

        for record in committed {
            // No subscribers is not an error.
            let _ = self.events.send(record);
        }

        self.metrics
            .operation_latency_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
        Ok(value)
    }

    fn refresh_gauges(&self, vault: &NodeVault) {
        let native = vault.totals(&Asset::Native).locked();
        let token = vault.totals(&Asset::Token(vault.token())).locked();
        self.metrics.set_total_value_locked(native, token);
    }
}
