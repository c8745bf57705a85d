//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                              |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/health`              | Liveness check                           |
//! | GET    | `/status`              | Vault configuration and totals           |
//! | GET    | `/domain`              | EIP-712 domain and typed-data template   |
//! | GET    | `/accounts/:address`   | Balances, lock and next call nonce       |
//! | POST   | `/deposit`             | Stake native currency or the token       |
//! | POST   | `/withdraw`            | Relay a signed withdrawal                |
//! | POST   | `/admin/lock-duration` | Change the lock for future deposits      |
//! | POST   | `/admin/owner`         | Transfer ownership                       |
//! | POST   | `/admin/domain`        | Rebind to another chain or vault address |
//! | POST   | `/custody/mint`        | Devnet faucet                            |
//! | POST   | `/custody/approve`     | Token allowance for the vault            |
//! | GET    | `/events`              | Committed events from the durable log    |
//! | GET    | `/ws`                  | WebSocket for live committed events      |
//!
//! Every state-changing POST except the faucet and `/withdraw` carries an
//! EIP-712 signature over a nonce-bound call (see
//! [`locked_vault_protocol::crypto::calls`]). The node recovers the signer
//! and never acts on a claimed address alone: a missing or foreign
//! signature is 403 and a reused nonce is 409. `/withdraw` is authenticated
//! by the withdrawal signature the engine checks.
//!
//! Failures come back as `{ "error": kind, "code": "LVxx", "message": ... }`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use locked_vault_contracts::{
    AccountView, Asset, AssetTotals, CustodyError, EventRecord, RelockPolicy, VaultError,
};
use locked_vault_protocol::config::MAX_EVENTS_PER_PAGE;
use locked_vault_protocol::crypto::{
    to_hex_prefixed, CallAuthorization, Eip712Domain, NodeCall, Signature, TypedDataPayload,
    WithdrawAuthorization,
};
use locked_vault_protocol::Address;

use crate::service::{AuthError, ServiceError, VaultService};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network name derived from the chain id.
    pub network: String,
    /// The hosted vault.
    pub service: Arc<VaultService>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/domain", get(domain_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/deposit", post(deposit_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/admin/lock-duration", post(lock_duration_handler))
        .route("/admin/owner", post(owner_handler))
        .route("/admin/domain", post(reconfigure_handler))
        .route("/custody/mint", post(mint_handler))
        .route("/custody/approve", post(approve_handler))
        .route("/events", get(events_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /deposit`. Signed by the depositor as a `Deposit` call.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub depositor: Address,
    pub asset: Asset,
    pub amount: u128,
    pub nonce: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

impl DepositRequest {
    fn authorization(&self) -> CallAuthorization {
        let asset = match self.asset {
            Asset::Native => Address::ZERO,
            Asset::Token(token) => token,
        };
        CallAuthorization::new(
            self.depositor,
            self.nonce,
            NodeCall::Deposit {
                asset,
                amount: self.amount,
            },
        )
    }
}

/// Body of `POST /withdraw`. The withdrawal signature is the proof of
/// origin; the node relays it for `staker`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub staker: Address,
    pub asset: Asset,
    pub amount: u128,
    pub signature: Signature,
}

/// Body of `POST /admin/lock-duration`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockDurationRequest {
    pub caller: Address,
    pub lock_duration_secs: u64,
    pub nonce: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Body of `POST /admin/owner`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerRequest {
    pub caller: Address,
    pub new_owner: Address,
    pub nonce: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Body of `POST /admin/domain`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconfigureRequest {
    pub caller: Address,
    pub chain_id: u64,
    pub vault_address: Address,
    pub nonce: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Body of `POST /custody/mint`. Unauthenticated: a devnet faucet.
#[derive(Debug, Serialize, Deserialize)]
pub struct MintRequest {
    pub account: Address,
    pub asset: Asset,
    pub amount: u128,
}

/// Body of `POST /custody/approve`. Signed by the token holder.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub owner: Address,
    pub amount: u128,
    pub nonce: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Query of `GET /domain`. With both fields set, the response includes the
/// digest the depositor has to sign.
#[derive(Debug, Default, Deserialize)]
pub struct DomainQuery {
    pub staker: Option<Address>,
    /// Decimal string, so values past `u64` survive URL decoding.
    pub amount: Option<String>,
}

/// Query of `GET /events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub from: Option<u64>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub chain_id: u64,
    pub vault_address: Address,
    pub token: Address,
    pub owner: Address,
    pub trusted_forwarder: Option<Address>,
    pub lock_duration_secs: u64,
    pub relock_policy: RelockPolicy,
    pub native: AssetTotals,
    pub token_totals: AssetTotals,
    pub next_event_seq: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /domain`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DomainResponse {
    pub domain: Eip712Domain,
    pub domain_separator: String,
    pub typed_data: TypedDataPayload,
    #[serde(default)]
    pub digest: Option<String>,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub native_balance: u128,
    pub token_balance: u128,
    pub unlock_time: u64,
    pub locked: bool,
    /// Nonce the account's next signed call must carry.
    pub nonce: u64,
}

/// Response payload for the custody endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct CustodyResponse {
    pub account: Address,
    pub asset: Asset,
    pub balance: u128,
    pub allowance: u128,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    BadRequest(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Service(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for a vault error.
pub fn vault_error_status(e: &VaultError) -> StatusCode {
    match e {
        VaultError::AmountMustBePositive
        | VaultError::UnsupportedToken(_)
        | VaultError::ZeroAddress(_)
        | VaultError::ReservedAddress(_)
        | VaultError::LockDurationMustBePositive => StatusCode::BAD_REQUEST,
        VaultError::InvalidSignature { .. } => StatusCode::UNAUTHORIZED,
        VaultError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        VaultError::InsufficientBalance { .. } | VaultError::BalanceOverflow { .. } => {
            StatusCode::CONFLICT
        }
        VaultError::LockNotMatured { .. } => StatusCode::LOCKED,
        VaultError::AssetTransferFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Service(ServiceError::Vault(e)) => (
                vault_error_status(&e),
                ErrorResponse {
                    error: e.kind().to_string(),
                    code: Some(e.code().to_string()),
                    message: e.revert_reason(),
                },
            ),
            ApiError::Service(ServiceError::Custody(e)) => {
                let status = match e {
                    CustodyError::UnknownToken(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::CONFLICT,
                };
                (
                    status,
                    ErrorResponse {
                        error: "CustodyRejected".into(),
                        code: None,
                        message: e.to_string(),
                    },
                )
            }
            ApiError::Service(ServiceError::Auth(e)) => match e {
                AuthError::StaleNonce { .. } => (
                    StatusCode::CONFLICT,
                    ErrorResponse {
                        error: "StaleNonce".into(),
                        code: None,
                        message: e.to_string(),
                    },
                ),
                _ => (
                    StatusCode::FORBIDDEN,
                    ErrorResponse {
                        error: "Unauthorized".into(),
                        code: Some(e.code().to_string()),
                        message: e.to_string(),
                    },
                ),
            },
            ApiError::Service(e @ ServiceError::Storage(_)) => {
                tracing::error!("storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "StorageFailure".into(),
                        code: None,
                        message: e.to_string(),
                    },
                )
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "MalformedRequest".into(),
                    code: None,
                    message,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Query Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: vault configuration and per-asset totals.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let resp = state.service.read(|vault| {
        let domain = vault.domain();
        StatusResponse {
            version: state.version.clone(),
            network: state.network.clone(),
            chain_id: domain.chain_id,
            vault_address: domain.verifying_contract,
            token: vault.token(),
            owner: vault.owner(),
            trusted_forwarder: vault.trusted_forwarder(),
            lock_duration_secs: vault.lock_duration(),
            relock_policy: vault.relock_policy(),
            native: vault.totals(&Asset::Native),
            token_totals: vault.totals(&Asset::Token(vault.token())),
            next_event_seq: vault.next_seq(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    });
    Json(resp)
}

/// `GET /domain`: what clients sign against.
async fn domain_handler(
    State(state): State<AppState>,
    query: Result<Query<DomainQuery>, QueryRejection>,
) -> ApiResult<DomainResponse> {
    let Query(query) = query?;
    let amount = query
        .amount
        .as_deref()
        .map(str::parse::<u128>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid amount: {}", e)))?;
    let domain = state.service.read(|vault| vault.domain().clone());

    let message =
        WithdrawAuthorization::new(query.staker.unwrap_or(Address::ZERO), amount.unwrap_or(0));
    let digest = match (query.staker, amount) {
        (Some(_), Some(_)) => Some(to_hex_prefixed(&message.signing_digest(&domain))),
        _ => None,
    };

    Ok(Json(DomainResponse {
        domain_separator: to_hex_prefixed(&domain.separator()),
        typed_data: TypedDataPayload::withdrawal(&domain, &message),
        domain,
        digest,
    }))
}

/// `GET /accounts/:address`: balances, lock and next call nonce of one
/// account. Unknown accounts read as empty.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<AccountResponse> {
    let address: Address = address
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid address: {}", e)))?;
    let AccountView {
        address,
        native_balance,
        token_balance,
        unlock_time,
        locked,
    } = state.service.read(|vault| vault.account(&address));
    Ok(Json(AccountResponse {
        address,
        native_balance,
        token_balance,
        unlock_time,
        locked,
        nonce: state.service.nonce(&address),
    }))
}

/// `GET /events?from=&limit=`: committed events in sequence order.
async fn events_handler(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let Query(query) = query?;
    let from = query.from.unwrap_or(1);
    let limit = query
        .limit
        .unwrap_or(MAX_EVENTS_PER_PAGE)
        .min(MAX_EVENTS_PER_PAGE);
    Ok(Json(state.service.events_from(from, limit)?))
}

// ---------------------------------------------------------------------------
// Vault Operations
// ---------------------------------------------------------------------------

/// `POST /deposit`
async fn deposit_handler(
    State(state): State<AppState>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> ApiResult<EventRecord> {
    let Json(req) = body?;
    let auth = req.authorization();
    let record = state.service.execute_signed(
        "deposit",
        &auth,
        req.signature.as_ref(),
        |vault, ctx| match req.asset {
            Asset::Native => vault.deposit_native(ctx, req.amount),
            Asset::Token(token) => vault.deposit_token(ctx, token, req.amount),
        },
    )?;
    Ok(Json(record))
}

/// `POST /withdraw`: the relayer endpoint. Funds go to `staker`, and only
/// if the signature is theirs.
async fn withdraw_handler(
    State(state): State<AppState>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> ApiResult<EventRecord> {
    let Json(req) = body?;
    let record = state
        .service
        .execute_relayed("withdraw", req.staker, |vault, ctx| match req.asset {
            Asset::Native => vault.withdraw_native(ctx, req.amount, &req.signature),
            Asset::Token(token) => vault.withdraw_token(ctx, token, req.amount, &req.signature),
        })?;
    Ok(Json(record))
}

/// `POST /admin/lock-duration`
async fn lock_duration_handler(
    State(state): State<AppState>,
    body: Result<Json<LockDurationRequest>, JsonRejection>,
) -> ApiResult<EventRecord> {
    let Json(req) = body?;
    let auth = CallAuthorization::new(
        req.caller,
        req.nonce,
        NodeCall::SetLockDuration {
            lock_duration_secs: req.lock_duration_secs,
        },
    );
    let record = state.service.execute_signed(
        "set_lock_duration",
        &auth,
        req.signature.as_ref(),
        |vault, ctx| vault.set_lock_duration(ctx, req.lock_duration_secs),
    )?;
    Ok(Json(record))
}

/// `POST /admin/owner`
async fn owner_handler(
    State(state): State<AppState>,
    body: Result<Json<OwnerRequest>, JsonRejection>,
) -> ApiResult<EventRecord> {
    let Json(req) = body?;
    let auth = CallAuthorization::new(
        req.caller,
        req.nonce,
        NodeCall::TransferOwnership {
            new_owner: req.new_owner,
        },
    );
    let record = state.service.execute_signed(
        "transfer_ownership",
        &auth,
        req.signature.as_ref(),
        |vault, ctx| vault.transfer_ownership(ctx, req.new_owner),
    )?;
    Ok(Json(record))
}

/// `POST /admin/domain`: custody follows the vault to its new address. The
/// call is signed under the domain being replaced.
async fn reconfigure_handler(
    State(state): State<AppState>,
    body: Result<Json<ReconfigureRequest>, JsonRejection>,
) -> ApiResult<EventRecord> {
    let Json(req) = body?;
    let auth = CallAuthorization::new(
        req.caller,
        req.nonce,
        NodeCall::Reconfigure {
            chain_id: req.chain_id,
            vault_address: req.vault_address,
        },
    );
    let record = state.service.execute_signed(
        "reconfigure",
        &auth,
        req.signature.as_ref(),
        |vault, ctx| {
            let record = vault.reconfigure(ctx, req.chain_id, req.vault_address)?;
            vault.custody_mut().relocate_vault(req.vault_address);
            Ok(record)
        },
    )?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Custody
// ---------------------------------------------------------------------------

/// `POST /custody/mint`: devnet faucet.
async fn mint_handler(
    State(state): State<AppState>,
    body: Result<Json<MintRequest>, JsonRejection>,
) -> ApiResult<CustodyResponse> {
    let Json(req) = body?;
    let resp = state.service.custody(|custody| {
        let balance = custody.mint(&req.account, &req.asset, req.amount)?;
        Ok(CustodyResponse {
            account: req.account,
            asset: req.asset,
            balance,
            allowance: custody.allowance(&req.account),
        })
    })?;
    tracing::info!(account = %req.account, asset = %req.asset, amount = req.amount, "minted");
    Ok(Json(resp))
}

/// `POST /custody/approve`: sets the token allowance `owner` grants the vault.
async fn approve_handler(
    State(state): State<AppState>,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> ApiResult<CustodyResponse> {
    let Json(req) = body?;
    let auth = CallAuthorization::new(req.owner, req.nonce, NodeCall::Approve { amount: req.amount });
    let resp = state
        .service
        .custody_signed(&auth, req.signature.as_ref(), |custody, owner| {
            custody.approve(&owner, req.amount);
            let asset = Asset::Token(custody.token());
            Ok(CustodyResponse {
                account: owner,
                asset,
                balance: custody.balance_of(&owner, &asset),
                allowance: custody.allowance(&owner),
            })
        })?;
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive each committed [`EventRecord`] as JSON. The connection
/// is push-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.service.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(record) => {
                        let payload = match serde_json::to_string(&record) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Clients catch up through /events.
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
