//! # Prometheus Metrics
//!
//! Operational metrics for the vault node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `locked_vault` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use locked_vault_contracts::VaultEvent;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Label value for the native asset.
const NATIVE: &str = "native";
/// Label value for the supported token.
const TOKEN: &str = "token";

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared across request handlers and the vault service.
#[derive(Clone)]
pub struct VaultMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Committed deposits, by asset.
    pub deposits_total: IntCounterVec,
    /// Committed withdrawals, by asset.
    pub withdrawals_total: IntCounterVec,
    /// Committed administrative operations, by event name.
    pub admin_operations_total: IntCounterVec,
    /// Rejected operations, by `LVxx` error code.
    pub rejected_operations_total: IntCounterVec,
    /// Sum of depositor balances, by asset, in base units.
    pub total_value_locked: GaugeVec,
    /// Time spent applying and persisting one operation, by operation.
    pub operation_latency_seconds: HistogramVec,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    ///
    /// # Errors
    ///
    /// Fails only on invalid metric definitions or duplicate registration.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("locked_vault".into()), None)?;

        let deposits_total = IntCounterVec::new(
            Opts::new("deposits_total", "Total number of committed deposits"),
            &["asset"],
        )?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total = IntCounterVec::new(
            Opts::new("withdrawals_total", "Total number of committed withdrawals"),
            &["asset"],
        )?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let admin_operations_total = IntCounterVec::new(
            Opts::new(
                "admin_operations_total",
                "Total number of committed owner operations",
            ),
            &["event"],
        )?;
        registry.register(Box::new(admin_operations_total.clone()))?;

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Total number of operations refused by the vault",
            ),
            &["code"],
        )?;
        registry.register(Box::new(rejected_operations_total.clone()))?;

        let total_value_locked = GaugeVec::new(
            Opts::new(
                "total_value_locked",
                "Sum of depositor balances in base units",
            ),
            &["asset"],
        )?;
        registry.register(Box::new(total_value_locked.clone()))?;

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Time to apply and persist one vault operation in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            deposits_total,
            withdrawals_total,
            admin_operations_total,
            rejected_operations_total,
            total_value_locked,
            operation_latency_seconds,
        })
    }

    /// Counts a committed event.
    pub fn record_event(&self, event: &VaultEvent) {
        match event {
            VaultEvent::StakeNative { .. } => self.deposits_total.with_label_values(&[NATIVE]).inc(),
            VaultEvent::StakeToken { .. } => self.deposits_total.with_label_values(&[TOKEN]).inc(),
            VaultEvent::WithdrawalNative { .. } => {
                self.withdrawals_total.with_label_values(&[NATIVE]).inc()
            }
            VaultEvent::WithdrawalToken { .. } => {
                self.withdrawals_total.with_label_values(&[TOKEN]).inc()
            }
            other => self
                .admin_operations_total
                .with_label_values(&[other.name()])
                .inc(),
        }
    }

    /// Counts a refused operation.
    pub fn record_rejection(&self, code: &str) {
        self.rejected_operations_total
            .with_label_values(&[code])
            .inc();
    }

    /// Publishes current locked totals. Values above 2^53 lose precision.
    pub fn set_total_value_locked(&self, native: u128, token: u128) {
        self.total_value_locked
            .with_label_values(&[NATIVE])
            .set(native as f64);
        self.total_value_locked
            .with_label_values(&[TOKEN])
            .set(token as f64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<VaultMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
