//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Swap lifecycle transitions per swapper
//! - Validation failures per gate
//! - Governance votes and executed proposals
//! - Module swaps and registered chains
//! - Requests left pending

use crate::error::HotSwapError;
use crate::events::AuditEvent;
use crate::registry::ModuleSlot;
use crate::types::GateKind;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge,
    GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{info, warn};

lazy_static! {
    // Swap lifecycle
    pub static ref SWAPS_REQUESTED: CounterVec = register_counter_vec!(
        "hotswap_swaps_requested_total",
        "Total swap requests recorded",
        &["swapper"]
    ).unwrap();

    pub static ref SWAPS_EXECUTED: CounterVec = register_counter_vec!(
        "hotswap_swaps_executed_total",
        "Total swaps executed",
        &["swapper"]
    ).unwrap();

    pub static ref SWAPS_ROLLED_BACK: CounterVec = register_counter_vec!(
        "hotswap_swaps_rolled_back_total",
        "Total swaps rolled back",
        &["swapper"]
    ).unwrap();

    pub static ref REJECTIONS: CounterVec = register_counter_vec!(
        "hotswap_rejections_total",
        "Rejected operations by error kind",
        &["swapper", "kind"]
    ).unwrap();

    pub static ref VALIDATION_FAILURES: CounterVec = register_counter_vec!(
        "hotswap_validation_failures_total",
        "Proofs rejected by a validation gate",
        &["gate"]
    ).unwrap();

    pub static ref PENDING_REQUESTS: GaugeVec = register_gauge_vec!(
        "hotswap_pending_requests",
        "Requests recorded but never executed",
        &["swapper"]
    ).unwrap();

    // Governance
    pub static ref VOTES_CAST: CounterVec = register_counter_vec!(
        "hotswap_votes_cast_total",
        "Votes cast on proposals",
        &["approved"]
    ).unwrap();

    pub static ref PROPOSALS_EXECUTED: CounterVec = register_counter_vec!(
        "hotswap_proposals_executed_total",
        "Proposals that reached quorum and executed",
        &[]
    ).unwrap();

    // Modules and chains
    pub static ref MODULE_SWAPS: CounterVec = register_counter_vec!(
        "hotswap_module_swaps_total",
        "Module slot replacements",
        &["slot"]
    ).unwrap();

    pub static ref REGISTERED_CHAINS: Gauge = register_gauge!(
        "hotswap_registered_chains",
        "Chains in the cross-chain catalog"
    ).unwrap();

    // Audit
    pub static ref AUDIT_EVENTS: CounterVec = register_counter_vec!(
        "hotswap_audit_events_total",
        "Audit records appended by event type",
        &["event_type"]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "hotswap_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    encode_metrics().map_err(|e| {
        warn!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Render the default registry in the Prometheus text format
pub fn encode_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// Helper functions to record metrics

pub fn record_swap_requested(swapper: &str) {
    SWAPS_REQUESTED.with_label_values(&[swapper]).inc();
}

pub fn record_swap_executed(swapper: &str) {
    SWAPS_EXECUTED.with_label_values(&[swapper]).inc();
}

pub fn record_swap_rolled_back(swapper: &str) {
    SWAPS_ROLLED_BACK.with_label_values(&[swapper]).inc();
}

pub fn record_rejection(swapper: &str, error: &HotSwapError) {
    REJECTIONS
        .with_label_values(&[swapper, error.kind()])
        .inc();
}

pub fn record_validation_failure(gate: GateKind) {
    VALIDATION_FAILURES
        .with_label_values(&[gate.as_str()])
        .inc();
}

pub fn record_pending_requests(swapper: &str, pending: usize) {
    PENDING_REQUESTS
        .with_label_values(&[swapper])
        .set(pending as f64);
}

pub fn record_vote(approved: bool) {
    VOTES_CAST
        .with_label_values(&[if approved { "true" } else { "false" }])
        .inc();
}

pub fn record_proposal_executed() {
    PROPOSALS_EXECUTED.with_label_values(&[]).inc();
}

pub fn record_module_swap(slot: ModuleSlot) {
    MODULE_SWAPS.with_label_values(&[slot.name()]).inc();
}

pub fn set_registered_chains(count: usize) {
    REGISTERED_CHAINS.set(count as f64);
}

pub fn record_audit_event(event: &AuditEvent) {
    AUDIT_EVENTS.with_label_values(&[event.name()]).inc();
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}
