//! Webhook dispatcher for custodial payouts.
//!
//! The upstream queue POSTs signed instructions to this server; each request
//! is verified, validated against the stored chain/token configuration, and
//! turned into exactly one on-chain transfer. Every failure is answered with
//! HTTP 200 and a plain-text message so the queue never retries a request
//! that was already rejected for a structural reason. Pipeline logic lives in
//! the core [`payrail`] crate; this crate provides the HTTP server and the
//! provisioning binaries.
//!
//! # Modules
//!
//! - [`routes`] — HTTP endpoints (dispatch webhook, health, metrics)
//! - [`state`] — Shared [`AppState`](state::AppState)
//! - [`metrics`] — Prometheus metrics for dispatch operations

pub mod metrics;
pub mod routes;
pub mod state;
