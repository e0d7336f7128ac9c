//! Glue between the gateway adapters and the payment engine.
//!
//! Adapters speak [`pasal_gateways::GatewayResult`]; the engine speaks settlement claims. This module owns
//! the translation, works out which order an inbound payload belongs to, and funnels every claim through
//! [`pasal_payment_engine::OrderFlowApi::apply_gateway_result`] so the ledger-first discipline cannot be
//! bypassed by a route handler.
mod reconcile;

pub use reconcile::{invoice_from_result, reconcile, resolve_order, to_claim, verify_with_provider};
