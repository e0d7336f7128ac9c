//! Payment gateway adapters.
//!
//! Every payment provider the storefront accepts is wrapped in an adapter implementing the [`GatewayAdapter`]
//! trait. The adapter owns all provider-specific detail: request signing, initiation calls, the authoritative
//! status lookup, and webhook/return payload parsing. Whatever the provider reports is reduced to a
//! [`GatewayResult`] carrying a [`NormalizedStatus`], so nothing downstream ever sees provider vocabulary.
//!
//! Adapters are selected once, by slug, from the [`GatewayRegistry`]. Adding a provider means implementing
//! the trait and registering it; no call site grows a new branch.
mod config;
mod data_objects;
mod error;
mod esewa;
mod khalti;
mod manual;
mod registry;
mod signature;

pub use config::{EsewaConfig, GatewayConfig, KhaltiConfig};
pub use data_objects::{
    CustomerInfo,
    GatewayResult,
    InitiateRequest,
    InitiateResponse,
    NormalizedStatus,
    PaymentAction,
};
pub use error::GatewayError;
pub use esewa::EsewaApi;
pub use khalti::KhaltiApi;
pub use manual::ManualGateway;
pub use registry::GatewayRegistry;
pub use signature::{sign_fields, verify_signed_fields};

use async_trait::async_trait;

/// The contract every payment provider adapter fulfils.
///
/// `initiate` is safe to call multiple times for the same order; each call is recorded by the caller at the
/// ledger level and the most recent provider reference is the live one. `verify` asks the provider's
/// authoritative lookup endpoint and is the only path (besides a signature-valid webhook with a matching
/// amount) that may report `Completed`. `handle_webhook` parses and authenticates an inbound payload without
/// any network I/O.
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    /// The provider slug, e.g. "khalti", "esewa", "cod".
    fn slug(&self) -> &'static str;

    /// True for providers that redirect the customer to an external payment page.
    fn is_digital(&self) -> bool;

    /// Start a payment for an order with the provider. Returns the provider reference and the action the
    /// client must take (redirect, form post, or nothing for manual gateways).
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, GatewayError>;

    /// Look the payment up with the provider. This is the authoritative status source. `expected` is the
    /// order's final amount; eSewa's status API requires it, and every adapter gets it for free so the
    /// caller can cross-check the reported amount.
    async fn verify(&self, reference: &str, expected: pasal_common::Rupee) -> Result<GatewayResult, GatewayError>;

    /// Parse and authenticate a webhook or browser-return payload. Performs no network I/O; a claim that
    /// cannot be authenticated locally comes back as `NormalizedStatus::Unverified`.
    fn handle_webhook(&self, raw: &serde_json::Value) -> Result<GatewayResult, GatewayError>;
}
