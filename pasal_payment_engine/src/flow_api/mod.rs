//! # The payment engine public API
//!
//! [`OrderFlowApi`] is the primary entry point for handling order and payment flows in response to checkout
//! requests, gateway claims (webhooks and polling) and admin actions. An instance is created by supplying a
//! database backend implementing [`crate::traits::PaymentGatewayDatabase`] plus the event producers from
//! [`crate::events::EventHandlers::producers`].
//!
//! The side-effect coordinator lives in [`mod@coordinator`]; it only ever runs on a committed, distinct
//! transition, and every rule it fires is guarded by an idempotency key in the backend.
mod config;
mod coordinator;
mod order_flow_api;
pub mod order_objects;

pub use config::EngineConfig;
pub use order_flow_api::OrderFlowApi;
