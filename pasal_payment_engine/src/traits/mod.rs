//! # Storage backend contracts.
//!
//! This module defines the interface contracts the payment engine database *backends* must satisfy.
//!
//! * [`OrderManagement`] provides read-only queries for orders, items, payments, ledger history and
//!   balances.
//! * [`PaymentGatewayDatabase`] defines the mutating behaviour: atomic order insertion, guarded status
//!   transitions, the idempotent side-effect primitives the coordinator composes, ledger appends and the
//!   scheduled sweeps.
//!
//! The split matters for the trust model: webhook and polling handlers get hold of an [`crate::OrderFlowApi`]
//! which only ever mutates through [`PaymentGatewayDatabase`], so every write path goes through transition
//! validation and the idempotency keys.
mod data_objects;
mod order_management;
mod payment_gateway_database;

pub use data_objects::{ExpirySweepResult, PricedItem, ReleaseSweepResult};
pub use order_management::OrderManagement;
pub use payment_gateway_database::{OrderFlowError, PaymentGatewayDatabase};
