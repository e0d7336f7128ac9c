//! Pasal Payment Engine
//!
//! The reconciliation core of the Pasal storefront. An order's financial state is fed by several partially
//! trusted, partially asynchronous sources: the customer's checkout, payment-gateway webhooks and polling
//! responses, and manual admin overrides. This crate owns the order/payment state machine, the append-only
//! payment ledger, and the idempotent side-effect coordinator that reacts to committed transitions (stock,
//! referral earnings, seller-balance release, notifications).
//!
//! The crate is divided into three main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to touch
//!    the database directly; the data types in [`mod@db_types`] are public, the table access is not.
//! 2. The engine public API ([`OrderFlowApi`]): order creation, transition requests, gateway-claim
//!    reconciliation and the scheduled sweeps. Backends implement the traits in [`mod@traits`].
//! 3. Events ([`mod@events`]): a small actor-style hook system. Committed transitions are published as
//!    events so collaborators (the notification dispatcher, mostly) can react without being able to touch
//!    order state.
pub mod calculation;
pub mod db_types;
pub mod events;
pub mod traits;

mod flow_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use flow_api::{order_objects, EngineConfig, OrderFlowApi};
pub use traits::{OrderFlowError, OrderManagement, PaymentGatewayDatabase};
