//! # Pasal payment server
//! The HTTP surface of the Pasal storefront's payment stack. It is responsible for:
//! * accepting checkout requests and initiating gateway payments,
//! * receiving browser returns and server-to-server webhooks from the payment providers,
//! * exposing order and payment status to customers and admins,
//! * running the background sweeps (pending-payment expiry, seller-balance release).
//!
//! ## Configuration
//! The server is configured via `PPS_`-prefixed environment variables. See [config] for the full list.
//!
//! ## Routes
//! * `GET /health`: health check, returns 200 OK.
//! * `POST /checkout`: create an order and initiate payment.
//! * `GET /payment/{provider}/success/{invoice}` and `/failure/{invoice}`: browser returns.
//! * `POST /payment/{provider}/webhook`: server-to-server provider notifications.
//! * `GET /payment/{provider}/status/{order_id}`: customer polling.
//! * `POST /admin/orders`, `GET /admin/orders/{order_id}`, `POST /admin/orders/{order_id}/status` and
//!   `POST /admin/withdrawals`: admin surface, behind the shared-secret header middleware.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
