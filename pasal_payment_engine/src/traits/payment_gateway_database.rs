use chrono::{DateTime, Utc};
use pasal_common::Rupee;
use thiserror::Error;

use crate::{
    calculation::{CouponInvalid, OrderTotals},
    db_types::{NewLedgerEntry, NewOrder, Order, OrderChanged, StatusUpdate, TransitionSource, Withdrawal},
    traits::{data_objects::PricedItem, OrderManagement},
};

/// The mutating contract a backend must satisfy to support the payment engine.
///
/// The contract is built around two disciplines:
/// * every status change goes through [`transition_order`](Self::transition_order), which validates
///   legality under an exclusive transaction and reports whether anything actually changed;
/// * every side effect of a transition is an *apply* method guarded by an `(order_id, effect_kind)`
///   idempotency key, returning `true` only the first time it fires. Replayed webhooks and concurrent
///   sweeps therefore cannot double-apply anything.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the order, its items, and the computed totals in a single atomic transaction, and bumps the
    /// coupon's usage count if one was applied. Idempotent by invoice number.
    ///
    /// Returns the order record and `true` if it was inserted, or the existing record and `false` if an
    /// order with this invoice already existed.
    async fn insert_order(
        &self,
        order: NewOrder,
        totals: OrderTotals,
        items: &[PricedItem],
    ) -> Result<(Order, bool), OrderFlowError>;

    /// Applies a `(status, payment_status)` change to the order under an exclusive transaction.
    ///
    /// * If the proposed tuple equals the current tuple, nothing is written and `Ok(None)` is returned.
    /// * If the change is illegal, `Err(OrderFlowError::InvalidTransition)` is returned and nothing is
    ///   written.
    /// * Otherwise the new tuple, the source and `updated_at` are written, `delivered_at` is set if the
    ///   order is entering `Delivered` for the first time, and the committed change is returned.
    async fn transition_order(
        &self,
        order_id: i64,
        update: StatusUpdate,
        source: TransitionSource,
    ) -> Result<Option<OrderChanged>, OrderFlowError>;

    /// Appends one row to the payment ledger. The ledger is append-only; this is the only write it sees.
    async fn insert_ledger_entry(&self, entry: NewLedgerEntry) -> Result<(), OrderFlowError>;

    /// Records the latest gateway interaction for `(order, provider)`, replacing any earlier one.
    async fn upsert_gateway_payment(
        &self,
        order_id: i64,
        provider: &str,
        reference: &str,
        amount: Rupee,
        status: &str,
        raw_response: &str,
    ) -> Result<(), OrderFlowError>;

    /// Decrements stock for every line on the order, flooring at zero. Guarded by `StockDecremented`;
    /// returns `true` only on first application.
    async fn apply_stock_decrement(&self, order_id: i64) -> Result<bool, OrderFlowError>;

    /// Restores stock for every line on the order. Applies only if `StockDecremented` fired earlier and
    /// `StockRestored` has not; an order's stock is restored at most once, and never without having been
    /// decremented.
    async fn apply_stock_restore(&self, order_id: i64) -> Result<bool, OrderFlowError>;

    /// Creates a pending referral earning of `amount` for `user_id` against the order. Guarded by
    /// `EarningCreated`.
    async fn create_referral_earning(&self, order_id: i64, user_id: i64, amount: Rupee) -> Result<bool, OrderFlowError>;

    /// Marks the order's earning as paid and credits the referrer's balance, atomically. Guarded by
    /// `EarningPaid`; a no-op if the order has no earning.
    async fn mark_earning_paid(&self, order_id: i64) -> Result<bool, OrderFlowError>;

    /// Cancels the order's earning. If the earning had already been paid out, the referrer's balance is
    /// debited by the same amount (floor zero), atomically. Guarded by `EarningCancelled`.
    async fn cancel_referral_earning(&self, order_id: i64) -> Result<bool, OrderFlowError>;

    /// Inserts the seller-balance release row for the order. Guarded by `BalanceReleased` and a UNIQUE
    /// constraint on `order_id`; returns `true` only on first application.
    async fn release_seller_balance(&self, order: &Order, amount: Rupee) -> Result<bool, OrderFlowError>;

    /// Fetches orders on a digital gateway whose payment has been pending since before `cutoff`. Orders on
    /// the listed manual gateways never expire.
    async fn fetch_expirable_orders(
        &self,
        cutoff: DateTime<Utc>,
        manual_gateways: &[String],
    ) -> Result<Vec<Order>, OrderFlowError>;

    /// Fetches delivered, paid orders with a seller that have no `seller_balance_entries` row yet. Input to
    /// the release retry sweep.
    async fn fetch_unreleased_orders(&self) -> Result<Vec<Order>, OrderFlowError>;

    /// Debits `amount` from the user's referral balance and records a pending withdrawal, in one
    /// transaction. Fails without writing anything if the balance is insufficient.
    async fn process_withdrawal(&self, user_id: i64, amount: Rupee) -> Result<Withdrawal, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("No order exists with invoice {0}")]
    InvoiceNotFound(String),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Item quantities must be positive, got {0}")]
    InvalidQuantity(i64),
    #[error("Illegal status transition. {0}")]
    InvalidTransition(String),
    #[error("Coupon rejected. {0}")]
    CouponInvalid(#[from] CouponInvalid),
    #[error("Reported amount {reported} does not match the order total {expected}")]
    AmountMismatch { expected: Rupee, reported: Rupee },
    #[error("Gateway result for provider {reported} arrived for an order placed with {expected}")]
    ProviderMismatch { expected: String, reported: String },
    #[error("Insufficient referral balance: {available} available, {requested} requested")]
    InsufficientBalance { available: Rupee, requested: Rupee },
    #[error("Withdrawal amounts must be positive")]
    InvalidWithdrawalAmount,
    #[error("Mandatory side effect failed for order {order_id}: {reason}")]
    SideEffectFailed { order_id: i64, reason: String },
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
