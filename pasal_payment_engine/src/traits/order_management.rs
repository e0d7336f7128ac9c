use pasal_common::Rupee;

use crate::{
    db_types::{Coupon, GatewayPayment, LedgerEntry, Order, OrderItem, Product, ReferralEarning},
    traits::OrderFlowError,
};

/// Read-only queries over the payment engine database. Everything a customer-facing status page or an admin
/// dashboard needs, with no way to mutate order state.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_by_invoice(&self, invoice: &str) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderFlowError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderFlowError>;

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, OrderFlowError>;

    /// The latest gateway interaction for the order, if any payment was ever initiated.
    async fn fetch_gateway_payment(&self, order_id: i64) -> Result<Option<GatewayPayment>, OrderFlowError>;

    /// The full, append-only ledger history for the order, oldest first.
    async fn fetch_ledger_entries(&self, order_id: i64) -> Result<Vec<LedgerEntry>, OrderFlowError>;

    /// The non-cancelled referral earning for the order, if one exists. There is at most one.
    async fn fetch_earning_for_order(&self, order_id: i64) -> Result<Option<ReferralEarning>, OrderFlowError>;

    async fn referral_balance(&self, user_id: i64) -> Result<Rupee, OrderFlowError>;

    /// A seller's released balance. Computed as the sum over `seller_balance_entries`; there is no second
    /// copy of this number anywhere.
    async fn seller_balance(&self, seller_id: i64) -> Result<Rupee, OrderFlowError>;
}
