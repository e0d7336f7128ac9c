//! View objects assembled from multiple tables for API consumers.
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{GatewayPayment, LedgerEntry, Order, OrderItem},
    traits::{OrderFlowError, OrderManagement},
};

/// Everything a status page needs about one order: the order row, its lines, the latest gateway
/// interaction and the full ledger history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<GatewayPayment>,
    pub ledger: Vec<LedgerEntry>,
}

impl OrderSnapshot {
    pub async fn assemble<B: OrderManagement>(db: &B, order: Order) -> Result<Self, OrderFlowError> {
        let items = db.fetch_order_items(order.id).await?;
        let payment = db.fetch_gateway_payment(order.id).await?;
        let ledger = db.fetch_ledger_entries(order.id).await?;
        Ok(Self { order, items, payment, ledger })
    }
}

/// One line of a checkout request, before pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: i64,
    pub quantity: i64,
}
