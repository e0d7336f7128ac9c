use chrono::{DateTime, Utc};
use pasal_common::Rupee;
use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// An order line with its price already resolved from the catalog. The flow API builds these before handing
/// them to the backend, so inserts never re-read product prices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricedItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Rupee,
}

impl PricedItem {
    pub fn line_total(&self) -> Rupee {
        self.unit_price * self.quantity
    }
}

/// The outcome of a pending-payment expiry sweep.
#[derive(Debug, Clone, Default)]
pub struct ExpirySweepResult {
    pub cutoff: Option<DateTime<Utc>>,
    /// Orders that were cancelled by this sweep.
    pub cancelled: Vec<Order>,
}

impl ExpirySweepResult {
    pub fn count(&self) -> usize {
        self.cancelled.len()
    }
}

/// The outcome of a seller-balance release sweep.
#[derive(Debug, Clone, Default)]
pub struct ReleaseSweepResult {
    /// Orders whose seller balance was released by this sweep.
    pub released: Vec<Order>,
    /// Orders evaluated but still inside the wait period or otherwise ineligible.
    pub still_waiting: usize,
}
