//! `SqliteDatabase` is a concrete implementation of a Pasal payment engine backend.
//!
//! It composes the free functions in [`super::db`] into the trait contracts, opening a transaction wherever
//! a contract promises atomicity. SQLite's single-writer model serialises the write transactions, which is
//! what makes the read-validate-write pattern in `transition_order` safe.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use pasal_common::Rupee;
use sqlx::SqlitePool;

use super::db::{coupons, db_url, earnings, new_pool, orders, payments, products, seller_balances, side_effects};
use crate::{
    calculation::OrderTotals,
    db_types::{
        Coupon,
        EarningStatus,
        GatewayPayment,
        LedgerEntry,
        NewLedgerEntry,
        NewOrder,
        Order,
        OrderChanged,
        OrderItem,
        Product,
        ReferralEarning,
        SideEffectKind,
        StatusUpdate,
        TransitionSource,
        Withdrawal,
    },
    traits::{OrderFlowError, OrderManagement, PaymentGatewayDatabase, PricedItem},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects using the `PPS_DATABASE_URL` environment variable, or the default database path.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_invoice(&self, invoice: &str) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_invoice(invoice, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(order_id, &mut conn).await?)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(coupons::fetch_coupon(code, &mut conn).await?)
    }

    async fn fetch_gateway_payment(&self, order_id: i64) -> Result<Option<GatewayPayment>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_gateway_payment(order_id, &mut conn).await?)
    }

    async fn fetch_ledger_entries(&self, order_id: i64) -> Result<Vec<LedgerEntry>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_ledger_entries(order_id, &mut conn).await?)
    }

    async fn fetch_earning_for_order(&self, order_id: i64) -> Result<Option<ReferralEarning>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::fetch_earning_for_order(order_id, &mut conn).await?)
    }

    async fn referral_balance(&self, user_id: i64) -> Result<Rupee, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::referral_balance(user_id, &mut conn).await?)
    }

    async fn seller_balance(&self, seller_id: i64) -> Result<Rupee, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(seller_balances::seller_balance(seller_id, &mut conn).await?)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(
        &self,
        order: NewOrder,
        totals: OrderTotals,
        items: &[PricedItem],
    ) -> Result<(Order, bool), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let coupon_code = order.coupon_code.clone();
        let (order, inserted) = orders::idempotent_insert(order, totals, items, &mut tx).await?;
        if inserted {
            if let Some(code) = coupon_code {
                coupons::increment_usage(&code, &mut tx).await?;
            }
        }
        tx.commit().await?;
        Ok((order, inserted))
    }

    async fn transition_order(
        &self,
        order_id: i64,
        update: StatusUpdate,
        source: TransitionSource,
    ) -> Result<Option<OrderChanged>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let change = orders::transition_order(order_id, update, source, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn insert_ledger_entry(&self, entry: NewLedgerEntry) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::insert_ledger_entry(entry, &mut conn).await?)
    }

    async fn upsert_gateway_payment(
        &self,
        order_id: i64,
        provider: &str,
        reference: &str,
        amount: Rupee,
        status: &str,
        raw_response: &str,
    ) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::upsert_gateway_payment(order_id, provider, reference, amount, status, raw_response, &mut conn)
            .await?)
    }

    async fn apply_stock_decrement(&self, order_id: i64) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        if !side_effects::try_claim(order_id, SideEffectKind::StockDecremented, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in &items {
            let taken = products::decrement_stock(item.product_id, item.quantity, &mut tx).await?;
            orders::record_stock_taken(item.id, taken, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn apply_stock_restore(&self, order_id: i64) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        // Restoring stock that was never committed would conjure inventory out of thin air.
        if !side_effects::is_applied(order_id, SideEffectKind::StockDecremented, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        if !side_effects::try_claim(order_id, SideEffectKind::StockRestored, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        // Put back exactly what the decrement took, which can be less than the ordered quantity.
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in items.iter().filter(|i| i.stock_taken > 0) {
            products::restore_stock(item.product_id, item.stock_taken, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn create_referral_earning(
        &self,
        order_id: i64,
        user_id: i64,
        amount: Rupee,
    ) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        if !side_effects::try_claim(order_id, SideEffectKind::EarningCreated, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        let earning = earnings::insert_earning(order_id, user_id, amount, &mut tx).await?;
        tx.commit().await?;
        trace!("💸️ Earning #{} of {amount} created for user #{user_id} on order #{order_id}", earning.id);
        Ok(true)
    }

    async fn mark_earning_paid(&self, order_id: i64) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let Some(earning) = earnings::fetch_earning_for_order(order_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        if !side_effects::try_claim(order_id, SideEffectKind::EarningPaid, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        earnings::set_earning_status(earning.id, EarningStatus::Paid, &mut tx).await?;
        earnings::credit_balance(earning.user_id, earning.amount, &mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn cancel_referral_earning(&self, order_id: i64) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let Some(earning) = earnings::fetch_earning_for_order(order_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        if !side_effects::try_claim(order_id, SideEffectKind::EarningCancelled, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        if earning.status == EarningStatus::Paid {
            earnings::debit_balance_floored(earning.user_id, earning.amount, &mut tx).await?;
        }
        earnings::set_earning_status(earning.id, EarningStatus::Cancelled, &mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn release_seller_balance(&self, order: &Order, amount: Rupee) -> Result<bool, OrderFlowError> {
        let Some(seller_id) = order.seller_id else {
            return Ok(false);
        };
        let mut tx = self.pool.begin().await?;
        if !side_effects::try_claim(order.id, SideEffectKind::BalanceReleased, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        let inserted = seller_balances::insert_release(order.id, seller_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_expirable_orders(
        &self,
        cutoff: DateTime<Utc>,
        manual_gateways: &[String],
    ) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_expirable_orders(cutoff, manual_gateways, &mut conn).await?)
    }

    async fn fetch_unreleased_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_unreleased_orders(&mut conn).await?)
    }

    async fn process_withdrawal(&self, user_id: i64, amount: Rupee) -> Result<Withdrawal, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        if !earnings::debit_balance_strict(user_id, amount, &mut tx).await? {
            let available = earnings::referral_balance(user_id, &mut tx).await?;
            tx.rollback().await?;
            return Err(OrderFlowError::InsufficientBalance { available, requested: amount });
        }
        let withdrawal = earnings::insert_withdrawal(user_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}
