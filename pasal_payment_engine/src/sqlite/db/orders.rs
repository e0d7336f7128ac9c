use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    calculation::OrderTotals,
    db_types::{validate_transition, NewOrder, Order, OrderChanged, OrderItem, StatusUpdate, TransitionSource},
    traits::{OrderFlowError, PricedItem},
};

/// Inserts the order and its items, returning `false` in the second tuple slot if an order with this
/// invoice already exists. Not atomic on its own; the caller wraps it in a transaction together with the
/// coupon usage bump.
pub async fn idempotent_insert(
    order: NewOrder,
    totals: OrderTotals,
    items: &[PricedItem],
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderFlowError> {
    if let Some(existing) = fetch_order_by_invoice(&order.invoice, conn).await? {
        return Ok((existing, false));
    }
    let order = insert_order(order, totals, conn).await?;
    for item in items {
        insert_order_item(order.id, item, conn).await?;
    }
    debug!("📝️ Order inserted with id {} for invoice {}", order.id, order.invoice);
    Ok((order, true))
}

async fn insert_order(
    order: NewOrder,
    totals: OrderTotals,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let source = if order.created_by_admin { TransitionSource::Admin } else { TransitionSource::Checkout };
    let now = Utc::now();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                invoice, user_id, referred_by, seller_id,
                recipient_name, phone, address, city,
                gateway, coupon_code,
                subtotal, discount_amount, tax_amount, delivery_fee, final_amount,
                source, created_by_admin, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            RETURNING *;
        "#,
    )
    .bind(order.invoice)
    .bind(order.user_id)
    .bind(order.referred_by)
    .bind(order.seller_id)
    .bind(order.recipient_name)
    .bind(order.phone)
    .bind(order.address)
    .bind(order.city)
    .bind(order.gateway)
    .bind(order.coupon_code)
    .bind(totals.subtotal)
    .bind(totals.discount_amount)
    .bind(totals.tax_amount)
    .bind(totals.delivery_fee)
    .bind(totals.final_amount)
    .bind(source)
    .bind(order.created_by_admin)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

async fn insert_order_item(
    order_id: i64,
    item: &PricedItem,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    sqlx::query(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.line_total())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_invoice(invoice: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE invoice = $1").bind(invoice).fetch_optional(conn).await
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// Records how many units the stock decrement actually took for this line.
pub async fn record_stock_taken(item_id: i64, taken: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE order_items SET stock_taken = $1 WHERE id = $2")
        .bind(taken)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Applies a status transition inside the caller's transaction.
///
/// Reads the current tuple, validates the proposal, and writes the new tuple together with `source` and
/// `updated_at`. `delivered_at` is set when the order enters `Delivered` and it was not set before; it is
/// never overwritten. Returns `None` when the proposal matches the current tuple exactly.
pub async fn transition_order(
    order_id: i64,
    update: StatusUpdate,
    source: TransitionSource,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderChanged>, OrderFlowError> {
    let order =
        fetch_order_by_id(order_id, conn).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
    let new_status = update.status.unwrap_or(order.status);
    let new_payment = update.payment_status.unwrap_or(order.payment_status);
    if new_status == order.status && new_payment == order.payment_status {
        return Ok(None);
    }
    validate_transition(order.status, order.payment_status, new_status, new_payment, source)
        .map_err(OrderFlowError::InvalidTransition)?;
    let now = Utc::now();
    let updated: Order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                payment_status = $2,
                source = $3,
                updated_at = $4,
                delivered_at = CASE
                    WHEN $1 = 'Delivered' AND delivered_at IS NULL THEN $4
                    ELSE delivered_at
                END
            WHERE id = $5 AND status = $6 AND payment_status = $7
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(new_payment)
    .bind(source)
    .bind(now)
    .bind(order_id)
    .bind(order.status)
    .bind(order.payment_status)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        OrderFlowError::InvalidTransition(format!("order #{order_id} was modified concurrently. Retry the request."))
    })?;
    Ok(Some(OrderChanged {
        old_status: order.status,
        new_status,
        old_payment_status: order.payment_status,
        new_payment_status: new_payment,
        source,
        order: updated,
    }))
}

/// Orders on a digital gateway whose payment has been pending since before `cutoff`.
pub async fn fetch_expirable_orders(
    cutoff: DateTime<Utc>,
    manual_gateways: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
            SELECT * FROM orders
            WHERE payment_status = 'Pending'
              AND status NOT IN ('Cancelled', 'Delivered')
              AND created_at <
        "#,
    );
    builder.push_bind(cutoff);
    if !manual_gateways.is_empty() {
        builder.push(" AND gateway NOT IN (");
        let mut list = builder.separated(", ");
        for slug in manual_gateways {
            list.push_bind(slug);
        }
        builder.push(")");
    }
    builder.push(" ORDER BY created_at");
    builder.build_query_as().fetch_all(conn).await
}

/// Delivered, paid orders with a seller that have not had their balance released yet.
pub async fn fetch_unreleased_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT o.* FROM orders o
            WHERE o.status = 'Delivered'
              AND o.payment_status = 'Paid'
              AND o.seller_id IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM seller_balance_entries s WHERE s.order_id = o.id)
            ORDER BY o.delivered_at
        "#,
    )
    .fetch_all(conn)
    .await
}
