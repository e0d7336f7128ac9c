//! The side-effect coordinator.
//!
//! Runs once per committed, distinct transition and translates it into the effects the rest of the shop
//! depends on: stock movement, the referral-earning lifecycle and the seller-balance release. The engine
//! trusts the idempotency keys in the backend, not its own call pattern, so a replayed webhook that somehow
//! produces a second identical call here still mutates nothing.
//!
//! | trigger | effects |
//! |---|---|
//! | first entry into in-progress, or payment confirmed | stock decrement, pending referral earning |
//! | cancelled | stock restore (only if decremented), earning cancelled |
//! | payment refunded | earning cancelled (balance debited if it was paid out) |
//! | delivered | earning paid + referrer balance credit |
//! | delivered and paid | seller-balance release, once the wait gate passes |
use chrono::Utc;
use log::*;
use pasal_common::Rupee;

use crate::{
    calculation::{commission_for_items, PricedLine},
    db_types::{Order, OrderChanged, OrderStatus, PaymentStatus, TransitionSource},
    flow_api::EngineConfig,
    traits::{OrderFlowError, PaymentGatewayDatabase},
};

pub async fn run_side_effects<B: PaymentGatewayDatabase>(
    db: &B,
    config: &EngineConfig,
    change: &OrderChanged,
) -> Result<(), OrderFlowError> {
    let order = &change.order;
    let oid = order.id;

    let entered_in_progress = order.status.is_in_progress() || order.payment_status == PaymentStatus::Paid;
    if entered_in_progress && order.status != OrderStatus::Cancelled {
        if db.apply_stock_decrement(oid).await? {
            debug!("🧩️ Stock decremented for order #{oid}");
        }
        if let Some(referrer) = order.referred_by {
            let commission = order_commission(db, config, oid).await?;
            if !commission.is_zero() && db.create_referral_earning(oid, referrer, commission).await? {
                debug!("🧩️ Pending referral earning of {commission} created for user #{referrer} on order #{oid}");
            }
        }
    }

    if change.new_status == OrderStatus::Cancelled {
        if db.apply_stock_restore(oid).await? {
            debug!("🧩️ Stock restored for cancelled order #{oid}");
        }
        if db.cancel_referral_earning(oid).await? {
            debug!("🧩️ Referral earning cancelled for order #{oid}");
        }
    }

    if change.new_payment_status == PaymentStatus::Refunded && db.cancel_referral_earning(oid).await? {
        debug!("🧩️ Referral earning reversed for refunded order #{oid}");
    }

    if change.new_status == OrderStatus::Delivered && db.mark_earning_paid(oid).await? {
        debug!("🧩️ Referral earning paid out for delivered order #{oid}");
    }

    if order.status == OrderStatus::Delivered && order.payment_status == PaymentStatus::Paid {
        match evaluate_release(db, config, order).await? {
            ReleaseOutcome::Released(amount) => {
                info!("🧩️ Seller balance of {amount} released for order #{oid}");
            },
            ReleaseOutcome::Waiting => {
                debug!("🧩️ Seller release for order #{oid} still inside the wait period. The sweep will retry.");
            },
            ReleaseOutcome::NotApplicable => {},
        }
    }

    Ok(())
}

pub enum ReleaseOutcome {
    Released(Rupee),
    Waiting,
    NotApplicable,
}

/// Applies the seller-balance release gate to a delivered, paid order.
///
/// The wait period runs from `delivered_at` and is waived when the delivery was confirmed by the courier.
/// The released amount is the merchandise value, `subtotal - discount`; tax and the delivery fee are not
/// the seller's money.
pub async fn evaluate_release<B: PaymentGatewayDatabase>(
    db: &B,
    config: &EngineConfig,
    order: &Order,
) -> Result<ReleaseOutcome, OrderFlowError> {
    if order.seller_id.is_none()
        || order.status != OrderStatus::Delivered
        || order.payment_status != PaymentStatus::Paid
    {
        return Ok(ReleaseOutcome::NotApplicable);
    }
    let Some(delivered_at) = order.delivered_at else {
        warn!("🧩️ Order #{} is Delivered but has no delivered_at timestamp. Skipping release.", order.id);
        return Ok(ReleaseOutcome::NotApplicable);
    };
    let courier_confirmed = order.source == TransitionSource::Courier;
    if !courier_confirmed && Utc::now() < delivered_at + config.seller_release_wait {
        return Ok(ReleaseOutcome::Waiting);
    }
    let amount = order.subtotal - order.discount_amount;
    if db.release_seller_balance(order, amount).await? {
        Ok(ReleaseOutcome::Released(amount))
    } else {
        Ok(ReleaseOutcome::NotApplicable)
    }
}

/// Total referral commission for an order, from its stored line totals and each product's commission rate.
async fn order_commission<B: PaymentGatewayDatabase>(
    db: &B,
    config: &EngineConfig,
    order_id: i64,
) -> Result<Rupee, OrderFlowError> {
    let items = db.fetch_order_items(order_id).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let rate = match db.fetch_product(item.product_id).await? {
            Some(product) => product.commission_rate_bp,
            None => None,
        };
        lines.push(PricedLine { unit_price: item.unit_price, quantity: item.quantity, commission_rate_bp: rate });
    }
    Ok(commission_for_items(&lines, config.default_commission_bp))
}
