use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use pasal_common::Rupee;

use crate::{
    calculation::{calculate, validate_coupon, PricedLine},
    db_types::{
        ClaimStatus,
        LedgerDirection,
        NewLedgerEntry,
        NewOrder,
        NewOrderItem,
        Order,
        OrderChanged,
        OrderStatus,
        PaymentStatus,
        SettlementClaim,
        StatusUpdate,
        TransitionSource,
        Withdrawal,
    },
    events::{EventProducers, OrderCreatedEvent, OrderTransitionEvent},
    flow_api::{coordinator, EngineConfig},
    traits::{ExpirySweepResult, OrderFlowError, PaymentGatewayDatabase, PricedItem, ReleaseSweepResult},
};

/// `OrderFlowApi` is the primary API for handling order and payment flows in response to checkout requests,
/// gateway settlement claims and admin actions.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, config: EngineConfig) -> Self {
        Self { db, producers, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Submit a new order.
    ///
    /// Prices the items, applies the coupon if it validates, and stores the order atomically. The call is
    /// idempotent by invoice number: resubmitting the same checkout returns the existing order and `false`,
    /// publishes nothing, and re-prices nothing.
    ///
    /// Customer checkouts and admin-created orders both come through here, so there is exactly one pricing
    /// code path.
    pub async fn process_new_order(
        &self,
        mut order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, bool), OrderFlowError> {
        if items.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        let mut priced = Vec::with_capacity(items.len());
        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            if item.quantity <= 0 {
                return Err(OrderFlowError::InvalidQuantity(item.quantity));
            }
            let product = self
                .db
                .fetch_product(item.product_id)
                .await?
                .ok_or(OrderFlowError::ProductNotFound(item.product_id))?;
            priced.push(PricedItem { product_id: product.id, quantity: item.quantity, unit_price: product.price });
            lines.push(PricedLine {
                unit_price: product.price,
                quantity: item.quantity,
                commission_rate_bp: product.commission_rate_bp,
            });
        }
        let subtotal: Rupee = priced.iter().map(|p| p.line_total()).sum();

        // A coupon that fails validation does not fail the order. It just does not apply.
        let coupon = match order.coupon_code.as_deref() {
            Some(code) => match self.db.fetch_coupon(code).await? {
                Some(coupon) => match validate_coupon(&coupon, subtotal, Utc::now()) {
                    Ok(()) => Some(coupon),
                    Err(reason) => {
                        warn!("🛒️ Coupon {code} rejected for invoice {}: {reason}", order.invoice);
                        order.coupon_code = None;
                        None
                    },
                },
                None => {
                    warn!("🛒️ Unknown coupon code {code} on invoice {}. Ignoring.", order.invoice);
                    order.coupon_code = None;
                    None
                },
            },
            None => None,
        };

        let totals = calculate(&lines, coupon.as_ref(), order.delivery_fee, self.config.tax_rate_percent);
        let invoice = order.invoice.clone();
        let (order, inserted) = self.db.insert_order(order, totals, &priced).await?;
        if inserted {
            debug!("🛒️ Order #{} created for invoice {invoice}, total {}", order.id, order.final_amount);
            self.call_order_created_hook(&order).await;
        } else {
            debug!("🛒️ Invoice {invoice} already exists as order #{}. Returning it unchanged.", order.id);
        }
        Ok((order, inserted))
    }

    /// Request a `(status, payment_status)` transition for the order.
    ///
    /// Legality is enforced by the backend under an exclusive transaction. On a committed, distinct change
    /// the side-effect coordinator runs, then the transition event is published. A proposal equal to the
    /// current tuple returns `Ok(None)` and publishes nothing, but the coordinator still runs: a retry
    /// after a crash between the commit and the side effects must pick up whatever was left unapplied, and
    /// the idempotency keys make the re-run free when nothing was.
    pub async fn request_transition(
        &self,
        order_id: i64,
        update: StatusUpdate,
        source: TransitionSource,
    ) -> Result<Option<OrderChanged>, OrderFlowError> {
        let Some(change) = self.db.transition_order(order_id, update, source).await? else {
            trace!("🔄️ Transition request for order #{order_id} matched current state. Re-checking side effects.");
            if let Some(order) = self.db.fetch_order_by_id(order_id).await? {
                let current = OrderChanged {
                    old_status: order.status,
                    new_status: order.status,
                    old_payment_status: order.payment_status,
                    new_payment_status: order.payment_status,
                    source,
                    order,
                };
                coordinator::run_side_effects(&self.db, &self.config, &current).await?;
            }
            return Ok(None);
        };
        info!(
            "🔄️ Order #{order_id}: {}/{} -> {}/{} ({})",
            change.old_status, change.old_payment_status, change.new_status, change.new_payment_status, source
        );
        coordinator::run_side_effects(&self.db, &self.config, &change).await?;
        self.call_order_transition_hook(&change).await;
        Ok(Some(change))
    }

    /// Reconcile an externally reported settlement claim against the order.
    ///
    /// Every claim is appended to the payment ledger first, whatever its status. Only a `Completed` claim
    /// whose amount matches the order's `final_amount` can confirm payment; `Unverified`, `Initiated` and
    /// `Pending` claims never change order state. Claims arriving after the payment already reached a
    /// terminal state are recorded and otherwise ignored.
    pub async fn apply_gateway_result(
        &self,
        order_id: i64,
        claim: SettlementClaim,
        source: TransitionSource,
    ) -> Result<Option<OrderChanged>, OrderFlowError> {
        let order = self.db.fetch_order_by_id(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        let direction = match source {
            TransitionSource::Checkout => LedgerDirection::Initiate,
            TransitionSource::Webhook => LedgerDirection::Webhook,
            _ => LedgerDirection::Verify,
        };
        self.db
            .insert_ledger_entry(NewLedgerEntry {
                order_id,
                provider: claim.provider.clone(),
                direction,
                normalized_status: claim.status.to_string(),
                trace_id: claim.reference.clone(),
            })
            .await?;

        if claim.provider != order.gateway {
            warn!(
                "⚖️ Claim from {} arrived for order #{order_id}, which was placed with {}. Recorded, not applied.",
                claim.provider, order.gateway
            );
            return Err(OrderFlowError::ProviderMismatch { expected: order.gateway, reported: claim.provider });
        }

        self.db
            .upsert_gateway_payment(
                order_id,
                &claim.provider,
                &claim.reference,
                claim.amount.unwrap_or_default(),
                &claim.status.to_string(),
                &claim.raw.to_string(),
            )
            .await?;

        let update = match claim.status {
            ClaimStatus::Completed => {
                let reported = claim.amount.unwrap_or_default();
                if reported != order.final_amount {
                    warn!(
                        "⚖️ Completed claim for order #{order_id} reports {reported} but the order total is {}. \
                         Rejected.",
                        order.final_amount
                    );
                    return Err(OrderFlowError::AmountMismatch { expected: order.final_amount, reported });
                }
                if order.payment_status != PaymentStatus::Pending {
                    debug!("⚖️ Order #{order_id} payment is already {}. Completed claim recorded only.", order.payment_status);
                    return Ok(None);
                }
                // Move a fresh order into fulfilment along with confirming payment. An order already past
                // Pending keeps its fulfilment status.
                if order.status == OrderStatus::Pending {
                    StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid)
                } else {
                    StatusUpdate::payment(PaymentStatus::Paid)
                }
            },
            ClaimStatus::Failed => {
                if order.payment_status != PaymentStatus::Pending {
                    debug!("⚖️ Order #{order_id} payment is already {}. Failed claim recorded only.", order.payment_status);
                    return Ok(None);
                }
                StatusUpdate::payment(PaymentStatus::Failed)
            },
            ClaimStatus::Cancelled => {
                if order.payment_status != PaymentStatus::Pending || order.status.is_terminal() {
                    debug!("⚖️ Order #{order_id} is already settled. Cancellation claim recorded only.");
                    return Ok(None);
                }
                StatusUpdate::both(OrderStatus::Cancelled, PaymentStatus::Failed)
            },
            ClaimStatus::Initiated | ClaimStatus::Pending => {
                trace!("⚖️ {} claim for order #{order_id} recorded.", claim.status);
                return Ok(None);
            },
            ClaimStatus::Unverified => {
                warn!("⚖️ Unverifiable claim for order #{order_id} from {}. Recorded, never applied.", claim.provider);
                return Ok(None);
            },
        };
        self.request_transition(order_id, update, source).await
    }

    /// Cancels digital-payment orders whose payment has been pending for longer than `window`.
    ///
    /// Orders on manual gateways are exempt; a COD order is allowed to sit unpaid until its doorstep
    /// handover.
    pub async fn expire_stale_pending(&self, window: Duration) -> Result<ExpirySweepResult, OrderFlowError> {
        let cutoff = Utc::now() - window;
        let stale = self.db.fetch_expirable_orders(cutoff, &self.config.manual_gateways).await?;
        if stale.is_empty() {
            trace!("⏲️ Expiry sweep found nothing to do");
            return Ok(ExpirySweepResult { cutoff: Some(cutoff), cancelled: Vec::new() });
        }
        info!("⏲️ Expiry sweep: {} orders pending since before {cutoff}", stale.len());
        let mut cancelled = Vec::with_capacity(stale.len());
        for order in stale {
            let update = StatusUpdate::both(OrderStatus::Cancelled, PaymentStatus::Failed);
            match self.request_transition(order.id, update, TransitionSource::System).await {
                Ok(Some(change)) => cancelled.push(change.order),
                Ok(None) => {},
                Err(e) => {
                    // One stuck order must not starve the rest of the sweep.
                    error!("⏲️ Failed to expire order #{}: {e}", order.id);
                },
            }
        }
        Ok(ExpirySweepResult { cutoff: Some(cutoff), cancelled })
    }

    /// Re-evaluates the seller-balance release gate for delivered, paid orders that have not released yet.
    pub async fn retry_pending_releases(&self) -> Result<ReleaseSweepResult, OrderFlowError> {
        let candidates = self.db.fetch_unreleased_orders().await?;
        let mut result = ReleaseSweepResult::default();
        for order in candidates {
            match coordinator::evaluate_release(&self.db, &self.config, &order).await? {
                coordinator::ReleaseOutcome::Released(amount) => {
                    info!("🏦️ Released {amount} to seller #{:?} for order #{}", order.seller_id, order.id);
                    result.released.push(order);
                },
                coordinator::ReleaseOutcome::Waiting => result.still_waiting += 1,
                coordinator::ReleaseOutcome::NotApplicable => {},
            }
        }
        Ok(result)
    }

    /// Debits a referral balance and records a pending withdrawal, atomically.
    pub async fn process_withdrawal(&self, user_id: i64, amount: Rupee) -> Result<Withdrawal, OrderFlowError> {
        if amount <= Rupee::default() {
            return Err(OrderFlowError::InvalidWithdrawalAmount);
        }
        let withdrawal = self.db.process_withdrawal(user_id, amount).await?;
        info!("🏦️ Withdrawal #{} of {amount} recorded for user #{user_id}", withdrawal.id);
        Ok(withdrawal)
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for producer in &self.producers.order_created_producers {
            producer.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_transition_hook(&self, change: &OrderChanged) {
        for producer in &self.producers.order_transition_producers {
            producer.publish_event(OrderTransitionEvent::from(change.clone())).await;
        }
    }
}
