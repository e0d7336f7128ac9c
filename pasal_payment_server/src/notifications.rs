//! Notification dispatch.
//!
//! The engine publishes events for committed order changes; this module subscribes to them and tells the
//! outside world. Delivery is currently the structured log (operators tail it and the storefront scrapes
//! it in development); the dispatcher is the single place a mail or SMS sender would slot in.

use log::*;
use pasal_payment_engine::events::{EventHooks, OrderCreatedEvent, OrderTransitionEvent};

/// Builds the hook set the engine's event handlers are started with.
pub fn create_notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|event| Box::pin(async move { notify_order_created(event) }));
    hooks.on_order_transition(|event| Box::pin(async move { notify_order_transition(event) }));
    hooks
}

fn notify_order_created(event: OrderCreatedEvent) {
    let order = &event.order;
    info!(
        "📝️ Order #{} placed. Invoice {}, {} via {}, for user #{}",
        order.id, order.invoice, order.final_amount, order.gateway, order.user_id
    );
}

fn notify_order_transition(event: OrderTransitionEvent) {
    let order = &event.order;
    if event.is_payment_confirmation() {
        info!("📝️ Payment of {} confirmed for order #{} (invoice {})", order.final_amount, order.id, order.invoice);
    }
    if event.is_cancellation() {
        info!("📝️ Order #{} (invoice {}) was cancelled by {}", order.id, order.invoice, event.source);
    }
    if event.is_delivery() {
        info!("📝️ Order #{} (invoice {}) was delivered", order.id, order.invoice);
    }
}
