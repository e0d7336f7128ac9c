use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderChanged, OrderStatus, PaymentStatus, TransitionSource};

/// Published once per successfully inserted order. Replayed checkout requests that hit the idempotent
/// insert path do not produce a second event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published once per committed, distinct transition, after the side-effect coordinator has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransitionEvent {
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub old_payment_status: PaymentStatus,
    pub new_payment_status: PaymentStatus,
    pub source: TransitionSource,
}

impl From<OrderChanged> for OrderTransitionEvent {
    fn from(change: OrderChanged) -> Self {
        Self {
            order: change.order,
            old_status: change.old_status,
            new_status: change.new_status,
            old_payment_status: change.old_payment_status,
            new_payment_status: change.new_payment_status,
            source: change.source,
        }
    }
}

impl OrderTransitionEvent {
    pub fn is_cancellation(&self) -> bool {
        self.new_status == OrderStatus::Cancelled && self.old_status != OrderStatus::Cancelled
    }

    pub fn is_delivery(&self) -> bool {
        self.new_status == OrderStatus::Delivered && self.old_status != OrderStatus::Delivered
    }

    pub fn is_payment_confirmation(&self) -> bool {
        self.new_payment_status == PaymentStatus::Paid && self.old_payment_status != PaymentStatus::Paid
    }
}
