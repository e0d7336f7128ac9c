use std::fmt::Display;

use pasal_common::Rupee;
use pasal_gateways::PaymentAction;
use pasal_payment_engine::{
    db_types::{Order, OrderStatus, PaymentStatus},
    order_objects::CheckoutLine,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A customer checkout. The storefront resolves the cart into product ids and quantities; prices are never
/// taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: i64,
    #[serde(default)]
    pub referred_by: Option<i64>,
    #[serde(default)]
    pub seller_id: Option<i64>,
    pub items: Vec<CheckoutLine>,
    pub recipient_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub address: String,
    pub city: String,
    /// Gateway slug, e.g. "khalti", "esewa", "cod".
    pub gateway: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub delivery_fee: Rupee,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_id: i64,
    pub invoice: String,
    pub final_amount: Rupee,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// What the storefront should do next: redirect the browser, auto-submit a form, or nothing for
    /// manual gateways.
    pub payment: PaymentAction,
}

/// An admin transition request. `courier_confirmed` marks the change as coming from the delivery partner's
/// handheld, which waives the seller-release wait period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub courier_confirmed: bool,
}

/// An admin-initiated payout of a user's referral balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: i64,
    pub amount: Rupee,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusResponse {
    pub order_id: i64,
    pub invoice: String,
    pub provider: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// The provider's own vocabulary for the latest interaction, for display.
    pub provider_status: Option<String>,
}

impl PaymentStatusResponse {
    pub fn new(order: &Order, provider_status: Option<String>) -> Self {
        Self {
            order_id: order.id,
            invoice: order.invoice.clone(),
            provider: order.gateway.clone(),
            status: order.status,
            payment_status: order.payment_status,
            provider_status,
        }
    }
}
