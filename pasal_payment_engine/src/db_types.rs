use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use pasal_common::Rupee;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------    OrderStatus      ---------------------------------------------------------
/// The order fulfilment lifecycle. Tracked independently of [`PaymentStatus`]: a COD order can be `Shipped`
/// while its payment is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Newly placed, nothing has happened yet.
    Pending,
    /// Payment arrived (or an admin accepted the order); fulfilment may begin.
    Confirmed,
    /// Being picked and packed.
    Processing,
    /// Handed to a courier.
    Shipped,
    /// Terminal success.
    Delivered,
    /// Terminal failure. Reachable from any non-terminal state.
    Cancelled,
}

impl OrderStatus {
    /// Position along the forward fulfilment path. `Cancelled` has no rank; it is a sideways exit.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// True for the states that mean work on the order has started (stock has been committed).
    pub fn is_in_progress(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// The payment lifecycle. `Paid` and `Failed` are terminal; `Refunded` is reachable only from `Paid` and
/// only through the explicit admin refund path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------  TransitionSource   ---------------------------------------------------------
/// Who asked for a transition. Carried on every transition event so downstream rules can depend on the
/// performer explicitly instead of inferring it from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransitionSource {
    Checkout,
    Webhook,
    Poll,
    Admin,
    Courier,
    System,
}

impl Display for TransitionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransitionSource::Checkout => "Checkout",
            TransitionSource::Webhook => "Webhook",
            TransitionSource::Poll => "Poll",
            TransitionSource::Admin => "Admin",
            TransitionSource::Courier => "Courier",
            TransitionSource::System => "System",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransitionSource {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Checkout" => Ok(Self::Checkout),
            "Webhook" => Ok(Self::Webhook),
            "Poll" => Ok(Self::Poll),
            "Admin" => Ok(Self::Admin),
            "Courier" => Ok(Self::Courier),
            "System" => Ok(Self::System),
            s => Err(ConversionError(format!("Invalid transition source: {s}"))),
        }
    }
}

//--------------------------------------    ClaimStatus      ---------------------------------------------------------
/// A gateway's normalized claim about a payment, as the engine sees it. The server's adapter layer maps
/// provider vocabulary onto this. `Unverified` marks a claim whose signature or provenance could not be
/// established; it is recorded in the ledger and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Initiated,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Unverified,
}

impl Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClaimStatus::Initiated => "initiated",
            ClaimStatus::Pending => "pending",
            ClaimStatus::Completed => "completed",
            ClaimStatus::Failed => "failed",
            ClaimStatus::Cancelled => "cancelled",
            ClaimStatus::Unverified => "unverified",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------  SettlementClaim    ---------------------------------------------------------
/// An externally reported payment status to be reconciled against internal order state. A claim is an input
/// to the state machine, never a command.
#[derive(Debug, Clone)]
pub struct SettlementClaim {
    pub provider: String,
    pub reference: String,
    pub status: ClaimStatus,
    /// The amount the provider says was paid. A completed claim whose amount does not match the order's
    /// `final_amount` is rejected.
    pub amount: Option<Rupee>,
    pub raw: serde_json::Value,
}

//--------------------------------------   LedgerDirection   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerDirection {
    Initiate,
    Verify,
    Webhook,
}

impl Display for LedgerDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerDirection::Initiate => "Initiate",
            LedgerDirection::Verify => "Verify",
            LedgerDirection::Webhook => "Webhook",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------   SideEffectKind    ---------------------------------------------------------
/// The idempotency key vocabulary of the side-effect coordinator. Each kind is applied at most once per
/// order, enforced by a UNIQUE(order_id, effect_kind) constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SideEffectKind {
    StockDecremented,
    StockRestored,
    EarningCreated,
    EarningPaid,
    EarningCancelled,
    BalanceReleased,
}

impl Display for SideEffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SideEffectKind::StockDecremented => "StockDecremented",
            SideEffectKind::StockRestored => "StockRestored",
            SideEffectKind::EarningCreated => "EarningCreated",
            SideEffectKind::EarningPaid => "EarningPaid",
            SideEffectKind::EarningCancelled => "EarningCancelled",
            SideEffectKind::BalanceReleased => "BalanceReleased",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------       Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Externally visible invoice number. Unique; providers see this as the purchase order id.
    pub invoice: String,
    pub user_id: i64,
    /// The user who referred the buyer, snapshotted at checkout. Drives the referral-earning lifecycle.
    pub referred_by: Option<i64>,
    pub seller_id: Option<i64>,
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    /// Gateway slug chosen at checkout.
    pub gateway: String,
    pub coupon_code: Option<String>,
    pub subtotal: Rupee,
    pub discount_amount: Rupee,
    pub tax_amount: Rupee,
    pub delivery_fee: Rupee,
    /// `subtotal - discount_amount + tax_amount + delivery_fee`. Immutable once computed; re-derivable by
    /// the calculation engine for verification.
    pub final_amount: Rupee,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Who performed the most recent transition.
    pub source: TransitionSource,
    pub created_by_admin: bool,
    /// Set exactly once, when the order first reaches `Delivered`.
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub invoice: String,
    pub user_id: i64,
    pub referred_by: Option<i64>,
    pub seller_id: Option<i64>,
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub gateway: String,
    pub coupon_code: Option<String>,
    pub delivery_fee: Rupee,
    pub created_by_admin: bool,
}

impl NewOrder {
    pub fn new(invoice: impl Into<String>, user_id: i64, gateway: impl Into<String>) -> Self {
        Self {
            invoice: invoice.into(),
            user_id,
            referred_by: None,
            seller_id: None,
            recipient_name: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            gateway: gateway.into(),
            coupon_code: None,
            delivery_fee: Rupee::default(),
            created_by_admin: false,
        }
    }
}

//--------------------------------------     OrderItem       ---------------------------------------------------------
/// A line on an order. `unit_price` is the price at the time of ordering and is never recomputed.
/// `stock_taken` is how many units the stock decrement actually took off the shelf, which can be fewer than
/// `quantity` when the shelf was short; a restore puts back `stock_taken`, never `quantity`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Rupee,
    pub line_total: Rupee,
    pub stock_taken: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

//--------------------------------------      Product        ---------------------------------------------------------
/// The slice of the catalog the engine needs: price for order lines, stock for the coordinator, commission
/// rate for referral earnings.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Rupee,
    pub stock: i64,
    pub seller_id: Option<i64>,
    /// Per-product referral commission in basis points. `None` falls back to the configured default.
    pub commission_rate_bp: Option<i64>,
}

//--------------------------------------   GatewayPayment    ---------------------------------------------------------
/// The latest gateway interaction per (order, provider). Overwritten on each initiation/verification; the
/// ledger retains full history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GatewayPayment {
    pub id: i64,
    pub order_id: i64,
    pub provider: String,
    pub reference: String,
    pub amount: Rupee,
    pub status: String,
    pub raw_response: String,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    LedgerEntry      ---------------------------------------------------------
/// One row per gateway interaction, append-only. Never updated or deleted; used for duplicate-delivery
/// detection and audit reconstruction.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub order_id: i64,
    pub provider: String,
    pub direction: LedgerDirection,
    pub normalized_status: String,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub order_id: i64,
    pub provider: String,
    pub direction: LedgerDirection,
    pub normalized_status: String,
    pub trace_id: String,
}

//--------------------------------------   EarningStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EarningStatus {
    Pending,
    Paid,
    Cancelled,
}

impl Display for EarningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EarningStatus::Pending => "Pending",
            EarningStatus::Paid => "Paid",
            EarningStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------  ReferralEarning    ---------------------------------------------------------
/// A referral commission accrued against an order. At most one non-cancelled earning exists per order.
#[derive(Debug, Clone, FromRow)]
pub struct ReferralEarning {
    pub id: i64,
    /// `None` for withdrawal debit rows, which are negative earnings not tied to an order.
    pub order_id: Option<i64>,
    pub user_id: i64,
    pub amount: Rupee,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Coupon         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CouponKind {
    Percent,
    Fixed,
}

#[derive(Debug, Clone, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub kind: CouponKind,
    /// Whole percent for `Percent` coupons, paisa for `Fixed` coupons.
    pub value: i64,
    /// Cap for percentage discounts.
    pub max_discount: Option<Rupee>,
    pub min_order_amount: Option<Rupee>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------    Withdrawal       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: Rupee,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    StatusUpdate     ---------------------------------------------------------
/// A proposed `(status, payment_status)` change. `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self { status: Some(status), payment_status: None }
    }

    pub fn payment(payment_status: PaymentStatus) -> Self {
        Self { status: None, payment_status: Some(payment_status) }
    }

    pub fn both(status: OrderStatus, payment_status: PaymentStatus) -> Self {
        Self { status: Some(status), payment_status: Some(payment_status) }
    }
}

//--------------------------------------    OrderChanged     ---------------------------------------------------------
/// A committed, distinct transition. Only ever constructed after the new tuple has been written; a proposal
/// that matched current state produces no `OrderChanged` at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChanged {
    /// The order as it stands after the transition.
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub old_payment_status: PaymentStatus,
    pub new_payment_status: PaymentStatus,
    pub source: TransitionSource,
}

//-------------------------------------- transition legality ---------------------------------------------------------
/// Checks whether a `(status, payment_status)` transition is legal.
///
/// | order status | rule |
/// |---|---|
/// | forward | `rank(new) > rank(old)` along Pending → Confirmed → Processing → Shipped → Delivered |
/// | cancel  | `Cancelled` from any non-terminal state |
/// | other   | forbidden (no backward moves, nothing out of a terminal state) |
///
/// | payment status | rule |
/// |---|---|
/// | `Pending → Paid` / `Pending → Failed` | allowed |
/// | `Paid → Refunded` | allowed for `Admin` source only |
/// | anything else | forbidden (no `Paid → Pending` regression) |
pub fn validate_transition(
    old_status: OrderStatus,
    old_payment: PaymentStatus,
    new_status: OrderStatus,
    new_payment: PaymentStatus,
    source: TransitionSource,
) -> Result<(), String> {
    if new_status != old_status {
        let legal = match (old_status.rank(), new_status.rank()) {
            // Forward along the fulfilment path.
            (Some(old), Some(new)) => new > old,
            // Sideways into Cancelled, from non-terminal states only.
            (Some(_), None) => !old_status.is_terminal(),
            // Nothing leaves Cancelled.
            (None, _) => false,
        };
        if !legal {
            return Err(format!("order status may not move from {old_status} to {new_status}"));
        }
    }
    if new_payment != old_payment {
        use PaymentStatus::*;
        let legal = match (old_payment, new_payment) {
            (Pending, Paid) | (Pending, Failed) => true,
            (Paid, Refunded) => source == TransitionSource::Admin,
            _ => false,
        };
        if !legal {
            return Err(format!("payment status may not move from {old_payment} to {new_payment} (source: {source})"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn forward_order_transitions_are_legal() {
        use OrderStatus::*;
        for (from, to) in
            [(Pending, Confirmed), (Pending, Processing), (Confirmed, Processing), (Processing, Shipped), (Shipped, Delivered)]
        {
            validate_transition(from, PaymentStatus::Pending, to, PaymentStatus::Pending, TransitionSource::Admin)
                .unwrap_or_else(|e| panic!("{from} -> {to} should be legal: {e}"));
        }
    }

    #[test]
    fn backward_order_transitions_are_forbidden() {
        use OrderStatus::*;
        for (from, to) in [(Shipped, Processing), (Delivered, Shipped), (Confirmed, Pending)] {
            assert!(
                validate_transition(from, PaymentStatus::Pending, to, PaymentStatus::Pending, TransitionSource::Admin)
                    .is_err(),
                "{from} -> {to} should be forbidden"
            );
        }
    }

    #[test]
    fn cancel_reachable_from_non_terminal_only() {
        use OrderStatus::*;
        for from in [Pending, Confirmed, Processing, Shipped] {
            validate_transition(from, PaymentStatus::Pending, Cancelled, PaymentStatus::Pending, TransitionSource::Poll)
                .unwrap();
        }
        assert!(validate_transition(
            Delivered,
            PaymentStatus::Paid,
            Cancelled,
            PaymentStatus::Paid,
            TransitionSource::Admin
        )
        .is_err());
        assert!(validate_transition(
            Cancelled,
            PaymentStatus::Pending,
            Pending,
            PaymentStatus::Pending,
            TransitionSource::Admin
        )
        .is_err());
    }

    #[test]
    fn paid_never_regresses_to_pending() {
        assert!(validate_transition(
            OrderStatus::Confirmed,
            PaymentStatus::Paid,
            OrderStatus::Confirmed,
            PaymentStatus::Pending,
            TransitionSource::Webhook
        )
        .is_err());
    }

    #[test]
    fn refund_is_admin_only() {
        let check = |source| {
            validate_transition(OrderStatus::Delivered, PaymentStatus::Paid, OrderStatus::Delivered, PaymentStatus::Refunded, source)
        };
        assert!(check(TransitionSource::Admin).is_ok());
        assert!(check(TransitionSource::Webhook).is_err());
        assert!(check(TransitionSource::Poll).is_err());
    }

    #[test]
    fn failed_is_terminal() {
        assert!(validate_transition(
            OrderStatus::Pending,
            PaymentStatus::Failed,
            OrderStatus::Pending,
            PaymentStatus::Paid,
            TransitionSource::Webhook
        )
        .is_err());
    }
}
