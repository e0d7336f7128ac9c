//! The order calculation engine.
//!
//! Everything in this module is pure: amounts in, amounts out, no clock and no database. The same code path
//! prices customer checkouts and admin-created orders, so the two can never drift apart.
//!
//! Order of operations is fixed: discount applies to the item subtotal, tax applies to the discounted
//! subtotal, and the delivery fee is added last, untaxed.

use chrono::{DateTime, Utc};
use log::warn;
use pasal_common::Rupee;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Coupon, CouponKind};

/// Referral commission rates above this are treated as data-entry errors.
pub const MAX_COMMISSION_BP: i64 = 5_000;

/// A priced order line, the unit the calculation engine works in.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine {
    pub unit_price: Rupee,
    pub quantity: i64,
    /// Per-product referral commission in basis points, if the product sets one.
    pub commission_rate_bp: Option<i64>,
}

impl PricedLine {
    pub fn line_total(&self) -> Rupee {
        self.unit_price * self.quantity
    }
}

/// The complete financial breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Rupee,
    pub discount_amount: Rupee,
    pub tax_amount: Rupee,
    pub delivery_fee: Rupee,
    pub final_amount: Rupee,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponInvalid {
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit has been reached")]
    UsageLimitReached,
    #[error("Order subtotal {subtotal} is below the coupon minimum of {minimum}")]
    BelowMinimum { subtotal: Rupee, minimum: Rupee },
}

/// Checks a coupon's preconditions against an order subtotal. A coupon that fails validation simply does
/// not apply; the order proceeds with zero discount.
pub fn validate_coupon(coupon: &Coupon, subtotal: Rupee, now: DateTime<Utc>) -> Result<(), CouponInvalid> {
    if let Some(expires_at) = coupon.expires_at {
        if now >= expires_at {
            return Err(CouponInvalid::Expired);
        }
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(CouponInvalid::UsageLimitReached);
        }
    }
    if let Some(minimum) = coupon.min_order_amount {
        if subtotal < minimum {
            return Err(CouponInvalid::BelowMinimum { subtotal, minimum });
        }
    }
    Ok(())
}

/// The discount a (pre-validated) coupon grants on a subtotal. Percentage discounts are capped by the
/// coupon's `max_discount`; no discount ever exceeds the subtotal itself.
pub fn coupon_discount(coupon: &Coupon, subtotal: Rupee) -> Rupee {
    let discount = match coupon.kind {
        CouponKind::Percent => {
            let raw = subtotal.percent(coupon.value.max(0) as u32);
            match coupon.max_discount {
                Some(cap) if raw > cap => cap,
                _ => raw,
            }
        }
        CouponKind::Fixed => Rupee::from(coupon.value.max(0)),
    };
    discount.min(subtotal)
}

/// Prices an order.
///
/// `coupon`, if given, must already have passed [`validate_coupon`]. `tax_rate_percent` is a whole
/// percentage (13 for Nepal VAT).
pub fn calculate(items: &[PricedLine], coupon: Option<&Coupon>, delivery_fee: Rupee, tax_rate_percent: u32) -> OrderTotals {
    let subtotal: Rupee = items.iter().map(|line| line.line_total()).sum();
    let discount_amount = coupon.map(|c| coupon_discount(c, subtotal)).unwrap_or_default();
    let tax_amount = (subtotal - discount_amount).percent(tax_rate_percent);
    let final_amount = subtotal - discount_amount + tax_amount + delivery_fee;
    OrderTotals { subtotal, discount_amount, tax_amount, delivery_fee, final_amount }
}

/// Total referral commission for an order's lines. Each line uses its own rate when one is set, otherwise
/// `default_rate_bp`. Rates outside 0..=50% are ignored in favour of the default.
pub fn commission_for_items(items: &[PricedLine], default_rate_bp: i64) -> Rupee {
    let default_rate_bp = default_rate_bp.clamp(0, MAX_COMMISSION_BP);
    items
        .iter()
        .map(|line| {
            let rate = match line.commission_rate_bp {
                Some(bp) if (0..=MAX_COMMISSION_BP).contains(&bp) => bp,
                Some(bp) => {
                    warn!("🧮️ Ignoring out-of-range commission rate {bp}bp, using default {default_rate_bp}bp");
                    default_rate_bp
                }
                None => default_rate_bp,
            };
            line.line_total().basis_points(rate as u32)
        })
        .sum()
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn line(price_rupees: i64, quantity: i64) -> PricedLine {
        PricedLine { unit_price: Rupee::from_rupees(price_rupees), quantity, commission_rate_bp: None }
    }

    fn percent_coupon(value: i64, max_discount: Option<Rupee>) -> Coupon {
        Coupon {
            id: 1,
            code: "TEST".into(),
            kind: CouponKind::Percent,
            value,
            max_discount,
            min_order_amount: None,
            usage_limit: None,
            used_count: 0,
            expires_at: None,
        }
    }

    #[test]
    fn cod_order_with_delivery_fee() {
        // 1000 subtotal, 150 delivery, 13% tax, no discount.
        let totals = calculate(&[line(1000, 1)], None, Rupee::from_rupees(150), 13);
        assert_eq!(totals.subtotal, Rupee::from_rupees(1000));
        assert_eq!(totals.discount_amount, Rupee::default());
        assert_eq!(totals.tax_amount, Rupee::from_rupees(130));
        assert_eq!(totals.final_amount, Rupee::from_rupees(1280));
    }

    #[test]
    fn percent_discount_is_capped_and_tax_follows() {
        // 20% of 1000 would be 200, capped at 100. Tax is 13% of 900.
        let coupon = percent_coupon(20, Some(Rupee::from_rupees(100)));
        let totals = calculate(&[line(500, 2)], Some(&coupon), Rupee::default(), 13);
        assert_eq!(totals.discount_amount, Rupee::from_rupees(100));
        assert_eq!(totals.tax_amount, Rupee::from_rupees(117));
        assert_eq!(totals.final_amount, Rupee::from_rupees(1017));
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let coupon = Coupon {
            kind: CouponKind::Fixed,
            value: Rupee::from_rupees(500).value(),
            ..percent_coupon(0, None)
        };
        let totals = calculate(&[line(300, 1)], Some(&coupon), Rupee::default(), 13);
        assert_eq!(totals.discount_amount, Rupee::from_rupees(300));
        assert_eq!(totals.tax_amount, Rupee::default());
        assert_eq!(totals.final_amount, Rupee::default());
    }

    #[test]
    fn final_amount_identity_holds() {
        let coupon = percent_coupon(10, None);
        let totals = calculate(&[line(799, 3), line(120, 2)], Some(&coupon), Rupee::from_rupees(100), 13);
        assert_eq!(
            totals.final_amount,
            totals.subtotal - totals.discount_amount + totals.tax_amount + totals.delivery_fee
        );
    }

    #[test]
    fn calculation_is_deterministic() {
        let items = [line(1234, 2), line(56, 7)];
        let coupon = percent_coupon(15, Some(Rupee::from_rupees(250)));
        let a = calculate(&items, Some(&coupon), Rupee::from_rupees(80), 13);
        let b = calculate(&items, Some(&coupon), Rupee::from_rupees(80), 13);
        assert_eq!(a, b);
    }

    #[test]
    fn coupon_validation_rules() {
        let now = Utc::now();
        let mut coupon = percent_coupon(10, None);

        coupon.expires_at = Some(now - Duration::hours(1));
        assert_eq!(validate_coupon(&coupon, Rupee::from_rupees(1000), now), Err(CouponInvalid::Expired));
        coupon.expires_at = None;

        coupon.usage_limit = Some(5);
        coupon.used_count = 5;
        assert_eq!(validate_coupon(&coupon, Rupee::from_rupees(1000), now), Err(CouponInvalid::UsageLimitReached));
        coupon.used_count = 4;
        assert!(validate_coupon(&coupon, Rupee::from_rupees(1000), now).is_ok());

        coupon.min_order_amount = Some(Rupee::from_rupees(2000));
        assert!(matches!(
            validate_coupon(&coupon, Rupee::from_rupees(1000), now),
            Err(CouponInvalid::BelowMinimum { .. })
        ));
    }

    #[test]
    fn commission_uses_per_item_rate_with_default_fallback() {
        let items = [
            PricedLine { unit_price: Rupee::from_rupees(1000), quantity: 1, commission_rate_bp: Some(1000) },
            PricedLine { unit_price: Rupee::from_rupees(500), quantity: 2, commission_rate_bp: None },
        ];
        // 10% of 1000 + 5% (default) of 1000.
        assert_eq!(commission_for_items(&items, 500), Rupee::from_rupees(150));
    }

    #[test]
    fn out_of_range_commission_rates_fall_back() {
        let items = [
            PricedLine { unit_price: Rupee::from_rupees(100), quantity: 1, commission_rate_bp: Some(9000) },
            PricedLine { unit_price: Rupee::from_rupees(100), quantity: 1, commission_rate_bp: Some(-100) },
        ];
        // Both lines fall back to the 5% default.
        assert_eq!(commission_for_items(&items, 500), Rupee::from_rupees(10));
    }
}
