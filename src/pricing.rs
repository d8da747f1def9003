//! Promotion eligibility, discount computation, and checkout totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Flat fee charged on every non-empty order.
pub const SHIPPING_FEE: i64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType {
    Percent,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percent => "PERCENT",
            DiscountType::Fixed => "FIXED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "PERCENT" => Ok(DiscountType::Percent),
            "FIXED" => Ok(DiscountType::Fixed),
            other => Err(AppError::BadRequest(format!(
                "unknown discount type: {other}"
            ))),
        }
    }
}

/// The parts of a promotion the calculator needs.
#[derive(Debug, Clone)]
pub struct PromotionRule {
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_order_value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

/// Why a promotion does not apply. Distinct from a zero discount so the
/// caller can tell the customer which condition failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotApplicable {
    #[error("promotion is not active")]
    Inactive,
    #[error("promotion has not started yet")]
    NotStarted,
    #[error("promotion has expired")]
    Expired,
    #[error("order value is below the minimum of {min}")]
    BelowMinimum { min: i64 },
}

/// Compute the discount a promotion grants on an order subtotal.
///
/// PERCENT discounts are uncapped; FIXED discounts are clamped to the
/// subtotal so the total can never go negative.
pub fn compute_discount(
    rule: &PromotionRule,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<i64, NotApplicable> {
    if !rule.active {
        return Err(NotApplicable::Inactive);
    }
    if now < rule.starts_at {
        return Err(NotApplicable::NotStarted);
    }
    if now > rule.ends_at {
        return Err(NotApplicable::Expired);
    }
    if subtotal < rule.min_order_value {
        return Err(NotApplicable::BelowMinimum {
            min: rule.min_order_value,
        });
    }

    let amount = match rule.discount_type {
        DiscountType::Percent => subtotal * rule.discount_value / 100,
        DiscountType::Fixed => rule.discount_value.min(subtotal),
    };
    Ok(amount)
}

/// Shipping is charged only when the order actually has items.
pub fn shipping_fee(total_items: i64) -> i64 {
    if total_items > 0 { SHIPPING_FEE } else { 0 }
}

/// subtotal - discount + shipping.
pub fn order_total(subtotal: i64, discount: i64, shipping: i64) -> i64 {
    subtotal - discount + shipping
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rule(discount_type: DiscountType, value: i64, min: i64) -> PromotionRule {
        let now = Utc::now();
        PromotionRule {
            discount_type,
            discount_value: value,
            min_order_value: min,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            active: true,
        }
    }

    #[test]
    fn percent_discount_is_exact() {
        let r = rule(DiscountType::Percent, 10, 0);
        assert_eq!(compute_discount(&r, 435_000, Utc::now()), Ok(43_500));
        assert_eq!(compute_discount(&r, 0, Utc::now()), Ok(0));
    }

    #[test]
    fn fixed_discount_clamps_to_subtotal() {
        let r = rule(DiscountType::Fixed, 600_000, 0);
        assert_eq!(compute_discount(&r, 435_000, Utc::now()), Ok(435_000));

        let small = rule(DiscountType::Fixed, 20_000, 0);
        assert_eq!(compute_discount(&small, 435_000, Utc::now()), Ok(20_000));
    }

    #[test]
    fn ineligibility_is_not_a_zero_discount() {
        let mut r = rule(DiscountType::Percent, 10, 0);
        r.active = false;
        assert_eq!(
            compute_discount(&r, 100_000, Utc::now()),
            Err(NotApplicable::Inactive)
        );

        let r = rule(DiscountType::Percent, 10, 500_000);
        assert_eq!(
            compute_discount(&r, 435_000, Utc::now()),
            Err(NotApplicable::BelowMinimum { min: 500_000 })
        );
    }

    #[test]
    fn window_is_inclusive() {
        let r = rule(DiscountType::Percent, 10, 0);
        assert_eq!(compute_discount(&r, 100_000, r.starts_at), Ok(10_000));
        assert_eq!(compute_discount(&r, 100_000, r.ends_at), Ok(10_000));
        assert!(compute_discount(&r, 100_000, r.starts_at - Duration::seconds(1)).is_err());
        assert!(compute_discount(&r, 100_000, r.ends_at + Duration::seconds(1)).is_err());
    }

    #[test]
    fn validation_is_deterministic() {
        let r = rule(DiscountType::Percent, 15, 100_000);
        let now = Utc::now();
        let first = compute_discount(&r, 200_000, now);
        let second = compute_discount(&r, 200_000, now);
        assert_eq!(first, second);
    }

    #[test]
    fn checkout_totals_match_contract() {
        // subtotal 435000, shipping 15000, no discount -> 450000
        assert_eq!(order_total(435_000, 0, shipping_fee(3)), 450_000);
        // oversized fixed discount clamps, leaving just the shipping fee
        let r = rule(DiscountType::Fixed, 600_000, 0);
        let discount = compute_discount(&r, 435_000, Utc::now()).unwrap();
        assert_eq!(order_total(435_000, discount, shipping_fee(3)), 15_000);
        // empty order ships for free
        assert_eq!(shipping_fee(0), 0);
    }
}
