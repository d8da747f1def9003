//! Order and payment status machines.
//!
//! Single source of truth for the lifecycle: every route and service that
//! gates an action on a status goes through the tables here instead of
//! comparing strings inline.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Who is requesting a transition. Staff maps to the `admin` role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipping,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "SHIPPING" => Ok(OrderStatus::Shipping),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::BadRequest(format!(
                "unknown order status: {other}"
            ))),
        }
    }

    /// DELIVERED and CANCELLED are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Legal next statuses for the given actor.
    ///
    /// The customer table is deliberately narrower than the staff table:
    /// customers may only cancel while PENDING, staff may also cancel a
    /// CONFIRMED order. This asymmetry is part of the existing contract.
    pub fn allowed_next(&self, actor: Actor) -> &'static [OrderStatus] {
        match (self, actor) {
            (OrderStatus::Pending, Actor::Staff) => {
                &[OrderStatus::Confirmed, OrderStatus::Cancelled]
            }
            (OrderStatus::Pending, Actor::Customer) => &[OrderStatus::Cancelled],
            (OrderStatus::Confirmed, Actor::Staff) => {
                &[OrderStatus::Shipping, OrderStatus::Cancelled]
            }
            (OrderStatus::Shipping, Actor::Staff) => &[OrderStatus::Delivered],
            _ => &[],
        }
    }

    pub fn can_transition(&self, next: OrderStatus, actor: Actor) -> bool {
        self.allowed_next(actor).contains(&next)
    }

    /// Reviews unlock only once the order has been delivered.
    pub fn can_review(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(AppError::BadRequest(format!(
                "unknown payment status: {other}"
            ))),
        }
    }

    /// PENDING -> PAID | FAILED for every method; PAID -> REFUNDED only for
    /// gateway methods. COD has no refund path, so PAID is terminal for it.
    pub fn can_transition(&self, next: PaymentStatus, method: PaymentMethod) -> bool {
        match (self, next) {
            (PaymentStatus::Pending, PaymentStatus::Paid)
            | (PaymentStatus::Pending, PaymentStatus::Failed) => true,
            (PaymentStatus::Paid, PaymentStatus::Refunded) => method != PaymentMethod::Cod,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cod,
    Vnpay,
    Momo,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Vnpay => "VNPAY",
            PaymentMethod::Momo => "MOMO",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "COD" => Ok(PaymentMethod::Cod),
            "VNPAY" => Ok(PaymentMethod::Vnpay),
            "MOMO" => Ok(PaymentMethod::Momo),
            other => Err(AppError::BadRequest(format!(
                "unknown payment method: {other}"
            ))),
        }
    }

    /// Non-COD payments are settled by the gateway redirect, not by staff.
    pub fn is_gateway(&self) -> bool {
        !matches!(self, PaymentMethod::Cod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ORDER: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn staff_transitions_follow_table() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Confirmed, Actor::Staff));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled, Actor::Staff));
        assert!(OrderStatus::Confirmed.can_transition(OrderStatus::Shipping, Actor::Staff));
        assert!(OrderStatus::Confirmed.can_transition(OrderStatus::Cancelled, Actor::Staff));
        assert!(OrderStatus::Shipping.can_transition(OrderStatus::Delivered, Actor::Staff));

        // no skipping forward, no moving backward
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Shipping, Actor::Staff));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Delivered, Actor::Staff));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Pending, Actor::Staff));
        assert!(!OrderStatus::Shipping.can_transition(OrderStatus::Cancelled, Actor::Staff));
    }

    #[test]
    fn customer_may_only_cancel_while_pending() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled, Actor::Customer));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Confirmed, Actor::Customer));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Cancelled, Actor::Customer));
        assert!(!OrderStatus::Shipping.can_transition(OrderStatus::Cancelled, Actor::Customer));
    }

    #[test]
    fn delivered_and_cancelled_are_absorbing() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL_ORDER {
                assert!(!terminal.can_transition(next, Actor::Staff));
                assert!(!terminal.can_transition(next, Actor::Customer));
            }
        }
    }

    #[test]
    fn refund_requires_paid_and_gateway_method() {
        assert!(PaymentStatus::Paid.can_transition(PaymentStatus::Refunded, PaymentMethod::Momo));
        assert!(PaymentStatus::Paid.can_transition(PaymentStatus::Refunded, PaymentMethod::Vnpay));
        assert!(!PaymentStatus::Paid.can_transition(PaymentStatus::Refunded, PaymentMethod::Cod));
        assert!(
            !PaymentStatus::Pending.can_transition(PaymentStatus::Refunded, PaymentMethod::Momo)
        );
        assert!(
            !PaymentStatus::Failed.can_transition(PaymentStatus::Refunded, PaymentMethod::Momo)
        );
    }

    #[test]
    fn pending_payment_settles_either_way() {
        for method in [PaymentMethod::Cod, PaymentMethod::Vnpay, PaymentMethod::Momo] {
            assert!(PaymentStatus::Pending.can_transition(PaymentStatus::Paid, method));
            assert!(PaymentStatus::Pending.can_transition(PaymentStatus::Failed, method));
        }
        assert!(!PaymentStatus::Paid.can_transition(PaymentStatus::Failed, PaymentMethod::Cod));
    }

    #[test]
    fn review_gate_is_delivered_only() {
        for status in ALL_ORDER {
            assert_eq!(status.can_review(), status == OrderStatus::Delivered);
        }
    }

    #[test]
    fn status_strings_round_trip_uppercase() {
        for status in ALL_ORDER {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::parse("pending").is_err());
        assert!(PaymentMethod::parse("cod").is_err());
    }
}
