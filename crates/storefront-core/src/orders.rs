//! Order lifecycle vocabulary: statuses, payment modes, and the rules that
//! decide which status changes are legal.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Statuses whose orders count toward revenue.
    pub const REALIZED: [OrderStatus; 3] = [
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_realized(self) -> bool {
        Self::REALIZED.contains(&self)
    }

    /// No further transitions are defined out of these states, although the
    /// permissive policy does not block them.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Realized status names, shaped for binding as a Postgres `TEXT[]`.
    #[must_use]
    pub fn realized_names() -> Vec<String> {
        Self::REALIZED
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

/// How checkout settles payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMode {
    /// Checkout marks the order paid synchronously.
    #[default]
    Immediate,
    /// The order is created `pending` and confirmed later by its owner.
    Deferred,
}

impl PaymentMode {
    #[must_use]
    pub fn initial_status(self) -> OrderStatus {
        match self {
            PaymentMode::Immediate => OrderStatus::Paid,
            PaymentMode::Deferred => OrderStatus::Pending,
        }
    }
}

/// Rules applied to administrative status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any enumerated status may overwrite any other (manual corrections).
    #[default]
    Permissive,
    /// Only the forward lifecycle edges and cancellation are allowed.
    Strict,
}

impl StatusPolicy {
    /// Checks an administrative change from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] when the strict table has no
    /// edge for the pair.
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> Result<(), CoreError> {
        if self == StatusPolicy::Permissive || from == to || strict_edge(from, to) {
            Ok(())
        } else {
            Err(CoreError::IllegalTransition { from, to })
        }
    }
}

fn strict_edge(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::{Cancelled, Delivered, Paid, Pending, Shipped};

    matches!(
        (from, to),
        (Pending, Paid | Cancelled) | (Paid, Shipped | Cancelled) | (Shipped, Delivered)
    )
}

/// The owner-initiated payment confirmation: legal only from `pending`.
///
/// # Errors
///
/// Returns [`CoreError::IllegalTransition`] for any other current status.
pub fn pay_transition(current: OrderStatus) -> Result<OrderStatus, CoreError> {
    if current == OrderStatus::Pending {
        Ok(OrderStatus::Paid)
    } else {
        Err(CoreError::IllegalTransition {
            from: current,
            to: OrderStatus::Paid,
        })
    }
}
