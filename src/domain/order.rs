use super::ids::{OrderId, UserId};
use super::money::{Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum OrderStatus {
    Created,
    Paid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Paid => "Paid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored order. In-memory values are snapshots; the store owns the canonical row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    /// Owner of the order. Never changes after creation.
    pub user_id: UserId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn is_payable(&self) -> bool {
        self.status == OrderStatus::Created
    }
}

/// An order that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub amount: Amount,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(user_id: UserId, amount: Amount, currency: Currency) -> Self {
        Self {
            user_id,
            amount,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            status: OrderStatus::Created,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_starts_created() {
        let amount = Amount::new(dec!(100)).unwrap();
        let order = NewOrder::new(UserId(7), amount, Currency::Usd).into_order(OrderId(1));
        assert_eq!(order.status, OrderStatus::Created);
        assert!(order.is_payable());
        assert!(order.is_owned_by(UserId(7)));
        assert!(!order.is_owned_by(UserId(8)));
    }

    #[test]
    fn test_order_status_serialization() {
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"Paid\"");
    }
}
