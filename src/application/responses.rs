use crate::domain::ids::{OrderId, PaymentId, UserId};
use crate::domain::money::Amount;
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outward projection of a payment. The idempotency key stays internal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Amount,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            user_id: payment.user_id,
            amount: payment.amount,
            status: payment.status.to_string(),
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub amount: Amount,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            amount: order.amount,
            currency: order.currency.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at,
        }
    }
}
