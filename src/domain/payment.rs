use super::ids::{OrderId, PaymentId, UserId};
use super::money::Amount;
use super::order::Order;
use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a payment. Only `Pending` may transition; every other status is terminal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    /// The provider captured the money but the order had already been paid by another payment.
    RequiresReview,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Successful => "Successful",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::RequiresReview => "RequiresReview",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied token that scopes one logical create request across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ServiceError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Idempotency-Key header is required".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Copied from the order when the payment is created, never re-derived.
    pub amount: Amount,
    pub status: PaymentStatus,
    pub idempotency_key: IdempotencyKey,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Moves a pending payment to a terminal status.
    pub fn settle(&mut self, status: PaymentStatus) -> Result<(), ServiceError> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(ServiceError::Conflict(
                "Payment already processed".to_string(),
            ));
        }
        self.status = status;
        Ok(())
    }
}

/// A payment that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Amount,
    pub idempotency_key: IdempotencyKey,
    pub created_at: DateTime<Utc>,
}

impl NewPayment {
    /// Drafts a pending payment for the whole amount of `order`.
    pub fn for_order(order: &Order, idempotency_key: IdempotencyKey) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.amount,
            idempotency_key,
            created_at: Utc::now(),
        }
    }

    pub fn into_payment(self, id: PaymentId) -> Payment {
        Payment {
            id,
            order_id: self.order_id,
            user_id: self.user_id,
            amount: self.amount,
            status: PaymentStatus::Pending,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
        }
    }
}
