use super::ids::{OrderId, PaymentId};
use super::money::Amount;
use super::order::{NewOrder, Order, OrderStatus};
use super::payment::{IdempotencyKey, NewPayment, Payment};
use crate::error::{ProviderError, Result};
use async_trait::async_trait;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
    async fn insert(&self, order: NewOrder) -> Result<Order>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>>;
    /// All payments of an order, ordered by id.
    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;
    /// Inserts a pending payment.
    ///
    /// Fails with `StoreError::UniqueViolation` when the idempotency key is already taken.
    async fn insert(&self, payment: NewPayment) -> Result<Payment>;
}

/// A store able to open atomic units of work spanning orders and payments.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<StoreTransactionBox>;
}

/// An open transaction.
///
/// Row locks taken through it are held until `commit` or `rollback`. Writes become visible to
/// other callers only on `commit`. Dropping an uncommitted transaction rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a payment and takes an exclusive lock on its row for the rest of the transaction.
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;

    /// Sets the order's status to `to` only if it is currently `from`.
    ///
    /// Returns the number of rows changed (0 or 1). The order row stays locked until the
    /// transaction ends, so a concurrent transition blocks and then observes the outcome.
    async fn try_transition_order(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<u64>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// The external settlement provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Charges `amount`. `Ok(false)` means the provider declined the charge. A server-side failure
    /// is `ProviderError::Rejected` and counts against the circuit breaker.
    async fn process(&self, amount: Amount) -> std::result::Result<bool, ProviderError>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type TransactionalStoreBox = Box<dyn TransactionalStore>;
pub type StoreTransactionBox = Box<dyn StoreTransaction>;
pub type PaymentProviderBox = Box<dyn PaymentProvider>;
