use crate::domain::ids::{OrderId, PaymentId};
use crate::domain::order::{NewOrder, Order, OrderStatus};
use crate::domain::payment::{IdempotencyKey, NewPayment, Payment};
use crate::domain::ports::{
    OrderStore, PaymentStore, StoreTransaction, StoreTransactionBox, TransactionalStore,
};
use crate::error::{Result, StoreError};
use crate::infrastructure::row_locks::{HeldLocks, RowKey, RowLocks};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    payments: BTreeMap<PaymentId, Payment>,
    /// Unique index over `Payment::idempotency_key`.
    idempotency_keys: HashMap<IdempotencyKey, PaymentId>,
    last_order_id: u64,
    last_payment_id: u64,
}

/// A thread-safe in-memory store for orders and payments.
///
/// Uses `Arc<RwLock<..>>` tables so clones share state, plus a row lock table that gives
/// transactions the same exclusive, transaction-scoped row locks a relational database would.
/// Ideal for testing or for runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: RowLocks,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let mut tables = self.tables.write().await;
        tables.last_order_id += 1;
        let order = order.into_order(OrderId(tables.last_order_id));
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .idempotency_keys
            .get(key)
            .and_then(|id| tables.payments.get(id))
            .cloned())
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|payment| payment.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        if tables.idempotency_keys.contains_key(&payment.idempotency_key) {
            return Err(StoreError::UniqueViolation {
                constraint: "payments_idempotency_key",
                key: payment.idempotency_key.to_string(),
            });
        }

        tables.last_payment_id += 1;
        let payment = payment.into_payment(PaymentId(tables.last_payment_id));
        tables
            .idempotency_keys
            .insert(payment.idempotency_key.clone(), payment.id);
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            locks: self.locks.clone(),
            held: HeldLocks::default(),
            orders: HashMap::new(),
            payments: HashMap::new(),
        }))
    }
}

/// An open transaction against an [`InMemoryStore`].
///
/// Writes are buffered and applied under a single table write lock on commit.
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    locks: RowLocks,
    held: HeldLocks,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
}

impl InMemoryTransaction {
    async fn current_order(&self, id: OrderId) -> Option<Order> {
        match self.orders.get(&id) {
            Some(order) => Some(order.clone()),
            None => self.tables.read().await.orders.get(&id).cloned(),
        }
    }

    async fn current_payment(&self, id: PaymentId) -> Option<Payment> {
        match self.payments.get(&id) {
            Some(payment) => Some(payment.clone()),
            None => self.tables.read().await.payments.get(&id).cloned(),
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.held.ensure(&self.locks, RowKey::Payment(id)).await;
        Ok(self.current_payment(id).await)
    }

    async fn try_transition_order(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<u64> {
        self.held.ensure(&self.locks, RowKey::Order(id)).await;
        match self.current_order(id).await {
            Some(mut order) if order.status == from => {
                order.status = to;
                self.orders.insert(id, order);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        self.held
            .ensure(&self.locks, RowKey::Payment(payment.id))
            .await;
        if self.current_payment(payment.id).await.is_none() {
            return Err(StoreError::internal(format!(
                "payment {} does not exist",
                payment.id
            )));
        }
        self.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        {
            let mut tables = this.tables.write().await;
            for (id, order) in this.orders.drain() {
                tables.orders.insert(id, order);
            }
            for (id, payment) in this.payments.drain() {
                tables.payments.insert(id, payment);
            }
        }
        this.held.release_all();
        debug!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.orders.clear();
        this.payments.clear();
        this.held.release_all();
        debug!("in-memory transaction rolled back");
        Ok(())
    }
}
