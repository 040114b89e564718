use crate::domain::ids::{OrderId, PaymentId};
use crate::domain::order::{NewOrder, Order, OrderStatus};
use crate::domain::payment::{IdempotencyKey, NewPayment, Payment};
use crate::domain::ports::{
    OrderStore, PaymentStore, StoreTransaction, StoreTransactionBox, TransactionalStore,
};
use crate::error::{Result, StoreError};
use crate::infrastructure::row_locks::{HeldLocks, RowKey, RowLocks};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for payment rows, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Unique index from idempotency key to payment id.
pub const CF_IDEMPOTENCY_KEYS: &str = "idempotency_keys";
/// Index of payments per order, keyed by `order_id ++ payment_id` with empty values.
pub const CF_ORDER_PAYMENTS: &str = "order_payments";
/// Id sequences.
pub const CF_META: &str = "meta";

const ORDER_SEQUENCE: &[u8] = b"sequence:orders";
const PAYMENT_SEQUENCE: &[u8] = b"sequence:payments";

/// A persistent store implementation using RocksDB.
///
/// Rows are JSON documents in separate Column Families. Inserts are serialized through a write
/// gate so sequence allocation and the idempotency index check are atomic with the write.
/// Transactions buffer their writes and commit them as one `WriteBatch`. Row locks live in this
/// process, which is the only one allowed to open the database.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>` and the lock table).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: RowLocks,
    writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_ORDERS,
            CF_PAYMENTS,
            CF_IDEMPOTENCY_KEYS,
            CF_ORDER_PAYMENTS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::new(),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::internal(format!("{name} column family not found")))
    }

    fn load<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Reserves the next id of a sequence. The caller must hold the write gate and write `batch`.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let last = match self.db.get_cf(cf, sequence)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::internal("corrupted sequence value")
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = last + 1;
        batch.put_cf(cf, sequence, next.to_be_bytes());
        Ok(next)
    }

    fn payment_id_for_key(&self, key: &IdempotencyKey) -> Result<Option<PaymentId>> {
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        match self.db.get_cf(cf, key.as_str().as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::internal("corrupted idempotency index entry")
                })?;
                Ok(Some(PaymentId(u64::from_be_bytes(raw))))
            }
            None => Ok(None),
        }
    }

    fn insert_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut batch = WriteBatch::default();
        let id = OrderId(self.next_id(&mut batch, ORDER_SEQUENCE)?);
        let order = new_order.into_order(id);
        self.put(&mut batch, CF_ORDERS, &id.to_be_bytes(), &order)?;
        self.db.write(&batch)?;
        Ok(order)
    }

    fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment> {
        if self
            .payment_id_for_key(&new_payment.idempotency_key)?
            .is_some()
        {
            return Err(StoreError::UniqueViolation {
                constraint: "payments_idempotency_key",
                key: new_payment.idempotency_key.to_string(),
            });
        }

        let mut batch = WriteBatch::default();
        let id = PaymentId(self.next_id(&mut batch, PAYMENT_SEQUENCE)?);
        let payment = new_payment.into_payment(id);
        self.put(&mut batch, CF_PAYMENTS, &id.to_be_bytes(), &payment)?;

        let index = self.cf(CF_IDEMPOTENCY_KEYS)?;
        batch.put_cf(index, payment.idempotency_key.as_str().as_bytes(), id.to_be_bytes());

        let by_order = self.cf(CF_ORDER_PAYMENTS)?;
        batch.put_cf(by_order, order_payment_key(payment.order_id, id), b"");

        self.db.write(&batch)?;
        Ok(payment)
    }

    fn payments_of(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let prefix = order_id.to_be_bytes();
        let cf = self.cf(CF_ORDER_PAYMENTS)?;

        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let raw: [u8; 8] = key[8..].try_into().map_err(|_| {
                StoreError::internal("corrupted order payment index entry")
            })?;
            ids.push(PaymentId(u64::from_be_bytes(raw)));
        }

        let mut payments = Vec::with_capacity(ids.len());
        for id in ids {
            let payment = self
                .load::<Payment>(CF_PAYMENTS, &id.to_be_bytes())?
                .ok_or_else(|| StoreError::internal(format!("indexed payment {id} is missing")))?;
            payments.push(payment);
        }
        Ok(payments)
    }

    fn apply(
        &self,
        orders: &HashMap<OrderId, Order>,
        payments: &HashMap<PaymentId, Payment>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (id, order) in orders {
            self.put(&mut batch, CF_ORDERS, &id.to_be_bytes(), order)?;
        }
        for (id, payment) in payments {
            self.put(&mut batch, CF_PAYMENTS, &id.to_be_bytes(), payment)?;
        }
        self.db.write(&batch)?;
        Ok(())
    }
}

fn order_payment_key(order_id: OrderId, payment_id: PaymentId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&order_id.to_be_bytes());
    key[8..].copy_from_slice(&payment_id.to_be_bytes());
    key
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.load(CF_ORDERS, &id.to_be_bytes())
    }

    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let _gate = self.writes.lock().await;
        self.insert_order(order)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.load(CF_PAYMENTS, &id.to_be_bytes())
    }

    async fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        match self.payment_id_for_key(key)? {
            Some(id) => self.load(CF_PAYMENTS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        self.payments_of(order_id)
    }

    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let _gate = self.writes.lock().await;
        self.insert_payment(payment)
    }
}

#[async_trait]
impl TransactionalStore for RocksDBStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        Ok(Box::new(RocksDBTransaction {
            store: self.clone(),
            held: HeldLocks::default(),
            orders: HashMap::new(),
            payments: HashMap::new(),
        }))
    }
}

/// An open transaction against a [`RocksDBStore`].
pub struct RocksDBTransaction {
    store: RocksDBStore,
    held: HeldLocks,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
}

impl RocksDBTransaction {
    fn current_order(&self, id: OrderId) -> Result<Option<Order>> {
        match self.orders.get(&id) {
            Some(order) => Ok(Some(order.clone())),
            None => self.store.load(CF_ORDERS, &id.to_be_bytes()),
        }
    }

    fn current_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        match self.payments.get(&id) {
            Some(payment) => Ok(Some(payment.clone())),
            None => self.store.load(CF_PAYMENTS, &id.to_be_bytes()),
        }
    }
}

#[async_trait]
impl StoreTransaction for RocksDBTransaction {
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.held.ensure(&self.store.locks, RowKey::Payment(id)).await;
        self.current_payment(id)
    }

    async fn try_transition_order(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<u64> {
        self.held.ensure(&self.store.locks, RowKey::Order(id)).await;
        match self.current_order(id)? {
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
            .ensure(&self.store.locks, RowKey::Payment(payment.id))
            .await;
        if self.current_payment(payment.id)?.is_none() {
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
        if !this.orders.is_empty() || !this.payments.is_empty() {
            this.store.apply(&this.orders, &this.payments)?;
        }
        this.held.release_all();
        debug!("rocksdb transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.orders.clear();
        this.payments.clear();
        this.held.release_all();
        debug!("rocksdb transaction rolled back");
        Ok(())
    }
}
