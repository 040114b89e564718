#![allow(dead_code)]

use async_trait::async_trait;
use orderpay::application::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use orderpay::application::orders::{CreateOrderRequest, OrderService};
use orderpay::application::payments::PaymentCoordinator;
use orderpay::application::provider_client::PaymentProviderClient;
use orderpay::application::responses::{OrderResponse, PaymentResponse};
use orderpay::domain::ids::{OrderId, UserId};
use orderpay::domain::money::Amount;
use orderpay::domain::payment::IdempotencyKey;
use orderpay::domain::ports::{PaymentProvider, PaymentStoreBox, TransactionalStoreBox};
use orderpay::error::{ProviderError, ServiceError};
use orderpay::infrastructure::in_memory::InMemoryStore;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Approve,
    Decline,
    /// The provider answers with a 5xx status.
    ServerError,
    /// The request never reaches the provider.
    Fail,
}

/// Provider double that answers from a script, then from a fallback reply.
///
/// Clones share the script and the call counter, so a test can keep one clone to steer and
/// inspect the instance handed to the coordinator.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Arc<Mutex<Reply>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    rendezvous: Option<Arc<Barrier>>,
}

impl ScriptedProvider {
    pub fn replying(fallback: Reply) -> Self {
        Self {
            script: Arc::default(),
            fallback: Arc::new(Mutex::new(fallback)),
            calls: Arc::default(),
            delay: None,
            rendezvous: None,
        }
    }

    pub fn approving() -> Self {
        Self::replying(Reply::Approve)
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls wait until `parties` calls are in flight at once.
    pub fn with_rendezvous(mut self, parties: usize) -> Self {
        self.rendezvous = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| *self.fallback.lock().unwrap())
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn process(&self, _amount: Amount) -> Result<bool, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(rendezvous) = &self.rendezvous {
            rendezvous.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply() {
            Reply::Approve => Ok(true),
            Reply::Decline => Ok(false),
            Reply::ServerError => Err(ProviderError::Rejected { status: 503 }),
            Reply::Fail => Err(ProviderError::Transport(Box::new(std::io::Error::other(
                "connection refused",
            )))),
        }
    }
}

/// Services wired over one in-memory store.
pub struct Harness {
    pub store: InMemoryStore,
    pub orders: OrderService,
    pub payments: PaymentCoordinator,
    pub provider: ScriptedProvider,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::approving())
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        let store = InMemoryStore::new();
        Self::build(store.clone(), Box::new(store.clone()), Box::new(store), provider)
    }

    /// Uses `payments` for the payment port instead of the store itself.
    pub fn with_payment_store(
        store: InMemoryStore,
        payments: PaymentStoreBox,
        provider: ScriptedProvider,
    ) -> Self {
        let transactions = Box::new(store.clone());
        Self::build(store, payments, transactions, provider)
    }

    /// Uses `transactions` to open confirm transactions instead of the store itself.
    pub fn with_transactions(
        store: InMemoryStore,
        transactions: TransactionalStoreBox,
        provider: ScriptedProvider,
    ) -> Self {
        let payments = Box::new(store.clone());
        Self::build(store, payments, transactions, provider)
    }

    fn build(
        store: InMemoryStore,
        payments: PaymentStoreBox,
        transactions: TransactionalStoreBox,
        provider: ScriptedProvider,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "payment-provider",
            CircuitBreakerConfig::default(),
        ));
        let client = PaymentProviderClient::new(Box::new(provider.clone()), breaker);
        Self {
            orders: OrderService::new(Box::new(store.clone())),
            payments: PaymentCoordinator::new(
                Box::new(store.clone()),
                payments,
                transactions,
                client,
            ),
            store,
            provider,
        }
    }

    pub async fn order(&self, user: u64, amount: Decimal) -> OrderResponse {
        let request = CreateOrderRequest {
            amount,
            currency: "USD".to_string(),
        };
        self.orders.create(UserId(user), request).await.unwrap()
    }

    pub async fn pay(
        &self,
        user: u64,
        order_id: OrderId,
        key: &str,
    ) -> Result<PaymentResponse, ServiceError> {
        self.payments
            .create(UserId(user), IdempotencyKey::new(key).unwrap(), order_id)
            .await
    }

    pub async fn order_status(&self, user: u64, order_id: OrderId) -> String {
        self.orders
            .get_by_id(UserId(user), order_id)
            .await
            .unwrap()
            .status
    }
}
