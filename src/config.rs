use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::application::provider_client::PaymentProviderClient;
use crate::domain::ports::{
    OrderStoreBox, PaymentProviderBox, PaymentStoreBox, TransactionalStoreBox,
};
use crate::error::{ProviderError, StoreError};
use crate::infrastructure::http_provider::HttpPaymentProvider;
use crate::infrastructure::in_memory::InMemoryStore;
use crate::infrastructure::sandbox_provider::SandboxProvider;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs a script of order and payment commands against a payment store.
#[derive(Parser, Debug, Clone)]
#[command(name = "orderpay", author, version, about, long_about = None)]
pub struct Config {
    /// Command script (CSV with columns op,user,order,payment,key,amount,currency)
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "ORDERPAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Endpoint of the HTTP payment provider. The sandbox provider is used when absent.
    #[arg(long, env = "ORDERPAY_PROVIDER_URL")]
    pub provider_url: Option<String>,

    /// Timeout for a single provider call, in milliseconds.
    #[arg(long, env = "ORDERPAY_PROVIDER_TIMEOUT_MS", default_value_t = 5000)]
    pub provider_timeout_ms: u64,

    /// Sandbox provider declines charges above this amount.
    #[arg(long, env = "ORDERPAY_SANDBOX_DECLINE_ABOVE")]
    pub sandbox_decline_above: Option<Decimal>,

    /// Consecutive provider failures that open the circuit.
    #[arg(long, env = "ORDERPAY_BREAKER_FAILURE_THRESHOLD", default_value_t = 3)]
    pub breaker_failure_threshold: u32,

    /// Seconds the circuit stays open before a probe is let through.
    #[arg(long, env = "ORDERPAY_BREAKER_OPEN_SECS", default_value_t = 30)]
    pub breaker_open_secs: u64,
}

/// The storage engine selected at startup. Each port is handed its own handle to it.
#[derive(Clone)]
pub enum Stores {
    InMemory(InMemoryStore),
    #[cfg(feature = "storage-rocksdb")]
    RocksDb(crate::infrastructure::rocksdb::RocksDBStore),
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryStore::new())
    }

    pub fn orders(&self) -> OrderStoreBox {
        match self {
            Self::InMemory(store) => Box::new(store.clone()),
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(store) => Box::new(store.clone()),
        }
    }

    pub fn payments(&self) -> PaymentStoreBox {
        match self {
            Self::InMemory(store) => Box::new(store.clone()),
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(store) => Box::new(store.clone()),
        }
    }

    pub fn transactions(&self) -> TransactionalStoreBox {
        match self {
            Self::InMemory(store) => Box::new(store.clone()),
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(store) => Box::new(store.clone()),
        }
    }
}

impl Config {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            open_duration: Duration::from_secs(self.breaker_open_secs),
        }
    }

    pub fn provider(&self) -> Result<PaymentProviderBox, ProviderError> {
        match &self.provider_url {
            Some(url) => {
                info!(endpoint = %url, "Using HTTP payment provider");
                let timeout = Duration::from_millis(self.provider_timeout_ms);
                Ok(Box::new(HttpPaymentProvider::new(url.clone(), timeout)?))
            }
            None => {
                info!(
                    decline_above = ?self.sandbox_decline_above,
                    "Using sandbox payment provider"
                );
                Ok(Box::new(SandboxProvider::new(self.sandbox_decline_above)))
            }
        }
    }

    pub fn provider_client(&self) -> Result<PaymentProviderClient, ProviderError> {
        let breaker = Arc::new(CircuitBreaker::new("payment-provider", self.breaker_config()));
        Ok(PaymentProviderClient::new(self.provider()?, breaker))
    }

    pub fn stores(&self) -> Result<Stores, StoreError> {
        match &self.db_path {
            Some(path) => open_persistent(path),
            None => Ok(Stores::in_memory()),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: &std::path::Path) -> Result<Stores, StoreError> {
    use crate::infrastructure::rocksdb::RocksDBStore;

    info!(path = %path.display(), "Opening RocksDB store");
    Ok(Stores::RocksDb(RocksDBStore::open(path)?))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(path: &std::path::Path) -> Result<Stores, StoreError> {
    tracing::warn!(
        path = %path.display(),
        "Built without the storage-rocksdb feature, falling back to in-memory storage"
    );
    Ok(Stores::in_memory())
}
