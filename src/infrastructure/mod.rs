//! Adapters for the domain ports: storage engines and payment providers.

pub mod http_provider;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod row_locks;
pub mod sandbox_provider;
