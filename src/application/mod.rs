//! Application layer orchestrating orders and payments.
//!
//! `PaymentCoordinator` owns the create and confirm protocol. It talks to storage and to the
//! external provider only through the ports in `domain::ports`, so every adapter in
//! `infrastructure` is interchangeable at wiring time.

pub mod circuit_breaker;
pub mod orders;
pub mod payments;
pub mod provider_client;
pub mod responses;
