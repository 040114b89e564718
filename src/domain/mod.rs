//! Domain model: orders, payments, their value objects and the ports the
//! application layer depends on.

pub mod ids;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
