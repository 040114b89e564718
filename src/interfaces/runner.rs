use crate::application::orders::{CreateOrderRequest, OrderService};
use crate::application::payments::PaymentCoordinator;
use crate::domain::payment::IdempotencyKey;
use crate::error::ServiceError;
use crate::interfaces::csv::command_reader::Command;
use crate::interfaces::outcome::Outcome;
use serde::Serialize;

/// Dispatches commands to the order and payment services.
pub struct CommandRunner {
    orders: OrderService,
    payments: PaymentCoordinator,
}

impl CommandRunner {
    pub fn new(orders: OrderService, payments: PaymentCoordinator) -> Self {
        Self { orders, payments }
    }

    pub fn payments(&self) -> &PaymentCoordinator {
        &self.payments
    }

    /// Runs one command; `row` identifies it in the outcome.
    pub async fn run(&self, row: u64, command: Command) -> Outcome {
        let result = match command {
            Command::CreateOrder {
                user_id,
                amount,
                currency,
            } => {
                let request = CreateOrderRequest { amount, currency };
                render(201, self.orders.create(user_id, request).await)
            }
            Command::GetOrder { user_id, order_id } => {
                render(200, self.orders.get_by_id(user_id, order_id).await)
            }
            Command::CreatePayment {
                user_id,
                order_id,
                idempotency_key,
            } => match IdempotencyKey::new(idempotency_key) {
                Ok(key) => render(201, self.payments.create(user_id, key, order_id).await),
                Err(err) => Err(err),
            },
            Command::ConfirmPayment {
                user_id,
                payment_id,
            } => render(200, self.payments.confirm(user_id, payment_id).await),
            Command::ListPayments { user_id, order_id } => {
                render(200, self.payments.get_by_order_id(user_id, order_id).await)
            }
        };

        match result {
            Ok((status, data)) => Outcome::success(row, status, data),
            Err(err) => Outcome::failure(row, &err),
        }
    }
}

fn render<T: Serialize>(
    status: u16,
    result: Result<T, ServiceError>,
) -> Result<(u16, serde_json::Value), ServiceError> {
    let value = result?;
    let data = serde_json::to_value(value)
        .map_err(|err| ServiceError::unexpected_from("Failed to render response", err))?;
    Ok((status, data))
}
