use crate::application::responses::OrderResponse;
use crate::domain::ids::{OrderId, UserId};
use crate::domain::money::{Amount, Currency, MAX_ORDER_AMOUNT, MIN_ORDER_AMOUNT};
use crate::domain::order::NewOrder;
use crate::domain::ports::OrderStoreBox;
use crate::error::ServiceError;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: Decimal,
    pub currency: String,
}

/// Creates and reads orders on behalf of their owners.
pub struct OrderService {
    orders: OrderStoreBox,
}

impl OrderService {
    pub fn new(orders: OrderStoreBox) -> Self {
        Self { orders }
    }

    #[instrument(
        skip_all,
        fields(%user_id, amount = %request.amount, currency = %request.currency)
    )]
    pub async fn create(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let currency: Currency = request.currency.parse().inspect_err(|_| {
            warn!("CreateOrder rejected: unsupported currency");
        })?;

        if request.amount < MIN_ORDER_AMOUNT || request.amount > MAX_ORDER_AMOUNT {
            warn!("CreateOrder rejected: amount out of range");
            return Err(ServiceError::Validation(format!(
                "Amount must be between {MIN_ORDER_AMOUNT} and {MAX_ORDER_AMOUNT}"
            )));
        }
        let amount = Amount::new(request.amount)?;

        let order = self
            .orders
            .insert(NewOrder::new(user_id, amount, currency))
            .await?;
        info!(order_id = %order.id, "Order created");
        Ok(OrderResponse::from(&order))
    }

    #[instrument(skip_all, fields(%user_id, %order_id))]
    pub async fn get_by_id(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderResponse, ServiceError> {
        let Some(order) = self.orders.get(order_id).await? else {
            warn!("Order not found");
            return Err(ServiceError::NotFound("Order not found".to_string()));
        };

        if !order.is_owned_by(user_id) {
            warn!(owner_id = %order.user_id, "Access denied to order");
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        Ok(OrderResponse::from(&order))
    }
}
