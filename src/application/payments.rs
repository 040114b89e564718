use crate::application::provider_client::PaymentProviderClient;
use crate::application::responses::PaymentResponse;
use crate::domain::ids::{OrderId, PaymentId, UserId};
use crate::domain::order::OrderStatus;
use crate::domain::payment::{IdempotencyKey, NewPayment, Payment, PaymentStatus};
use crate::domain::ports::{
    OrderStoreBox, PaymentStoreBox, StoreTransaction, TransactionalStoreBox,
};
use crate::error::{ProviderError, ServiceError};
use tracing::{error, info, instrument, warn};

/// Owns the create and confirm protocol for payments.
///
/// Holds no locks of its own: idempotency relies on the store's unique index, and confirmation
/// relies on the store's row locks and conditional order update, so several coordinators (or
/// processes) may serve the same store concurrently.
pub struct PaymentCoordinator {
    orders: OrderStoreBox,
    payments: PaymentStoreBox,
    transactions: TransactionalStoreBox,
    provider: PaymentProviderClient,
}

impl PaymentCoordinator {
    pub fn new(
        orders: OrderStoreBox,
        payments: PaymentStoreBox,
        transactions: TransactionalStoreBox,
        provider: PaymentProviderClient,
    ) -> Self {
        Self {
            orders,
            payments,
            transactions,
            provider,
        }
    }

    pub fn provider(&self) -> &PaymentProviderClient {
        &self.provider
    }

    /// Creates a pending payment for the whole order amount, or returns the payment previously
    /// created with the same idempotency key for the same order.
    #[instrument(
        skip_all,
        fields(%user_id, %order_id, idempotency_key = %idempotency_key.as_str())
    )]
    pub async fn create(
        &self,
        user_id: UserId,
        idempotency_key: IdempotencyKey,
        order_id: OrderId,
    ) -> Result<PaymentResponse, ServiceError> {
        info!("CreatePayment requested");
        let result = self.try_create(user_id, idempotency_key, order_id).await;
        report_unexpected("CreatePayment", &result);
        result
    }

    async fn try_create(
        &self,
        user_id: UserId,
        idempotency_key: IdempotencyKey,
        order_id: OrderId,
    ) -> Result<PaymentResponse, ServiceError> {
        let Some(order) = self.orders.get(order_id).await? else {
            warn!("CreatePayment failed: order not found");
            return Err(ServiceError::NotFound("Order not found".to_string()));
        };

        if let Some(existing) = self.payments.get_by_idempotency_key(&idempotency_key).await? {
            return replay(existing, order_id);
        }

        if !order.is_owned_by(user_id) {
            warn!(owner_id = %order.user_id, "CreatePayment forbidden");
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        if !order.is_payable() {
            warn!(status = %order.status, "CreatePayment conflict: order is not payable");
            return Err(ServiceError::Conflict("Order is not payable".to_string()));
        }

        let draft = NewPayment::for_order(&order, idempotency_key.clone());
        match self.payments.insert(draft).await {
            Ok(payment) => {
                info!(payment_id = %payment.id, status = %payment.status, "Payment created");
                Ok(PaymentResponse::from(&payment))
            }
            Err(err) if err.is_unique_violation() => {
                // A concurrent request with the same key won the insert; answer with its row.
                warn!("CreatePayment unique violation, resolving to the stored payment");
                match self.payments.get_by_idempotency_key(&idempotency_key).await? {
                    Some(winner) => replay(winner, order_id),
                    None => Err(ServiceError::unexpected_from(
                        "An unexpected error occurred",
                        err,
                    )),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Charges a pending payment and marks its order paid, atomically.
    ///
    /// The payment row stays locked from the first read until commit, so concurrent confirmations
    /// of one payment run one after another and only the first reaches the provider.
    #[instrument(skip_all, fields(%user_id, %payment_id))]
    pub async fn confirm(
        &self,
        user_id: UserId,
        payment_id: PaymentId,
    ) -> Result<PaymentResponse, ServiceError> {
        info!("ConfirmPayment requested");
        let mut tx = self.transactions.begin().await?;

        let outcome = self.settle(tx.as_mut(), user_id, payment_id).await;
        let result = match outcome {
            Err(err @ ServiceError::Unexpected { .. }) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "ConfirmPayment rollback failed");
                }
                Err(err)
            }
            settled => match tx.commit().await {
                Ok(()) => settled,
                Err(commit_err) => Err(ServiceError::unexpected_from(
                    "Unexpected error",
                    commit_err,
                )),
            },
        };

        report_unexpected("ConfirmPayment", &result);
        result
    }

    async fn settle(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: UserId,
        payment_id: PaymentId,
    ) -> Result<PaymentResponse, ServiceError> {
        let Some(mut payment) = tx.lock_payment(payment_id).await? else {
            warn!("ConfirmPayment failed: payment not found");
            return Err(ServiceError::NotFound("Payment not found".to_string()));
        };

        if !payment.is_owned_by(user_id) {
            warn!(owner_id = %payment.user_id, "ConfirmPayment forbidden");
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Successful => {
                info!("ConfirmPayment idempotent success");
                return Ok(PaymentResponse::from(&payment));
            }
            status => {
                warn!(%status, "ConfirmPayment conflict: payment already processed");
                return Err(ServiceError::Conflict(
                    "Payment already processed".to_string(),
                ));
            }
        }

        let approved = match self.provider.process(payment.amount).await {
            Ok(approved) => approved,
            Err(ProviderError::Rejected { status }) => {
                warn!(status, "Payment provider rejected the charge");
                false
            }
            Err(ProviderError::Unavailable) => {
                warn!("Payment provider unavailable");
                return Err(ServiceError::unexpected("Payment provider unavailable"));
            }
            Err(err) => return Err(ServiceError::unexpected_from("Unexpected error", err)),
        };

        if !approved {
            payment.settle(PaymentStatus::Failed)?;
            tx.update_payment(&payment).await?;
            warn!("Payment failed by provider");
            return Err(ServiceError::Conflict("Payment failed".to_string()));
        }

        let affected = tx
            .try_transition_order(payment.order_id, OrderStatus::Created, OrderStatus::Paid)
            .await?;
        if affected == 0 {
            payment.settle(PaymentStatus::RequiresReview)?;
            tx.update_payment(&payment).await?;
            error!(
                order_id = %payment.order_id,
                amount = %payment.amount,
                "Order paid by another payment after the charge; payment requires review"
            );
            return Err(ServiceError::Conflict("Order already paid".to_string()));
        }

        payment.settle(PaymentStatus::Successful)?;
        tx.update_payment(&payment).await?;
        info!(order_id = %payment.order_id, "Payment confirmed successfully");
        Ok(PaymentResponse::from(&payment))
    }

    /// Lists the payments of an order owned by the caller, ordered by id.
    #[instrument(skip_all, fields(%user_id, %order_id))]
    pub async fn get_by_order_id(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Vec<PaymentResponse>, ServiceError> {
        info!("GetPaymentsByOrder requested");
        let result = self.try_get_by_order_id(user_id, order_id).await;
        report_unexpected("GetPaymentsByOrder", &result);
        result
    }

    async fn try_get_by_order_id(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Vec<PaymentResponse>, ServiceError> {
        let Some(order) = self.orders.get(order_id).await? else {
            warn!("Order not found");
            return Err(ServiceError::NotFound("Order not found".to_string()));
        };

        if !order.is_owned_by(user_id) {
            warn!(owner_id = %order.user_id, "Access denied to payments");
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let mut payments = self.payments.list_by_order(order_id).await?;
        payments.sort_by_key(|payment| payment.id);
        info!(count = payments.len(), "Payments fetched");
        Ok(payments.iter().map(PaymentResponse::from).collect())
    }
}

/// Resolves a payment found under the requested idempotency key.
fn replay(existing: Payment, order_id: OrderId) -> Result<PaymentResponse, ServiceError> {
    if existing.order_id == order_id {
        info!(
            payment_id = %existing.id,
            status = %existing.status,
            "CreatePayment idempotent replay"
        );
        return Ok(PaymentResponse::from(&existing));
    }

    warn!(
        existing_order_id = %existing.order_id,
        requested_order_id = %order_id,
        "Idempotency key reuse with different order"
    );
    Err(ServiceError::Conflict(
        "Idempotency key reuse with different request parameters".to_string(),
    ))
}

fn report_unexpected<T>(operation: &'static str, result: &Result<T, ServiceError>) {
    if let Err(ServiceError::Unexpected {
        message,
        source: Some(source),
    }) = result
    {
        error!(operation, %message, cause = %source, "Request failed unexpectedly");
    }
}
