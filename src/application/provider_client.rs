use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::domain::money::Amount;
use crate::domain::ports::PaymentProviderBox;
use crate::error::ProviderError;
use std::sync::Arc;

/// Calls the settlement provider through a shared circuit breaker.
///
/// Only provider errors (transport failures and server-side rejections) count against the
/// breaker; declines do not. While the breaker is open the provider is not called and
/// `ProviderError::Unavailable` is returned.
pub struct PaymentProviderClient {
    provider: PaymentProviderBox,
    breaker: Arc<CircuitBreaker>,
}

impl PaymentProviderClient {
    pub fn new(provider: PaymentProviderBox, breaker: Arc<CircuitBreaker>) -> Self {
        Self { provider, breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Charges `amount`. `Ok(false)` means the provider declined.
    pub async fn process(&self, amount: Amount) -> Result<bool, ProviderError> {
        match self.breaker.execute(|| self.provider.process(amount)).await {
            Ok(approved) => Ok(approved),
            Err(CircuitBreakerError::Open) => Err(ProviderError::Unavailable),
            Err(CircuitBreakerError::Failed(err)) => Err(err),
        }
    }
}
