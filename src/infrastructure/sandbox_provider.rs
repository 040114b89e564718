use crate::domain::money::Amount;
use crate::domain::ports::PaymentProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Offline stand-in for the settlement provider.
///
/// Approves every charge up to `decline_above` and declines anything larger, so declines can be
/// triggered from input data. Without a limit every charge is approved.
#[derive(Debug, Clone, Default)]
pub struct SandboxProvider {
    decline_above: Option<Decimal>,
}

impl SandboxProvider {
    pub fn new(decline_above: Option<Decimal>) -> Self {
        Self { decline_above }
    }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    async fn process(&self, amount: Amount) -> Result<bool, ProviderError> {
        match self.decline_above {
            Some(limit) if amount.value() > limit => {
                warn!(%amount, %limit, "Sandbox provider declined charge");
                Ok(false)
            }
            _ => {
                info!(%amount, "Sandbox provider approved charge");
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_sandbox_without_limit_approves() {
        let provider = SandboxProvider::default();
        let approved = provider
            .process(Amount::new(dec!(999999)).unwrap())
            .await
            .unwrap();
        assert!(approved);
    }

    #[tokio::test]
    async fn test_sandbox_declines_above_limit() {
        let provider = SandboxProvider::new(Some(dec!(500)));
        assert!(provider.process(Amount::new(dec!(500)).unwrap()).await.unwrap());
        assert!(!provider.process(Amount::new(dec!(500.01)).unwrap()).await.unwrap());
    }
}
