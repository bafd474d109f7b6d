use swapdesk_config::ConfigError;
use swapdesk_provider::ProviderError;
use swapdesk_ratelock::LockStoreError;
use thiserror::Error;

/// Failures while assembling a [`SwapDesk`](crate::SwapDesk)
#[derive(Debug, Error)]
pub enum SwapDeskError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("rate-lock storage unavailable: {0}")]
    Storage(#[from] LockStoreError),

    #[error("missing required field: {field}")]
    MissingField { field: String },
}
