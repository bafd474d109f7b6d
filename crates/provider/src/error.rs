use thiserror::Error;

/// Failures talking to the exchange provider gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Failures that may clear up on their own; the next attempt can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_)
                | ProviderError::Timeout
                | ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Transport("reset".to_string()).is_transient());
        assert!(ProviderError::Server {
            status: 502,
            message: "bad gateway".to_string()
        }
        .is_transient());
        assert!(!ProviderError::BadRequest("amount".to_string()).is_transient());
        assert!(!ProviderError::Malformed("eof".to_string()).is_transient());
    }
}
