use thiserror::Error;

/// The only failures that cross the pipeline boundary. Every other fault —
/// provider timeouts, malformed payloads, HTTP errors — is absorbed by the
/// fallback cascade and never surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required credential or setting is absent. Surfaced immediately,
    /// before any provider call; not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The configured provider's request budget for the current window is
    /// exhausted. Retry timing is the caller's decision.
    #[error("rate limit exhausted for provider '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retryable() {
        let err = PipelineError::RateLimited {
            provider: "gemini".into(),
            retry_after_ms: 1500,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_configuration_is_not_retryable() {
        let err = PipelineError::Configuration("missing api key".into());
        assert!(!err.is_retryable());
    }
}
