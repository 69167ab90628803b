// Streaming Provider Error Types

/// Errors surfaced by streaming providers and the capacity calculators
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} credentials not configured")]
    MissingCredentials { provider: &'static str },

    #[error("Unknown streaming provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid stream role: {0}")]
    InvalidRole(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("{provider} does not implement {operation}")]
    NotImplemented {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
