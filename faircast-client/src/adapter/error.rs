// Stream Adapter Error Types

/// Errors surfaced by client-side streaming adapters
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Unknown streaming provider: {0}")]
    UnknownProvider(String),

    #[error("Already joined channel {0}")]
    AlreadyJoined(String),

    #[error("Not joined to a channel")]
    NotJoined,

    #[error("Timed out waiting for the connection to be acknowledged")]
    JoinTimeout,

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
