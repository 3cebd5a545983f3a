//! Error types for plan construction and serialization
//!
//! Normalization and traversal are infallible on well-formed input. The
//! only failures are:
//! - asking a builder for a composite of a kind it does not support
//! - a serializer failing to assemble its document

/// Errors raised while building or deriving plans
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Step kind is not a composite kind (or is not a known kind at all)
    #[error("unsupported step kind: '{0}'")]
    UnsupportedStepKind(String),

    /// Serialization of a plan failed
    #[error("serialization failed: {0}")]
    Serialize(#[from] SerializeError),
}

impl PlanError {
    /// Create an unsupported step kind error
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedStepKind(kind.into())
    }
}

/// Errors raised while emitting a plan document
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// A leaf payload could not be converted
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// The document could not be assembled
    #[error("format error: {0}")]
    Format(String),
}

/// Result type alias for plan operations
pub type PlanResult<T> = Result<T, PlanError>;
