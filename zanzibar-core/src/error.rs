use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZanzibarError {
    #[error("Invalid set: {0}")]
    InvalidSet(String),

    #[error("Invalid tuple: {0}")]
    InvalidTuple(String),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Maximum traversal depth of {max_depth} exceeded")]
    MaxDepthExceeded { max_depth: u32 },

    #[error("Traversal visited more than {max_visited} sets")]
    TraversalLimitExceeded { max_visited: usize },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ZanzibarError {
    /// Infrastructure failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }

    /// A traversal guard tripped; usually a misconfigured or cyclic graph.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(
            self,
            Self::MaxDepthExceeded { .. } | Self::TraversalLimitExceeded { .. }
        )
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidSet(_) | Self::InvalidTuple(_) | Self::InvalidRelation(_)
        )
    }
}

impl ZanzibarError {
    /// Wraps a driver error with the operation that failed.
    pub(crate) fn storage(context: &str, err: sqlx::Error) -> Self {
        Self::StorageError(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, ZanzibarError>;
