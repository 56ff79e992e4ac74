//! Worker pool error types.

use std::fmt;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool could not be created (thread spawn or resource failure).
    ///
    /// Nothing is left running when this is returned; callers may retry
    /// with a fresh pool.
    Init {
        /// What failed.
        reason: String,
    },

    /// A creation parameter is out of range.
    InvalidConfig {
        /// Name of the offending parameter.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// The task was submitted while the pool was shutting down and was
    /// discarded without running.
    TaskDropped,
}

impl PoolError {
    /// Check if this is a creation failure (including invalid parameters).
    pub fn is_init(&self) -> bool {
        matches!(self, PoolError::Init { .. } | PoolError::InvalidConfig { .. })
    }

    /// Check if the task was dropped because of shutdown.
    pub fn is_dropped(&self) -> bool {
        matches!(self, PoolError::TaskDropped)
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Init { reason } => {
                write!(f, "pool initialization failed: {}", reason)
            }
            PoolError::InvalidConfig { field, message } => {
                write!(f, "invalid pool parameter {}: {}", field, message)
            }
            PoolError::TaskDropped => {
                write!(f, "task dropped: pool is shutting down")
            }
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
