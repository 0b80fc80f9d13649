//! Error types for the range lock manager
//!
//! This module defines the error taxonomy shared by every lock manager layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Classification
//!
//! | Variant           | Retry?                  | Meaning                                   |
//! |-------------------|-------------------------|-------------------------------------------|
//! | `InvalidArgument` | never                   | malformed range, bad handle, bad config   |
//! | `NotGranted`      | caller may retry later  | lock not obtained before the timeout      |
//! | `Deadlock`        | abort the transaction   | waiting would close a wait-for cycle      |
//! | `OutOfLocks`      | after freeing capacity  | limits reached, escalation did not help   |
//! | `Fatal`           | never                   | internal invariant violated               |

use thiserror::Error;

/// Result type alias for lock manager operations
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Error types for the lock manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Invalid handle, malformed range or mismatched key configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The lock could not be granted before the wait timed out
    #[error("Lock not granted")]
    NotGranted,

    /// Waiting for the lock would deadlock
    #[error("Deadlock detected")]
    Deadlock,

    /// Lock count or lock memory ceiling reached and escalation could not free room
    #[error("Out of locks")]
    OutOfLocks,

    /// Internal invariant violation; the lock manager should be considered unusable
    #[error("Fatal lock manager error: {0}")]
    Fatal(String),
}

impl LockError {
    /// Create an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        LockError::InvalidArgument(msg.into())
    }

    /// Create a `Fatal` error
    pub fn fatal(msg: impl Into<String>) -> Self {
        LockError::Fatal(msg.into())
    }

    /// Whether the caller can reasonably retry the same acquisition later
    ///
    /// `Deadlock` is not retryable as-is: the transaction must abort first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::NotGranted | LockError::OutOfLocks)
    }

    /// Whether this error means the lock manager is no longer usable
    pub fn is_fatal(&self) -> bool {
        matches!(self, LockError::Fatal(_))
    }
}
