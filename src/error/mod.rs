//! Error taxonomy and recovery advice.
//!
//! Every failure is an [`OperationError`] carrying a machine-readable
//! [`ErrorKind`] and the [`RecoveryAdvice`] for that kind, so callers can both
//! switch on the kind and show the suggestion directly.

pub mod kind;
pub mod operation;
pub mod recovery;
pub mod status;

// Re-export main types for convenient access
pub use kind::{classify, ErrorCategory, ErrorKind};
pub use operation::{ErrorCause, OperationError};
pub use recovery::{advice_for, AdviceOverride, RecoveryAdvice};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OperationError>;
