/// Structured error types for bannerctl-core.
///
/// Library consumers get a closed taxonomy they can match on; the
/// `bannerctl` binary wraps these in `anyhow` for reporting.

use thiserror::Error;

use crate::model::BannerId;

/// Boxed source error from a storage backend
pub type StorageSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for banner persistence
#[derive(Error, Debug)]
pub enum BannerError {
    /// Operation called on a banner in the wrong lifecycle state
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// Underlying store read or write failed (including constraint violations)
    #[error("Storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageSource,
    },

    /// Malformed input such as a non-integer slider identifier
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Banner does not exist in the store
    #[error("Banner {id} not found")]
    NotFound { id: BannerId },
}

/// Result type alias for bannerctl-core operations
pub type Result<T> = std::result::Result<T, BannerError>;

impl BannerError {
    /// Create an invalid state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Create a storage error for the named operation
    pub fn storage(
        operation: &'static str,
        source: impl Into<StorageSource>,
    ) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    /// Create a validation error for a field
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(id: BannerId) -> Self {
        Self::NotFound { id }
    }

    /// True for failures reported by the store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
