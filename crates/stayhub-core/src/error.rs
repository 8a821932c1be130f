//! Error types for `StayHub` core library.

use thiserror::Error;

use crate::models::BookingStatus;

/// Result type alias using `StayHub` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `StayHub` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unrecognized cancellation policy code
    #[error("Invalid cancellation policy tier: {0}")]
    InvalidPolicyTier(i64),

    /// Booking status change not permitted by the lifecycle
    #[error("Invalid booking transition from {from:?} to {to:?}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    /// Unrecognized integer code for a coded enum
    #[error("Invalid {kind} code: {code}")]
    InvalidCode { kind: &'static str, code: i64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session persistence error
    #[error("Session error: {0}")]
    Session(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
