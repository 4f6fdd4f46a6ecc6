//! Error types for the video output pipeline.

use thiserror::Error;

use crate::property::PropertyId;

/// Main error type for video output operations.
#[derive(Error, Debug)]
pub enum VideoOutError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Programmer error: double release, retaining a disposed surface,
    /// mutating a shared frame.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Unsupported property: {0:?}")]
    UnsupportedProperty(PropertyId),

    #[error("Property is read-only: {0:?}")]
    ReadOnlyProperty(PropertyId),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The sink could not honor the requested geometry/format.
    #[error("Format negotiation failed: {0}")]
    FormatNegotiation(String),

    #[error("Port is closed")]
    PortClosed,

    #[error("Sink interface version mismatch: expected {expected}, found {found}")]
    InterfaceVersion { expected: u32, found: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VideoOutError {
    /// True for capability mismatches the caller can recover from by
    /// falling back to a lesser feature.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedProperty(_) | Self::ReadOnlyProperty(_) | Self::Unsupported(_)
        )
    }

    /// True for programmer errors.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

/// Report a usage error: logged always, fatal in debug builds.
///
/// Release builds return the error so the caller can ignore the operation
/// without touching shared state.
#[track_caller]
pub fn usage_error(msg: impl Into<String>) -> VideoOutError {
    let msg = msg.into();
    tracing::error!("usage error: {}", msg);
    debug_assert!(cfg!(test) || cfg!(feature = "lenient-usage"), "usage error: {msg}");
    VideoOutError::Usage(msg)
}

/// Result type alias for video output operations.
pub type Result<T> = std::result::Result<T, VideoOutError>;
