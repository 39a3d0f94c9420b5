//! # Error Types
//!
//! Unified error handling across the flock crates.
//!
//! Configuration problems are fatal and surface at construction; allocation
//! failures are transient and retried by the simulator; everything else at a
//! buffer boundary is a device error. Out-of-range parameter input is not an
//! error at all: setters clamp.

use thiserror::Error;

/// Main error type for flock operations
#[derive(Error, Debug)]
pub enum FlockError {
    /// Kernel entry point or layout mismatch — a deployment error,
    /// fatal at simulation startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Device buffer could not be (re)allocated — recoverable,
    /// the simulator stays stale and retries next frame
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// Device lost or transfer failure
    #[error("Device error: {0}")]
    Device(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flock operations
pub type FlockResult<T> = Result<T, FlockError>;

impl FlockError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an allocation error
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Create a device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}
