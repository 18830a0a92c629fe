//! Error types for the Lumen3D engine
//!
//! Every fallible engine operation returns [`Result`]. Most variants are
//! fatal for the current run; the swapchain variant is the one transient
//! condition the frame loop recovers from locally.

use std::fmt;

/// Result type for Lumen3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen3D engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, invalid state, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or description (bad binding index, extent mismatch, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain, subsystems)
    InitializationFailed(String),

    /// Required asset could not be read or decoded
    AssetLoad(String),

    /// The presentation surface no longer matches the swapchain
    SwapchainOutOfDate,

    /// A bounded fence wait elapsed without the GPU signalling
    DeviceHang(String),
}

impl Error {
    /// Whether the frame loop may recover from this error by rebuilding
    /// swapchain-dependent state and trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SwapchainOutOfDate)
    }

    /// Whether this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::AssetLoad(msg) => write!(f, "Asset load failed: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::DeviceHang(msg) => write!(f, "Device hang: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
