//! Error types for the network service orchestrator

use crate::addr::AddressError;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, NetServiceError>;

/// Errors that can occur while publishing, browsing or resolving
#[derive(Debug, Error)]
pub enum NetServiceError {
    /// mDNS service daemon failed to initialize
    #[error("failed to initialize mDNS daemon: {0}")]
    DaemonInitFailed(String),

    /// Failed to advertise a service
    #[error("failed to publish service '{name}': {reason}")]
    PublishFailed { name: String, reason: String },

    /// Failed to browse for services
    #[error("failed to browse for service type '{service_type}': {reason}")]
    BrowseFailed {
        service_type: String,
        reason: String,
    },

    /// Service resolution failed
    #[error("failed to resolve service '{name}': {reason}")]
    ResolveFailed { name: String, reason: String },

    /// Invalid orchestrator configuration
    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),

    /// A resolved address record could not be interpreted
    #[error(transparent)]
    Address(#[from] AddressError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
