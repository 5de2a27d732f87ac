//! Error types for the Genesys Cloud provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while managing Genesys Cloud resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The desired state failed validation. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider configuration is invalid or the provider is unconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform API answered with a non-success status.
    #[error("API error for {resource} (status {status}): {message}")]
    Api {
        /// Resource type the call was made for.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// Human readable context plus the API's own message.
        message: String,
    },

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A retry loop ran past its deadline.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The remote state never converged on the written state.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Operation not implemented for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The remote object was created but a later step failed. The engine
    /// must record `state` so the object is tracked and not created twice.
    #[error("{source}")]
    PartiallyCreated {
        /// State of the created object, including its id.
        state: Box<serde_json::Value>,
        /// The step that failed after creation.
        source: Box<ProviderError>,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Build an API error wrapped with the resource name and context.
    pub fn api(resource: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    /// Attach the state of an object that exists remotely despite `source`.
    pub fn partially_created(state: serde_json::Value, source: ProviderError) -> Self {
        Self::PartiallyCreated {
            state: Box::new(state),
            source: Box::new(source),
        }
    }

    /// State to persist for an object created before the failure.
    pub fn partial_state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::PartiallyCreated { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
            Self::Api { message, .. } => message,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::Consistency(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::PartiallyCreated { source, .. } => source.message(),
        }
    }

    /// The HTTP status behind this error, if it came from the API.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            Self::PartiallyCreated { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the API reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Transient failures worth retrying at the request level.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ResourceExhausted(_) | Self::Unavailable(_) => true,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::PartiallyCreated { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Convert this error into a diagnostic for the orchestration engine.
    pub fn to_diagnostic(&self) -> Diagnostic {
        if let Self::PartiallyCreated { source, .. } = self {
            return source.to_diagnostic();
        }
        let summary = match self {
            Self::Validation(_) => "Invalid configuration",
            Self::Configuration(_) => "Provider configuration error",
            Self::DeadlineExceeded(_) => "Timed out waiting for the platform",
            Self::Consistency(_) => "Platform state did not converge",
            Self::Api { .. } | Self::Http(_) => "Platform API request failed",
            _ => "Provider error",
        };
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}
