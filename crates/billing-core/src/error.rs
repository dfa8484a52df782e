//! Unified error handling for billing-core

use thiserror::Error;

/// Core error type for billing-core
#[derive(Error, Debug)]
pub enum Error {
    /// Requested resource key is not in the catalog
    #[error("Unknown resource: {resource}")]
    UnknownResource { resource: String },

    /// Quantity could not be coerced to an integer
    #[error("Invalid quantity for resource {resource}: {value}")]
    InvalidQuantity { resource: String, value: String },

    /// Requested billing term does not exist or is inactive
    #[error("Unknown billing term: {term}")]
    UnknownTerm { term: String },

    /// Target node cannot host the requested resources
    #[error("Node {node} has insufficient capacity: {detail}")]
    InsufficientCapacity { node: String, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for billing-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an unknown resource error
    pub fn unknown_resource(resource: impl Into<String>) -> Self {
        Error::UnknownResource {
            resource: resource.into(),
        }
    }

    /// Create an invalid quantity error
    pub fn invalid_quantity(resource: impl Into<String>, value: impl ToString) -> Self {
        Error::InvalidQuantity {
            resource: resource.into(),
            value: value.to_string(),
        }
    }

    /// Create an insufficient capacity error
    pub fn insufficient_capacity(node: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::InsufficientCapacity {
            node: node.into(),
            detail: detail.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether this error was caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownResource { .. }
                | Error::InvalidQuantity { .. }
                | Error::UnknownTerm { .. }
                | Error::InsufficientCapacity { .. }
                | Error::Validation(_)
        )
    }
}

// Convert to String for request handlers that surface plain messages
impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
