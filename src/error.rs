//! Error types for the spilltree library.
//!
//! All fallible operations return [`SpillTreeError`] through the crate-wide
//! [`Result`] alias. Errors surface synchronously to the caller of the
//! operation that produced them; nothing is retried internally.
//!
//! # Examples
//!
//! ```
//! use spilltree::error::{Result, SpillTreeError};
//!
//! fn check_spill(spill: f64) -> Result<()> {
//!     if !(0.0..1.0).contains(&spill) {
//!         return Err(SpillTreeError::config(format!(
//!             "spill={spill:.2e}, must lie in range [0,1)"
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_spill(1.5).is_err());
//! ```

use thiserror::Error;

/// The main error type for spill tree operations.
#[derive(Error, Debug)]
pub enum SpillTreeError {
    /// Invalid construction or query parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not supported by the tree's data source kind.
    #[error("Unsupported operation: {0}")]
    Capability(String),

    /// Malformed query.
    #[error("Query error: {0}")]
    Query(String),

    /// A split strategy was given members it cannot handle.
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Key absent from a data source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector of the wrong length.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector containing NaN or infinite values.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with SpillTreeError.
pub type Result<T> = std::result::Result<T, SpillTreeError>;

impl SpillTreeError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::Config(msg.into())
    }

    /// Create a new capability error.
    pub fn capability<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::Capability(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::Query(msg.into())
    }

    /// Create a new numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::Numerical(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::NotFound(msg.into())
    }

    /// Create a new invalid vector error.
    pub fn invalid_vector<S: Into<String>>(msg: S) -> Self {
        SpillTreeError::InvalidVector(msg.into())
    }

    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        SpillTreeError::DimensionMismatch { expected, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = SpillTreeError::config("spill out of range");
        assert_eq!(error.to_string(), "Configuration error: spill out of range");

        let error = SpillTreeError::capability("update on dense source");
        assert_eq!(
            error.to_string(),
            "Unsupported operation: update on dense source"
        );

        let error = SpillTreeError::dimension_mismatch(3, 2);
        assert_eq!(error.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = SpillTreeError::from(json_error);

        match error {
            SpillTreeError::Json(_) => {} // Expected
            _ => panic!("Expected JSON error variant"),
        }
    }
}
