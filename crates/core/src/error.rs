//! Error types for the abwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions. None of these errors
//! ever reach the host request: the assignment path degrades to a safe
//! default, and these types exist so the degradation can be logged.

use thiserror::Error;

/// Top-level error for operations outside the assignment path (startup,
/// serving, CLI output).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Eligibility error: {0}")]
    Eligibility(#[from] EligibilityError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while fetching or decoding an experiment catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Catalog fetch from {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Catalog source {url} answered with status {status_code}")]
    HttpStatus { url: String, status_code: u16 },

    #[error("Invalid catalog payload from {url}: {reason}")]
    InvalidPayload { url: String, reason: String },

    #[error("Catalog payload from {url} is not a JSON array")]
    NotAnArray { url: String },
}

/// Failures while deciding whether a request may join an experiment.
#[derive(Debug, Clone, Error)]
pub enum EligibilityError {
    #[error("Invalid eligibility rule for experiment '{experiment_id}': {detail}")]
    InvalidRule {
        experiment_id: String,
        detail: String,
    },

    #[error("Eligibility check failed: {0}")]
    Evaluation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_displays_url() {
        let err = CatalogError::HttpStatus {
            url: "https://cdn.example.com/experiments.json".into(),
            status_code: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("experiments.json"));
    }

    #[test]
    fn eligibility_error_names_experiment() {
        let err = EligibilityError::InvalidRule {
            experiment_id: "checkout-v2".into(),
            detail: "expected operator".into(),
        };
        assert!(err.to_string().contains("checkout-v2"));
    }

    #[test]
    fn bounded_errors_convert_into_top_level() {
        let err: Error = CatalogError::NotAnArray {
            url: "http://localhost:3000/api/experiments".into(),
        }
        .into();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(err.to_string().starts_with("Catalog error"));

        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
