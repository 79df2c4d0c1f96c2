//! Error types for CA and enrollment operations

use cert_validation::CertificateError;
use pki_types::InvalidId;
use thiserror::Error;
use vault_storage::VaultError;

/// Result type for CA and enrollment operations
pub type PkiResult<T> = Result<T, PkiError>;

/// Errors surfaced to callers of the CA engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PkiError {
    /// Malformed CSR, certificate or key, or a CA that is missing when needed
    #[error("{0}")]
    InvalidEntity(String),

    /// A required pre-check failed
    #[error("{0}")]
    Validation(String),

    /// The referenced secret, enrollment or CA does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The secrets backend call itself failed
    #[error("External process error: {0}")]
    ExternalProcess(String),
}

impl PkiError {
    /// Whether the caller may try the same call again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalProcess(_))
    }
}

impl From<CertificateError> for PkiError {
    fn from(error: CertificateError) -> Self {
        Self::InvalidEntity(error.to_string())
    }
}

impl From<VaultError> for PkiError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::NotFound(path) => Self::NotFound(path),
            other => Self::ExternalProcess(other.to_string()),
        }
    }
}

impl From<InvalidId> for PkiError {
    fn from(error: InvalidId) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<validator::ValidationErrors> for PkiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversions() {
        let cases: Vec<(&str, PkiError, PkiError)> = vec![
            (
                "vault not found",
                VaultError::NotFound("secrets/dfsp-ca/1".to_string()).into(),
                PkiError::NotFound("secrets/dfsp-ca/1".to_string()),
            ),
            (
                "vault status",
                VaultError::Status {
                    path: "pki/sign/client".to_string(),
                    status: 400,
                    message: "no CA configured".to_string(),
                }
                .into(),
                PkiError::ExternalProcess(
                    "Vault request to pki/sign/client failed with status 400: no CA configured"
                        .to_string(),
                ),
            ),
            (
                "bad id",
                InvalidId { name: "dfspId" }.into(),
                PkiError::Validation("Invalid dfspId".to_string()),
            ),
            (
                "bad csr",
                CertificateError::InvalidCsr("empty input".to_string()).into(),
                PkiError::InvalidEntity("Could not parse the CSR content: empty input".to_string()),
            ),
        ];

        for (name, actual, expected) in cases {
            assert_eq!(actual, expected, "case: {name}");
        }
    }

    #[test]
    fn test_only_backend_failures_are_retryable() {
        assert!(PkiError::ExternalProcess("timeout".to_string()).is_retryable());
        assert!(!PkiError::NotFound("x".to_string()).is_retryable());
        assert!(!PkiError::InvalidEntity("x".to_string()).is_retryable());
        assert!(!PkiError::Validation("x".to_string()).is_retryable());
    }
}
