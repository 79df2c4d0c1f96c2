use thiserror::Error;

/// Errors raised while decoding CSR, certificate or key material
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// The CSR is empty, not PEM, or not a PKCS#10 structure
    #[error("Could not parse the CSR content: {0}")]
    InvalidCsr(String),

    /// The certificate is empty, not PEM, or not an X.509 structure
    #[error("Could not parse the certificate content: {0}")]
    InvalidCertificate(String),

    /// The private key is neither PKCS#1 nor PKCS#8 RSA
    #[error("Could not parse the private key: {0}")]
    InvalidPrivateKey(String),
}

/// Result type for certificate operations
pub type CertificateResult<T, E = CertificateError> = Result<T, E>;
