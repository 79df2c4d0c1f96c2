//! Certificate and CSR validation for the hub PKI
//!
//! Parses PEM material into descriptors, verifies issuer chains and runs a fixed catalogue of
//! named checks. Nothing here performs I/O or keeps state between calls.

/// Trust anchors, issuer path verification and root classification
pub mod chain;

/// The catalogue of checks
pub mod checks;

/// OIDs, PEM labels and policy constants
pub mod constants;

/// Error types
pub mod error;

/// PEM decoding into descriptors
pub mod parser;

/// Default code lists per artifact kind
pub mod profiles;

/// Dispatch from validation code to check
pub mod registry;

/// Validation entry points
pub mod validator;

pub use chain::{classify_root, verify_path, ChainOutcome, RootClassification, TrustStore};
pub use checks::{compare_alt_names, Authority, CheckInput};
pub use error::{CertificateError, CertificateResult};
pub use parser::{
    parse_cert, parse_chain, parse_csr, split_pem_blocks, CertificateDocument, CsrDocument,
    PrivateKeyDocument,
};
pub use profiles::ValidationProfiles;
pub use registry::{CheckFn, ValidationRegistry};
pub use validator::{EnrollmentMaterial, Validator};
