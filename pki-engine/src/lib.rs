//! Hub certificate authority service

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]
#![allow(clippy::missing_errors_doc)]

/// Local key pair and CSR generation
pub mod csr;

/// DFSP CA, server and JWS certificate services
pub mod dfsp;

/// The CA engine trait and its provided operations
pub mod engine;

/// Enrollment lifecycle
pub mod enrollment;

/// Hub CA and hub server certificate
pub mod hub;

/// Configuration and error types
pub mod types;

/// Engine implementation on top of the secrets backend
pub mod vault_engine;

pub use dfsp::DfspCertificateService;
pub use engine::{PkiEngine, SecretStoreExt};
pub use enrollment::EnrollmentService;
pub use hub::HubService;
pub use types::{Environment, PkiEngineConfig, PkiError, PkiResult, SecretKey};
pub use vault_engine::VaultPkiEngine;
