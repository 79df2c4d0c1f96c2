//! Shared data model for the hub PKI services
//!
//! These types are exchanged between the validation engine, the secrets backend and the
//! enrollment workflow. They carry no behaviour beyond construction and the state
//! transitions of an enrollment record.

/// CA creation input and certificate bundles
pub mod ca;

/// Parsed CSR and certificate descriptors
pub mod descriptor;

/// Enrollment records and their state machine
pub mod enrollment;

/// Numeric identifiers used to build backend paths
pub mod ids;

/// Validation codes, results and aggregates
pub mod validation;

pub use ca::{
    CaBundle, CaInitialInfo, CaKeyInfo, CaSubject, CertificateBundle, DfspCa, DfspCertificate,
    GeneratedCa, HubCaDetails, IntermediateCa, IssuedCertificate, KeyAlgorithm,
    ServerCertRequest,
};
pub use descriptor::{CertInfo, CsrInfo, SubjectAltNames, SubjectInfo};
pub use enrollment::{
    CsrParameters, Enrollment, EnrollmentDirection, EnrollmentState, GeneratedCsr,
    PendingEnrollment, SignedEnrollment,
};
pub use ids::{DfspId, EnrollmentId, InvalidId};
pub use validation::{
    Validation, ValidationAggregate, ValidationCode, ValidationResult, ValidationState,
};
