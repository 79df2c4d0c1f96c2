use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::descriptor::{CertInfo, CsrInfo, SubjectAltNames, SubjectInfo};
use crate::ids::EnrollmentId;
use crate::validation::{Validation, ValidationAggregate, ValidationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    CsrLoaded,
    CertSigned,
}

/// Which side submitted the CSR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentDirection {
    /// DFSP-submitted CSR, signed by the hub
    Inbound,
    /// Hub-generated CSR, signed by the DFSP
    Outbound,
}

/// Enrollment waiting for its certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEnrollment {
    pub id: EnrollmentId,
    pub csr: String,
    /// Only present when the key pair was generated by the hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub csr_info: CsrInfo,
    pub validations: Vec<Validation>,
    pub validation_state: ValidationState,
}

/// Enrollment whose certificate has been issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEnrollment {
    pub id: EnrollmentId,
    pub csr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub csr_info: CsrInfo,
    pub certificate: String,
    pub cert_info: CertInfo,
    pub validations: Vec<Validation>,
    pub validation_state: ValidationState,
}

impl PendingEnrollment {
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        csr: String,
        key: Option<String>,
        csr_info: CsrInfo,
        aggregate: ValidationAggregate,
    ) -> Self {
        Self {
            id,
            csr,
            key,
            csr_info,
            validations: aggregate.validations,
            validation_state: aggregate.validation_state,
        }
    }

    /// `CSR_LOADED` → `CERT_SIGNED`. Validations are replaced by the re-evaluated aggregate.
    #[must_use]
    pub fn into_signed(
        self,
        certificate: String,
        cert_info: CertInfo,
        aggregate: ValidationAggregate,
    ) -> SignedEnrollment {
        SignedEnrollment {
            id: self.id,
            csr: self.csr,
            key: self.key,
            csr_info: self.csr_info,
            certificate,
            cert_info,
            validations: aggregate.validations,
            validation_state: aggregate.validation_state,
        }
    }
}

/// Enrollment record, tagged by its lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum Enrollment {
    #[serde(rename = "CSR_LOADED")]
    CsrLoaded(PendingEnrollment),
    #[serde(rename = "CERT_SIGNED")]
    CertSigned(SignedEnrollment),
}

impl Enrollment {
    #[must_use]
    pub const fn id(&self) -> EnrollmentId {
        match self {
            Self::CsrLoaded(e) => e.id,
            Self::CertSigned(e) => e.id,
        }
    }

    #[must_use]
    pub const fn state(&self) -> EnrollmentState {
        match self {
            Self::CsrLoaded(_) => EnrollmentState::CsrLoaded,
            Self::CertSigned(_) => EnrollmentState::CertSigned,
        }
    }

    #[must_use]
    pub fn csr(&self) -> &str {
        match self {
            Self::CsrLoaded(e) => &e.csr,
            Self::CertSigned(e) => &e.csr,
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::CsrLoaded(e) => e.key.as_deref(),
            Self::CertSigned(e) => e.key.as_deref(),
        }
    }

    #[must_use]
    pub const fn csr_info(&self) -> &CsrInfo {
        match self {
            Self::CsrLoaded(e) => &e.csr_info,
            Self::CertSigned(e) => &e.csr_info,
        }
    }

    #[must_use]
    pub fn certificate(&self) -> Option<&str> {
        match self {
            Self::CsrLoaded(_) => None,
            Self::CertSigned(e) => Some(&e.certificate),
        }
    }

    #[must_use]
    pub const fn cert_info(&self) -> Option<&CertInfo> {
        match self {
            Self::CsrLoaded(_) => None,
            Self::CertSigned(e) => Some(&e.cert_info),
        }
    }

    #[must_use]
    pub fn validations(&self) -> &[Validation] {
        match self {
            Self::CsrLoaded(e) => &e.validations,
            Self::CertSigned(e) => &e.validations,
        }
    }

    #[must_use]
    pub const fn validation_state(&self) -> ValidationState {
        match self {
            Self::CsrLoaded(e) => e.validation_state,
            Self::CertSigned(e) => e.validation_state,
        }
    }
}

/// Input of local CSR generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrParameters {
    pub subject: SubjectInfo,
    #[serde(default)]
    pub extensions: SubjectAltNames,
}

/// PEM-encoded CSR and the private key it was signed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCsr {
    pub csr: String,
    pub private_key: String,
}
