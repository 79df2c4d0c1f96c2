use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::descriptor::CertInfo;
use crate::validation::{Validation, ValidationAggregate, ValidationState};

/// Key algorithm of a generated CA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    #[default]
    Rsa,
}

impl KeyAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CaKeyInfo {
    #[serde(default)]
    pub algorithm: KeyAlgorithm,
    #[validate(range(min = 2048, max = 8192))]
    pub size: u32,
}

impl Default for CaKeyInfo {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::Rsa,
            size: 4096,
        }
    }
}

/// Subject of a CA. Common name and organization are mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CaSubject {
    #[serde(rename = "CN")]
    #[validate(length(min = 1, message = "CN is required"))]
    pub common_name: String,
    #[serde(rename = "O")]
    #[validate(length(min = 1, message = "O is required"))]
    pub organization: String,
    #[serde(rename = "OU", default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Everything needed to create a root or intermediate CA
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CaInitialInfo {
    #[validate(nested)]
    pub subject: CaSubject,
    #[serde(default)]
    #[validate(nested)]
    pub key: CaKeyInfo,
    /// Extra DNS names for the CA certificate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

/// Root certificate plus a concatenated PEM chain of 0..n intermediates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A leaf certificate with the material needed to validate it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBundle {
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// CA bundle uploaded by a DFSP, stored with the outcome of its validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfspCa {
    #[serde(flatten)]
    pub bundle: CaBundle,
    pub validations: Vec<Validation>,
    pub validation_state: ValidationState,
}

impl DfspCa {
    #[must_use]
    pub fn new(bundle: CaBundle, aggregate: ValidationAggregate) -> Self {
        Self {
            bundle,
            validations: aggregate.validations,
            validation_state: aggregate.validation_state,
        }
    }
}

/// Server or JWS certificate of a DFSP, stored with the outcome of its validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfspCertificate {
    #[serde(flatten)]
    pub bundle: CertificateBundle,
    pub cert_info: CertInfo,
    pub validations: Vec<Validation>,
    pub validation_state: ValidationState,
}

impl DfspCertificate {
    #[must_use]
    pub fn new(bundle: CertificateBundle, cert_info: CertInfo, aggregate: ValidationAggregate) -> Self {
        Self {
            bundle,
            cert_info,
            validations: aggregate.validations,
            validation_state: aggregate.validation_state,
        }
    }
}

/// Metadata about the hub CA kept next to the PKI mounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubCaDetails {
    pub root_certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<CaInitialInfo>,
}

/// Root CA created by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCa {
    pub certificate: String,
    pub private_key: String,
    /// Request the CA was created from
    pub info: CaInitialInfo,
}

/// Intermediate CA installed on the intermediate mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateCa {
    pub certificate: String,
    pub csr: String,
    pub private_key: String,
}

/// Hub server certificate request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServerCertRequest {
    #[validate(length(min = 1, message = "commonName is required"))]
    pub common_name: String,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    /// Validity in hours, the backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_hours: Option<u64>,
}

/// Certificate and key issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    pub certificate: String,
    pub private_key: String,
    pub issuing_ca: String,
    pub serial_number: String,
}
