use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::warn;

/// Named checks understood by the validation registry.
///
/// The string form is the contract toward callers, so variants whose name contains digits
/// spell out their serialization explicitly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Current time falls inside the certificate validity window
    CertificateValidity,
    /// CSR carries CN, OU, O, L, ST, C and E
    CsrMandatoryDistinguishedName,
    #[serde(rename = "CSR_PUBLIC_KEY_LENGTH_2048")]
    #[strum(serialize = "CSR_PUBLIC_KEY_LENGTH_2048")]
    CsrPublicKeyLength2048,
    #[serde(rename = "CSR_PUBLIC_KEY_LENGTH_4096")]
    #[strum(serialize = "CSR_PUBLIC_KEY_LENGTH_4096")]
    CsrPublicKeyLength4096,
    #[serde(rename = "CERTIFICATE_PUBLIC_KEY_LENGTH_2048")]
    #[strum(serialize = "CERTIFICATE_PUBLIC_KEY_LENGTH_2048")]
    CertificatePublicKeyLength2048,
    #[serde(rename = "CERTIFICATE_PUBLIC_KEY_LENGTH_4096")]
    #[strum(serialize = "CERTIFICATE_PUBLIC_KEY_LENGTH_4096")]
    CertificatePublicKeyLength4096,
    #[serde(rename = "CSR_SIGNATURE_ALGORITHM_SHA256_512")]
    #[strum(serialize = "CSR_SIGNATURE_ALGORITHM_SHA256_512")]
    CsrSignatureAlgorithmSha256_512,
    #[serde(rename = "CERTIFICATE_SIGNATURE_ALGORITHM_SHA256_512")]
    #[strum(serialize = "CERTIFICATE_SIGNATURE_ALGORITHM_SHA256_512")]
    CertificateSignatureAlgorithmSha256_512,
    /// The CSR self-signature verifies against its own public key
    CsrSignatureValid,
    /// Extended key usage includes TLS server authentication
    CertificateUsageServer,
    /// Extended key usage includes TLS client authentication
    CertificateUsageClient,
    /// Every CA certificate of the bundle has `basicConstraints.CA = true`
    CaCertificateUsage,
    /// Root is self-signed or signed by a trusted root
    VerifyRootCertificate,
    /// Intermediate chain verifies up to the root
    VerifyChainCertificates,
    /// Leaf certificate verifies through the chain up to the root
    CertificateChain,
    CsrCertSameSubjectInfo,
    CsrCertSameCn,
    CsrCertSamePublicKey,
    /// Certificate public key matches the private key held by the hub
    CertificatePublicPrivateKeyMatch,
    /// Certificate was issued by the DFSP's CA bundle
    CertificateSignedByDfspCa,
    /// Certificate public key can be decoded, used for JWS certificates
    CertificatePublicKeyParseable,
}

impl ValidationCode {
    /// Parses externally supplied code names. Unknown names are logged and dropped so older
    /// callers keep working while the catalogue grows.
    pub fn parse_codes<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Self> {
        names
            .into_iter()
            .filter_map(|name| match name.trim().parse::<Self>() {
                Ok(code) => Some(code),
                Err(_) => {
                    warn!(code = name, "Unknown validation code, skipping");
                    None
                }
            })
            .collect()
    }
}

/// Outcome of a single validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Valid,
    Invalid,
    /// The check could not be evaluated; never counts as a failure
    NotAvailable,
}

/// Reduced state of a list of validations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationState {
    #[default]
    Valid,
    Invalid,
}

impl ValidationState {
    /// `Invalid` iff at least one result is `Invalid`
    pub fn reduce<'a>(results: impl IntoIterator<Item = &'a ValidationResult>) -> Self {
        if results
            .into_iter()
            .any(|result| *result == ValidationResult::Invalid)
        {
            Self::Invalid
        } else {
            Self::Valid
        }
    }
}

/// Result of running one registry check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub code: ValidationCode,
    pub is_available: bool,
    pub result: ValidationResult,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Validation {
    /// Builds a validation. An unavailable validation always reports `NotAvailable`,
    /// whatever `result` says.
    #[must_use]
    pub fn new(
        code: ValidationCode,
        is_available: bool,
        result: ValidationResult,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            is_available,
            result: if is_available {
                result
            } else {
                ValidationResult::NotAvailable
            },
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn valid(code: ValidationCode, message: impl Into<String>) -> Self {
        Self::new(code, true, ValidationResult::Valid, message)
    }

    #[must_use]
    pub fn invalid(code: ValidationCode, message: impl Into<String>) -> Self {
        Self::new(code, true, ValidationResult::Invalid, message)
    }

    #[must_use]
    pub fn not_available(code: ValidationCode, message: impl Into<String>) -> Self {
        Self::new(code, false, ValidationResult::NotAvailable, message)
    }

    /// Attaches structured details to the validation
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Ordered list of validations with their reduced state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAggregate {
    pub validations: Vec<Validation>,
    pub validation_state: ValidationState,
}

impl ValidationAggregate {
    #[must_use]
    pub fn from_validations(validations: Vec<Validation>) -> Self {
        let validation_state = ValidationState::reduce(validations.iter().map(|v| &v.result));
        Self {
            validations,
            validation_state,
        }
    }

    /// First validation reported for `code`
    #[must_use]
    pub fn find(&self, code: ValidationCode) -> Option<&Validation> {
        self.validations.iter().find(|v| v.code == code)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation_state == ValidationState::Valid
    }
}

impl FromIterator<Validation> for ValidationAggregate {
    fn from_iter<T: IntoIterator<Item = Validation>>(iter: T) -> Self {
        Self::from_validations(iter.into_iter().collect())
    }
}
