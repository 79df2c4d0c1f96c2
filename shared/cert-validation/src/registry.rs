use std::collections::HashMap;
use std::fmt;

use pki_types::{Validation, ValidationAggregate, ValidationCode};
use tracing::warn;

use crate::checks::{self, CheckInput};
use crate::error::CertificateResult;

/// Signature of every catalogue entry
pub type CheckFn = fn(&CheckInput<'_>) -> CertificateResult<Validation>;

/// Dispatch table from validation code to check
///
/// Backends that only support part of the catalogue remove entries with [`Self::without`];
/// codes without an entry are skipped when running.
#[derive(Clone)]
pub struct ValidationRegistry {
    checks: HashMap<ValidationCode, CheckFn>,
}

impl ValidationRegistry {
    /// Registry without any check
    #[must_use]
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Registry holding every known check
    #[must_use]
    pub fn catalogue() -> Self {
        Self::empty()
            .register(
                ValidationCode::CertificateValidity,
                checks::certificate_validity,
            )
            .register(
                ValidationCode::CsrMandatoryDistinguishedName,
                checks::csr_mandatory_distinguished_name,
            )
            .register(
                ValidationCode::CsrPublicKeyLength2048,
                checks::csr_public_key_length_2048,
            )
            .register(
                ValidationCode::CsrPublicKeyLength4096,
                checks::csr_public_key_length_4096,
            )
            .register(
                ValidationCode::CertificatePublicKeyLength2048,
                checks::certificate_public_key_length_2048,
            )
            .register(
                ValidationCode::CertificatePublicKeyLength4096,
                checks::certificate_public_key_length_4096,
            )
            .register(
                ValidationCode::CsrSignatureAlgorithmSha256_512,
                checks::csr_signature_algorithm,
            )
            .register(
                ValidationCode::CertificateSignatureAlgorithmSha256_512,
                checks::certificate_signature_algorithm,
            )
            .register(
                ValidationCode::CsrSignatureValid,
                checks::csr_signature_valid,
            )
            .register(
                ValidationCode::CertificateUsageServer,
                checks::certificate_usage_server,
            )
            .register(
                ValidationCode::CertificateUsageClient,
                checks::certificate_usage_client,
            )
            .register(
                ValidationCode::CaCertificateUsage,
                checks::ca_certificate_usage,
            )
            .register(
                ValidationCode::VerifyRootCertificate,
                checks::verify_root_certificate,
            )
            .register(
                ValidationCode::VerifyChainCertificates,
                checks::verify_chain_certificates,
            )
            .register(ValidationCode::CertificateChain, checks::certificate_chain)
            .register(
                ValidationCode::CsrCertSameSubjectInfo,
                checks::csr_cert_same_subject_info,
            )
            .register(ValidationCode::CsrCertSameCn, checks::csr_cert_same_cn)
            .register(
                ValidationCode::CsrCertSamePublicKey,
                checks::csr_cert_same_public_key,
            )
            .register(
                ValidationCode::CertificatePublicPrivateKeyMatch,
                checks::certificate_public_private_key_match,
            )
            .register(
                ValidationCode::CertificateSignedByDfspCa,
                checks::certificate_signed_by_dfsp_ca,
            )
            .register(
                ValidationCode::CertificatePublicKeyParseable,
                checks::certificate_public_key_parseable,
            )
    }

    #[must_use]
    pub fn register(mut self, code: ValidationCode, check: CheckFn) -> Self {
        self.checks.insert(code, check);
        self
    }

    #[must_use]
    pub fn without(mut self, code: ValidationCode) -> Self {
        self.checks.remove(&code);
        self
    }

    #[must_use]
    pub fn supports(&self, code: ValidationCode) -> bool {
        self.checks.contains_key(&code)
    }

    /// Runs `codes` in order and reduces the results
    ///
    /// # Errors
    /// Propagates the first check error. No partial aggregate is returned.
    pub fn run(
        &self,
        codes: &[ValidationCode],
        input: &CheckInput<'_>,
    ) -> CertificateResult<ValidationAggregate> {
        let mut validations = Vec::with_capacity(codes.len());

        for code in codes {
            let Some(check) = self.checks.get(code) else {
                warn!(code = %code, "No check registered for validation code, skipping");
                continue;
            };
            validations.push(check(input)?);
        }

        Ok(ValidationAggregate::from_validations(validations))
    }
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::catalogue()
    }
}

impl fmt::Debug for ValidationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<_> = self.checks.keys().collect();
        codes.sort();
        f.debug_struct("ValidationRegistry")
            .field("codes", &codes)
            .finish()
    }
}
