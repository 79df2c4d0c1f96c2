use chrono::{DateTime, Utc};
use pki_types::{CaBundle, CertificateBundle, DfspCa, ValidationAggregate, ValidationCode};
use tracing::instrument;

use crate::chain::TrustStore;
use crate::checks::{Authority, CheckInput};
use crate::error::CertificateResult;
use crate::parser::{parse_chain, CertificateDocument, CsrDocument, PrivateKeyDocument};
use crate::registry::ValidationRegistry;

/// CSR and certificate material of an enrollment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollmentMaterial<'a> {
    pub csr: &'a str,
    pub certificate: Option<&'a str>,
    /// Only set when the key pair was generated by the hub
    pub key: Option<&'a str>,
    /// Chain and root the certificate should verify against
    pub intermediate_chain: Option<&'a str>,
    pub root_certificate: Option<&'a str>,
    /// CA bundle the DFSP has on file
    pub authority: Option<&'a DfspCa>,
}

impl<'a> EnrollmentMaterial<'a> {
    #[must_use]
    pub const fn new(csr: &'a str) -> Self {
        Self {
            csr,
            certificate: None,
            key: None,
            intermediate_chain: None,
            root_certificate: None,
            authority: None,
        }
    }

    #[must_use]
    pub const fn with_certificate(mut self, certificate: Option<&'a str>) -> Self {
        self.certificate = certificate;
        self
    }

    #[must_use]
    pub const fn with_key(mut self, key: Option<&'a str>) -> Self {
        self.key = key;
        self
    }

    #[must_use]
    pub const fn with_chain(
        mut self,
        intermediate_chain: Option<&'a str>,
        root_certificate: Option<&'a str>,
    ) -> Self {
        self.intermediate_chain = intermediate_chain;
        self.root_certificate = root_certificate;
        self
    }

    #[must_use]
    pub const fn with_authority(mut self, authority: Option<&'a DfspCa>) -> Self {
        self.authority = authority;
        self
    }
}

/// Runs validation codes against certificate material
///
/// Inputs are parsed before any check runs, so a malformed CSR, certificate or key fails the
/// whole call instead of producing a partial aggregate.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: ValidationRegistry,
    trust_store: TrustStore,
    fixed_time: Option<i64>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationRegistry::catalogue(), TrustStore::webpki_roots())
    }
}

impl Validator {
    #[must_use]
    pub const fn new(registry: ValidationRegistry, trust_store: TrustStore) -> Self {
        Self {
            registry,
            trust_store,
            fixed_time: None,
        }
    }

    /// Evaluates time-dependent checks at `at` instead of the current time
    #[must_use]
    pub fn with_fixed_time(mut self, at: DateTime<Utc>) -> Self {
        self.fixed_time = Some(at.timestamp());
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &ValidationRegistry {
        &self.registry
    }

    fn now(&self) -> i64 {
        self.fixed_time.unwrap_or_else(|| Utc::now().timestamp())
    }

    /// Validates a leaf certificate with its chain, root and optional key
    ///
    /// # Errors
    /// Returns an error if any of the supplied PEM material cannot be parsed
    #[instrument(skip_all, fields(codes = codes.len()))]
    pub fn validate_certificate_bundle(
        &self,
        codes: &[ValidationCode],
        bundle: &CertificateBundle,
    ) -> CertificateResult<ValidationAggregate> {
        let certificate = CertificateDocument::from_pem(&bundle.certificate)?;
        let chain = parse_chain(bundle.intermediate_chain.as_deref().unwrap_or_default())?;
        let root = optional_certificate(bundle.root_certificate.as_deref())?;
        let key = optional_key(bundle.key.as_deref())?;

        self.registry.run(
            codes,
            &CheckInput {
                csr: None,
                certificate: Some(&certificate),
                chain: &chain,
                root: root.as_ref(),
                key: key.as_ref(),
                authority: None,
                trust_store: &self.trust_store,
                now: self.now(),
            },
        )
    }

    /// Validates a root certificate and its intermediate chain
    ///
    /// # Errors
    /// Returns an error if any of the supplied PEM material cannot be parsed
    #[instrument(skip_all, fields(codes = codes.len()))]
    pub fn validate_ca_bundle(
        &self,
        codes: &[ValidationCode],
        bundle: &CaBundle,
    ) -> CertificateResult<ValidationAggregate> {
        let chain = parse_chain(bundle.intermediate_chain.as_deref().unwrap_or_default())?;
        let root = optional_certificate(bundle.root_certificate.as_deref())?;
        let key = optional_key(bundle.key.as_deref())?;

        self.registry.run(
            codes,
            &CheckInput {
                csr: None,
                certificate: None,
                chain: &chain,
                root: root.as_ref(),
                key: key.as_ref(),
                authority: None,
                trust_store: &self.trust_store,
                now: self.now(),
            },
        )
    }

    /// Validates a CSR and, once signed, its certificate
    ///
    /// # Errors
    /// Returns an error if the CSR or any other supplied PEM material cannot be parsed
    #[instrument(skip_all, fields(codes = codes.len()))]
    pub fn validate_enrollment(
        &self,
        codes: &[ValidationCode],
        material: &EnrollmentMaterial<'_>,
    ) -> CertificateResult<ValidationAggregate> {
        let csr = CsrDocument::from_pem(material.csr)?;
        let certificate = optional_certificate(material.certificate)?;
        let key = optional_key(material.key)?;
        let chain = parse_chain(material.intermediate_chain.unwrap_or_default())?;
        let root = optional_certificate(material.root_certificate)?;
        let authority = material
            .authority
            .map(Authority::from_dfsp_ca)
            .transpose()?;

        self.registry.run(
            codes,
            &CheckInput {
                csr: Some(&csr),
                certificate: certificate.as_ref(),
                chain: &chain,
                root: root.as_ref(),
                key: key.as_ref(),
                authority: authority.as_ref(),
                trust_store: &self.trust_store,
                now: self.now(),
            },
        )
    }
}

fn optional_certificate(pem: Option<&str>) -> CertificateResult<Option<CertificateDocument>> {
    non_blank(pem).map(CertificateDocument::from_pem).transpose()
}

fn optional_key(pem: Option<&str>) -> CertificateResult<Option<PrivateKeyDocument>> {
    non_blank(pem).map(PrivateKeyDocument::from_pem).transpose()
}

fn non_blank(pem: Option<&str>) -> Option<&str> {
    pem.filter(|pem| !pem.trim().is_empty())
}
