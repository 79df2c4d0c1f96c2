//! The catalogue of checks. Each check reads what it needs from a [`CheckInput`] and reports
//! `NOT_AVAILABLE` when that input is absent.

use std::collections::BTreeSet;

use chrono::DateTime;
use pki_types::{
    DfspCa, SubjectAltNames, SubjectInfo, Validation, ValidationCode, ValidationState,
};
use serde_json::json;
use x509_parser::public_key::PublicKey;

use crate::chain::{classify_root, verify_path, ChainOutcome, RootClassification, TrustStore};
use crate::constants::ALLOWED_SIGNATURE_ALGORITHMS;
use crate::error::CertificateResult;
use crate::parser::{parse_chain, CertificateDocument, CsrDocument, PrivateKeyDocument};

/// CA material a DFSP has on file, with the state of its own validation
#[derive(Debug, Clone)]
pub struct Authority {
    pub root: Option<CertificateDocument>,
    pub chain: Vec<CertificateDocument>,
    pub validation_state: ValidationState,
}

impl Authority {
    /// # Errors
    /// Returns an error if the stored root or chain cannot be parsed
    pub fn from_dfsp_ca(ca: &DfspCa) -> CertificateResult<Self> {
        let root = ca
            .bundle
            .root_certificate
            .as_deref()
            .filter(|pem| !pem.trim().is_empty())
            .map(CertificateDocument::from_pem)
            .transpose()?;
        let chain = parse_chain(ca.bundle.intermediate_chain.as_deref().unwrap_or_default())?;

        Ok(Self {
            root,
            chain,
            validation_state: ca.validation_state,
        })
    }

    fn is_empty(&self) -> bool {
        self.root.is_none() && self.chain.is_empty()
    }
}

/// Everything a check may look at
pub struct CheckInput<'a> {
    pub csr: Option<&'a CsrDocument>,
    pub certificate: Option<&'a CertificateDocument>,
    pub chain: &'a [CertificateDocument],
    pub root: Option<&'a CertificateDocument>,
    pub key: Option<&'a PrivateKeyDocument>,
    pub authority: Option<&'a Authority>,
    pub trust_store: &'a TrustStore,
    /// Unix seconds
    pub now: i64,
}

pub(crate) fn certificate_validity(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificateValidity;
    let Some(certificate) = input.certificate else {
        return Ok(Validation::not_available(code, "No certificate to check"));
    };

    let info = certificate.info();
    let now = input.now;
    let window = format!(
        "{} - {}",
        info.not_before.to_rfc3339(),
        info.not_after.to_rfc3339()
    );

    if info.not_before.timestamp() <= now && now <= info.not_after.timestamp() {
        Ok(Validation::valid(code, format!("Certificate is valid for {window}")))
    } else {
        let at = DateTime::from_timestamp(now, 0)
            .map_or_else(|| now.to_string(), |at| at.to_rfc3339());
        Ok(Validation::invalid(
            code,
            format!("Certificate is not valid at {at}, validity is {window}"),
        ))
    }
}

pub(crate) fn csr_mandatory_distinguished_name(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrMandatoryDistinguishedName;
    let Some(csr) = input.csr else {
        return Ok(Validation::not_available(code, "No CSR to check"));
    };

    let missing: Vec<&str> = csr
        .info()
        .subject
        .fields()
        .into_iter()
        .filter(|(_, value)| value.map_or(true, |value| value.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

    if missing.is_empty() {
        Ok(Validation::valid(
            code,
            "CSR has all mandatory distinguished name attributes",
        ))
    } else {
        Ok(Validation::invalid(
            code,
            format!(
                "CSR is missing mandatory distinguished name attributes: {}",
                missing.join(", ")
            ),
        )
        .with_details(json!({ "missingAttributes": missing })))
    }
}

pub(crate) fn csr_public_key_length_2048(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    Ok(csr_public_key_length(input, ValidationCode::CsrPublicKeyLength2048, 2048))
}

pub(crate) fn csr_public_key_length_4096(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    Ok(csr_public_key_length(input, ValidationCode::CsrPublicKeyLength4096, 4096))
}

fn csr_public_key_length(input: &CheckInput<'_>, code: ValidationCode, expected: u32) -> Validation {
    match input.csr {
        Some(csr) => key_length("CSR", code, csr.info().public_key_length, expected),
        None => Validation::not_available(code, "No CSR to check"),
    }
}

pub(crate) fn certificate_public_key_length_2048(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    Ok(certificate_public_key_length(
        input,
        ValidationCode::CertificatePublicKeyLength2048,
        2048,
    ))
}

pub(crate) fn certificate_public_key_length_4096(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    Ok(certificate_public_key_length(
        input,
        ValidationCode::CertificatePublicKeyLength4096,
        4096,
    ))
}

fn certificate_public_key_length(
    input: &CheckInput<'_>,
    code: ValidationCode,
    expected: u32,
) -> Validation {
    match input.certificate {
        Some(cert) => key_length("Certificate", code, cert.info().public_key_length, expected),
        None => Validation::not_available(code, "No certificate to check"),
    }
}

fn key_length(subject: &str, code: ValidationCode, actual: u32, expected: u32) -> Validation {
    let details = json!({ "actualKeySize": actual, "expectedKeySize": expected });
    let validation = if actual >= expected {
        Validation::valid(code, format!("{subject} public key length is {actual} bits"))
    } else {
        Validation::invalid(
            code,
            format!("{subject} public key length is {actual} bits, at least {expected} required"),
        )
    };
    validation.with_details(details)
}

pub(crate) fn csr_signature_algorithm(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrSignatureAlgorithmSha256_512;
    Ok(match input.csr {
        Some(csr) => signature_algorithm("CSR", code, &csr.info().signature_algorithm),
        None => Validation::not_available(code, "No CSR to check"),
    })
}

pub(crate) fn certificate_signature_algorithm(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificateSignatureAlgorithmSha256_512;
    Ok(match input.certificate {
        Some(cert) => signature_algorithm("Certificate", code, &cert.info().signature_algorithm),
        None => Validation::not_available(code, "No certificate to check"),
    })
}

/// The message names only the algorithm found
fn signature_algorithm(subject: &str, code: ValidationCode, algorithm: &str) -> Validation {
    if ALLOWED_SIGNATURE_ALGORITHMS.contains(&algorithm) {
        Validation::valid(
            code,
            format!("{subject} has a valid Signature Algorithm : {algorithm}"),
        )
    } else {
        Validation::invalid(
            code,
            format!("{subject} has an invalid Signature Algorithm : {algorithm}"),
        )
    }
}

pub(crate) fn csr_signature_valid(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrSignatureValid;
    let Some(csr) = input.csr else {
        return Ok(Validation::not_available(code, "No CSR to check"));
    };

    Ok(match csr.x509()?.verify_signature() {
        Ok(()) => Validation::valid(code, "CSR signature is valid"),
        Err(e) => Validation::invalid(code, format!("CSR signature is invalid: {e}")),
    })
}

pub(crate) fn certificate_usage_server(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    Ok(extended_key_usage(
        input,
        ValidationCode::CertificateUsageServer,
        "serverAuth",
        "TLS server authentication",
    ))
}

pub(crate) fn certificate_usage_client(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    Ok(extended_key_usage(
        input,
        ValidationCode::CertificateUsageClient,
        "clientAuth",
        "TLS client authentication",
    ))
}

fn extended_key_usage(
    input: &CheckInput<'_>,
    code: ValidationCode,
    usage: &str,
    description: &str,
) -> Validation {
    let Some(certificate) = input.certificate else {
        return Validation::not_available(code, "No certificate to check");
    };

    if certificate
        .info()
        .extended_key_usage
        .iter()
        .any(|name| name == usage)
    {
        Validation::valid(code, format!("Certificate has {description} usage"))
    } else {
        Validation::invalid(code, format!("Certificate does not have {description} usage"))
    }
}

pub(crate) fn ca_certificate_usage(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CaCertificateUsage;
    if input.root.is_none() && input.chain.is_empty() {
        return Ok(Validation::not_available(code, "No CA certificates to check"));
    }

    let not_ca: Vec<String> = input
        .root
        .into_iter()
        .chain(input.chain)
        .filter(|cert| !cert.info().is_ca)
        .map(|cert| display_name(&cert.info().subject))
        .collect();

    if not_ca.is_empty() {
        Ok(Validation::valid(code, "All certificates are CA certificates"))
    } else {
        Ok(Validation::invalid(
            code,
            format!("Certificates without the CA flag: {}", not_ca.join(", ")),
        ))
    }
}

pub(crate) fn verify_root_certificate(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::VerifyRootCertificate;
    let Some(root) = input.root else {
        return Ok(Validation::not_available(code, "No root certificate to check"));
    };

    let classification = classify_root(root, input.trust_store)?;
    let validation = match classification {
        RootClassification::SelfSigned => {
            Validation::valid(code, "Root certificate is self-signed")
        }
        RootClassification::Signed => {
            Validation::valid(code, "Root certificate is signed by a trusted root")
        }
        RootClassification::Untrusted => Validation::invalid(
            code,
            "Root certificate is neither self-signed nor signed by a trusted root",
        ),
    };
    Ok(validation.with_details(json!({ "rootCertificateState": classification.as_str() })))
}

pub(crate) fn verify_chain_certificates(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::VerifyChainCertificates;
    let Some((top, rest)) = input.chain.split_first() else {
        return Ok(Validation::not_available(code, "No intermediate chain to check"));
    };

    let outcome = verify_path(top, rest, input.root, input.trust_store, input.now)?;
    Ok(chain_validation(code, "Intermediate chain", outcome))
}

pub(crate) fn certificate_chain(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificateChain;
    let Some(certificate) = input.certificate else {
        return Ok(Validation::not_available(code, "No certificate to check"));
    };

    let outcome = verify_path(
        certificate,
        input.chain,
        input.root,
        input.trust_store,
        input.now,
    )?;
    Ok(chain_validation(code, "Certificate chain", outcome))
}

fn chain_validation(code: ValidationCode, subject: &str, outcome: ChainOutcome) -> Validation {
    match outcome {
        ChainOutcome::Verified { .. } => Validation::valid(code, format!("{subject} is valid")),
        ChainOutcome::Broken(reason) => {
            Validation::invalid(code, format!("{subject} is invalid: {reason}"))
        }
    }
}

pub(crate) fn csr_cert_same_subject_info(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrCertSameSubjectInfo;
    let (Some(csr), Some(certificate)) = (input.csr, input.certificate) else {
        return Ok(Validation::not_available(code, "CSR and certificate are both needed"));
    };
    let csr = csr.info();
    let cert = certificate.info();

    if let Some((field, expected, actual)) = compare_subjects(&csr.subject, &cert.subject) {
        return Ok(Validation::invalid(
            code,
            format!("CSR and certificate have a different subject {field}"),
        )
        .with_details(json!({ "field": field, "csr": expected, "certificate": actual })));
    }

    if let Some(field) = compare_alt_names(
        &csr.subject_alternative_names,
        &cert.subject_alternative_names,
    ) {
        return Ok(Validation::invalid(
            code,
            format!("CSR and certificate have different subject alternative names: {field}"),
        )
        .with_details(json!({ "field": field })));
    }

    Ok(Validation::valid(
        code,
        "CSR and certificate have the same subject info",
    ))
}

/// First subject field that differs, with the CSR and certificate values
fn compare_subjects<'a>(
    csr: &'a SubjectInfo,
    cert: &'a SubjectInfo,
) -> Option<(&'static str, Option<&'a str>, Option<&'a str>)> {
    csr.fields()
        .into_iter()
        .zip(cert.fields())
        .find(|((_, expected), (_, actual))| expected != actual)
        .map(|((field, expected), (_, actual))| (field, expected, actual))
}

/// Name of the first alternative name kind whose values differ. Order is not significant.
#[must_use]
pub fn compare_alt_names(left: &SubjectAltNames, right: &SubjectAltNames) -> Option<&'static str> {
    left.fields()
        .into_iter()
        .zip(right.fields())
        .find(|((_, a), (_, b))| {
            a.iter().collect::<BTreeSet<_>>() != b.iter().collect::<BTreeSet<_>>()
        })
        .map(|((field, _), _)| field)
}

pub(crate) fn csr_cert_same_cn(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrCertSameCn;
    let (Some(csr), Some(certificate)) = (input.csr, input.certificate) else {
        return Ok(Validation::not_available(code, "CSR and certificate are both needed"));
    };

    let expected = csr.info().subject.common_name.as_deref();
    let actual = certificate.info().subject.common_name.as_deref();
    if expected == actual {
        Ok(Validation::valid(code, "CSR and certificate have the same CN"))
    } else {
        Ok(Validation::invalid(code, "CSR and certificate have a different CN")
            .with_details(json!({ "csr": expected, "certificate": actual })))
    }
}

pub(crate) fn csr_cert_same_public_key(input: &CheckInput<'_>) -> CertificateResult<Validation> {
    let code = ValidationCode::CsrCertSamePublicKey;
    let (Some(csr), Some(certificate)) = (input.csr, input.certificate) else {
        return Ok(Validation::not_available(code, "CSR and certificate are both needed"));
    };

    if csr.info().public_key_fingerprint == certificate.info().public_key_fingerprint {
        Ok(Validation::valid(
            code,
            "CSR and certificate have the same public key",
        ))
    } else {
        Ok(Validation::invalid(
            code,
            "CSR and certificate have a different public key",
        ))
    }
}

pub(crate) fn certificate_public_private_key_match(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificatePublicPrivateKeyMatch;
    let Some(certificate) = input.certificate else {
        return Ok(Validation::not_available(code, "No certificate to check"));
    };
    let Some(key) = input.key else {
        return Ok(Validation::not_available(
            code,
            "No private key, the key pair was not generated by the hub",
        ));
    };

    if key.matches_public_key(certificate.x509()?.public_key()) {
        Ok(Validation::valid(
            code,
            "Certificate public key matches the private key",
        ))
    } else {
        Ok(Validation::invalid(
            code,
            "Certificate public key does not match the private key",
        ))
    }
}

pub(crate) fn certificate_signed_by_dfsp_ca(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificateSignedByDfspCa;
    let Some(certificate) = input.certificate else {
        return Ok(Validation::not_available(code, "No certificate to check"));
    };
    let Some(authority) = input.authority.filter(|authority| !authority.is_empty()) else {
        return Ok(Validation::not_available(code, "No DFSP CA on file"));
    };
    if authority.validation_state == ValidationState::Invalid {
        return Ok(Validation::invalid(code, "DFSP CA is invalid"));
    }

    // without a root, the last certificate of the chain is the anchor
    let (intermediates, root) = match (&authority.root, authority.chain.split_last()) {
        (Some(root), _) => (authority.chain.as_slice(), Some(root)),
        (None, Some((last, rest))) => (rest, Some(last)),
        (None, None) => (authority.chain.as_slice(), None),
    };

    let outcome = verify_path(
        certificate,
        intermediates,
        root,
        &TrustStore::empty(),
        input.now,
    )?;
    Ok(match outcome {
        ChainOutcome::Verified { .. } => {
            Validation::valid(code, "Certificate is signed by the DFSP CA")
        }
        ChainOutcome::Broken(reason) => Validation::invalid(
            code,
            format!("Certificate is not signed by the DFSP CA: {reason}"),
        ),
    })
}

pub(crate) fn certificate_public_key_parseable(
    input: &CheckInput<'_>,
) -> CertificateResult<Validation> {
    let code = ValidationCode::CertificatePublicKeyParseable;
    let Some(certificate) = input.certificate else {
        return Ok(Validation::not_available(code, "No certificate to check"));
    };

    Ok(match certificate.x509()?.public_key().parsed() {
        Ok(PublicKey::Unknown(_)) => {
            Validation::invalid(code, "Certificate public key algorithm is not supported")
        }
        Ok(_) => Validation::valid(code, "Certificate public key is parseable"),
        Err(e) => Validation::invalid(
            code,
            format!("Certificate public key is not parseable: {e}"),
        ),
    })
}

fn display_name(subject: &SubjectInfo) -> String {
    subject
        .common_name
        .clone()
        .unwrap_or_else(|| "<no CN>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alt_names(dns: &[&str]) -> SubjectAltNames {
        SubjectAltNames {
            dns: dns.iter().map(ToString::to_string).collect(),
            ..SubjectAltNames::default()
        }
    }

    #[test]
    fn test_alt_name_comparison_ignores_order() {
        let cases = vec![
            ("same order", &["a", "b"][..], &["a", "b"][..], None),
            ("reversed", &["a", "b"][..], &["b", "a"][..], None),
            ("different value", &["a", "b"][..], &["a", "c"][..], Some("dns")),
            ("missing value", &["a", "b"][..], &["a"][..], Some("dns")),
            ("both empty", &[][..], &[][..], None),
        ];

        for (name, left, right, expected) in cases {
            assert_eq!(
                compare_alt_names(&alt_names(left), &alt_names(right)),
                expected,
                "case: {name}"
            );
        }
    }

    #[test]
    fn test_alt_name_comparison_names_the_field() {
        let left = SubjectAltNames {
            ips: vec!["10.0.0.1".to_string()],
            ..SubjectAltNames::default()
        };
        assert_eq!(
            compare_alt_names(&left, &SubjectAltNames::default()),
            Some("ips")
        );
    }

    #[test]
    fn test_key_length_details() {
        let failing = key_length("CSR", ValidationCode::CsrPublicKeyLength4096, 2048, 4096);
        assert_eq!(failing.result, pki_types::ValidationResult::Invalid);
        assert_eq!(
            failing.details,
            Some(json!({ "actualKeySize": 2048, "expectedKeySize": 4096 }))
        );

        let passing = key_length("CSR", ValidationCode::CsrPublicKeyLength2048, 2048, 2048);
        assert_eq!(passing.result, pki_types::ValidationResult::Valid);
    }

    #[test]
    fn test_signature_algorithm_message_names_only_the_algorithm() {
        let sha256 = signature_algorithm(
            "CSR",
            ValidationCode::CsrSignatureAlgorithmSha256_512,
            "sha256WithRSAEncryption",
        );
        assert!(sha256.message.contains("256"));
        assert!(!sha256.message.contains("512"));

        let sha1 = signature_algorithm(
            "CSR",
            ValidationCode::CsrSignatureAlgorithmSha256_512,
            "sha1WithRSAEncryption",
        );
        assert_eq!(sha1.result, pki_types::ValidationResult::Invalid);
    }
}
