use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use pki_types::{CertInfo, CsrInfo, SubjectAltNames, SubjectInfo};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{ExtendedKeyUsage, GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::{AttributeTypeAndValue, SubjectPublicKeyInfo, X509Name};

use crate::constants::{
    signature_algorithm_name, CERTIFICATE_PEM_LABEL, CSR_PEM_LABELS, PEM_BLOCK_START,
};
use crate::error::{CertificateError, CertificateResult};

/// Parses a PEM CSR into its descriptor
///
/// # Errors
/// Returns [`CertificateError::InvalidCsr`] for empty, non-PEM or malformed input
pub fn parse_csr(pem: &str) -> CertificateResult<CsrInfo> {
    CsrDocument::from_pem(pem).map(CsrDocument::into_info)
}

/// Parses a PEM certificate into its descriptor
///
/// # Errors
/// Returns [`CertificateError::InvalidCertificate`] for empty, non-PEM or malformed input
pub fn parse_cert(pem: &str) -> CertificateResult<CertInfo> {
    CertificateDocument::from_pem(pem).map(CertificateDocument::into_info)
}

/// Parses a concatenation of PEM certificates. Blank input is an empty chain.
///
/// # Errors
/// Returns [`CertificateError::InvalidCertificate`] if any block is not a certificate
pub fn parse_chain(pem: &str) -> CertificateResult<Vec<CertificateDocument>> {
    split_pem_blocks(pem)
        .into_iter()
        .map(CertificateDocument::from_pem)
        .collect()
}

/// Splits concatenated PEM text on `-----BEGIN` boundaries
#[must_use]
pub fn split_pem_blocks(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = text
        .match_indices(PEM_BLOCK_START)
        .map(|(index, _)| index)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            text[start..end].trim()
        })
        .collect()
}

/// A decoded CSR. Keeps the DER so signature checks can re-read the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrDocument {
    der: Vec<u8>,
    info: CsrInfo,
}

impl CsrDocument {
    /// # Errors
    /// Returns [`CertificateError::InvalidCsr`] if the input cannot be decoded
    pub fn from_pem(pem: &str) -> CertificateResult<Self> {
        let der = decode_pem(pem, &CSR_PEM_LABELS).map_err(CertificateError::InvalidCsr)?;
        let info = describe_csr(&parse_csr_der(&der)?);
        Ok(Self { der, info })
    }

    #[must_use]
    pub const fn info(&self) -> &CsrInfo {
        &self.info
    }

    #[must_use]
    pub fn into_info(self) -> CsrInfo {
        self.info
    }

    pub(crate) fn x509(&self) -> CertificateResult<X509CertificationRequest<'_>> {
        parse_csr_der(&self.der)
    }
}

/// A decoded certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDocument {
    der: Vec<u8>,
    info: CertInfo,
}

impl CertificateDocument {
    /// # Errors
    /// Returns [`CertificateError::InvalidCertificate`] if the input cannot be decoded
    pub fn from_pem(pem: &str) -> CertificateResult<Self> {
        let der = decode_pem(pem, &[CERTIFICATE_PEM_LABEL])
            .map_err(CertificateError::InvalidCertificate)?;
        let info = describe_certificate(&parse_certificate_der(&der)?)?;
        Ok(Self { der, info })
    }

    /// # Errors
    /// Returns [`CertificateError::InvalidCertificate`] if the bytes are not a certificate
    pub fn from_der(der: &[u8]) -> CertificateResult<Self> {
        let info = describe_certificate(&parse_certificate_der(der)?)?;
        Ok(Self {
            der: der.to_vec(),
            info,
        })
    }

    #[must_use]
    pub const fn info(&self) -> &CertInfo {
        &self.info
    }

    #[must_use]
    pub fn into_info(self) -> CertInfo {
        self.info
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub(crate) fn x509(&self) -> CertificateResult<X509Certificate<'_>> {
        parse_certificate_der(&self.der)
    }
}

/// An RSA private key, PKCS#1 or PKCS#8
pub struct PrivateKeyDocument {
    key: RsaPrivateKey,
}

impl PrivateKeyDocument {
    /// # Errors
    /// Returns [`CertificateError::InvalidPrivateKey`] if the PEM is neither PKCS#1 nor PKCS#8 RSA
    pub fn from_pem(pem: &str) -> CertificateResult<Self> {
        let pem = pem.trim();
        if pem.is_empty() {
            return Err(CertificateError::InvalidPrivateKey("empty input".to_string()));
        }

        RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map(|key| Self { key })
            .map_err(|e| CertificateError::InvalidPrivateKey(e.to_string()))
    }

    /// Compares modulus and public exponent with an RSA public key
    pub(crate) fn matches_public_key(&self, spki: &SubjectPublicKeyInfo<'_>) -> bool {
        match spki.parsed() {
            Ok(PublicKey::RSA(public)) => {
                strip_leading_zeros(public.modulus) == self.key.n().to_bytes_be().as_slice()
                    && strip_leading_zeros(public.exponent)
                        == self.key.e().to_bytes_be().as_slice()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PrivateKeyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyDocument").finish_non_exhaustive()
    }
}

fn decode_pem(pem: &str, labels: &[&str]) -> Result<Vec<u8>, String> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err("empty input".to_string());
    }

    let (_, block) = parse_x509_pem(pem.as_bytes()).map_err(|e| format!("invalid PEM: {e}"))?;
    if !labels.contains(&block.label.as_str()) {
        return Err(format!("unexpected PEM block {}", block.label));
    }
    Ok(block.contents)
}

fn parse_csr_der(der: &[u8]) -> CertificateResult<X509CertificationRequest<'_>> {
    X509CertificationRequest::from_der(der)
        .map(|(_, csr)| csr)
        .map_err(|e| CertificateError::InvalidCsr(e.to_string()))
}

fn parse_certificate_der(der: &[u8]) -> CertificateResult<X509Certificate<'_>> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))
}

fn describe_csr(csr: &X509CertificationRequest<'_>) -> CsrInfo {
    let request = &csr.certification_request_info;

    let mut alt_names = SubjectAltNames::default();
    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                push_general_names(&san.general_names, &mut alt_names);
            }
        }
    }

    CsrInfo {
        subject: subject_info(&request.subject),
        subject_alternative_names: alt_names,
        signature_algorithm: signature_algorithm_name(
            &csr.signature_algorithm.algorithm.to_id_string(),
        ),
        public_key_length: public_key_length(&request.subject_pki),
        public_key_fingerprint: fingerprint(&request.subject_pki),
    }
}

fn describe_certificate(cert: &X509Certificate<'_>) -> CertificateResult<CertInfo> {
    let invalid = |e: x509_parser::error::X509Error| {
        CertificateError::InvalidCertificate(e.to_string())
    };

    let mut alt_names = SubjectAltNames::default();
    if let Some(san) = cert.subject_alternative_name().map_err(invalid)? {
        push_general_names(&san.value.general_names, &mut alt_names);
    }

    let extended_key_usage = cert
        .extended_key_usage()
        .map_err(invalid)?
        .map(|eku| usage_names(eku.value))
        .unwrap_or_default();

    let is_ca = cert
        .basic_constraints()
        .map_err(invalid)?
        .is_some_and(|constraints| constraints.value.ca);

    let validity = cert.validity();

    Ok(CertInfo {
        subject: subject_info(cert.subject()),
        issuer: subject_info(cert.issuer()),
        serial_number: hex::encode(cert.raw_serial()),
        not_before: to_datetime(validity.not_before.timestamp())?,
        not_after: to_datetime(validity.not_after.timestamp())?,
        signature_algorithm: signature_algorithm_name(
            &cert.signature_algorithm.algorithm.to_id_string(),
        ),
        subject_alternative_names: alt_names,
        public_key_length: public_key_length(cert.public_key()),
        public_key_fingerprint: fingerprint(cert.public_key()),
        extended_key_usage,
        is_ca,
    })
}

fn to_datetime(timestamp: i64) -> CertificateResult<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        CertificateError::InvalidCertificate(format!("validity out of range: {timestamp}"))
    })
}

fn subject_info(name: &X509Name<'_>) -> SubjectInfo {
    SubjectInfo {
        common_name: joined(name.iter_common_name()),
        organization: joined(name.iter_organization()),
        organizational_unit: joined(name.iter_organizational_unit()),
        country: joined(name.iter_country()),
        locality: joined(name.iter_locality()),
        state: joined(name.iter_state_or_province()),
        email_address: joined(name.iter_email()),
    }
}

/// Values of a repeated attribute are concatenated without a separator
fn joined<'a, 'b: 'a>(
    values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    let joined: String = values.filter_map(|attr| attr.as_str().ok()).collect();
    (!joined.is_empty()).then_some(joined)
}

fn push_general_names(names: &[GeneralName<'_>], alt_names: &mut SubjectAltNames) {
    for name in names {
        match name {
            GeneralName::DNSName(dns) => alt_names.dns.push((*dns).to_string()),
            GeneralName::RFC822Name(email) => alt_names.emails.push((*email).to_string()),
            GeneralName::URI(uri) => alt_names.uris.push((*uri).to_string()),
            GeneralName::IPAddress(bytes) => {
                if let Some(ip) = ip_from_bytes(bytes) {
                    alt_names.ips.push(ip.to_string());
                }
            }
            _ => {}
        }
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| IpAddr::V6(Ipv6Addr::from(octets)))
}

fn usage_names(eku: &ExtendedKeyUsage<'_>) -> Vec<String> {
    let mut names: Vec<String> = [
        (eku.any, "anyExtendedKeyUsage"),
        (eku.server_auth, "serverAuth"),
        (eku.client_auth, "clientAuth"),
        (eku.code_signing, "codeSigning"),
        (eku.email_protection, "emailProtection"),
        (eku.time_stamping, "timeStamping"),
        (eku.ocsp_signing, "OCSPSigning"),
    ]
    .into_iter()
    .filter(|(present, _)| *present)
    .map(|(_, name)| name.to_string())
    .collect();

    names.extend(eku.other.iter().map(|oid| oid.to_id_string()));
    names
}

/// RSA modulus length in bits, 0 for other key types
fn public_key_length(spki: &SubjectPublicKeyInfo<'_>) -> u32 {
    match spki.parsed() {
        Ok(PublicKey::RSA(public)) => modulus_bits(public.modulus),
        _ => 0,
    }
}

fn modulus_bits(modulus: &[u8]) -> u32 {
    let trimmed = strip_leading_zeros(modulus);
    let Some(first) = trimmed.first() else {
        return 0;
    };
    let bytes = u32::try_from(trimmed.len()).unwrap_or(0);
    (bytes - 1) * 8 + (8 - first.leading_zeros())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

pub(crate) fn fingerprint(spki: &SubjectPublicKeyInfo<'_>) -> String {
    hex::encode(Sha256::digest(spki.raw))
}
