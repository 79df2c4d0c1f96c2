use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::constants::MAX_CHAIN_DEPTH;
use crate::error::CertificateResult;
use crate::parser::CertificateDocument;

/// Trust anchors identified by subject name and public key
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    anchors: Vec<TrustAnchor>,
}

/// Both fields hold complete DER encodings
#[derive(Debug, Clone)]
struct TrustAnchor {
    subject: Vec<u8>,
    spki: Vec<u8>,
}

impl TrustStore {
    /// Store without any anchor. Only explicitly supplied roots are trusted.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store holding the Mozilla root program bundled by `webpki-roots`
    #[must_use]
    pub fn webpki_roots() -> Self {
        // webpki anchors carry the contents of the subject and SPKI sequences, without their header
        let anchors = webpki_roots::TLS_SERVER_ROOTS
            .iter()
            .map(|anchor| TrustAnchor {
                subject: der_sequence(anchor.subject.as_ref()),
                spki: der_sequence(anchor.subject_public_key_info.as_ref()),
            })
            .collect();

        Self { anchors }
    }

    /// Adds a certificate as an anchor
    ///
    /// # Errors
    /// Returns an error if the certificate cannot be re-read
    pub fn add_certificate(&mut self, certificate: &CertificateDocument) -> CertificateResult<()> {
        let x509 = certificate.x509()?;
        self.anchors.push(TrustAnchor {
            subject: x509.subject().as_raw().to_vec(),
            spki: x509.public_key().raw.to_vec(),
        });
        Ok(())
    }

    /// # Errors
    /// Returns an error if the certificate cannot be re-read
    pub fn with_certificate(mut self, certificate: &CertificateDocument) -> CertificateResult<Self> {
        self.add_certificate(certificate)?;
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Whether an anchor named as the certificate's issuer verifies its signature
    fn vouches_for(&self, cert: &X509Certificate<'_>) -> bool {
        let issuer = cert.issuer().as_raw();
        self.anchors
            .iter()
            .filter(|anchor| anchor.subject == issuer)
            .any(|anchor| {
                SubjectPublicKeyInfo::from_der(&anchor.spki)
                    .is_ok_and(|(_, spki)| cert.verify_signature(Some(&spki)).is_ok())
            })
    }
}

/// How a root certificate earns its trust
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootClassification {
    SelfSigned,
    /// Signed by an anchor of the trust store
    Signed,
    Untrusted,
}

impl RootClassification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfSigned => "SELF_SIGNED",
            Self::Signed => "SIGNED",
            Self::Untrusted => "UNTRUSTED",
        }
    }
}

/// Outcome of following a certificate's issuers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Number of issuers followed before reaching an anchor
    Verified { depth: usize },
    Broken(String),
}

impl ChainOutcome {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Classifies a root as self-signed, signed by a trusted anchor, or neither
///
/// # Errors
/// Returns an error if the certificate cannot be re-read
pub fn classify_root(
    root: &CertificateDocument,
    trust_store: &TrustStore,
) -> CertificateResult<RootClassification> {
    let x509 = root.x509()?;

    let classification = if is_self_signed(&x509) {
        RootClassification::SelfSigned
    } else if trust_store.vouches_for(&x509) {
        RootClassification::Signed
    } else {
        RootClassification::Untrusted
    };
    Ok(classification)
}

/// Follows issuers from `leaf` through `intermediates` until it reaches `root` or an anchor of
/// the trust store. Issuers are checked against `now`, the leaf is not.
///
/// # Errors
/// Returns an error if one of the certificates cannot be re-read
pub fn verify_path(
    leaf: &CertificateDocument,
    intermediates: &[CertificateDocument],
    root: Option<&CertificateDocument>,
    trust_store: &TrustStore,
    now: i64,
) -> CertificateResult<ChainOutcome> {
    let leaf = leaf.x509()?;
    let intermediates = intermediates
        .iter()
        .map(CertificateDocument::x509)
        .collect::<CertificateResult<Vec<_>>>()?;
    let root = root.map(CertificateDocument::x509).transpose()?;

    let mut used = vec![false; intermediates.len()];
    let mut current = &leaf;

    for depth in 0..MAX_CHAIN_DEPTH {
        if depth > 0 {
            if let Some(reason) = outside_validity(current, now) {
                return Ok(ChainOutcome::Broken(reason));
            }
        }

        if let Some(root) = &root {
            if same_entity(current, root) {
                return Ok(ChainOutcome::Verified { depth });
            }
            if issued_by(current, root) {
                return Ok(outside_validity(root, now).map_or(
                    ChainOutcome::Verified { depth: depth + 1 },
                    ChainOutcome::Broken,
                ));
            }
        }

        let next = intermediates
            .iter()
            .enumerate()
            .find(|(index, candidate)| !used[*index] && issued_by(current, candidate))
            .map(|(index, _)| index);

        if let Some(index) = next {
            used[index] = true;
            current = &intermediates[index];
            continue;
        }

        if trust_store.vouches_for(current) {
            return Ok(ChainOutcome::Verified { depth: depth + 1 });
        }

        let reason = if is_self_signed(current) {
            format!("Self-signed certificate {} is not trusted", current.subject())
        } else {
            format!("Unable to find issuer certificate for {}", current.subject())
        };
        return Ok(ChainOutcome::Broken(reason));
    }

    Ok(ChainOutcome::Broken(format!(
        "Certificate chain is longer than {MAX_CHAIN_DEPTH} certificates"
    )))
}

fn is_self_signed(cert: &X509Certificate<'_>) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw() && cert.verify_signature(None).is_ok()
}

fn issued_by(child: &X509Certificate<'_>, parent: &X509Certificate<'_>) -> bool {
    child.issuer().as_raw() == parent.subject().as_raw()
        && child.verify_signature(Some(parent.public_key())).is_ok()
}

fn same_entity(a: &X509Certificate<'_>, b: &X509Certificate<'_>) -> bool {
    a.subject().as_raw() == b.subject().as_raw() && a.public_key().raw == b.public_key().raw
}

fn outside_validity(cert: &X509Certificate<'_>, now: i64) -> Option<String> {
    let validity = cert.validity();
    let in_window =
        validity.not_before.timestamp() <= now && now <= validity.not_after.timestamp();
    (!in_window).then(|| format!("Certificate {} is outside its validity period", cert.subject()))
}

fn der_sequence(contents: &[u8]) -> Vec<u8> {
    let mut encoded = vec![0x30];
    match u8::try_from(contents.len()) {
        Ok(len) if len < 0x80 => encoded.push(len),
        _ => {
            let len = contents.len().to_be_bytes();
            let skip = len.iter().take_while(|byte| **byte == 0).count();
            let significant = &len[skip..];
            encoded.push(0x80 | u8::try_from(significant.len()).unwrap_or(0));
            encoded.extend_from_slice(significant);
        }
    }
    encoded.extend_from_slice(contents);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOT: &str = include_str!("../tests/fixtures/hub_root.pem");
    const INTERMEDIATE: &str = include_str!("../tests/fixtures/hub_intermediate.pem");
    const CLIENT: &str = include_str!("../tests/fixtures/dfsp_client.pem");
    const CLIENT_UNRELATED_ISSUER: &str =
        include_str!("../tests/fixtures/dfsp_client_unrelated_issuer.pem");
    const UNRELATED_ROOT: &str = include_str!("../tests/fixtures/unrelated_root.pem");

    // 2050-01-01T00:00:00Z
    const NOW: i64 = 2_524_608_000;

    fn doc(pem: &str) -> CertificateDocument {
        CertificateDocument::from_pem(pem).unwrap()
    }

    #[test]
    fn test_leaf_verifies_through_intermediate_to_root() {
        let outcome = verify_path(
            &doc(CLIENT),
            &[doc(INTERMEDIATE)],
            Some(&doc(ROOT)),
            &TrustStore::empty(),
            NOW,
        )
        .unwrap();
        assert_eq!(outcome, ChainOutcome::Verified { depth: 2 });
    }

    #[test]
    fn test_leaf_without_its_issuer_is_broken() {
        let outcome = verify_path(
            &doc(CLIENT_UNRELATED_ISSUER),
            &[doc(INTERMEDIATE)],
            Some(&doc(ROOT)),
            &TrustStore::empty(),
            NOW,
        )
        .unwrap();
        assert!(!outcome.is_verified());

        let outcome = verify_path(&doc(CLIENT), &[], Some(&doc(ROOT)), &TrustStore::empty(), NOW)
            .unwrap();
        assert!(matches!(outcome, ChainOutcome::Broken(reason) if reason.contains("Unable to find issuer")));
    }

    #[test]
    fn test_trust_store_anchors_the_chain() {
        let store = TrustStore::empty().with_certificate(&doc(ROOT)).unwrap();
        let outcome = verify_path(&doc(CLIENT), &[doc(INTERMEDIATE)], None, &store, NOW).unwrap();
        assert_eq!(outcome, ChainOutcome::Verified { depth: 2 });
    }

    #[test]
    fn test_issuer_outside_validity_breaks_chain() {
        let outcome = verify_path(
            &doc(CLIENT),
            &[doc(INTERMEDIATE)],
            Some(&doc(ROOT)),
            &TrustStore::empty(),
            0,
        )
        .unwrap();
        assert!(matches!(outcome, ChainOutcome::Broken(reason) if reason.contains("validity")));
    }

    #[test]
    fn test_root_classification() {
        let empty = TrustStore::empty();
        assert_eq!(
            classify_root(&doc(ROOT), &empty).unwrap(),
            RootClassification::SelfSigned
        );
        assert_eq!(
            classify_root(&doc(INTERMEDIATE), &empty).unwrap(),
            RootClassification::Untrusted
        );

        let store = TrustStore::empty().with_certificate(&doc(ROOT)).unwrap();
        assert_eq!(
            classify_root(&doc(INTERMEDIATE), &store).unwrap(),
            RootClassification::Signed
        );

        let unrelated = TrustStore::empty()
            .with_certificate(&doc(UNRELATED_ROOT))
            .unwrap();
        assert_eq!(
            classify_root(&doc(INTERMEDIATE), &unrelated).unwrap(),
            RootClassification::Untrusted
        );
    }

    #[test]
    fn test_webpki_roots_are_loaded() {
        let store = TrustStore::webpki_roots();
        assert!(!store.is_empty());
        assert!(store
            .anchors
            .iter()
            .all(|anchor| SubjectPublicKeyInfo::from_der(&anchor.spki).is_ok()));
    }

    #[test]
    fn test_der_sequence_lengths() {
        assert_eq!(der_sequence(&[1, 2]), vec![0x30, 2, 1, 2]);
        let long = vec![0u8; 300];
        assert_eq!(&der_sequence(&long)[..4], &[0x30, 0x82, 0x01, 0x2c]);
    }
}
