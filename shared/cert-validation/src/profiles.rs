use pki_types::ValidationCode::{
    self, CaCertificateUsage, CertificateChain, CertificatePublicKeyLength2048,
    CertificatePublicKeyParseable, CertificatePublicPrivateKeyMatch,
    CertificateSignatureAlgorithmSha256_512, CertificateSignedByDfspCa, CertificateUsageClient,
    CertificateUsageServer, CertificateValidity, CsrCertSameCn, CsrCertSamePublicKey,
    CsrCertSameSubjectInfo, CsrMandatoryDistinguishedName, CsrPublicKeyLength2048,
    CsrSignatureAlgorithmSha256_512, CsrSignatureValid, VerifyChainCertificates,
    VerifyRootCertificate,
};

/// Code lists applied to each kind of artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProfiles {
    pub jws_cert_validations: Vec<ValidationCode>,
    pub dfsp_ca_validations: Vec<ValidationCode>,
    pub server_cert_validations: Vec<ValidationCode>,
    pub inbound_validations: Vec<ValidationCode>,
    pub outbound_validations: Vec<ValidationCode>,
}

const CSR_VALIDATIONS: [ValidationCode; 4] = [
    CsrSignatureValid,
    CsrMandatoryDistinguishedName,
    CsrPublicKeyLength2048,
    CsrSignatureAlgorithmSha256_512,
];

const CONSISTENCY_VALIDATIONS: [ValidationCode; 3] =
    [CsrCertSameSubjectInfo, CsrCertSameCn, CsrCertSamePublicKey];

impl Default for ValidationProfiles {
    fn default() -> Self {
        let inbound_validations = CSR_VALIDATIONS
            .into_iter()
            .chain([CertificateValidity, CertificateUsageClient, CertificateChain])
            .chain(CONSISTENCY_VALIDATIONS)
            .collect();

        let outbound_validations = CSR_VALIDATIONS
            .into_iter()
            .chain([
                CertificateValidity,
                CertificateUsageClient,
                CertificateSignedByDfspCa,
            ])
            .chain(CONSISTENCY_VALIDATIONS)
            .chain([CertificatePublicPrivateKeyMatch])
            .collect();

        Self {
            jws_cert_validations: vec![CertificatePublicKeyParseable],
            dfsp_ca_validations: vec![
                VerifyRootCertificate,
                VerifyChainCertificates,
                CaCertificateUsage,
            ],
            server_cert_validations: vec![
                CertificateValidity,
                CertificateUsageServer,
                CertificateChain,
                CertificatePublicKeyLength2048,
                CertificateSignatureAlgorithmSha256_512,
                CertificatePublicPrivateKeyMatch,
            ],
            inbound_validations,
            outbound_validations,
        }
    }
}
