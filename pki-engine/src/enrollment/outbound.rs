use cert_validation::{parse_cert, parse_csr, EnrollmentMaterial};
use pki_types::{
    CsrParameters, DfspId, Enrollment, EnrollmentDirection, EnrollmentId, PendingEnrollment,
};
use tracing::{info, instrument};

use super::EnrollmentService;
use crate::types::PkiResult;

const OUTBOUND: EnrollmentDirection = EnrollmentDirection::Outbound;

impl EnrollmentService {
    /// Generates a key pair and CSR for the hub to be signed by the DFSP
    ///
    /// # Errors
    /// `Validation` if the parameters cannot be encoded, `ExternalProcess` if storing fails
    #[instrument(skip(self, params))]
    pub async fn create_outbound_enrollment(
        &self,
        dfsp_id: DfspId,
        params: &CsrParameters,
    ) -> PkiResult<Enrollment> {
        let generated = self.engine.create_csr(params).await?;
        let csr_info = parse_csr(&generated.csr)?;
        let dfsp_ca = self.dfsp_ca(dfsp_id).await?;

        let material = EnrollmentMaterial::new(&generated.csr)
            .with_key(Some(generated.private_key.as_str()))
            .with_authority(dfsp_ca.as_ref());
        let aggregate = self
            .engine
            .validate_enrollment(&self.engine.profiles().outbound_validations, &material)?;

        let id = self.next_enrollment_id(OUTBOUND, dfsp_id).await?;
        let enrollment = Enrollment::CsrLoaded(PendingEnrollment::new(
            id,
            generated.csr,
            Some(generated.private_key),
            csr_info,
            aggregate,
        ));

        info!(en_id = %id, "Created outbound enrollment");
        self.save(OUTBOUND, dfsp_id, enrollment).await
    }

    /// Attaches the certificate the DFSP issued for an outbound CSR
    ///
    /// The certificate is checked against the DFSP's CA bundle, when one is on file.
    ///
    /// # Errors
    /// `NotFound` if the enrollment does not exist, `InvalidEntity` if the certificate cannot
    /// be parsed, `Validation` if the enrollment already has a certificate
    #[instrument(skip(self, certificate))]
    pub async fn upload_outbound_certificate(
        &self,
        dfsp_id: DfspId,
        en_id: EnrollmentId,
        certificate: String,
    ) -> PkiResult<Enrollment> {
        let pending = self.pending_enrollment(OUTBOUND, dfsp_id, en_id).await?;
        let cert_info = parse_cert(&certificate)?;
        let dfsp_ca = self.dfsp_ca(dfsp_id).await?;

        let material = EnrollmentMaterial::new(&pending.csr)
            .with_certificate(Some(certificate.as_str()))
            .with_key(pending.key.as_deref())
            .with_authority(dfsp_ca.as_ref());
        let aggregate = self
            .engine
            .validate_enrollment(&self.engine.profiles().outbound_validations, &material)?;

        let enrollment = Enrollment::CertSigned(pending.into_signed(certificate, cert_info, aggregate));
        info!(state = %enrollment.validation_state(), "Stored outbound certificate");
        self.save(OUTBOUND, dfsp_id, enrollment).await
    }
}
