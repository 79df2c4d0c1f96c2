use cert_validation::{parse_cert, parse_csr, EnrollmentMaterial};
use pki_types::{DfspId, Enrollment, EnrollmentDirection, EnrollmentId, PendingEnrollment};
use tracing::{info, instrument};

use super::EnrollmentService;
use crate::types::{PkiError, PkiResult};

const INBOUND: EnrollmentDirection = EnrollmentDirection::Inbound;

impl EnrollmentService {
    /// Stores a CSR submitted by a DFSP and validates it right away
    ///
    /// # Errors
    /// `Validation` if the CSR cannot be parsed, `ExternalProcess` if storing fails
    #[instrument(skip(self, csr))]
    pub async fn create_inbound_enrollment(
        &self,
        dfsp_id: DfspId,
        csr: String,
    ) -> PkiResult<Enrollment> {
        let csr_info = parse_csr(&csr).map_err(|e| PkiError::Validation(e.to_string()))?;
        let aggregate = self.engine.validate_enrollment(
            &self.engine.profiles().inbound_validations,
            &EnrollmentMaterial::new(&csr),
        )?;

        let id = self.next_enrollment_id(INBOUND, dfsp_id).await?;
        let enrollment =
            Enrollment::CsrLoaded(PendingEnrollment::new(id, csr, None, csr_info, aggregate));

        info!(en_id = %id, state = %enrollment.validation_state(), "Created inbound enrollment");
        self.save(INBOUND, dfsp_id, enrollment).await
    }

    /// Signs the CSR of an inbound enrollment with the hub CA
    ///
    /// # Errors
    /// `NotFound` if the enrollment does not exist, `InvalidEntity` if there is no hub CA,
    /// `Validation` if it is already signed, and backend failures unchanged
    #[instrument(skip(self))]
    pub async fn sign_inbound_enrollment(
        &self,
        dfsp_id: DfspId,
        en_id: EnrollmentId,
    ) -> PkiResult<Enrollment> {
        let pending = self.pending_enrollment(INBOUND, dfsp_id, en_id).await?;

        let root = match self.engine.get_root_ca_cert().await {
            Ok(root) => root,
            Err(PkiError::NotFound(_)) => {
                return Err(PkiError::InvalidEntity(
                    "Could not retrieve current CA, cannot sign the CSR".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };
        let common_name = pending
            .csr_info
            .subject
            .common_name
            .clone()
            .ok_or_else(|| PkiError::Validation("The CSR has no common name".to_string()))?;

        let certificate = self
            .engine
            .sign(&pending.csr, &common_name, self.sign_expiry_hours)
            .await?;
        let cert_info = parse_cert(&certificate)?;

        let material = EnrollmentMaterial::new(&pending.csr)
            .with_certificate(Some(certificate.as_str()))
            .with_key(pending.key.as_deref())
            .with_chain(None, Some(root.as_str()));
        let aggregate = self
            .engine
            .validate_enrollment(&self.engine.profiles().inbound_validations, &material)?;

        let enrollment = Enrollment::CertSigned(pending.into_signed(certificate, cert_info, aggregate));
        info!(state = %enrollment.validation_state(), "Signed inbound enrollment");
        self.save(INBOUND, dfsp_id, enrollment).await
    }
}
