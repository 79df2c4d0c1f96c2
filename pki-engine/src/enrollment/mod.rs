//! Enrollment lifecycle: `CSR_LOADED` → `CERT_SIGNED`
//!
//! Inbound enrollments carry a CSR submitted by a DFSP and are signed by the hub CA. Outbound
//! enrollments carry a CSR generated by the hub and are signed by the DFSP out of band.
//!
//! Writes to the enrollments of one DFSP are not safe to race; callers serialise them.

mod inbound;
mod outbound;

use std::sync::Arc;

use pki_types::{
    DfspCa, DfspId, Enrollment, EnrollmentDirection, EnrollmentId, EnrollmentState,
    PendingEnrollment,
};

use crate::engine::{PkiEngine, SecretStoreExt};
use crate::types::{PkiError, PkiResult, SecretKey};

/// Creates, signs and queries enrollments of DFSPs
#[derive(Clone)]
pub struct EnrollmentService {
    engine: Arc<dyn PkiEngine>,
    /// Validity of certificates the hub signs for inbound enrollments
    sign_expiry_hours: u64,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(engine: Arc<dyn PkiEngine>, sign_expiry_hours: u64) -> Self {
        Self {
            engine,
            sign_expiry_hours,
        }
    }

    /// # Errors
    /// `NotFound` when the enrollment does not exist
    pub async fn get_enrollment(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        en_id: EnrollmentId,
    ) -> PkiResult<Enrollment> {
        self.engine.get_enrollment(direction, dfsp_id, en_id).await
    }

    /// Enrollments of a DFSP ordered by id, optionally only those in `state`
    ///
    /// # Errors
    /// Returns the first backend failure
    pub async fn list_enrollments(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        state: Option<EnrollmentState>,
    ) -> PkiResult<Vec<Enrollment>> {
        self.engine.list_enrollments(direction, dfsp_id, state).await
    }

    /// Ids are allocated as one past the largest stored id
    async fn next_enrollment_id(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
    ) -> PkiResult<EnrollmentId> {
        let ids = self.engine.list_enrollment_ids(direction, dfsp_id).await?;
        let next = ids.last().map_or(1, |id| id.get() + 1);
        Ok(EnrollmentId::new(next))
    }

    async fn dfsp_ca(&self, dfsp_id: DfspId) -> PkiResult<Option<DfspCa>> {
        self.engine.get_json_opt(&SecretKey::DfspCa(dfsp_id)).await
    }

    /// Loads an enrollment that is still waiting for its certificate
    async fn pending_enrollment(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        en_id: EnrollmentId,
    ) -> PkiResult<PendingEnrollment> {
        match self.get_enrollment(direction, dfsp_id, en_id).await? {
            Enrollment::CsrLoaded(pending) => Ok(pending),
            Enrollment::CertSigned(_) => Err(PkiError::Validation(format!(
                "Enrollment {en_id} already has a certificate"
            ))),
        }
    }

    async fn save(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        enrollment: Enrollment,
    ) -> PkiResult<Enrollment> {
        self.engine
            .set_enrollment(direction, dfsp_id, &enrollment)
            .await?;
        Ok(enrollment)
    }
}
