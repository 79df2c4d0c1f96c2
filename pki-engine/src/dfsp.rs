//! CA bundles, server certificates and JWS certificates uploaded by DFSPs

use std::collections::BTreeMap;
use std::sync::Arc;

use cert_validation::parse_cert;
use futures::future::try_join_all;
use pki_types::{CaBundle, CertificateBundle, DfspCa, DfspCertificate, DfspId, ValidationCode};
use tracing::{info, instrument, warn};

use crate::engine::{PkiEngine, SecretStoreExt};
use crate::types::{PkiResult, SecretKey};

/// Validates and stores the certificate material of DFSPs
#[derive(Clone)]
pub struct DfspCertificateService {
    engine: Arc<dyn PkiEngine>,
}

impl DfspCertificateService {
    #[must_use]
    pub fn new(engine: Arc<dyn PkiEngine>) -> Self {
        Self { engine }
    }

    /// Validates a DFSP CA bundle and stores it with its validations
    ///
    /// # Errors
    /// `InvalidEntity` if a certificate cannot be parsed, `ExternalProcess` if storing fails
    #[instrument(skip(self, bundle))]
    pub async fn upload_dfsp_ca(&self, dfsp_id: DfspId, bundle: CaBundle) -> PkiResult<DfspCa> {
        let aggregate = self
            .engine
            .validate_ca_bundle(&self.engine.profiles().dfsp_ca_validations, &bundle)?;
        let ca = DfspCa::new(bundle, aggregate);

        self.engine.set_json(&SecretKey::DfspCa(dfsp_id), &ca).await?;
        info!(state = %ca.validation_state, "Stored DFSP CA");
        Ok(ca)
    }

    /// # Errors
    /// `NotFound` when the DFSP has no CA on file
    pub async fn get_dfsp_ca(&self, dfsp_id: DfspId) -> PkiResult<DfspCa> {
        self.engine.get_json(&SecretKey::DfspCa(dfsp_id)).await
    }

    /// Validates the server certificate of a DFSP and stores it
    ///
    /// # Errors
    /// `InvalidEntity` if a certificate or the key cannot be parsed
    #[instrument(skip(self, bundle))]
    pub async fn upload_dfsp_server_certs(
        &self,
        dfsp_id: DfspId,
        bundle: CertificateBundle,
    ) -> PkiResult<DfspCertificate> {
        let codes = self.engine.profiles().server_cert_validations.clone();
        self.store_certificate(SecretKey::DfspServerCert(dfsp_id), &codes, bundle)
            .await
    }

    /// # Errors
    /// `NotFound` when no server certificate was uploaded
    pub async fn get_dfsp_server_certs(&self, dfsp_id: DfspId) -> PkiResult<DfspCertificate> {
        self.engine
            .get_json(&SecretKey::DfspServerCert(dfsp_id))
            .await
    }

    /// Stores the JWS certificate the DFSP signs its messages with
    ///
    /// # Errors
    /// `InvalidEntity` if the certificate cannot be parsed
    #[instrument(skip(self, bundle))]
    pub async fn upload_dfsp_jws_cert(
        &self,
        dfsp_id: DfspId,
        bundle: CertificateBundle,
    ) -> PkiResult<DfspCertificate> {
        let codes = self.engine.profiles().jws_cert_validations.clone();
        self.store_certificate(SecretKey::DfspJwsCert(dfsp_id), &codes, bundle)
            .await
    }

    /// Stores a JWS certificate of a DFSP connected through another hub
    ///
    /// # Errors
    /// `InvalidEntity` if the certificate cannot be parsed
    #[instrument(skip(self, bundle))]
    pub async fn upload_external_dfsp_jws_cert(
        &self,
        dfsp_id: DfspId,
        bundle: CertificateBundle,
    ) -> PkiResult<DfspCertificate> {
        let codes = self.engine.profiles().jws_cert_validations.clone();
        self.store_certificate(SecretKey::DfspExternalJwsCert(dfsp_id), &codes, bundle)
            .await
    }

    /// # Errors
    /// `NotFound` when no JWS certificate was uploaded
    pub async fn get_dfsp_jws_cert(&self, dfsp_id: DfspId) -> PkiResult<DfspCertificate> {
        self.engine.get_json(&SecretKey::DfspJwsCert(dfsp_id)).await
    }

    /// # Errors
    /// `NotFound` when no external JWS certificate was uploaded
    pub async fn get_external_dfsp_jws_cert(
        &self,
        dfsp_id: DfspId,
    ) -> PkiResult<DfspCertificate> {
        self.engine
            .get_json(&SecretKey::DfspExternalJwsCert(dfsp_id))
            .await
    }

    /// JWS certificates of every DFSP, read concurrently
    ///
    /// # Errors
    /// Returns the first backend failure
    pub async fn get_all_dfsp_jws_certs(&self) -> PkiResult<BTreeMap<DfspId, DfspCertificate>> {
        let names = self.engine.list_secrets(&SecretKey::DfspJwsCerts).await?;
        let ids = names.iter().filter_map(|name| match name.parse::<DfspId>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(name = %name, "Skipping unexpected JWS certificate key");
                None
            }
        });

        let certificates = try_join_all(ids.map(|dfsp_id| async move {
            let certificate = self
                .engine
                .get_json_opt::<DfspCertificate>(&SecretKey::DfspJwsCert(dfsp_id))
                .await?;
            PkiResult::Ok(certificate.map(|certificate| (dfsp_id, certificate)))
        }))
        .await?;

        Ok(certificates.into_iter().flatten().collect())
    }

    /// Removes every secret owned by a DFSP
    ///
    /// # Errors
    /// Returns the first backend failure
    pub async fn delete_dfsp(&self, dfsp_id: DfspId) -> PkiResult<()> {
        self.engine.delete_all_dfsp_data(dfsp_id).await
    }

    async fn store_certificate(
        &self,
        key: SecretKey,
        codes: &[ValidationCode],
        bundle: CertificateBundle,
    ) -> PkiResult<DfspCertificate> {
        let cert_info = parse_cert(&bundle.certificate)?;
        let aggregate = self.engine.validate_certificate_bundle(codes, &bundle)?;
        let certificate = DfspCertificate::new(bundle, cert_info, aggregate);

        self.engine.set_json(&key, &certificate).await?;
        info!(%key, state = %certificate.validation_state, "Stored DFSP certificate");
        Ok(certificate)
    }
}
