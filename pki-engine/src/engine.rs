//! The CA engine interface
//!
//! Validation entry points and the secret, enrollment and DFSP teardown helpers are provided
//! methods, so a backend only implements the PKI primitives and raw secret access.

use async_trait::async_trait;
use cert_validation::{EnrollmentMaterial, ValidationProfiles, Validator};
use futures::future::try_join_all;
use pki_types::{
    CaBundle, CaInitialInfo, CertificateBundle, CsrParameters, DfspId, Enrollment,
    EnrollmentDirection, EnrollmentId, EnrollmentState, GeneratedCa, GeneratedCsr,
    IntermediateCa, IssuedCertificate, ServerCertRequest, ValidationAggregate, ValidationCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::types::{
    ClientCertBundle, IpWhitelistEntry, PkiError, PkiResult, SecretKey, WhitelistScope,
};

const DIRECTIONS: [EnrollmentDirection; 2] =
    [EnrollmentDirection::Inbound, EnrollmentDirection::Outbound];

/// Certificate authority operations backed by a secrets/PKI service
#[async_trait]
pub trait PkiEngine: Send + Sync {
    /// Validator used by the `validate_*` entry points
    fn validator(&self) -> &Validator;

    /// Code lists applied to each artifact kind
    fn profiles(&self) -> &ValidationProfiles;

    /// Runs `codes` against a leaf certificate bundle
    ///
    /// # Errors
    /// Returns `InvalidEntity` if any PEM input cannot be parsed
    fn validate_certificate_bundle(
        &self,
        codes: &[ValidationCode],
        bundle: &CertificateBundle,
    ) -> PkiResult<ValidationAggregate> {
        Ok(self.validator().validate_certificate_bundle(codes, bundle)?)
    }

    /// Runs `codes` against a root certificate and its intermediate chain
    ///
    /// # Errors
    /// Returns `InvalidEntity` if any PEM input cannot be parsed
    fn validate_ca_bundle(
        &self,
        codes: &[ValidationCode],
        bundle: &CaBundle,
    ) -> PkiResult<ValidationAggregate> {
        Ok(self.validator().validate_ca_bundle(codes, bundle)?)
    }

    /// Runs `codes` against the CSR and certificate of an enrollment
    ///
    /// # Errors
    /// Returns `InvalidEntity` if any PEM input cannot be parsed
    fn validate_enrollment(
        &self,
        codes: &[ValidationCode],
        material: &EnrollmentMaterial<'_>,
    ) -> PkiResult<ValidationAggregate> {
        Ok(self.validator().validate_enrollment(codes, material)?)
    }

    /// Replaces the hub root CA with a new self-signed one
    async fn create_ca(&self, info: &CaInitialInfo, ttl_hours: Option<u64>)
        -> PkiResult<GeneratedCa>;

    /// Creates an intermediate CA signed by the root and makes it the active intermediate
    async fn create_intermediate_ca(&self, info: &CaInitialInfo) -> PkiResult<IntermediateCa>;

    /// Generates a key pair locally and a CSR signed with it
    async fn create_csr(&self, params: &CsrParameters) -> PkiResult<GeneratedCsr>;

    /// Signs a client CSR with the root CA
    async fn sign(&self, csr: &str, common_name: &str, ttl_hours: u64) -> PkiResult<String>;

    /// Signs an intermediate CA CSR with the root, keeping the CSR's common name
    async fn sign_intermediate_hub_csr(&self, csr: &str) -> PkiResult<String>;

    /// Signs a leaf CSR with the intermediate CA, keeping the CSR's common name
    async fn sign_with_intermediate_ca(&self, csr: &str) -> PkiResult<String>;

    /// Issues the hub server certificate, key included
    async fn create_hub_server_cert(
        &self,
        request: &ServerCertRequest,
    ) -> PkiResult<IssuedCertificate>;

    async fn revoke_hub_server_cert(&self, serial_number: &str) -> PkiResult<()>;

    /// PEM of the hub root CA, `NotFound` when none exists
    async fn get_root_ca_cert(&self) -> PkiResult<String>;

    /// PEM of the active intermediate CA, if one is installed
    async fn get_intermediate_ca_cert(&self) -> PkiResult<Option<String>>;

    async fn set_secret(&self, key: &SecretKey, value: Value) -> PkiResult<()>;

    /// `NotFound` when nothing is stored under `key`
    async fn get_secret(&self, key: &SecretKey) -> PkiResult<Value>;

    /// Names stored directly below `key`, empty when there are none
    async fn list_secrets(&self, key: &SecretKey) -> PkiResult<Vec<String>>;

    /// Removing a secret that does not exist succeeds
    async fn delete_secret(&self, key: &SecretKey) -> PkiResult<()>;

    /// Pushes client certificate material derived from the latest signed outbound enrollment
    async fn populate_dfsp_client_cert_bundle(
        &self,
        dfsp_id: DfspId,
        dfsp_name: &str,
        host: &str,
        fqdn: &str,
    ) -> PkiResult<ClientCertBundle>;

    /// Pushes the address whitelist of a DFSP for the gateway of `scope`
    async fn populate_dfsp_ip_whitelist_bundle(
        &self,
        scope: WhitelistScope,
        dfsp_name: &str,
        entries: &[IpWhitelistEntry],
    ) -> PkiResult<()>;

    async fn populate_dfsp_internal_ip_whitelist_bundle(
        &self,
        dfsp_name: &str,
        entries: &[IpWhitelistEntry],
    ) -> PkiResult<()> {
        self.populate_dfsp_ip_whitelist_bundle(WhitelistScope::Internal, dfsp_name, entries)
            .await
    }

    async fn populate_dfsp_external_ip_whitelist_bundle(
        &self,
        dfsp_name: &str,
        entries: &[IpWhitelistEntry],
    ) -> PkiResult<()> {
        self.populate_dfsp_ip_whitelist_bundle(WhitelistScope::External, dfsp_name, entries)
            .await
    }

    /// Ids of the enrollments stored for a DFSP, ascending
    async fn list_enrollment_ids(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
    ) -> PkiResult<Vec<EnrollmentId>> {
        let names = self
            .list_secrets(&SecretKey::Enrollments(direction, dfsp_id))
            .await?;

        let mut ids: Vec<EnrollmentId> = names
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(%dfsp_id, name = %name, "Skipping unexpected enrollment key");
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn get_enrollment(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        en_id: EnrollmentId,
    ) -> PkiResult<Enrollment> {
        let key = SecretKey::Enrollment(direction, dfsp_id, en_id);
        let value = self.get_secret(&key).await?;
        decode_secret(&key, value)
    }

    async fn set_enrollment(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        enrollment: &Enrollment,
    ) -> PkiResult<()> {
        let key = SecretKey::Enrollment(direction, dfsp_id, enrollment.id());
        self.set_secret(&key, encode_secret(&key, enrollment)?).await
    }

    /// Enrollments of a DFSP ordered by id, optionally only those in `state`
    async fn list_enrollments(
        &self,
        direction: EnrollmentDirection,
        dfsp_id: DfspId,
        state: Option<EnrollmentState>,
    ) -> PkiResult<Vec<Enrollment>> {
        let ids = self.list_enrollment_ids(direction, dfsp_id).await?;
        let enrollments =
            try_join_all(ids.into_iter().map(|id| self.get_enrollment(direction, dfsp_id, id)))
                .await?;

        Ok(enrollments
            .into_iter()
            .filter(|enrollment| state.is_none_or(|state| enrollment.state() == state))
            .collect())
    }

    /// Removes every secret owned by a DFSP. Categories with nothing stored are skipped.
    #[instrument(skip(self))]
    async fn delete_all_dfsp_data(&self, dfsp_id: DfspId) -> PkiResult<()> {
        let enrollment_ids = try_join_all(
            DIRECTIONS.map(|direction| self.list_enrollment_ids(direction, dfsp_id)),
        )
        .await?;

        let keys: Vec<SecretKey> = DIRECTIONS
            .into_iter()
            .zip(enrollment_ids)
            .flat_map(|(direction, ids)| {
                ids.into_iter()
                    .map(move |id| SecretKey::Enrollment(direction, dfsp_id, id))
            })
            .chain(SecretKey::dfsp_records(dfsp_id))
            .collect();

        try_join_all(keys.iter().map(|key| self.delete_secret(key))).await?;
        info!(%dfsp_id, secrets = keys.len(), "Deleted all DFSP data");
        Ok(())
    }
}

/// Typed access to secrets stored as JSON
#[async_trait]
pub trait SecretStoreExt: PkiEngine {
    /// # Errors
    /// `NotFound` when nothing is stored, `InvalidEntity` when the stored value has another shape
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &SecretKey) -> PkiResult<T> {
        let value = self.get_secret(key).await?;
        decode_secret(key, value)
    }

    /// Like [`SecretStoreExt::get_json`], with `None` instead of `NotFound`
    async fn get_json_opt<T: DeserializeOwned + Send>(
        &self,
        key: &SecretKey,
    ) -> PkiResult<Option<T>> {
        match self.get_json(key).await {
            Ok(value) => Ok(Some(value)),
            Err(PkiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`SecretStoreExt::get_json`], with `default` instead of `NotFound`
    async fn get_json_or<T: DeserializeOwned + Send>(
        &self,
        key: &SecretKey,
        default: T,
    ) -> PkiResult<T> {
        Ok(self.get_json_opt(key).await?.unwrap_or(default))
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &SecretKey, value: &T) -> PkiResult<()> {
        let value = encode_secret(key, value)?;
        self.set_secret(key, value).await
    }
}

impl<E: PkiEngine + ?Sized> SecretStoreExt for E {}

fn decode_secret<T: DeserializeOwned>(key: &SecretKey, value: Value) -> PkiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| PkiError::InvalidEntity(format!("Stored secret {key} is malformed: {e}")))
}

fn encode_secret<T: Serialize + ?Sized>(key: &SecretKey, value: &T) -> PkiResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| PkiError::InvalidEntity(format!("Could not encode secret {key}: {e}")))
}
