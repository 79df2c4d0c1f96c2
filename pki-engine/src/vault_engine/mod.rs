//! CA engine backed by a Vault-compatible secrets/PKI service

mod requests;

use std::sync::Arc;

use async_trait::async_trait;
use cert_validation::{parse_csr, ValidationProfiles, Validator};
use pki_types::{
    CaInitialInfo, CsrParameters, DfspCa, DfspId, Enrollment, EnrollmentDirection,
    EnrollmentState, GeneratedCa, GeneratedCsr, HubCaDetails, IntermediateCa, IssuedCertificate,
    ServerCertRequest,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, instrument};
use validator::Validate;
use vault_storage::VaultApi;

use crate::csr::generate_csr;
use crate::engine::{PkiEngine, SecretStoreExt};
use crate::types::{
    is_valid_bundle_name, join_pem, ClientCertBundle, IpWhitelistEntry, PkiEngineConfig,
    PkiError, PkiResult, SecretKey, WhitelistScope,
};
use requests::{
    ca_request, decode, server_cert_request, ttl, CaCertificate, GeneratedIntermediateCsr,
    GeneratedRoot, IssuedServerCertificate, SignedCertificate,
};

/// Validity of a root CA created without an explicit TTL
const DEFAULT_CA_TTL_HOURS: u64 = 87_600;

/// [`PkiEngine`] talking to the secrets backend through a [`VaultApi`]
pub struct VaultPkiEngine {
    vault: Arc<dyn VaultApi>,
    config: PkiEngineConfig,
    validator: Validator,
    profiles: ValidationProfiles,
}

impl VaultPkiEngine {
    /// Creates an engine validating against the well-known public roots
    #[must_use]
    pub fn new(vault: Arc<dyn VaultApi>, config: PkiEngineConfig) -> Self {
        Self {
            vault,
            config,
            validator: Validator::default(),
            profiles: ValidationProfiles::default(),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_profiles(mut self, profiles: ValidationProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PkiEngineConfig {
        &self.config
    }

    const fn signature_bits(&self) -> u64 {
        self.config.ca_signature_algorithm.bits()
    }

    fn kv_path(&self, key: &SecretKey) -> String {
        format!("{}/{key}", self.config.mounts.kv)
    }

    async fn write_pki<T: DeserializeOwned>(&self, path: &str, body: Value) -> PkiResult<T> {
        let data = self.vault.write(path, body).await?;
        decode(path, data)
    }

    async fn read_ca_certificate(&self, mount: &str) -> PkiResult<Option<String>> {
        let path = format!("{mount}/cert/ca");
        match self.vault.read(&path).await {
            Ok(data) => {
                let ca: CaCertificate = decode(&path, data)?;
                Ok(Some(ca.certificate).filter(|pem| !pem.trim().is_empty()))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_hub_ca_details(
        &self,
        intermediate_chain: Option<String>,
        info: Option<CaInitialInfo>,
    ) -> PkiResult<()> {
        let previous: Option<HubCaDetails> = self.get_json_opt(&SecretKey::HubCaDetails).await?;
        let details = HubCaDetails {
            root_certificate: self.get_root_ca_cert().await?,
            intermediate_chain,
            info: info.or_else(|| previous.and_then(|details| details.info)),
        };
        self.set_json(&SecretKey::HubCaDetails, &details).await
    }
}

/// Common name embedded in a CSR
fn csr_common_name(csr: &str) -> PkiResult<String> {
    parse_csr(csr)?
        .subject
        .common_name
        .ok_or_else(|| PkiError::Validation("The CSR has no common name".to_string()))
}

#[async_trait]
impl PkiEngine for VaultPkiEngine {
    fn validator(&self) -> &Validator {
        &self.validator
    }

    fn profiles(&self) -> &ValidationProfiles {
        &self.profiles
    }

    #[instrument(skip_all, fields(cn = %info.subject.common_name))]
    async fn create_ca(
        &self,
        info: &CaInitialInfo,
        ttl_hours: Option<u64>,
    ) -> PkiResult<GeneratedCa> {
        info.validate()?;
        let pki = &self.config.mounts.pki;

        self.vault.delete(&format!("{pki}/root")).await?;

        let mut body = ca_request(info);
        body["ttl"] = json!(ttl(ttl_hours.unwrap_or(DEFAULT_CA_TTL_HOURS)));
        body["signature_bits"] = json!(self.signature_bits());
        let root: GeneratedRoot = self
            .write_pki(&format!("{pki}/root/generate/exported"), body)
            .await?;
        let private_key = root.private_key.ok_or_else(|| {
            PkiError::ExternalProcess("Root CA was generated without an exported key".to_string())
        })?;

        self.store_hub_ca_details(None, Some(info.clone())).await?;
        info!("Created hub root CA");

        Ok(GeneratedCa {
            certificate: root.certificate,
            private_key,
            info: info.clone(),
        })
    }

    #[instrument(skip_all, fields(cn = %info.subject.common_name))]
    async fn create_intermediate_ca(&self, info: &CaInitialInfo) -> PkiResult<IntermediateCa> {
        info.validate()?;
        let intermediate = &self.config.mounts.intermediate_pki;

        let generated: GeneratedIntermediateCsr = self
            .write_pki(
                &format!("{intermediate}/intermediate/generate/exported"),
                ca_request(info),
            )
            .await?;
        let private_key = generated.private_key.ok_or_else(|| {
            PkiError::ExternalProcess(
                "Intermediate CA was generated without an exported key".to_string(),
            )
        })?;

        let certificate = self.sign_intermediate_hub_csr(&generated.csr).await?;
        self.vault
            .write(
                &format!("{intermediate}/intermediate/set-signed"),
                json!({ "certificate": certificate }),
            )
            .await?;

        self.store_hub_ca_details(Some(certificate.clone()), None)
            .await?;
        info!("Installed hub intermediate CA");

        Ok(IntermediateCa {
            certificate,
            csr: generated.csr,
            private_key,
        })
    }

    async fn create_csr(&self, params: &CsrParameters) -> PkiResult<GeneratedCsr> {
        let params = params.clone();
        let key_bits = self.config.csr_key_bits;
        tokio::task::spawn_blocking(move || generate_csr(&params, key_bits))
            .await
            .map_err(|e| PkiError::ExternalProcess(format!("CSR generation task failed: {e}")))?
    }

    #[instrument(skip(self, csr))]
    async fn sign(&self, csr: &str, common_name: &str, ttl_hours: u64) -> PkiResult<String> {
        let path = format!(
            "{}/sign/{}",
            self.config.mounts.pki, self.config.client_role
        );
        let signed: SignedCertificate = self
            .write_pki(
                &path,
                json!({
                    "csr": csr,
                    "common_name": common_name,
                    "ttl": ttl(ttl_hours),
                    "signature_bits": self.signature_bits(),
                }),
            )
            .await?;
        Ok(signed.certificate)
    }

    #[instrument(skip_all)]
    async fn sign_intermediate_hub_csr(&self, csr: &str) -> PkiResult<String> {
        let common_name = csr_common_name(csr)?;
        let path = format!("{}/root/sign-intermediate", self.config.mounts.pki);
        let signed: SignedCertificate = self
            .write_pki(
                &path,
                json!({
                    "csr": csr,
                    "common_name": common_name,
                    "use_csr_values": true,
                    "signature_bits": self.signature_bits(),
                }),
            )
            .await?;
        Ok(signed.certificate)
    }

    #[instrument(skip_all)]
    async fn sign_with_intermediate_ca(&self, csr: &str) -> PkiResult<String> {
        let common_name = csr_common_name(csr)?;
        let path = format!(
            "{}/sign/{}",
            self.config.mounts.intermediate_pki, self.config.client_role
        );
        let signed: SignedCertificate = self
            .write_pki(
                &path,
                json!({
                    "csr": csr,
                    "common_name": common_name,
                    "ttl": ttl(self.config.sign_expiry_hours),
                    "signature_bits": self.signature_bits(),
                }),
            )
            .await?;
        Ok(signed.certificate)
    }

    #[instrument(skip_all, fields(cn = %request.common_name))]
    async fn create_hub_server_cert(
        &self,
        request: &ServerCertRequest,
    ) -> PkiResult<IssuedCertificate> {
        request.validate()?;
        let path = format!(
            "{}/issue/{}",
            self.config.mounts.pki, self.config.server_role
        );
        let issued: IssuedServerCertificate = self
            .write_pki(&path, server_cert_request(request, self.signature_bits()))
            .await?;

        let certificate = IssuedCertificate {
            certificate: issued.certificate,
            private_key: issued.private_key,
            issuing_ca: issued.issuing_ca,
            serial_number: issued.serial_number,
        };
        self.set_json(&SecretKey::HubServerCert, &certificate)
            .await?;
        info!(serial = %certificate.serial_number, "Issued hub server certificate");
        Ok(certificate)
    }

    #[instrument(skip(self))]
    async fn revoke_hub_server_cert(&self, serial_number: &str) -> PkiResult<()> {
        self.vault
            .write(
                &format!("{}/revoke", self.config.mounts.pki),
                json!({ "serial_number": serial_number }),
            )
            .await?;
        info!("Revoked hub server certificate");
        Ok(())
    }

    async fn get_root_ca_cert(&self) -> PkiResult<String> {
        let pki = &self.config.mounts.pki;
        self.read_ca_certificate(pki)
            .await?
            .ok_or_else(|| PkiError::NotFound(format!("{pki}/cert/ca")))
    }

    async fn get_intermediate_ca_cert(&self) -> PkiResult<Option<String>> {
        self.read_ca_certificate(&self.config.mounts.intermediate_pki)
            .await
    }

    async fn set_secret(&self, key: &SecretKey, value: Value) -> PkiResult<()> {
        self.vault.write(&self.kv_path(key), value).await?;
        Ok(())
    }

    async fn get_secret(&self, key: &SecretKey) -> PkiResult<Value> {
        Ok(self.vault.read(&self.kv_path(key)).await?)
    }

    async fn list_secrets(&self, key: &SecretKey) -> PkiResult<Vec<String>> {
        Ok(self.vault.list(&self.kv_path(key)).await?)
    }

    async fn delete_secret(&self, key: &SecretKey) -> PkiResult<()> {
        match self.vault.delete(&self.kv_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn populate_dfsp_client_cert_bundle(
        &self,
        dfsp_id: DfspId,
        dfsp_name: &str,
        host: &str,
        fqdn: &str,
    ) -> PkiResult<ClientCertBundle> {
        if !is_valid_bundle_name(dfsp_name) {
            return Err(PkiError::Validation(format!(
                "Invalid DFSP name: {dfsp_name}"
            )));
        }

        // Most recent means the largest enrollment id
        let latest = self
            .list_enrollments(
                EnrollmentDirection::Outbound,
                dfsp_id,
                Some(EnrollmentState::CertSigned),
            )
            .await?
            .into_iter()
            .max_by_key(Enrollment::id);
        let Some(Enrollment::CertSigned(enrollment)) = latest else {
            return Err(PkiError::NotFound(format!(
                "No signed outbound enrollment for DFSP {dfsp_id}"
            )));
        };
        let client_key = enrollment.key.ok_or_else(|| {
            PkiError::InvalidEntity(format!(
                "Outbound enrollment {} has no private key",
                enrollment.id
            ))
        })?;

        let dfsp_ca: Option<DfspCa> = self.get_json_opt(&SecretKey::DfspCa(dfsp_id)).await?;
        let (chain, root) = dfsp_ca.map_or((None, None), |ca| {
            (ca.bundle.intermediate_chain, ca.bundle.root_certificate)
        });

        let bundle = ClientCertBundle {
            ca_bundle: join_pem([chain.as_deref(), root.as_deref()]),
            client_key,
            client_cert_chain: join_pem([
                Some(enrollment.certificate.as_str()),
                chain.as_deref(),
                root.as_deref(),
            ]),
            host: host.to_string(),
            fqdn: fqdn.to_string(),
        };

        let path = format!(
            "{}/{dfsp_name}",
            self.config.mounts.dfsp_client_cert_bundle
        );
        let value = serde_json::to_value(&bundle)
            .map_err(|e| PkiError::InvalidEntity(format!("Could not encode bundle: {e}")))?;
        self.vault.write(&path, value).await?;
        info!(en_id = %enrollment.id, "Published DFSP client certificate bundle");
        Ok(bundle)
    }

    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    async fn populate_dfsp_ip_whitelist_bundle(
        &self,
        scope: WhitelistScope,
        dfsp_name: &str,
        entries: &[IpWhitelistEntry],
    ) -> PkiResult<()> {
        if !is_valid_bundle_name(dfsp_name) {
            return Err(PkiError::Validation(format!(
                "Invalid DFSP name: {dfsp_name}"
            )));
        }

        let mount = match scope {
            WhitelistScope::Internal => &self.config.mounts.dfsp_internal_ip_whitelist_bundle,
            WhitelistScope::External => &self.config.mounts.dfsp_external_ip_whitelist_bundle,
        };
        self.vault
            .write(&format!("{mount}/{dfsp_name}"), json!({ "ips": entries }))
            .await?;
        Ok(())
    }
}
