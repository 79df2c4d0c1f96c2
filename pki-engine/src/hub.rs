//! Hub CA, hub server certificate and hub endpoint configuration

use std::sync::Arc;

use pki_types::{CaBundle, CaInitialInfo, HubCaDetails, IssuedCertificate};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::engine::{PkiEngine, SecretStoreExt};
use crate::types::{PkiError, PkiResult, SecretKey};

/// Operations on the hub's own PKI material
#[derive(Clone)]
pub struct HubService {
    engine: Arc<dyn PkiEngine>,
}

impl HubService {
    #[must_use]
    pub fn new(engine: Arc<dyn PkiEngine>) -> Self {
        Self { engine }
    }

    /// Creates the hub root CA unless one already exists. Returns whether it was created.
    ///
    /// # Errors
    /// `Validation` for an incomplete subject, `ExternalProcess` if the backend fails
    #[instrument(skip_all)]
    pub async fn ensure_hub_ca(&self, info: &CaInitialInfo) -> PkiResult<bool> {
        match self.engine.get_root_ca_cert().await {
            Ok(_) => {
                info!("Hub root CA already exists");
                Ok(false)
            }
            Err(PkiError::NotFound(_)) => {
                self.engine.create_ca(info, None).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// # Errors
    /// `NotFound` before the hub CA has been created
    pub async fn get_hub_ca_details(&self) -> PkiResult<HubCaDetails> {
        self.engine.get_json(&SecretKey::HubCaDetails).await
    }

    /// Root and intermediate certificates DFSPs use to trust the hub
    ///
    /// # Errors
    /// `NotFound` when there is no hub root CA
    pub async fn get_hub_ca_bundle(&self) -> PkiResult<CaBundle> {
        Ok(CaBundle {
            root_certificate: Some(self.engine.get_root_ca_cert().await?),
            intermediate_chain: self.engine.get_intermediate_ca_cert().await?,
            key: None,
        })
    }

    /// # Errors
    /// `NotFound` when no hub server certificate was issued
    pub async fn get_hub_server_cert(&self) -> PkiResult<IssuedCertificate> {
        self.engine.get_json(&SecretKey::HubServerCert).await
    }

    /// Revokes the stored hub server certificate and forgets it
    ///
    /// # Errors
    /// `NotFound` when no hub server certificate was issued
    #[instrument(skip_all)]
    pub async fn revoke_hub_server_cert(&self) -> PkiResult<()> {
        let current = self.get_hub_server_cert().await?;
        self.engine
            .revoke_hub_server_cert(&current.serial_number)
            .await?;
        self.engine.delete_secret(&SecretKey::HubServerCert).await
    }

    /// Endpoint configuration, an empty object when none was stored
    ///
    /// # Errors
    /// Returns backend failures other than a missing secret
    pub async fn get_hub_endpoints(&self) -> PkiResult<Value> {
        self.engine
            .get_json_or(&SecretKey::HubEndpoints, json!({}))
            .await
    }

    /// # Errors
    /// Returns the backend failure
    pub async fn set_hub_endpoints(&self, endpoints: Value) -> PkiResult<()> {
        self.engine
            .set_secret(&SecretKey::HubEndpoints, endpoints)
            .await
    }
}
