#![allow(dead_code)]

use std::sync::Arc;

use pki_engine::types::CaSignatureAlgorithm;
use pki_engine::{PkiEngine, PkiEngineConfig, VaultPkiEngine};
use pki_types::{CaInitialInfo, CaKeyInfo, CaSubject, CsrParameters, SubjectInfo, ValidationCode};
use pki_types::{Validation, ValidationAggregate};
use vault_storage::mock::MockVault;

pub const CLIENT_CSR: &str = include_str!("../fixtures/dfsp_client.csr");
pub const BIG_SHA512_CSR: &str = include_str!("../fixtures/dfsp_4096_sha512.csr");
pub const PARTIAL_CSR: &str = include_str!("../fixtures/dfsp_partial.csr");

/// Mount the tests use to play the DFSP's own CA
pub const DFSP_PKI: &str = "dfsp_pki";

pub struct TestSetup {
    pub vault: Arc<MockVault>,
    pub engine: Arc<dyn PkiEngine>,
}

pub fn config() -> PkiEngineConfig {
    PkiEngineConfig {
        csr_key_bits: 2048,
        sign_expiry_hours: 720,
        ..PkiEngineConfig::default()
    }
}

pub fn setup() -> TestSetup {
    setup_with(config())
}

pub fn setup_with(config: PkiEngineConfig) -> TestSetup {
    let vault = Arc::new(MockVault::with_pki_mounts(["pki", "pki_int", DFSP_PKI]));
    let engine: Arc<dyn PkiEngine> = Arc::new(VaultPkiEngine::new(vault.clone(), config));
    TestSetup { vault, engine }
}

pub fn sha512_config() -> PkiEngineConfig {
    PkiEngineConfig {
        ca_signature_algorithm: CaSignatureAlgorithm::Sha512WithRsa,
        ..config()
    }
}

pub fn hub_ca_info() -> CaInitialInfo {
    CaInitialInfo {
        subject: CaSubject {
            common_name: "Hub Root CA".to_string(),
            organization: "Hub".to_string(),
            organizational_unit: Some("PKI".to_string()),
            country: Some("US".to_string()),
            ..CaSubject::default()
        },
        key: CaKeyInfo {
            size: 2048,
            ..CaKeyInfo::default()
        },
        names: vec![],
    }
}

pub fn csr_parameters(common_name: &str) -> CsrParameters {
    CsrParameters {
        subject: SubjectInfo {
            common_name: Some(common_name.to_string()),
            organization: Some("Hub".to_string()),
            organizational_unit: Some("Switch".to_string()),
            country: Some("US".to_string()),
            locality: Some("Austin".to_string()),
            state: Some("Texas".to_string()),
            email_address: Some("pki@hub.example.com".to_string()),
        },
        ..CsrParameters::default()
    }
}

pub fn validation<'a>(validations: &'a [Validation], code: ValidationCode) -> &'a Validation {
    validations
        .iter()
        .find(|validation| validation.code == code)
        .unwrap_or_else(|| panic!("no {code} validation in {validations:?}"))
}

pub fn aggregate_validation(aggregate: &ValidationAggregate, code: ValidationCode) -> &Validation {
    aggregate
        .find(code)
        .unwrap_or_else(|| panic!("no {code} validation in {aggregate:?}"))
}
