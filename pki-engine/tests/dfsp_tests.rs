mod common;

use common::{aggregate_validation, hub_ca_info, setup, TestSetup, CLIENT_CSR};
use pki_engine::types::IpWhitelistEntry;
use pki_engine::{DfspCertificateService, EnrollmentService, PkiError};
use pki_types::{
    CaBundle, CertificateBundle, DfspId, IssuedCertificate, ServerCertRequest, ValidationAggregate,
    ValidationCode, ValidationResult, ValidationState,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use vault_storage::mock::MockVault;

async fn issue_server_cert(setup: &TestSetup, common_name: &str) -> IssuedCertificate {
    setup
        .engine
        .create_hub_server_cert(&ServerCertRequest {
            common_name: common_name.to_string(),
            ..ServerCertRequest::default()
        })
        .await
        .unwrap()
}

fn paths_of(vault: &MockVault, dfsp_id: DfspId) -> Vec<String> {
    let suffix = format!("/{dfsp_id}");
    let folder = format!("/{dfsp_id}/");
    vault
        .secret_paths()
        .into_iter()
        .filter(|path| path.ends_with(&suffix) || path.contains(&folder))
        .collect()
}

#[tokio::test]
async fn test_upload_server_certs_validates_bundle() {
    let setup = setup();
    setup.engine.create_ca(&hub_ca_info(), None).await.unwrap();
    let service = DfspCertificateService::new(setup.engine.clone());
    let issued = issue_server_cert(&setup, "dfsp1.example.com").await;

    let stored = service
        .upload_dfsp_server_certs(
            DfspId::new(1),
            CertificateBundle {
                certificate: issued.certificate.clone(),
                root_certificate: Some(issued.issuing_ca.clone()),
                key: Some(issued.private_key.clone()),
                intermediate_chain: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(stored.validation_state, ValidationState::Valid, "{stored:?}");
    assert_eq!(
        stored.cert_info.subject.common_name.as_deref(),
        Some("dfsp1.example.com")
    );
    assert_eq!(
        service.get_dfsp_server_certs(DfspId::new(1)).await.unwrap(),
        stored
    );

    // someone else's key
    let other = issue_server_cert(&setup, "other.example.com").await;
    let mismatched = service
        .upload_dfsp_server_certs(
            DfspId::new(2),
            CertificateBundle {
                certificate: issued.certificate,
                root_certificate: Some(issued.issuing_ca),
                key: Some(other.private_key),
                intermediate_chain: None,
            },
        )
        .await
        .unwrap();
    let aggregate = ValidationAggregate::from_validations(mismatched.validations);
    assert_eq!(
        aggregate_validation(&aggregate, ValidationCode::CertificatePublicPrivateKeyMatch).result,
        ValidationResult::Invalid
    );
    assert_eq!(aggregate.validation_state, ValidationState::Invalid);
}

#[tokio::test]
async fn test_upload_rejects_unparsable_material() {
    let setup = setup();
    let service = DfspCertificateService::new(setup.engine.clone());

    let cases: Vec<(&str, Result<(), PkiError>)> = vec![
        (
            "ca bundle",
            service
                .upload_dfsp_ca(
                    DfspId::new(1),
                    CaBundle {
                        root_certificate: Some("not a certificate".to_string()),
                        ..CaBundle::default()
                    },
                )
                .await
                .map(|_| ()),
        ),
        (
            "jws certificate",
            service
                .upload_dfsp_jws_cert(
                    DfspId::new(1),
                    CertificateBundle {
                        certificate: CLIENT_CSR.to_string(),
                        ..CertificateBundle::default()
                    },
                )
                .await
                .map(|_| ()),
        ),
    ];

    for (name, result) in cases {
        assert!(
            matches!(result, Err(PkiError::InvalidEntity(_))),
            "case: {name}: {result:?}"
        );
    }
    assert!(setup.vault.secret_paths().is_empty());
}

#[tokio::test]
async fn test_get_all_jws_certs() {
    let setup = setup();
    setup.engine.create_ca(&hub_ca_info(), None).await.unwrap();
    let service = DfspCertificateService::new(setup.engine.clone());

    for id in [3, 1] {
        let issued = issue_server_cert(&setup, &format!("jws{id}.example.com")).await;
        let stored = service
            .upload_dfsp_jws_cert(
                DfspId::new(id),
                CertificateBundle {
                    certificate: issued.certificate,
                    ..CertificateBundle::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stored.validations.len(), 1);
        assert_eq!(stored.validations[0].code, ValidationCode::CertificatePublicKeyParseable);
        assert_eq!(stored.validation_state, ValidationState::Valid);
    }
    let external = issue_server_cert(&setup, "external.example.com").await;
    service
        .upload_external_dfsp_jws_cert(
            DfspId::new(7),
            CertificateBundle {
                certificate: external.certificate,
                ..CertificateBundle::default()
            },
        )
        .await
        .unwrap();

    let all = service.get_all_dfsp_jws_certs().await.unwrap();
    assert_eq!(
        all.keys().copied().collect::<Vec<_>>(),
        vec![DfspId::new(1), DfspId::new(3)]
    );
    assert_eq!(
        all[&DfspId::new(3)].cert_info.subject.common_name.as_deref(),
        Some("jws3.example.com")
    );
    assert!(service
        .get_external_dfsp_jws_cert(DfspId::new(7))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_get_all_jws_certs_without_any() {
    let setup = setup();
    let service = DfspCertificateService::new(setup.engine.clone());
    assert!(service.get_all_dfsp_jws_certs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_all_dfsp_data_with_partial_data() {
    let setup = setup();
    setup.engine.create_ca(&hub_ca_info(), None).await.unwrap();
    let service = DfspCertificateService::new(setup.engine.clone());
    let enrollments = EnrollmentService::new(setup.engine.clone(), 24);
    let dfsp = DfspId::new(5);
    let neighbour = DfspId::new(6);

    for id in [dfsp, neighbour] {
        enrollments
            .create_inbound_enrollment(id, CLIENT_CSR.to_string())
            .await
            .unwrap();
    }
    enrollments
        .create_inbound_enrollment(dfsp, CLIENT_CSR.to_string())
        .await
        .unwrap();
    let issued = issue_server_cert(&setup, "jws5.example.com").await;
    service
        .upload_dfsp_jws_cert(
            dfsp,
            CertificateBundle {
                certificate: issued.certificate,
                ..CertificateBundle::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paths_of(&setup.vault, dfsp).len(), 3);

    // no CA, server certificate or outbound enrollments are stored for this DFSP
    service.delete_dfsp(dfsp).await.unwrap();

    assert!(paths_of(&setup.vault, dfsp).is_empty());
    assert_eq!(paths_of(&setup.vault, neighbour).len(), 1);
    assert!(matches!(
        service.get_dfsp_ca(dfsp).await,
        Err(PkiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_all_dfsp_data_without_data() {
    let setup = setup();
    setup
        .engine
        .delete_all_dfsp_data(DfspId::new(42))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_all_dfsp_data_propagates_backend_failure() {
    let setup = setup();
    setup.vault.fail_path("secrets/dfsp-ca");

    let err = setup
        .engine
        .delete_all_dfsp_data(DfspId::new(1))
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn test_ip_whitelist_bundles() {
    let setup = setup();
    let entries = vec![
        IpWhitelistEntry {
            address: "10.0.0.1".to_string(),
            ports: vec!["443".to_string()],
        },
        IpWhitelistEntry {
            address: "10.0.0.0/24".to_string(),
            ports: vec![],
        },
    ];

    setup
        .engine
        .populate_dfsp_internal_ip_whitelist_bundle("dfsp1", &entries)
        .await
        .unwrap();
    setup
        .engine
        .populate_dfsp_external_ip_whitelist_bundle("dfsp1", &entries[..1])
        .await
        .unwrap();

    let cases = vec![
        (
            "whitelist_pm4mls/dfsp1",
            json!({ "ips": [
                { "address": "10.0.0.1", "ports": ["443"] },
                { "address": "10.0.0.0/24" },
            ] }),
        ),
        (
            "whitelist_fsps/dfsp1",
            json!({ "ips": [{ "address": "10.0.0.1", "ports": ["443"] }] }),
        ),
    ];
    for (path, expected) in cases {
        assert_eq!(setup.vault.secret(path), Some(expected), "case: {path}");
    }

    let err = setup
        .engine
        .populate_dfsp_internal_ip_whitelist_bundle("dfsp/1", &entries)
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::Validation(_)), "{err:?}");
}
