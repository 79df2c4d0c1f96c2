use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vault_storage::mock::MockVault;
use vault_storage::{VaultApi, VaultError};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};

const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
const CLIENT_CSR: &str = include_str!("../../cert-validation/tests/fixtures/dfsp_client.csr");

fn field<'a>(data: &'a Value, name: &str) -> &'a str {
    data[name]
        .as_str()
        .unwrap_or_else(|| panic!("missing {name} in {data}"))
}

fn signature_oid(pem: &str) -> String {
    let (_, pem) = parse_x509_pem(pem.as_bytes()).unwrap();
    let (_, cert) = X509Certificate::from_der(&pem.contents).unwrap();
    cert.signature_algorithm.algorithm.to_id_string()
}

fn common_name(pem: &str) -> String {
    let (_, pem) = parse_x509_pem(pem.as_bytes()).unwrap();
    let (_, cert) = X509Certificate::from_der(&pem.contents).unwrap();
    let name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap()
        .to_string();
    name
}

async fn root_and_intermediate(vault: &MockVault, signature_bits: u64) -> anyhow::Result<()> {
    vault
        .write(
            "pki/root/generate/exported",
            json!({ "common_name": "Hub Root", "organization": "Hub", "key_bits": 2048,
                    "signature_bits": signature_bits }),
        )
        .await?;
    let generated = vault
        .write(
            "pki_int/intermediate/generate/exported",
            json!({ "common_name": "Hub Intermediate", "organization": "Hub", "key_bits": 2048 }),
        )
        .await?;
    let signed = vault
        .write(
            "pki/root/sign-intermediate",
            json!({ "csr": field(&generated, "csr"), "ttl": "8760h",
                    "signature_bits": signature_bits }),
        )
        .await?;
    vault
        .write(
            "pki_int/intermediate/set-signed",
            json!({ "certificate": field(&signed, "certificate") }),
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_key_value_operations() -> anyhow::Result<()> {
    let vault = MockVault::new();

    vault
        .write("secrets/dfsp-ca/1", json!({ "rootCertificate": "a" }))
        .await?;
    vault
        .write("secrets/dfsp-inbound-enrollment/1/1", json!({ "id": 1 }))
        .await?;
    vault
        .write("secrets/dfsp-inbound-enrollment/1/2", json!({ "id": 2 }))
        .await?;

    assert_eq!(
        vault.read("secrets/dfsp-ca/1").await?,
        json!({ "rootCertificate": "a" })
    );
    assert_eq!(
        vault.list("secrets/dfsp-inbound-enrollment/1").await?,
        vec!["1", "2"]
    );
    assert_eq!(
        vault.list("secrets/dfsp-inbound-enrollment").await?,
        vec!["1/"]
    );
    assert!(vault.list("secrets/dfsp-jws-certs").await?.is_empty());

    vault.delete("secrets/dfsp-ca/1").await?;
    vault.delete("secrets/dfsp-ca/1").await?;
    let err = vault.read("secrets/dfsp-ca/1").await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_hierarchy_and_client_signing() -> anyhow::Result<()> {
    let vault = MockVault::new();
    root_and_intermediate(&vault, 256).await?;

    let root = field(&vault.read("pki/cert/ca").await?, "certificate").to_string();
    let intermediate = field(&vault.read("pki_int/cert/ca").await?, "certificate").to_string();
    assert_eq!(common_name(&root), "Hub Root");
    assert_eq!(common_name(&intermediate), "Hub Intermediate");

    let signed = vault
        .write(
            "pki_int/sign/client",
            json!({ "csr": CLIENT_CSR, "common_name": "dfsp.test.io", "ttl": "48h" }),
        )
        .await?;
    assert_eq!(common_name(field(&signed, "certificate")), "dfsp.test.io");
    assert_eq!(field(&signed, "issuing_ca"), intermediate);
    assert_eq!(signature_oid(field(&signed, "certificate")), SHA256_WITH_RSA);
    Ok(())
}

#[tokio::test]
async fn test_signature_bits_select_digest() -> anyhow::Result<()> {
    let vault = MockVault::new();
    root_and_intermediate(&vault, 512).await?;

    let intermediate = field(&vault.read("pki_int/cert/ca").await?, "certificate").to_string();
    assert_eq!(signature_oid(&intermediate), SHA512_WITH_RSA);
    Ok(())
}

#[tokio::test]
async fn test_issue_and_revoke_server_certificate() -> anyhow::Result<()> {
    let vault = MockVault::new();
    root_and_intermediate(&vault, 256).await?;

    let issued = vault
        .write(
            "pki_int/issue/server",
            json!({ "common_name": "hub.test.io", "alt_names": "api.hub.test.io",
                    "ip_sans": "10.0.0.1" }),
        )
        .await?;
    assert!(field(&issued, "private_key").contains("RSA PRIVATE KEY"));
    let serial = field(&issued, "serial_number").to_string();

    vault
        .write("pki_int/revoke", json!({ "serial_number": serial }))
        .await?;
    assert_eq!(vault.revoked_serials(), vec![serial]);

    let err = vault
        .write("pki_int/revoke", json!({ "serial_number": "00:11" }))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Status { status: 400, .. }));
    Ok(())
}

#[tokio::test]
async fn test_signing_without_ca_is_rejected() {
    let vault = MockVault::new();
    let err = vault
        .write("pki_int/sign/client", json!({ "csr": "garbage" }))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Status { status: 400, .. }));

    vault.delete("pki/root").await.unwrap();
    assert!(vault.read("pki/cert/ca").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_injected_failures() {
    let vault = MockVault::new();
    vault.fail_path("secrets/dfsp-ca");

    let err = vault.read("secrets/dfsp-ca/1").await.unwrap_err();
    assert!(matches!(err, VaultError::Status { status: 500, .. }));
    assert!(vault.read("secrets/hub-endpoints").await.unwrap_err().is_not_found());
}
