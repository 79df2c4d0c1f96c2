//! In-memory stand-in for the secrets backend
//!
//! Key/value paths behave like a KV v1 mount. Paths under a configured PKI mount emulate the
//! certificate endpoints the engine calls: root and intermediate generation, intermediate
//! signing, `sign/<role>`, `issue/<role>`, `revoke` and `cert/ca`. Certificates are real and
//! signed with `rcgen`, so everything the mock hands out parses and verifies.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber, SignatureAlgorithm, PKCS_RSA_SHA256, PKCS_RSA_SHA384, PKCS_RSA_SHA512,
};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

use crate::auth::{AuthLease, AuthMethod};
use crate::client::VaultApi;
use crate::error::{VaultError, VaultResult};

/// Key size used when a request does not name one
const DEFAULT_KEY_BITS: usize = 2048;
/// Validity used when a request does not carry a ttl
const DEFAULT_TTL_HOURS: i64 = 24 * 365;

struct CaMaterial {
    certificate: String,
    /// PKCS#8, the form `rcgen` loads RSA keys from
    key: String,
}

impl CaMaterial {
    fn issuer(&self, signature_bits: u64) -> Result<(Certificate, KeyPair), rcgen::Error> {
        let key = KeyPair::from_pem_and_sign_algo(&self.key, signature_algorithm(signature_bits))?;
        let issuer = CertificateParams::from_ca_cert_pem(&self.certificate)?.self_signed(&key)?;
        Ok((issuer, key))
    }
}

struct GeneratedKey {
    pkcs1: String,
    pkcs8: String,
}

#[derive(Default)]
struct MockState {
    secrets: BTreeMap<String, Value>,
    authorities: HashMap<String, CaMaterial>,
    pending_keys: HashMap<String, String>,
    issued: BTreeSet<String>,
    revoked: Vec<String>,
    failing: Vec<String>,
}

enum Usage {
    Ca,
    Client,
}

/// In-memory secrets backend
pub struct MockVault {
    pki_mounts: Vec<String>,
    state: Mutex<MockState>,
    lease_duration: AtomicU64,
    login_delay_ms: AtomicU64,
    logins: AtomicUsize,
    failing_logins: AtomicUsize,
}

impl Default for MockVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVault {
    /// Mock with PKI endpoints under `pki` and `pki_int` and non-expiring tokens
    #[must_use]
    pub fn new() -> Self {
        Self::with_pki_mounts(["pki", "pki_int"])
    }

    #[must_use]
    pub fn with_pki_mounts<I, S>(mounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pki_mounts: mounts.into_iter().map(Into::into).collect(),
            state: Mutex::new(MockState::default()),
            lease_duration: AtomicU64::new(0),
            login_delay_ms: AtomicU64::new(0),
            logins: AtomicUsize::new(0),
            failing_logins: AtomicUsize::new(0),
        }
    }

    /// Lease in seconds handed out by subsequent logins
    #[must_use]
    pub fn with_lease(self, lease_duration: u64) -> Self {
        self.lease_duration.store(lease_duration, Ordering::SeqCst);
        self
    }

    /// Time each login takes before answering
    #[must_use]
    pub fn with_login_delay(self, delay: Duration) -> Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.login_delay_ms.store(millis, Ordering::SeqCst);
        self
    }

    /// Rejects the next `count` logins
    pub fn fail_logins(&self, count: usize) {
        self.failing_logins.store(count, Ordering::SeqCst);
    }

    /// Every request whose path starts with `prefix` fails with a 500
    pub fn fail_path(&self, prefix: impl Into<String>) {
        self.lock().failing.push(prefix.into());
    }

    /// Number of login attempts, failed ones included
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn secret(&self, path: &str) -> Option<Value> {
        self.lock().secrets.get(path).cloned()
    }

    /// Every key/value path currently holding data
    #[must_use]
    pub fn secret_paths(&self) -> Vec<String> {
        self.lock().secrets.keys().cloned().collect()
    }

    pub fn put_secret(&self, path: impl Into<String>, value: Value) {
        self.lock().secrets.insert(path.into(), value);
    }

    /// Certificate of the CA configured on `mount`
    #[must_use]
    pub fn ca_certificate(&self, mount: &str) -> Option<String> {
        self.lock()
            .authorities
            .get(mount)
            .map(|ca| ca.certificate.clone())
    }

    /// Installs an existing CA on `mount`; `key` may be PKCS#1 or PKCS#8
    ///
    /// # Errors
    /// Returns an error if the key cannot be read
    pub fn install_ca(&self, mount: &str, certificate: &str, key: &str) -> VaultResult<()> {
        let key = to_pkcs8(key).map_err(|e| rejected(mount, e))?;
        self.lock().authorities.insert(
            mount.to_string(),
            CaMaterial {
                certificate: certificate.to_string(),
                key,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn revoked_serials(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self, path: &str) -> VaultResult<()> {
        if self.lock().failing.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(VaultError::Status {
                path: path.to_string(),
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn pki_route<'p>(&self, path: &'p str) -> Option<(&'p str, &'p str)> {
        let (mount, rest) = path.split_once('/')?;
        self.pki_mounts
            .iter()
            .any(|pki| pki == mount)
            .then_some((mount, rest))
    }

    fn pki_write(&self, path: &str, mount: &str, rest: &str, body: &Value) -> VaultResult<Value> {
        let mut state = self.lock();
        match rest {
            "root/generate/exported" | "root/generate/internal" => {
                generate_root(&mut state, mount, body, rest.ends_with("exported"))
            }
            "intermediate/generate/exported" | "intermediate/generate/internal" => {
                generate_intermediate(&mut state, mount, body, rest.ends_with("exported"))
            }
            "intermediate/set-signed" => {
                let certificate = required(path, body, "certificate")?;
                let key = state
                    .pending_keys
                    .remove(mount)
                    .ok_or_else(|| rejected(path, "no pending intermediate key"))?;
                state.authorities.insert(
                    mount.to_string(),
                    CaMaterial {
                        certificate: certificate.to_string(),
                        key,
                    },
                );
                Ok(Value::Null)
            }
            "root/sign-intermediate" => sign_csr(&mut state, mount, body, &Usage::Ca),
            "revoke" => {
                let serial = required(path, body, "serial_number")?;
                if !state.issued.contains(serial) {
                    return Err(rejected(path, format!("certificate {serial} not found")));
                }
                state.revoked.push(serial.to_string());
                Ok(json!({ "revocation_time": time::OffsetDateTime::now_utc().unix_timestamp() }))
            }
            rest if rest.starts_with("sign/") => sign_csr(&mut state, mount, body, &Usage::Client),
            rest if rest.starts_with("issue/") => issue(&mut state, mount, body),
            rest if rest.starts_with("config/") => Ok(Value::Null),
            _ => Err(rejected(path, "unsupported endpoint")),
        }
        .map_err(|e| match e {
            VaultError::Status { message, .. } => rejected(path, message),
            other => other,
        })
    }
}

#[async_trait]
impl VaultApi for MockVault {
    async fn login(&self, _method: &AuthMethod) -> VaultResult<AuthLease> {
        let delay = self.login_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let rejected = self
            .failing_logins
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(VaultError::Authentication("login rejected".to_string()));
        }

        Ok(AuthLease {
            client_token: format!("mock-token-{attempt}"),
            lease_duration: self.lease_duration.load(Ordering::SeqCst),
        })
    }

    async fn read(&self, path: &str) -> VaultResult<Value> {
        self.check_failure(path)?;
        if let Some((mount, "cert/ca")) = self.pki_route(path) {
            return self
                .ca_certificate(mount)
                .map(|certificate| json!({ "certificate": certificate }))
                .ok_or_else(|| VaultError::NotFound(path.to_string()));
        }

        self.secret(path)
            .ok_or_else(|| VaultError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, body: Value) -> VaultResult<Value> {
        self.check_failure(path)?;
        if let Some((mount, rest)) = self.pki_route(path) {
            return self.pki_write(path, mount, rest, &body);
        }

        self.put_secret(path, body);
        Ok(Value::Null)
    }

    async fn list(&self, path: &str) -> VaultResult<Vec<String>> {
        self.check_failure(path)?;
        let prefix = format!("{}/", path.trim_end_matches('/'));

        let keys: BTreeSet<String> = self
            .lock()
            .secrets
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((folder, _)) => format!("{folder}/"),
                None => rest.to_string(),
            })
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn delete(&self, path: &str) -> VaultResult<()> {
        self.check_failure(path)?;
        if let Some((mount, "root")) = self.pki_route(path) {
            self.lock().authorities.remove(mount);
            return Ok(());
        }

        self.lock().secrets.remove(path);
        Ok(())
    }
}

fn generate_root(
    state: &mut MockState,
    mount: &str,
    body: &Value,
    exported: bool,
) -> VaultResult<Value> {
    let key = generate_key(key_bits(body))?;
    let key_pair = KeyPair::from_pem_and_sign_algo(&key.pkcs8, signature_algorithm(signature_bits(body)))
        .map_err(|e| rejected(mount, e))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(body);
    params.subject_alt_names = dns_names(body)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = ca_key_usages();
    let serial = set_validity_and_serial(&mut params, body);

    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| rejected(mount, e))?
        .pem();

    state.issued.insert(serial.clone());
    state.authorities.insert(
        mount.to_string(),
        CaMaterial {
            certificate: certificate.clone(),
            key: key.pkcs8,
        },
    );

    let mut data = json!({
        "certificate": certificate,
        "issuing_ca": certificate,
        "serial_number": serial,
    });
    if exported {
        data["private_key"] = Value::String(key.pkcs1);
        data["private_key_type"] = Value::String("rsa".to_string());
    }
    Ok(data)
}

fn generate_intermediate(
    state: &mut MockState,
    mount: &str,
    body: &Value,
    exported: bool,
) -> VaultResult<Value> {
    let key = generate_key(key_bits(body))?;
    let key_pair = KeyPair::from_pem_and_sign_algo(&key.pkcs8, &PKCS_RSA_SHA256)
        .map_err(|e| rejected(mount, e))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(body);
    let csr = params
        .serialize_request(&key_pair)
        .and_then(|csr| csr.pem())
        .map_err(|e| rejected(mount, e))?;

    state.pending_keys.insert(mount.to_string(), key.pkcs8);

    let mut data = json!({ "csr": csr });
    if exported {
        data["private_key"] = Value::String(key.pkcs1);
        data["private_key_type"] = Value::String("rsa".to_string());
    }
    Ok(data)
}

fn sign_csr(state: &mut MockState, mount: &str, body: &Value, usage: &Usage) -> VaultResult<Value> {
    let csr = required(mount, body, "csr")?;
    let mut request =
        CertificateSigningRequestParams::from_pem(csr).map_err(|e| rejected(mount, e))?;

    if let Some(common_name) = optional(body, "common_name") {
        request
            .params
            .distinguished_name
            .push(DnType::CommonName, common_name);
    }
    match usage {
        Usage::Ca => {
            request.params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            request.params.key_usages = ca_key_usages();
        }
        Usage::Client => {
            request.params.is_ca = IsCa::ExplicitNoCa;
            request.params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ];
            request.params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        }
    }
    let serial = set_validity_and_serial(&mut request.params, body);

    let authority = state
        .authorities
        .get(mount)
        .ok_or_else(|| rejected(mount, "no CA configured"))?;
    let (issuer, issuer_key) = authority
        .issuer(signature_bits(body))
        .map_err(|e| rejected(mount, e))?;
    let certificate = request
        .signed_by(&issuer, &issuer_key)
        .map_err(|e| rejected(mount, e))?
        .pem();
    let issuing_ca = authority.certificate.clone();

    state.issued.insert(serial.clone());
    Ok(json!({
        "certificate": certificate,
        "issuing_ca": issuing_ca,
        "ca_chain": [issuing_ca],
        "serial_number": serial,
    }))
}

fn issue(state: &mut MockState, mount: &str, body: &Value) -> VaultResult<Value> {
    let common_name = required(mount, body, "common_name")?;
    let key = generate_key(DEFAULT_KEY_BITS)?;
    let key_pair =
        KeyPair::from_pem_and_sign_algo(&key.pkcs8, &PKCS_RSA_SHA256).map_err(|e| rejected(mount, e))?;

    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.subject_alt_names = std::iter::once(dns_name(common_name)?)
        .chain(dns_names(body)?)
        .chain(ip_sans(body)?)
        .collect();
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let serial = set_validity_and_serial(&mut params, body);

    let authority = state
        .authorities
        .get(mount)
        .ok_or_else(|| rejected(mount, "no CA configured"))?;
    let (issuer, issuer_key) = authority
        .issuer(signature_bits(body))
        .map_err(|e| rejected(mount, e))?;
    let certificate = params
        .signed_by(&key_pair, &issuer, &issuer_key)
        .map_err(|e| rejected(mount, e))?
        .pem();
    let issuing_ca = authority.certificate.clone();

    state.issued.insert(serial.clone());
    Ok(json!({
        "certificate": certificate,
        "private_key": key.pkcs1,
        "private_key_type": "rsa",
        "issuing_ca": issuing_ca,
        "ca_chain": [issuing_ca],
        "serial_number": serial,
    }))
}

fn generate_key(bits: usize) -> VaultResult<GeneratedKey> {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| rejected("key generation", e))?;
    let pkcs1 = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| rejected("key generation", e))?;
    let pkcs8 = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| rejected("key generation", e))?;
    Ok(GeneratedKey {
        pkcs1: pkcs1.to_string(),
        pkcs8: pkcs8.to_string(),
    })
}

fn to_pkcs8(pem: &str) -> Result<String, String> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::DecodePrivateKey;

    let key = RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| e.to_string())?;
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| e.to_string())
}

fn distinguished_name(body: &Value) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    for (field, kind) in [
        ("common_name", DnType::CommonName),
        ("organization", DnType::OrganizationName),
        ("ou", DnType::OrganizationalUnitName),
        ("country", DnType::CountryName),
        ("locality", DnType::LocalityName),
        ("province", DnType::StateOrProvinceName),
    ] {
        if let Some(value) = optional(body, field) {
            name.push(kind, value);
        }
    }
    name
}

fn ca_key_usages() -> Vec<KeyUsagePurpose> {
    vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ]
}

fn set_validity_and_serial(params: &mut CertificateParams, body: &Value) -> String {
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::minutes(1);
    params.not_after = now + time::Duration::hours(ttl_hours(body));

    let mut serial = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut serial);
    serial[0] &= 0x7f;
    params.serial_number = Some(SerialNumber::from_slice(&serial));

    serial
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn ttl_hours(body: &Value) -> i64 {
    optional(body, "ttl")
        .and_then(|ttl| match ttl.strip_suffix('h') {
            Some(hours) => hours.parse().ok(),
            None => ttl.parse::<i64>().ok().map(|secs| secs / 3600),
        })
        .filter(|hours| *hours > 0)
        .unwrap_or(DEFAULT_TTL_HOURS)
}

fn key_bits(body: &Value) -> usize {
    body.get("key_bits")
        .and_then(Value::as_u64)
        .and_then(|bits| usize::try_from(bits).ok())
        .unwrap_or(DEFAULT_KEY_BITS)
}

fn signature_bits(body: &Value) -> u64 {
    body.get("signature_bits")
        .and_then(Value::as_u64)
        .unwrap_or(256)
}

fn signature_algorithm(bits: u64) -> &'static SignatureAlgorithm {
    match bits {
        384 => &PKCS_RSA_SHA384,
        512 => &PKCS_RSA_SHA512,
        _ => &PKCS_RSA_SHA256,
    }
}

fn dns_name(name: &str) -> VaultResult<SanType> {
    name.to_string()
        .try_into()
        .map(SanType::DnsName)
        .map_err(|e| rejected(name, e))
}

fn dns_names(body: &Value) -> VaultResult<Vec<SanType>> {
    comma_list(body, "alt_names").map(dns_name).collect()
}

fn ip_sans(body: &Value) -> VaultResult<Vec<SanType>> {
    comma_list(body, "ip_sans")
        .map(|ip| {
            ip.parse::<IpAddr>()
                .map(SanType::IpAddress)
                .map_err(|e| rejected(ip, e))
        })
        .collect()
}

fn comma_list<'a>(body: &'a Value, field: &str) -> impl Iterator<Item = &'a str> {
    optional(body, field)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn optional<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn required<'a>(path: &str, body: &'a Value, field: &str) -> VaultResult<&'a str> {
    optional(body, field).ok_or_else(|| rejected(path, format!("missing required field {field}")))
}

fn rejected(path: &str, message: impl Display) -> VaultError {
    VaultError::Status {
        path: path.to_string(),
        status: 400,
        message: message.to_string(),
    }
}
