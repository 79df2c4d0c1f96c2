//! Request bodies and responses of the PKI endpoints

use pki_types::{CaInitialInfo, ServerCertRequest};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};

use crate::types::{PkiError, PkiResult};

#[derive(Debug, Deserialize)]
pub(super) struct GeneratedRoot {
    pub certificate: String,
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GeneratedIntermediateCsr {
    pub csr: String,
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignedCertificate {
    pub certificate: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct IssuedServerCertificate {
    pub certificate: String,
    pub private_key: String,
    pub issuing_ca: String,
    pub serial_number: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CaCertificate {
    #[serde(default)]
    pub certificate: String,
}

pub(super) fn decode<T: DeserializeOwned>(path: &str, data: Value) -> PkiResult<T> {
    serde_json::from_value(data)
        .map_err(|e| PkiError::ExternalProcess(format!("Unexpected response from {path}: {e}")))
}

pub(super) fn ttl(hours: u64) -> String {
    format!("{hours}h")
}

/// Subject and key parameters of a root or intermediate CA
pub(super) fn ca_request(info: &CaInitialInfo) -> Value {
    let subject = &info.subject;
    compact(json!({
        "common_name": subject.common_name,
        "organization": subject.organization,
        "ou": subject.organizational_unit,
        "country": subject.country,
        "locality": subject.locality,
        "province": subject.state,
        "key_type": info.key.algorithm.as_str(),
        "key_bits": info.key.size,
        "alt_names": (!info.names.is_empty()).then(|| info.names.join(",")),
    }))
}

pub(super) fn server_cert_request(request: &ServerCertRequest, signature_bits: u64) -> Value {
    compact(json!({
        "common_name": request.common_name,
        "alt_names": (!request.dns.is_empty()).then(|| request.dns.join(",")),
        "ip_sans": (!request.ips.is_empty()).then(|| request.ips.join(",")),
        "ttl": request.ttl_hours.map(ttl),
        "signature_bits": signature_bits,
    }))
}

/// Drops `null` fields so the backend applies its own defaults
fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pki_types::{CaKeyInfo, CaSubject};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ca_request_omits_missing_fields() {
        let info = CaInitialInfo {
            subject: CaSubject {
                common_name: "Hub Root CA".to_string(),
                organization: "Hub".to_string(),
                country: Some("US".to_string()),
                ..CaSubject::default()
            },
            key: CaKeyInfo::default(),
            names: vec![],
        };

        assert_eq!(
            ca_request(&info),
            json!({
                "common_name": "Hub Root CA",
                "organization": "Hub",
                "country": "US",
                "key_type": "rsa",
                "key_bits": 4096,
            })
        );
    }

    #[test]
    fn test_server_cert_request_joins_alt_names() {
        let request = ServerCertRequest {
            common_name: "switch.example.com".to_string(),
            dns: vec!["a.example.com".to_string(), "b.example.com".to_string()],
            ips: vec!["10.0.0.1".to_string()],
            ttl_hours: Some(24),
        };

        assert_eq!(
            server_cert_request(&request, 256),
            json!({
                "common_name": "switch.example.com",
                "alt_names": "a.example.com,b.example.com",
                "ip_sans": "10.0.0.1",
                "ttl": "24h",
                "signature_bits": 256,
            })
        );
    }

    #[test]
    fn test_decode_reports_the_path() {
        let err = decode::<SignedCertificate>("pki/sign/client", json!({})).unwrap_err();
        assert!(matches!(err, PkiError::ExternalProcess(ref m) if m.contains("pki/sign/client")));
    }
}
