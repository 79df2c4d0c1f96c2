use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distinguished name fields extracted by short name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    #[serde(rename = "CN", default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(rename = "O", default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(rename = "OU", default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl SubjectInfo {
    /// Fields as `(short name, value)` pairs in a fixed order
    #[must_use]
    pub fn fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("CN", self.common_name.as_deref()),
            ("OU", self.organizational_unit.as_deref()),
            ("O", self.organization.as_deref()),
            ("L", self.locality.as_deref()),
            ("ST", self.state.as_deref()),
            ("C", self.country.as_deref()),
            ("E", self.email_address.as_deref()),
        ]
    }
}

/// Subject alternative names grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAltNames {
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub uris: Vec<String>,
}

impl SubjectAltNames {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dns.is_empty() && self.ips.is_empty() && self.emails.is_empty() && self.uris.is_empty()
    }

    /// Lists as `(field name, values)` pairs
    #[must_use]
    pub fn fields(&self) -> [(&'static str, &[String]); 4] {
        [
            ("dns", &self.dns),
            ("ips", &self.ips),
            ("emails", &self.emails),
            ("uris", &self.uris),
        ]
    }
}

/// Normalized view of a PEM certificate signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrInfo {
    pub subject: SubjectInfo,
    pub subject_alternative_names: SubjectAltNames,
    pub signature_algorithm: String,
    /// RSA modulus length in bits
    pub public_key_length: u32,
    /// Hex SHA-256 of the DER `SubjectPublicKeyInfo`
    pub public_key_fingerprint: String,
}

/// Normalized view of a PEM certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertInfo {
    pub subject: SubjectInfo,
    pub issuer: SubjectInfo,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub signature_algorithm: String,
    pub subject_alternative_names: SubjectAltNames,
    pub public_key_length: u32,
    pub public_key_fingerprint: String,
    #[serde(default)]
    pub extended_key_usage: Vec<String>,
    #[serde(default)]
    pub is_ca: bool,
}
