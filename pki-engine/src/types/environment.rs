//! Environment configuration for different deployment stages

use std::env;
use std::path::PathBuf;

use pki_types::{CaInitialInfo, CaKeyInfo, CaSubject, KeyAlgorithm};
use strum::{Display, EnumString};
use tracing::Level;
use vault_storage::AuthMethod;

/// Application environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (local vault dev server)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Base URL of the secrets backend
    ///
    /// # Panics
    ///
    /// Panics if `VAULT_ENDPOINT` is not set outside development
    #[must_use]
    pub fn vault_endpoint(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("VAULT_ENDPOINT").expect("VAULT_ENDPOINT environment variable is not set")
            }
            Self::Development => {
                env::var("VAULT_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8233".to_string())
            }
        }
    }

    /// Login method for the secrets backend, selected by `VAULT_AUTH_METHOD`
    ///
    /// # Panics
    ///
    /// Panics if the method is unknown, or if its credentials are missing outside development
    #[must_use]
    pub fn vault_auth_method(&self) -> AuthMethod {
        let method = env::var("VAULT_AUTH_METHOD")
            .unwrap_or_else(|_| "APP_ROLE".to_string())
            .trim()
            .to_uppercase();

        match method.as_str() {
            "K8S" => AuthMethod::Kubernetes {
                mount: var_or("VAULT_K8S_AUTH_MOUNT", "kubernetes"),
                role: self.credential("VAULT_K8S_ROLE"),
                token_file: PathBuf::from(var_or(
                    "VAULT_K8S_TOKEN_FILE",
                    "/var/run/secrets/kubernetes.io/serviceaccount/token",
                )),
            },
            "APP_ROLE" => AuthMethod::AppRole {
                mount: var_or("VAULT_APP_ROLE_MOUNT", "approle"),
                role_id: self.credential("VAULT_ROLE_ID"),
                secret_id: self.credential("VAULT_SECRET_ID"),
            },
            _ => panic!("Invalid vault auth method: {method}"),
        }
    }

    /// PKI role name; the development default is only a placeholder
    fn pki_role(&self, name: &str, default: &str) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var(name).unwrap_or_else(|_| panic!("{name} environment variable is not set"))
            }
            Self::Development => var_or(name, default),
        }
    }

    fn credential(&self, name: &str) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var(name).unwrap_or_else(|_| panic!("{name} environment variable is not set"))
            }
            Self::Development => env::var(name).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development => Level::DEBUG,
            })
    }
}

/// Digest the hub CA signs with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum CaSignatureAlgorithm {
    #[default]
    #[strum(serialize = "sha256WithRSAEncryption")]
    Sha256WithRsa,
    #[strum(serialize = "sha512WithRSAEncryption")]
    Sha512WithRsa,
}

impl CaSignatureAlgorithm {
    /// Value of the backend's `signature_bits` parameter
    #[must_use]
    pub const fn bits(self) -> u64 {
        match self {
            Self::Sha256WithRsa => 256,
            Self::Sha512WithRsa => 512,
        }
    }
}

/// Mount points of the secrets backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMounts {
    pub pki: String,
    pub intermediate_pki: String,
    pub kv: String,
    pub dfsp_client_cert_bundle: String,
    pub dfsp_internal_ip_whitelist_bundle: String,
    pub dfsp_external_ip_whitelist_bundle: String,
}

impl Default for VaultMounts {
    fn default() -> Self {
        Self {
            pki: "pki".to_string(),
            intermediate_pki: "pki_int".to_string(),
            kv: "secrets".to_string(),
            dfsp_client_cert_bundle: "onboarding_pm4mls".to_string(),
            dfsp_internal_ip_whitelist_bundle: "whitelist_pm4mls".to_string(),
            dfsp_external_ip_whitelist_bundle: "whitelist_fsps".to_string(),
        }
    }
}

/// Settings of the CA engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiEngineConfig {
    pub mounts: VaultMounts,
    pub client_role: String,
    pub server_role: String,
    /// Validity of certificates signed for enrollments
    pub sign_expiry_hours: u64,
    /// Size of locally generated keys
    pub csr_key_bits: usize,
    pub ca_signature_algorithm: CaSignatureAlgorithm,
    /// Hub CA created at startup when none exists yet
    pub hub_ca: Option<CaInitialInfo>,
}

impl Default for PkiEngineConfig {
    fn default() -> Self {
        Self {
            mounts: VaultMounts::default(),
            client_role: "example.com".to_string(),
            server_role: "example.com".to_string(),
            sign_expiry_hours: 43800,
            csr_key_bits: 4096,
            ca_signature_algorithm: CaSignatureAlgorithm::default(),
            hub_ca: None,
        }
    }
}

impl PkiEngineConfig {
    /// Reads the engine settings from the process environment
    ///
    /// # Panics
    ///
    /// Panics if `CA_SIGNATURE_ALGORITHM` names an unsupported algorithm, if the PKI roles are
    /// unset outside development, or if `HUB_CA_CN` is set without `HUB_CA_O`
    #[must_use]
    pub fn from_environment(environment: &Environment) -> Self {
        let defaults = Self::default();
        let mounts = VaultMounts {
            pki: var_or("VAULT_MOUNT_PKI", &defaults.mounts.pki),
            intermediate_pki: var_or(
                "VAULT_MOUNT_INTERMEDIATE_PKI",
                &defaults.mounts.intermediate_pki,
            ),
            kv: var_or("VAULT_MOUNT_KV", &defaults.mounts.kv),
            dfsp_client_cert_bundle: var_or(
                "VAULT_MOUNT_DFSP_CLIENT_CERT_BUNDLE",
                &defaults.mounts.dfsp_client_cert_bundle,
            ),
            dfsp_internal_ip_whitelist_bundle: var_or(
                "VAULT_MOUNT_DFSP_INTERNAL_IP_WHITELIST_BUNDLE",
                &defaults.mounts.dfsp_internal_ip_whitelist_bundle,
            ),
            dfsp_external_ip_whitelist_bundle: var_or(
                "VAULT_MOUNT_DFSP_EXTERNAL_IP_WHITELIST_BUNDLE",
                &defaults.mounts.dfsp_external_ip_whitelist_bundle,
            ),
        };

        let ca_signature_algorithm = env::var("CA_SIGNATURE_ALGORITHM").map_or(
            defaults.ca_signature_algorithm,
            |value| {
                value
                    .trim()
                    .parse()
                    .unwrap_or_else(|_| panic!("Invalid CA signature algorithm: {value}"))
            },
        );

        Self {
            mounts,
            client_role: environment.pki_role("VAULT_PKI_CLIENT_ROLE", &defaults.client_role),
            server_role: environment.pki_role("VAULT_PKI_SERVER_ROLE", &defaults.server_role),
            sign_expiry_hours: parsed_var("VAULT_SIGN_EXPIRY_HOURS")
                .unwrap_or(defaults.sign_expiry_hours),
            csr_key_bits: parsed_var("CSR_KEY_BITS").unwrap_or(defaults.csr_key_bits),
            ca_signature_algorithm,
            hub_ca: hub_ca_from_env(),
        }
    }
}

/// Set when `HUB_CA_CN` is; `HUB_CA_O` is then required and the other fields are optional
fn hub_ca_from_env() -> Option<CaInitialInfo> {
    let common_name = env::var("HUB_CA_CN").ok().filter(|v| !v.trim().is_empty())?;
    let organization = env::var("HUB_CA_O")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| panic!("HUB_CA_O environment variable is not set"));

    Some(CaInitialInfo {
        subject: CaSubject {
            common_name,
            organization,
            organizational_unit: env::var("HUB_CA_OU").ok(),
            country: env::var("HUB_CA_C").ok(),
            locality: env::var("HUB_CA_L").ok(),
            state: env::var("HUB_CA_ST").ok(),
        },
        key: CaKeyInfo {
            algorithm: KeyAlgorithm::Rsa,
            size: parsed_var("HUB_CA_KEY_BITS").unwrap_or(4096),
        },
        names: Vec::new(),
    })
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    const ENGINE_VARS: [&str; 9] = [
        "VAULT_MOUNT_KV",
        "VAULT_PKI_CLIENT_ROLE",
        "VAULT_PKI_SERVER_ROLE",
        "VAULT_SIGN_EXPIRY_HOURS",
        "CSR_KEY_BITS",
        "CA_SIGNATURE_ALGORITHM",
        "HUB_CA_CN",
        "HUB_CA_O",
        "VAULT_AUTH_METHOD",
    ];

    fn clear() {
        for name in ENGINE_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        env::remove_var("APP_ENV");
        assert_eq!(Environment::from_env(), Environment::Development);

        env::set_var("APP_ENV", "staging");
        assert_eq!(Environment::from_env(), Environment::Staging);

        env::set_var("APP_ENV", " Production ");
        assert_eq!(Environment::from_env(), Environment::Production);

        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    #[should_panic(expected = "Invalid environment: invalid")]
    fn test_invalid_environment() {
        env::set_var("APP_ENV", "invalid");
        let _ = Environment::from_env();
    }

    #[test]
    #[serial]
    fn test_engine_config_defaults() {
        clear();
        let config = PkiEngineConfig::from_environment(&Environment::Development);
        assert_eq!(config, PkiEngineConfig::default());
        assert_eq!(config.ca_signature_algorithm.bits(), 256);
    }

    #[test]
    #[serial]
    #[should_panic(expected = "HUB_CA_O environment variable is not set")]
    fn test_hub_ca_requires_organization() {
        clear();
        env::set_var("HUB_CA_CN", "Hub Root CA");
        let _ = PkiEngineConfig::from_environment(&Environment::Development);
    }

    #[test]
    #[serial]
    #[should_panic(expected = "VAULT_PKI_CLIENT_ROLE environment variable is not set")]
    fn test_pki_roles_required_outside_development() {
        clear();
        let _ = PkiEngineConfig::from_environment(&Environment::Production);
    }

    #[test]
    #[serial]
    fn test_pki_roles_from_env_in_production() {
        clear();
        env::set_var("VAULT_PKI_CLIENT_ROLE", "dfsp-client");
        env::set_var("VAULT_PKI_SERVER_ROLE", "hub-server");

        let config = PkiEngineConfig::from_environment(&Environment::Production);
        assert_eq!(config.client_role, "dfsp-client");
        assert_eq!(config.server_role, "hub-server");
        assert_eq!(config.hub_ca, None);
        clear();
    }

    #[test]
    #[serial]
    fn test_engine_config_overrides() {
        clear();
        env::set_var("VAULT_MOUNT_KV", "kv");
        env::set_var("VAULT_SIGN_EXPIRY_HOURS", "24");
        env::set_var("CSR_KEY_BITS", "not a number");
        env::set_var("CA_SIGNATURE_ALGORITHM", "sha512WithRSAEncryption");
        env::set_var("HUB_CA_CN", "Hub Root CA");
        env::set_var("HUB_CA_O", "Hub");

        let config = PkiEngineConfig::from_environment(&Environment::Development);
        assert_eq!(config.mounts.kv, "kv");
        assert_eq!(config.sign_expiry_hours, 24);
        assert_eq!(config.csr_key_bits, 4096);
        assert_eq!(
            config.ca_signature_algorithm,
            CaSignatureAlgorithm::Sha512WithRsa
        );
        let hub_ca = config.hub_ca.unwrap();
        assert_eq!(hub_ca.subject.common_name, "Hub Root CA");
        assert_eq!(hub_ca.key.size, 4096);
        clear();
    }

    #[test]
    #[serial]
    fn test_vault_auth_method_selection() {
        clear();
        env::set_var("VAULT_ROLE_ID", "role");
        env::set_var("VAULT_SECRET_ID", "secret");
        let method = Environment::Production.vault_auth_method();
        assert!(matches!(method, AuthMethod::AppRole { ref role_id, .. } if role_id == "role"));

        env::set_var("VAULT_AUTH_METHOD", "k8s");
        env::set_var("VAULT_K8S_ROLE", "pki-engine");
        let method = Environment::Production.vault_auth_method();
        assert!(matches!(method, AuthMethod::Kubernetes { ref mount, .. } if mount == "kubernetes"));

        for name in ["VAULT_ROLE_ID", "VAULT_SECRET_ID", "VAULT_K8S_ROLE"] {
            env::remove_var(name);
        }
        clear();
    }
}
