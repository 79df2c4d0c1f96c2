mod bundle;
mod environment;
mod error;
mod secret;

pub use bundle::{is_valid_bundle_name, join_pem, ClientCertBundle, IpWhitelistEntry, WhitelistScope};
pub use environment::{CaSignatureAlgorithm, Environment, PkiEngineConfig, VaultMounts};
pub use error::{PkiError, PkiResult};
pub use secret::SecretKey;
