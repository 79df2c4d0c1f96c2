//! Authentication against the secrets backend and background token renewal

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::client::VaultApi;
use crate::error::{VaultError, VaultResult};

/// Time left on a lease when the renewal fires
const RENEWAL_MARGIN: Duration = Duration::from_secs(10);
/// Wait before retrying a failed re-authentication
const RETRY_DELAY: Duration = Duration::from_secs(10);
/// Shortest wait between two logins, so tiny leases do not spin
const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(1);
/// Longest single timer the runtime is asked to arm
#[allow(clippy::cast_sign_loss)]
const MAX_TIMER: Duration = Duration::from_millis(i32::MAX as u64);

/// How the service proves its identity to the backend
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Workload identity: a service-account token read from disk
    Kubernetes {
        mount: String,
        role: String,
        token_file: PathBuf,
    },
    /// Static application credentials
    AppRole {
        mount: String,
        role_id: String,
        secret_id: String,
    },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes {
                mount,
                role,
                token_file,
            } => f
                .debug_struct("Kubernetes")
                .field("mount", mount)
                .field("role", role)
                .field("token_file", token_file)
                .finish(),
            Self::AppRole { mount, role_id, .. } => f
                .debug_struct("AppRole")
                .field("mount", mount)
                .field("role_id", role_id)
                .finish_non_exhaustive(),
        }
    }
}

impl AuthMethod {
    /// Path and body of the login request
    ///
    /// # Errors
    /// Returns `VaultError::Authentication` if the service-account token cannot be read
    pub async fn login_request(&self) -> VaultResult<(String, Value)> {
        match self {
            Self::Kubernetes {
                mount,
                role,
                token_file,
            } => {
                let jwt = tokio::fs::read_to_string(token_file).await.map_err(|e| {
                    VaultError::Authentication(format!(
                        "cannot read service account token {}: {e}",
                        token_file.display()
                    ))
                })?;
                Ok((
                    format!("auth/{mount}/login"),
                    json!({ "role": role, "jwt": jwt.trim() }),
                ))
            }
            Self::AppRole {
                mount,
                role_id,
                secret_id,
            } => Ok((
                format!("auth/{mount}/login"),
                json!({ "role_id": role_id, "secret_id": secret_id }),
            )),
        }
    }
}

/// Token handed out by a successful login
#[derive(Clone)]
pub struct AuthLease {
    pub client_token: String,
    /// Lease in seconds, 0 for a token that never expires
    pub lease_duration: u64,
}

impl fmt::Debug for AuthLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLease")
            .field("lease_duration", &self.lease_duration)
            .finish_non_exhaustive()
    }
}

/// Delay before a lease of `lease_secs` has to be renewed, `None` when it never expires
#[must_use]
pub fn renewal_delay(lease_secs: u64) -> Option<Duration> {
    if lease_secs == 0 {
        return None;
    }
    let delay = Duration::from_secs(lease_secs).saturating_sub(RENEWAL_MARGIN);
    Some(delay.clamp(MIN_RENEWAL_DELAY, MAX_TIMER))
}

/// Authenticated session that keeps its token fresh
///
/// The session owns at most one renewal task. `connect` replaces it, `disconnect` and drop
/// cancel it.
pub struct VaultSession {
    api: Arc<dyn VaultApi>,
    method: AuthMethod,
    renewal: Mutex<Option<CancellationToken>>,
}

impl VaultSession {
    #[must_use]
    pub fn new(api: Arc<dyn VaultApi>, method: AuthMethod) -> Self {
        Self {
            api,
            method,
            renewal: Mutex::new(None),
        }
    }

    /// Logs in and schedules the renewal of the issued token
    ///
    /// # Errors
    /// Returns the login error; no renewal is scheduled in that case
    #[instrument(skip_all)]
    pub async fn connect(&self) -> VaultResult<()> {
        self.cancel_renewal();

        let lease = self.api.login(&self.method).await?;
        info!(
            lease_secs = lease.lease_duration,
            "Authenticated against vault"
        );

        if let Some(delay) = renewal_delay(lease.lease_duration) {
            let shutdown = CancellationToken::new();
            tokio::spawn(renew(
                Arc::clone(&self.api),
                self.method.clone(),
                delay,
                shutdown.clone(),
            ));
            // an overlapping connect may have stored its own task meanwhile
            if let Some(previous) = self.lock_renewal().replace(shutdown) {
                previous.cancel();
            }
        }
        Ok(())
    }

    /// Logs in again right away, replacing the pending renewal
    ///
    /// # Errors
    /// Returns the login error
    pub async fn reauthenticate(&self) -> VaultResult<()> {
        self.connect().await
    }

    /// Stops the renewal task
    pub fn disconnect(&self) {
        self.cancel_renewal();
    }

    /// Whether a renewal is currently scheduled
    #[must_use]
    pub fn is_renewing(&self) -> bool {
        self.lock_renewal()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn cancel_renewal(&self) {
        if let Some(token) = self.lock_renewal().take() {
            token.cancel();
        }
    }

    fn lock_renewal(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.renewal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        self.cancel_renewal();
    }
}

async fn renew(
    api: Arc<dyn VaultApi>,
    method: AuthMethod,
    mut delay: Duration,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("Vault token renewal cancelled");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        match api.login(&method).await {
            Ok(lease) => {
                info!(
                    lease_secs = lease.lease_duration,
                    "Renewed vault authentication"
                );
                match renewal_delay(lease.lease_duration) {
                    Some(next) => delay = next,
                    None => return,
                }
            }
            Err(e) => {
                error!("Vault re-authentication failed, retrying: {e}");
                delay = RETRY_DELAY;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_renewal_delay() {
        let cases = vec![
            ("non expiring", 0, None),
            ("one hour", 3600, Some(Duration::from_secs(3590))),
            ("shorter than margin", 5, Some(MIN_RENEWAL_DELAY)),
            ("capped", u64::from(u32::MAX), Some(MAX_TIMER)),
        ];

        for (name, lease, expected) in cases {
            assert_eq!(renewal_delay(lease), expected, "case: {name}");
        }
    }

    #[tokio::test]
    async fn test_app_role_login_request() {
        let method = AuthMethod::AppRole {
            mount: "approle".to_string(),
            role_id: "role".to_string(),
            secret_id: "secret".to_string(),
        };
        let (path, body) = method.login_request().await.unwrap();
        assert_eq!(path, "auth/approle/login");
        assert_eq!(body, json!({ "role_id": "role", "secret_id": "secret" }));
        assert!(!format!("{method:?}").contains("secret\""));
    }

    #[tokio::test]
    async fn test_kubernetes_login_requires_token_file() {
        let method = AuthMethod::Kubernetes {
            mount: "kubernetes".to_string(),
            role: "pki".to_string(),
            token_file: PathBuf::from("/nonexistent/token"),
        };
        let err = method.login_request().await.unwrap_err();
        assert!(matches!(err, VaultError::Authentication(_)));
    }
}
