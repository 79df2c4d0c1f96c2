use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::auth::{AuthLease, AuthMethod};
use crate::error::{VaultError, VaultResult};

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Maximum number of idle connections to maintain per host
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;
/// Header carrying the client token
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Key/value and PKI operations of the secrets backend
///
/// Paths are relative to the API root and start with the mount, e.g. `secrets/hub-ca-details`
/// or `pki/root/generate/exported`.
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Authenticates and keeps the issued token for subsequent calls
    async fn login(&self, method: &AuthMethod) -> VaultResult<AuthLease>;

    /// `data` of the secret or endpoint at `path`, `NotFound` when absent
    async fn read(&self, path: &str) -> VaultResult<Value>;

    /// Writes `body` to `path` and returns the `data` of the response, `Null` when empty
    async fn write(&self, path: &str, body: Value) -> VaultResult<Value>;

    /// Keys directly below `path`; sub-folders end with `/`. Empty when nothing is stored.
    async fn list(&self, path: &str) -> VaultResult<Vec<String>>;

    /// Deletes whatever is stored at `path`
    async fn delete(&self, path: &str) -> VaultResult<()>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<String>,
}

/// HTTP client for a Vault-compatible secrets backend
pub struct VaultHttpClient {
    endpoint: String,
    http_client: ClientWithMiddleware,
    token: RwLock<Option<String>>,
}

impl VaultHttpClient {
    /// Creates a new client for the backend listening at `endpoint`
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to be created
    pub fn new(endpoint: impl Into<String>) -> VaultResult<Self> {
        let reqwest_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()?;

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http_client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, self.url(path));
        match self.token.read().await.as_deref() {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> VaultResult<Option<Response>> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "Vault response");

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(VaultError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.json::<ErrorEnvelope>().await.unwrap_or_default();
            return Err(VaultError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message: body.errors.join("; "),
            });
        }
        Ok(Some(response))
    }

    async fn data(&self, path: &str, builder: RequestBuilder) -> VaultResult<Value> {
        match self.send(path, builder).await? {
            Some(response) => Ok(response.json::<DataEnvelope>().await?.data),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl VaultApi for VaultHttpClient {
    #[instrument(skip_all)]
    async fn login(&self, method: &AuthMethod) -> VaultResult<AuthLease> {
        let (path, body) = method.login_request().await?;
        let builder = self.http_client.post(self.url(&path)).json(&body);

        let response = self.send(&path, builder).await.map_err(|e| match e {
            VaultError::Status { message, .. } => VaultError::Authentication(message),
            other => other,
        })?;
        let Some(response) = response else {
            return Err(VaultError::UnexpectedResponse(
                "empty login response".to_string(),
            ));
        };
        let LoginEnvelope { auth } = response.json().await?;

        *self.token.write().await = Some(auth.client_token.clone());
        Ok(AuthLease {
            client_token: auth.client_token,
            lease_duration: auth.lease_duration,
        })
    }

    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> VaultResult<Value> {
        let builder = self.request(Method::GET, path).await;
        self.data(path, builder).await
    }

    #[instrument(skip(self, body))]
    async fn write(&self, path: &str, body: Value) -> VaultResult<Value> {
        let builder = self.request(Method::POST, path).await.json(&body);
        self.data(path, builder).await
    }

    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> VaultResult<Vec<String>> {
        let builder = self
            .request(Method::GET, path)
            .await
            .query(&[("list", "true")]);

        match self.data(path, builder).await {
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(data) => Ok(serde_json::from_value::<ListData>(data)?.keys),
            Err(VaultError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> VaultResult<()> {
        let builder = self.request(Method::DELETE, path).await;
        match self.send(path, builder).await {
            Ok(_) | Err(VaultError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_endpoint_and_path() {
        let client = VaultHttpClient::new("http://127.0.0.1:8233/").unwrap();
        assert_eq!(
            client.url("secrets/hub-ca-details"),
            "http://127.0.0.1:8233/v1/secrets/hub-ca-details"
        );
        assert_eq!(client.url("/pki/cert/ca"), "http://127.0.0.1:8233/v1/pki/cert/ca");
    }

    #[test]
    fn test_lease_debug_hides_token() {
        let lease = AuthLease {
            client_token: "s.token".to_string(),
            lease_duration: 60,
        };
        assert!(!format!("{lease:?}").contains("s.token"));
    }
}
