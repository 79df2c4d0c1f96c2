use std::sync::Arc;

use pki_engine::{types::Environment, HubService, PkiEngine, VaultPkiEngine};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};
use vault_storage::{VaultApi, VaultHttpClient, VaultSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
            .from_env_lossy()
    };

    // JSON logs for staging/production, plain text for development
    match environment {
        Environment::Production | Environment::Staging => {
            fmt().json().with_env_filter(env_filter()).init();
        }
        Environment::Development => {
            fmt().with_env_filter(env_filter()).init();
        }
    }

    let vault: Arc<dyn VaultApi> = Arc::new(VaultHttpClient::new(environment.vault_endpoint())?);
    let session = VaultSession::new(Arc::clone(&vault), environment.vault_auth_method());
    session.connect().await?;

    let config = pki_engine::PkiEngineConfig::from_environment(&environment);
    let hub_ca = config.hub_ca.clone();
    let engine: Arc<dyn PkiEngine> = Arc::new(VaultPkiEngine::new(vault, config));

    if let Some(info) = hub_ca {
        if HubService::new(Arc::clone(&engine)).ensure_hub_ca(&info).await? {
            info!("Created hub root CA from configuration");
        }
    }

    info!(?environment, "PKI engine ready");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    session.disconnect();
    Ok(())
}
