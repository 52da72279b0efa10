use color_eyre::eyre::{WrapErr, eyre};
use oidc_idp::api::start_webserver;
use oidc_idp::clients::ClientRegistry;
use oidc_idp::config::{config_path, load_config};
use oidc_idp::directory::StaticDirectory;
use oidc_idp::keys::KeyManager;
use oidc_idp::oidc::{OidcSettings, OidcState};
use oidc_idp::spawn_exchange_sweeper;
use rustls::crypto::{self, CryptoProvider};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "oidc_idp=info,tower_http=info,hyper=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let path = config_path();
    let config = load_config(&path)
        .wrap_err_with(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::info!(
        issuer = %config.issuer_url(),
        clients = config.clients.len(),
        "configuration loaded"
    );

    CryptoProvider::install_default(crypto::ring::default_provider())
        .map_err(|_| eyre!("a TLS crypto provider is already installed"))?;

    let directory = StaticDirectory::load(&config.user_db.path)?;

    let count = config.signing_keys;
    let keys = tokio::task::spawn_blocking(move || KeyManager::new(count))
        .await?
        .wrap_err("failed to generate signing keys")?;

    let clients = Arc::new(ClientRegistry::new(&config.clients));
    let state = OidcState::new(
        OidcSettings::from_config(&config),
        clients,
        Arc::new(keys),
        Arc::new(directory),
    )?;

    spawn_exchange_sweeper(Arc::clone(&state.exchanges), config.sweep_interval());

    start_webserver(&config, state).await
}
