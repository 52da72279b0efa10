//! Shared state handed to every OIDC handler.

use crate::clients::ClientRegistry;
use crate::config::AppConfig;
use crate::directory::Directory;
use crate::error::IdpError;
use crate::keys::KeyProvider;
use crate::oidc::authorize::Authorizer;
use crate::oidc::discovery::DiscoveryDocument;
use crate::oidc::exchange::ExchangeStore;
use crate::oidc::resolver::PrincipalResolver;
use crate::oidc::tokens::TokenIssuer;
use std::sync::Arc;
use std::time::Duration;

/// All protocol components. Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct OidcState {
    pub clients: Arc<ClientRegistry>,
    pub keys: Arc<dyn KeyProvider>,
    pub exchanges: Arc<ExchangeStore>,
    pub resolver: PrincipalResolver,
    pub authorizer: Authorizer,
    /// Discovery document, serialized once.
    pub discovery: Arc<str>,
}

/// Inputs for [`OidcState::new`].
pub struct OidcSettings {
    pub issuer_url: String,
    pub authorization_url: String,
    pub token_lifetime: Duration,
    pub code_ttl: Duration,
}

impl OidcSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            issuer_url: config.issuer_url(),
            authorization_url: config.authorization_url(),
            token_lifetime: config.token_lifetime(),
            code_ttl: config.code_ttl(),
        }
    }
}

impl OidcState {
    pub fn new(
        settings: OidcSettings,
        clients: Arc<ClientRegistry>,
        keys: Arc<dyn KeyProvider>,
        directory: Arc<dyn Directory>,
    ) -> Result<Self, IdpError> {
        let discovery = DiscoveryDocument::new(&settings.issuer_url, &settings.authorization_url)
            .to_json()
            .map_err(|e| IdpError::Internal(format!("discovery document: {e}")))?;
        let exchanges = Arc::new(ExchangeStore::new(settings.code_ttl));
        let issuer = TokenIssuer::new(
            settings.issuer_url,
            Arc::clone(&keys),
            settings.token_lifetime,
        );
        let authorizer = Authorizer::new(Arc::clone(&clients), issuer, Arc::clone(&exchanges));

        Ok(Self {
            clients,
            keys,
            exchanges,
            resolver: PrincipalResolver::new(directory),
            authorizer,
            discovery: Arc::from(discovery),
        })
    }
}
