//! Registered relying parties.

use crate::config::ClientConfig;
use crate::error::IdpError;
use std::collections::{HashMap, HashSet};
use subtle::ConstantTimeEq;

/// A registered client. Immutable after startup.
#[derive(Clone, Debug)]
pub struct ClientRecord {
    pub client_id: String,
    client_secret: String,
    pub allowed_redirect_uris: HashSet<String>,
}

impl ClientRecord {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uris: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            allowed_redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact string match against the registered set; no normalisation.
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.allowed_redirect_uris.contains(redirect_uri)
    }

    pub fn secret_matches(&self, secret: &str) -> bool {
        self.client_secret.as_bytes().ct_eq(secret.as_bytes()).into()
    }
}

/// Client id → record map built once from configuration.
#[derive(Clone, Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientRecord>,
}

impl ClientRegistry {
    pub fn new(configs: &[ClientConfig]) -> Self {
        let clients = configs
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    ClientRecord::new(&c.id, &c.secret, &c.redirect_urls),
                )
            })
            .collect();
        Self { clients }
    }

    pub fn from_records(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        Self {
            clients: records
                .into_iter()
                .map(|r| (r.client_id.clone(), r))
                .collect(),
        }
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientRecord> {
        self.clients.get(client_id)
    }

    /// Check a client id / secret pair. Unknown client and wrong secret fail identically.
    pub fn authenticate(&self, client_id: &str, secret: &str) -> Result<&ClientRecord, IdpError> {
        match self.get(client_id) {
            Some(client) if client.secret_matches(secret) => Ok(client),
            _ => Err(IdpError::ClientAuthenticationFailed(client_id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
