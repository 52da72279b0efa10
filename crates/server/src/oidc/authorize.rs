//! Authorization orchestration: validate the request, mint tokens, hand out a code.

use crate::clients::ClientRegistry;
use crate::directory::Principal;
use crate::error::IdpError;
use crate::oidc::exchange::ExchangeStore;
use crate::oidc::tokens::TokenIssuer;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

/// Raw authorization parameters as they arrive in a query string or form body.
#[derive(Clone, Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeParams {
    pub client_id: Option<String>,
    /// Space separated scopes, e.g. `openid email profile`.
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
    pub nonce: Option<String>,
    pub state: Option<String>,
    pub response_type: Option<String>,
}

fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary.filter(|v| !v.is_empty()).or(fallback)
}

impl AuthorizeParams {
    /// Fill every absent parameter from `fallback`.
    pub fn or(self, fallback: AuthorizeParams) -> AuthorizeParams {
        AuthorizeParams {
            client_id: pick(self.client_id, fallback.client_id),
            scope: pick(self.scope, fallback.scope),
            redirect_uri: pick(self.redirect_uri, fallback.redirect_uri),
            nonce: pick(self.nonce, fallback.nonce),
            state: pick(self.state, fallback.state),
            response_type: pick(self.response_type, fallback.response_type),
        }
    }

    /// Check that every parameter is present and non-empty.
    pub fn require(self) -> Result<AuthorizationRequest, IdpError> {
        fn required(value: Option<String>, name: &'static str) -> Result<String, IdpError> {
            value
                .filter(|v| !v.is_empty())
                .ok_or(IdpError::MissingParameter(name))
        }

        let scope = required(self.scope, "scope")?;
        Ok(AuthorizationRequest {
            client_id: required(self.client_id, "client_id")?,
            scopes: scope.split_whitespace().map(String::from).collect(),
            redirect_uri: required(self.redirect_uri, "redirect_uri")?,
            nonce: required(self.nonce, "nonce")?,
            state: required(self.state, "state")?,
            response_type: required(self.response_type, "response_type")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    pub redirect_uri: String,
    pub nonce: String,
    pub state: String,
    pub response_type: String,
}

#[derive(Clone)]
pub struct Authorizer {
    clients: Arc<ClientRegistry>,
    issuer: TokenIssuer,
    exchanges: Arc<ExchangeStore>,
}

impl Authorizer {
    pub fn new(
        clients: Arc<ClientRegistry>,
        issuer: TokenIssuer,
        exchanges: Arc<ExchangeStore>,
    ) -> Self {
        Self {
            clients,
            issuer,
            exchanges,
        }
    }

    /// Authorize `principal` for `request` and return the URL to redirect the user agent to.
    ///
    /// Nothing is stored unless the client and redirect target check out.
    pub fn authorize(
        &self,
        principal: &Principal,
        request: &AuthorizationRequest,
    ) -> Result<String, IdpError> {
        let client = self
            .clients
            .get(&request.client_id)
            .ok_or_else(|| IdpError::UnknownClient(request.client_id.clone()))?;
        if !client.allows_redirect(&request.redirect_uri) {
            return Err(IdpError::RedirectUriMismatch {
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
            });
        }
        if request.response_type != "code" {
            // accepted as-is, only the code flow is ever answered
            tracing::warn!(
                client_id = %request.client_id,
                response_type = %request.response_type,
                "unsupported response_type requested"
            );
        }

        let bundle = self.issuer.issue(
            principal,
            &request.client_id,
            &request.scopes,
            Some(&request.nonce),
        )?;
        let code = self.exchanges.put(&request.client_id, bundle);
        Ok(redirect_with_code(&request.redirect_uri, &request.state, &code))
    }
}

/// Append `state` then `code` to `redirect_uri`, keeping any query it already has.
pub fn redirect_with_code(redirect_uri: &str, state: &str, code: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("state", state)
        .append_pair("code", code)
        .finish();
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    format!("{redirect_uri}{separator}{query}")
}
