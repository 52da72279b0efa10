//! Client authentication for the backend listener.
//!
//! Relying parties present `client_id` / `client_secret` either as HTTP Basic
//! credentials, in the query string, or in a form body. Everything on the backend
//! except health and documentation routes requires them.

use crate::clients::ClientRegistry;
use crate::error::IdpError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;
use url::form_urlencoded;

/// Upper bound on a buffered form body.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

const PUBLIC_PATHS: &[&str] = &["/healthz", "/api-docs"];

/// Id of the client that passed authentication, attached to the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedClient(pub String);

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// `Authorization: Basic base64(id:secret)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<ClientCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some(ClientCredentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}

/// `client_id` and `client_secret` pairs in urlencoded data.
pub fn form_credentials(data: &[u8]) -> Option<ClientCredentials> {
    let mut client_id = None;
    let mut client_secret = None;
    for (key, value) in form_urlencoded::parse(data) {
        match key.as_ref() {
            "client_id" if client_id.is_none() => client_id = Some(value.into_owned()),
            "client_secret" if client_secret.is_none() => client_secret = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(ClientCredentials {
        client_id: client_id?,
        client_secret: client_secret?,
    })
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Middleware rejecting unauthenticated backend requests with `401 invalid_client`.
pub async fn require_client(
    State(clients): State<Arc<ClientRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if PUBLIC_PATHS
        .iter()
        .any(|public| path == *public || path.starts_with(&format!("{public}/")))
    {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let mut credentials = basic_credentials(&parts.headers)
        .or_else(|| parts.uri.query().and_then(|q| form_credentials(q.as_bytes())));

    let body = if credentials.is_none() && is_form(&parts.headers) {
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return IdpError::MissingParameter("client_id").into_response();
            }
        };
        credentials = form_credentials(&bytes);
        Body::from(bytes)
    } else {
        body
    };

    let Some(credentials) = credentials else {
        return IdpError::ClientAuthenticationFailed(String::new()).into_response();
    };
    let client_id = match clients.authenticate(&credentials.client_id, &credentials.client_secret) {
        Ok(client) => client.client_id.clone(),
        Err(e) => return e.into_response(),
    };

    let mut request = Request::from_parts(parts, body);
    request
        .extensions_mut()
        .insert(AuthenticatedClient(client_id));
    next.run(request).await
}
