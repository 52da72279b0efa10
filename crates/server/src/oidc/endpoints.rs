//! HTTP handlers for the frontend (`/auth`) and backend (`/token`, `/keys`, discovery).

use super::OIDC_TAG;
use crate::error::{ErrorResponse, IdpError};
use crate::logging::WideEvent;
use crate::oidc::authorize::AuthorizeParams;
use crate::oidc::client_auth::AuthenticatedClient;
use crate::oidc::discovery::{DiscoveryDocument, JwkSet, jwks};
use crate::oidc::login::render_login;
use crate::oidc::resolver::{CertificateIdentity, Credentials};
use crate::oidc::state::OidcState;
use crate::oidc::tokens::TokenBundle;
use axum::{
    Extension, Form, Json,
    extract::{Query, State, rejection::FormRejection},
    http::{Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Routes served to end-user agents.
pub fn frontend_router(state: OidcState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(auth_start, auth_verify))
        .with_state(state)
}

/// Routes served to registered clients.
pub fn backend_router(state: OidcState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .routes(routes!(keys))
        .routes(routes!(openid_configuration))
        .with_state(state)
}

/// Login form submission. Authorization parameters may also come from the query string.
#[derive(Default, Deserialize, ToSchema)]
pub struct AuthSubmission {
    pub name: Option<String>,
    pub password: Option<String>,
    #[serde(flatten)]
    pub authorization: AuthorizeParams,
}

/// Token request. Client credentials may instead arrive as HTTP Basic or in the query string.
///
/// `client_id` and `client_secret` are checked by the backend's client authentication
/// layer before the handler runs.
#[derive(Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// Must be `authorization_code`
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Resolve the principal, then authorize, under one `authorize` wide event.
async fn authorize_with(
    state: &OidcState,
    params: AuthorizeParams,
    credentials: Credentials,
) -> Result<Response, IdpError> {
    let evt = WideEvent::new("authorize");
    evt.add_opt("client_id", params.client_id.as_deref());
    evt.add("auth.method", credentials.method());

    let result = async {
        let request = params.require()?;
        let principal = state.resolver.resolve(credentials).await?;
        evt.add("subject", &principal.subject);
        state.authorizer.authorize(&principal, &request)
    }
    .await;

    match result {
        Ok(location) => {
            evt.success("authorization code issued");
            Ok(Redirect::to(&location).into_response())
        }
        Err(e) => {
            evt.failure(&e);
            Err(e)
        }
    }
}

/// Start an authorization.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/auth",
    tag = OIDC_TAG,
    operation_id = "Authorize",
    summary = "Start an authorization request",
    description = "Without a client certificate this renders the password login form, which posts back \
                   to `/auth` with the same query string.\n\n\
                   When the connection presented a verified client certificate, the user is authorized \
                   directly and redirected to `redirect_uri?state=<state>&code=<code>`.",
    params(AuthorizeParams),
    responses(
        (status = 200, description = "Login page HTML"),
        (status = 303, description = "Redirect to the client with an authorization code"),
        (status = 400, description = "Missing parameter, unknown client or unregistered redirect_uri", body = ErrorResponse),
        (status = 401, description = "Certificate does not match a directory entry", body = ErrorResponse),
    )
)]
async fn auth_start(
    State(state): State<OidcState>,
    uri: Uri,
    Query(params): Query<AuthorizeParams>,
    identity: Option<Extension<CertificateIdentity>>,
) -> Result<Response, IdpError> {
    if let Some(Extension(identity)) = identity {
        return authorize_with(&state, params, Credentials::Certificate(identity)).await;
    }

    let html = render_login(uri.query(), params.client_id.as_deref())
        .map_err(|e| IdpError::Internal(format!("failed to render login page: {e}")))?;
    Ok(Html(html).into_response())
}

/// Complete an authorization.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/auth",
    tag = OIDC_TAG,
    operation_id = "Authorize Submit",
    summary = "Authenticate the user and issue an authorization code",
    description = "Uses the password method when `name` and `password` are submitted, otherwise the \
                   verified client certificate of the connection.\n\n\
                   Authorization parameters are taken from the form body, falling back to the query string. \
                   The body may be omitted entirely when a client certificate is used.",
    params(AuthorizeParams),
    request_body(
        content = AuthSubmission,
        content_type = "application/x-www-form-urlencoded",
        description = "Credentials and authorization parameters"
    ),
    responses(
        (status = 303, description = "Redirect to the client with an authorization code"),
        (status = 400, description = "Missing parameter, unknown client or unregistered redirect_uri", body = ErrorResponse),
        (status = 401, description = "Authentication failed", body = ErrorResponse),
    )
)]
async fn auth_verify(
    State(state): State<OidcState>,
    Query(query): Query<AuthorizeParams>,
    identity: Option<Extension<CertificateIdentity>>,
    form: Result<Form<AuthSubmission>, FormRejection>,
) -> Result<Response, IdpError> {
    let form = match form {
        Ok(Form(form)) => form,
        // no form body: everything comes from the query string and the connection
        Err(FormRejection::InvalidFormContentType(_)) => AuthSubmission::default(),
        Err(e) => return Err(IdpError::MalformedRequest(e.body_text())),
    };
    let credentials = match (form.name, form.password, identity) {
        (None, None, Some(Extension(identity))) => Credentials::Certificate(identity),
        (None, None, None) => return Err(IdpError::MissingParameter("name")),
        (name, password, _) => Credentials::Password {
            name: name.unwrap_or_default(),
            password: password.unwrap_or_default(),
        },
    };
    authorize_with(&state, form.authorization.or(query), credentials).await
}

/// Redeem an authorization code.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/token",
    tag = OIDC_TAG,
    operation_id = "Token",
    summary = "Exchange an authorization code for tokens",
    description = "Each code redeems at most once, and only for the client it was issued to.\n\n\
                   **Client authentication:** HTTP Basic, or `client_id` and `client_secret` in the \
                   query string or the body.\n\n\
                   The response is `application/x-www-form-urlencoded`; `id_token` is present only when \
                   the `openid` scope was requested.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenBundle, content_type = "application/x-www-form-urlencoded"),
        (status = 400, description = "Missing parameter, unsupported grant type or invalid code", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
async fn token(
    State(state): State<OidcState>,
    client: Option<Extension<AuthenticatedClient>>,
    Form(request): Form<TokenRequest>,
) -> Result<Response, IdpError> {
    let evt = WideEvent::new("token");
    evt.add_opt("grant_type", request.grant_type.as_deref());

    let client = client.map(|Extension(AuthenticatedClient(client_id))| client_id);
    let result = redeem(&state, &evt, client, request);
    match result {
        Ok(bundle) => {
            evt.success("authorization code redeemed");
            Ok((
                [
                    (header::CACHE_CONTROL, "no-store"),
                    (header::PRAGMA, "no-cache"),
                ],
                Form(bundle),
            )
                .into_response())
        }
        Err(e) => {
            evt.failure(&e);
            Err(e)
        }
    }
}

fn redeem(
    state: &OidcState,
    evt: &WideEvent,
    client_id: Option<String>,
    request: TokenRequest,
) -> Result<TokenBundle, IdpError> {
    let grant_type = request
        .grant_type
        .filter(|g| !g.is_empty())
        .ok_or(IdpError::MissingParameter("grant_type"))?;
    if grant_type != "authorization_code" {
        return Err(IdpError::UnsupportedGrantType(grant_type));
    }

    let client_id = client_id.ok_or_else(|| IdpError::ClientAuthenticationFailed(String::new()))?;
    evt.add("client_id", &client_id);
    let client = state
        .clients
        .get(&client_id)
        .ok_or_else(|| IdpError::ClientAuthenticationFailed(client_id.clone()))?;

    let redirect_uri = request
        .redirect_uri
        .filter(|r| !r.is_empty())
        .ok_or(IdpError::MissingParameter("redirect_uri"))?;
    evt.add("redirect_uri", &redirect_uri);
    if !client.allows_redirect(&redirect_uri) {
        return Err(IdpError::RedirectUriMismatch {
            client_id,
            redirect_uri,
        });
    }

    let code = request
        .code
        .filter(|c| !c.is_empty())
        .ok_or(IdpError::MissingParameter("code"))?;
    state.exchanges.get(&client.client_id, &code)
}

/// Public signing keys.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/keys",
    tag = OIDC_TAG,
    operation_id = "JWKS",
    summary = "JSON Web Key Set used to verify issued tokens",
    responses(
        (status = 200, description = "Key set", body = JwkSet),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
async fn keys(State(state): State<OidcState>) -> Json<JwkSet> {
    Json(jwks(state.keys.as_ref()))
}

/// Provider metadata.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    tag = OIDC_TAG,
    operation_id = "OpenID Configuration",
    summary = "OpenID Connect discovery document",
    responses(
        (status = 200, description = "Discovery document", body = DiscoveryDocument),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
async fn openid_configuration(State(state): State<OidcState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.discovery.to_string(),
    )
}
