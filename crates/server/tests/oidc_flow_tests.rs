//! End-to-end authorization code flow tests.

mod common;

use axum::Extension;
use axum::http::header;
use axum_test::TestServer;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use common::*;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use oidc_idp::api::{backend_app, frontend_app};
use oidc_idp::oidc::CertificateIdentity;
use oidc_idp::oidc::tokens::at_hash;
use serde_json::Value;
use std::collections::HashMap;

fn servers() -> (TestServer, TestServer, oidc_idp::oidc::OidcState) {
    let state = state();
    let frontend = TestServer::new(frontend_app(state.clone())).expect("create frontend");
    let backend = TestServer::new(backend_app(state.clone())).expect("create backend");
    (frontend, backend, state)
}

fn form_body(text: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect()
}

async fn password_login(frontend: &TestServer, scope: &'static str) -> String {
    let mut form = authorize_params(scope);
    form.push(("name", "alice"));
    form.push(("password", "wonderland"));
    let response = frontend.post("/auth").form(&form).await;
    response.assert_status_see_other();
    let location = response.header(header::LOCATION);
    let location = location.to_str().expect("ascii location");
    assert!(location.starts_with("https://app.example/cb?state=af0ifjsldkj&code="));
    let (state, code) = state_and_code(location);
    assert_eq!(state, "af0ifjsldkj");
    code
}

fn token_form<'a>(code: &'a str) -> Vec<(&'static str, &'a str)> {
    vec![
        ("grant_type", "authorization_code"),
        ("client_id", "c1"),
        ("client_secret", "s1"),
        ("redirect_uri", REDIRECT_URI),
        ("code", code),
    ]
}

/// Verify `token` against the published JWKS, as a relying party would.
async fn verify(backend: &TestServer, token: &str) -> Value {
    let jwks: Value = backend
        .get("/keys")
        .add_header(header::AUTHORIZATION, basic("c1", "s1"))
        .await
        .json();
    let kid = jsonwebtoken::decode_header(token)
        .expect("header")
        .kid
        .expect("kid");
    let jwk = jwks["keys"]
        .as_array()
        .expect("keys")
        .iter()
        .find(|k| k["kid"] == kid.as_str())
        .expect("kid is published");
    let key = DecodingKey::from_rsa_components(
        jwk["n"].as_str().expect("n"),
        jwk["e"].as_str().expect("e"),
    )
    .expect("decoding key");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&["c1"]);
    validation.set_issuer(&[ISSUER]);
    jsonwebtoken::decode::<Value>(token, &key, &validation)
        .expect("valid token")
        .claims
}

#[tokio::test]
async fn test_password_flow_redeems_once() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "openid email").await;

    let response = backend.post("/token").form(&token_form(&code)).await;
    response.assert_status_ok();
    let body = form_body(&response.text());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], "86399");
    assert!(!body["access_token"].is_empty());
    assert!(!body["id_token"].is_empty());

    let claims = verify(&backend, &body["id_token"]).await;
    assert_eq!(claims["nonce"], "n-0S6_WzA2Mj");
    assert_eq!(claims["at_hash"], at_hash(&body["access_token"]));
    assert_eq!(claims["sub"], URL_SAFE_NO_PAD.encode("alice@example.com"));

    let access = verify(&backend, &body["access_token"]).await;
    assert_eq!(access["email"], "alice@example.com");
    assert!(access.get("given_name").is_none());

    let replay = backend.post("/token").form(&token_form(&code)).await;
    replay.assert_status_bad_request();
    assert_eq!(replay.json::<Value>()["error"], "invalid_grant");
}

#[tokio::test]
async fn test_without_openid_no_id_token() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "email profile").await;

    let response = backend.post("/token").form(&token_form(&code)).await;
    response.assert_status_ok();
    let body = form_body(&response.text());
    assert!(!body["access_token"].is_empty());
    assert!(!body.contains_key("id_token"));
}

#[tokio::test]
async fn test_basic_auth_on_token_endpoint() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "openid").await;

    let response = backend
        .post("/token")
        .add_header(header::AUTHORIZATION, basic("c1", "s1"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("redirect_uri", REDIRECT_URI),
            ("code", code.as_str()),
        ])
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_query_credentials_on_token_endpoint() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "openid").await;

    let response = backend
        .post("/token")
        .add_query_param("client_id", "c1")
        .add_query_param("client_secret", "s1")
        .form(&[
            ("grant_type", "authorization_code"),
            ("redirect_uri", REDIRECT_URI),
            ("code", code.as_str()),
        ])
        .await;
    response.assert_status_ok();
    let body = form_body(&response.text());
    assert!(!body["id_token"].is_empty());
}

#[tokio::test]
async fn test_code_of_other_client_is_not_consumed() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "openid").await;

    let foreign = backend
        .post("/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", "c2"),
            ("client_secret", "s2"),
            ("redirect_uri", OTHER_REDIRECT_URI),
            ("code", code.as_str()),
        ])
        .await;
    foreign.assert_status_bad_request();
    assert_eq!(foreign.json::<Value>()["error"], "invalid_grant");

    backend
        .post("/token")
        .form(&token_form(&code))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (frontend, _, state) = servers();
    let mut form = authorize_params("openid");
    form.push(("name", "alice"));
    form.push(("password", "looking-glass"));

    let response = frontend.post("/auth").form(&form).await;
    response.assert_status_unauthorized();
    assert!(state.exchanges.is_empty());
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let (frontend, _, _) = servers();
    let form: Vec<_> = authorize_params("openid")
        .into_iter()
        .filter(|(k, _)| *k != "nonce")
        .chain([("name", "alice"), ("password", "wonderland")])
        .collect();

    let response = frontend.post("/auth").form(&form).await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "invalid_request");
}

#[tokio::test]
async fn test_unregistered_redirect_has_no_side_effect() {
    let (frontend, _, state) = servers();
    let form: Vec<_> = authorize_params("openid")
        .into_iter()
        .map(|(k, v)| {
            if k == "redirect_uri" {
                (k, "https://evil.example/cb")
            } else {
                (k, v)
            }
        })
        .chain([("name", "alice"), ("password", "wonderland")])
        .collect();

    let response = frontend.post("/auth").form(&form).await;
    response.assert_status_bad_request();
    assert!(state.exchanges.is_empty());
}

#[tokio::test]
async fn test_query_parameters_complete_the_form() {
    let (frontend, _, _) = servers();
    let mut request = frontend.post("/auth");
    for (key, value) in authorize_params("openid") {
        request = request.add_query_param(key, value);
    }
    let response = request
        .form(&[("name", "alice"), ("password", "wonderland")])
        .await;
    response.assert_status_see_other();
}

#[tokio::test]
async fn test_login_page_without_certificate() {
    let (frontend, _, _) = servers();
    let mut request = frontend.get("/auth");
    for (key, value) in authorize_params("openid") {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(r#"name="password""#));
    assert!(html.contains("action=\"/auth?client_id=c1"));
}

fn certificate(email: &str) -> CertificateIdentity {
    CertificateIdentity {
        common_name: "alice".into(),
        organization: "Example Org".into(),
        email: email.into(),
    }
}

#[tokio::test]
async fn test_certificate_flow() {
    let state = state();
    let frontend = TestServer::new(
        frontend_app(state.clone()).layer(Extension(certificate("alice@example.com"))),
    )
    .expect("create frontend");

    let mut request = frontend.get("/auth");
    for (key, value) in authorize_params("openid profile") {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    response.assert_status_see_other();
    let location = response.header(header::LOCATION);
    let (_, code) = state_and_code(location.to_str().unwrap());

    let bundle = state.exchanges.get("c1", &code).expect("code stored");
    assert!(bundle.id_token.is_some());
}

#[tokio::test]
async fn test_certificate_post_without_body() {
    let state = state();
    let frontend = TestServer::new(
        frontend_app(state.clone()).layer(Extension(certificate("alice@example.com"))),
    )
    .expect("create frontend");

    let mut request = frontend.post("/auth");
    for (key, value) in authorize_params("openid") {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    response.assert_status_see_other();
    let location = response.header(header::LOCATION);
    let (state_param, code) = state_and_code(location.to_str().unwrap());
    assert_eq!(state_param, "af0ifjsldkj");
    assert!(state.exchanges.get("c1", &code).is_ok());
}

#[tokio::test]
async fn test_post_without_body_or_certificate_is_bad_request() {
    let (frontend, _, state) = servers();
    let mut request = frontend.post("/auth");
    for (key, value) in authorize_params("openid") {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "invalid_request");
    assert!(state.exchanges.is_empty());
}

#[tokio::test]
async fn test_certificate_email_mismatch_is_rejected() {
    let state = state();
    let frontend = TestServer::new(
        frontend_app(state.clone()).layer(Extension(certificate("mallory@example.com"))),
    )
    .expect("create frontend");

    let mut request = frontend.post("/auth");
    for (key, value) in authorize_params("openid") {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    response.assert_status_unauthorized();
    assert_eq!(response.json::<Value>()["error"], "access_denied");
    assert!(state.exchanges.is_empty());
}

#[tokio::test]
async fn test_backend_requires_client_credentials() {
    let (_, backend, _) = servers();

    backend.get("/keys").await.assert_status_unauthorized();
    backend
        .get("/keys")
        .add_header(header::AUTHORIZATION, basic("c1", "wrong"))
        .await
        .assert_status_unauthorized();
    let unknown = backend
        .get("/keys")
        .add_header(header::AUTHORIZATION, basic("nobody", "s1"))
        .await;
    unknown.assert_status_unauthorized();
    assert_eq!(unknown.json::<Value>()["error"], "invalid_client");

    backend.get("/healthz").await.assert_status_ok();
}

#[tokio::test]
async fn test_jwks_and_discovery() {
    let (_, backend, _) = servers();

    let jwks: Value = backend
        .get("/keys")
        .add_header(header::AUTHORIZATION, basic("c1", "s1"))
        .await
        .json();
    let keys = jwks["keys"].as_array().expect("keys");
    assert_eq!(keys.len(), 3);
    for key in keys {
        assert_eq!(key["kty"], "RSA");
        assert_eq!(key["use"], "sig");
        assert_eq!(key["alg"], "RS256");
    }

    let response = backend
        .get("/.well-known/openid-configuration")
        .add_query_param("client_id", "c1")
        .add_query_param("client_secret", "s1")
        .await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert_eq!(doc["issuer"], ISSUER);
    assert_eq!(doc["authorization_endpoint"], AUTHORIZATION_URL);
    assert_eq!(doc["token_endpoint"], format!("{ISSUER}/token"));
    assert_eq!(doc["jwks_uri"], format!("{ISSUER}/keys"));
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let (_, backend, _) = servers();
    let response = backend
        .post("/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", "c1"),
            ("client_secret", "s1"),
        ])
        .await;
    response.assert_status_bad_request();
    assert_eq!(
        response.json::<Value>()["error"],
        "unsupported_grant_type"
    );
}

#[tokio::test]
async fn test_token_redirect_must_be_registered() {
    let (frontend, backend, _) = servers();
    let code = password_login(&frontend, "openid").await;

    let response = backend
        .post("/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", "c1"),
            ("client_secret", "s1"),
            ("redirect_uri", OTHER_REDIRECT_URI),
            ("code", code.as_str()),
        ])
        .await;
    response.assert_status_bad_request();

    backend
        .post("/token")
        .form(&token_form(&code))
        .await
        .assert_status_ok();
}
