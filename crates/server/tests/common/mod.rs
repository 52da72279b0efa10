//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use axum::http::HeaderValue;
use base64::{Engine, engine::general_purpose::STANDARD};
use oidc_idp::clients::{ClientRecord, ClientRegistry};
use oidc_idp::directory::StaticDirectory;
use oidc_idp::keys::KeyManager;
use oidc_idp::oidc::{OidcSettings, OidcState};
use oidc_idp::password::hash_password;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const ISSUER: &str = "https://idp.example:9443";
pub const AUTHORIZATION_URL: &str = "https://idp.example:8443/auth";
pub const REDIRECT_URI: &str = "https://app.example/cb";
pub const OTHER_REDIRECT_URI: &str = "https://other.example/cb";

/// RSA generation is slow; every test in a binary shares one key set.
pub fn keys() -> Arc<KeyManager> {
    static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(KeyManager::new(3).expect("generate keys")))
        .clone()
}

fn directory() -> StaticDirectory {
    static USERS: OnceLock<String> = OnceLock::new();
    let yaml = USERS.get_or_init(|| {
        format!(
            r#"
users:
  - name: alice
    uid: 1000
    gid: 1000
    password: "{}"
    full_name: Alice Liddell
    given_name: Alice
    family_name: Liddell
    email: alice@example.com
    groups: [staff]
groups:
  - name: staff
    gid: 2000
"#,
            hash_password("wonderland").expect("hash password")
        )
    });
    StaticDirectory::from_yaml_str(yaml).expect("parse directory")
}

pub fn state() -> OidcState {
    let clients = ClientRegistry::from_records([
        ClientRecord::new("c1", "s1", [REDIRECT_URI]),
        ClientRecord::new("c2", "s2", [OTHER_REDIRECT_URI]),
    ]);
    OidcState::new(
        OidcSettings {
            issuer_url: ISSUER.into(),
            authorization_url: AUTHORIZATION_URL.into(),
            token_lifetime: Duration::from_secs(86_400),
            code_ttl: Duration::from_secs(600),
        },
        Arc::new(clients),
        keys(),
        Arc::new(directory()),
    )
    .expect("build state")
}

/// Authorization parameters for client `c1`.
pub fn authorize_params(scope: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("client_id", "c1"),
        ("scope", scope),
        ("redirect_uri", REDIRECT_URI),
        ("nonce", "n-0S6_WzA2Mj"),
        ("state", "af0ifjsldkj"),
        ("response_type", "code"),
    ]
}

pub fn basic(client_id: &str, secret: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "Basic {}",
        STANDARD.encode(format!("{client_id}:{secret}"))
    ))
    .expect("header value")
}

/// Split a redirect `Location` into its `state` and `code` parameters.
pub fn state_and_code(location: &str) -> (String, String) {
    let url = url::Url::parse(location).expect("absolute redirect");
    let mut state = None;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    (state.expect("state"), code.expect("code"))
}
