//! Provider metadata and the public key set.

use crate::keys::KeyProvider;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::traits::PublicKeyParts;
use serde::Serialize;

/// `/.well-known/openid-configuration` body.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub claims_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub response_types_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
}

impl DiscoveryDocument {
    pub fn new(issuer_url: &str, authorization_url: &str) -> Self {
        let issuer = issuer_url.trim_end_matches('/').to_string();
        Self {
            authorization_endpoint: authorization_url.to_string(),
            token_endpoint: format!("{issuer}/token"),
            jwks_uri: format!("{issuer}/keys"),
            issuer,
            claims_supported: vec![
                "aud",
                "email",
                "email_verified",
                "exp",
                "family_name",
                "given_name",
                "groups",
                "iat",
                "iss",
                "name",
                "sub",
                "username",
            ],
            grant_types_supported: vec!["authorization_code"],
            id_token_signing_alg_values_supported: vec!["RS256"],
            response_types_supported: vec!["code"],
            scopes_supported: vec!["openid", "email", "profile"],
            subject_types_supported: vec!["public"],
            token_endpoint_auth_methods_supported: vec!["client_secret_basic"],
        }
    }

    /// Serialize once at startup; the handler serves these bytes verbatim.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Jwk {
    pub kty: &'static str,
    #[serde(rename = "use")]
    pub key_use: &'static str,
    pub alg: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Current public keys, ordered by key id.
pub fn jwks(provider: &dyn KeyProvider) -> JwkSet {
    let mut keys: Vec<Jwk> = provider
        .public_keys()
        .into_iter()
        .map(|(kid, key)| Jwk {
            kty: "RSA",
            key_use: "sig",
            alg: "RS256",
            kid,
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        })
        .collect();
    keys.sort_by(|a, b| a.kid.cmp(&b.kid));
    JwkSet { keys }
}
