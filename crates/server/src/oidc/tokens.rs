//! Access and ID token construction.
//!
//! The access token carries profile and email claims only when the matching scope was
//! requested. The ID token always carries them. Relying parties depend on that
//! difference, so it is pinned by tests below.

use crate::directory::Principal;
use crate::error::IdpError;
use crate::keys::KeyProvider;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Header};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_EMAIL: &str = "email";

/// Backdating applied to `iat` to absorb clock skew between us and relying parties.
const CLOCK_SKEW: i64 = 5;

/// What the token endpoint hands back for a redeemed code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct TokenBundle {
    pub token_type: String,
    pub expires_in: u64,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProfileClaims<'a> {
    name: &'a str,
    given_name: &'a str,
    family_name: &'a str,
    username: &'a str,
    groups: &'a [String],
}

#[derive(Debug, Serialize)]
struct EmailClaims<'a> {
    email: &'a str,
    email_verified: bool,
}

#[derive(Debug, Serialize)]
struct AccessClaims<'a> {
    token_use: &'static str,
    event_id: &'a str,
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
    scope: String,
    #[serde(flatten)]
    profile: Option<ProfileClaims<'a>>,
    #[serde(flatten)]
    email: Option<EmailClaims<'a>>,
}

#[derive(Debug, Serialize)]
struct IdClaims<'a> {
    token_use: &'static str,
    event_id: &'a str,
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
    at_hash: String,
    given_name: &'a str,
    family_name: &'a str,
    username: &'a str,
    email: &'a str,
    email_verified: bool,
    groups: &'a [String],
}

/// Builds and signs token bundles for one issuer.
#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    keys: Arc<dyn KeyProvider>,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(issuer: impl Into<String>, keys: Arc<dyn KeyProvider>, lifetime: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
            lifetime,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Seconds advertised in `expires_in`, one less than the real lifetime.
    pub fn expires_in(&self) -> u64 {
        self.lifetime.as_secs().saturating_sub(1)
    }

    /// Mint the access token and, when `openid` was requested, the ID token.
    ///
    /// Both tokens share one `event_id` and one time window but are signed with
    /// independently drawn keys.
    pub fn issue(
        &self,
        principal: &Principal,
        client_id: &str,
        scopes: &BTreeSet<String>,
        nonce: Option<&str>,
    ) -> Result<TokenBundle, IdpError> {
        let event_id = Uuid::new_v4().to_string();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let iat = now - CLOCK_SKEW;
        let exp = i64::try_from(self.lifetime.as_secs())
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| IdpError::Internal("token lifetime out of range".into()))?;
        let sub = subject(principal);

        let access = AccessClaims {
            token_use: "access",
            event_id: &event_id,
            iss: &self.issuer,
            sub: &sub,
            aud: client_id,
            exp,
            iat,
            scope: scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" "),
            profile: scopes.contains(SCOPE_PROFILE).then(|| ProfileClaims {
                name: &principal.full_name,
                given_name: &principal.given_name,
                family_name: &principal.family_name,
                username: &principal.subject,
                groups: &principal.groups,
            }),
            email: scopes.contains(SCOPE_EMAIL).then(|| EmailClaims {
                email: &principal.email,
                email_verified: true,
            }),
        };
        let access_token = self.sign(&access)?;

        let id_token = if scopes.contains(SCOPE_OPENID) {
            let claims = IdClaims {
                token_use: "id",
                event_id: &event_id,
                iss: &self.issuer,
                sub: &sub,
                aud: client_id,
                exp,
                iat,
                nonce: nonce.filter(|n| !n.is_empty()),
                at_hash: at_hash(&access_token),
                given_name: &principal.given_name,
                family_name: &principal.family_name,
                username: &principal.subject,
                email: &principal.email,
                email_verified: true,
                groups: &principal.groups,
            };
            Some(self.sign(&claims)?)
        } else {
            None
        };

        tracing::debug!(
            event_id = %event_id,
            client_id,
            subject = %principal.subject,
            id_token = id_token.is_some(),
            "issued tokens"
        );

        Ok(TokenBundle {
            token_type: "Bearer".into(),
            expires_in: self.expires_in(),
            access_token,
            id_token,
        })
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, IdpError> {
        let key = self.keys.signing_key();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.key_id().to_string());
        Ok(jsonwebtoken::encode(&header, claims, key.encoding_key())?)
    }
}

/// `sub` claim: the principal's email, base64url without padding.
pub fn subject(principal: &Principal) -> String {
    URL_SAFE_NO_PAD.encode(principal.email.as_bytes())
}

/// Left half of SHA-256 over the access token, base64url without padding.
pub fn at_hash(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..16])
}
