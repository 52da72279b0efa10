use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("unknown client `{0}`")]
    UnknownClient(String),
    #[error("redirect_uri `{redirect_uri}` is not registered for client `{client_id}`")]
    RedirectUriMismatch {
        client_id: String,
        redirect_uri: String,
    },
    #[error("client authentication failed for `{0}`")]
    ClientAuthenticationFailed(String),
    #[error("authentication failed for `{0}`")]
    AuthenticationFailed(String),
    #[error("certificate email does not match the directory record for `{0}`")]
    IdentityMismatch(String),
    #[error("authorization code not found")]
    UnknownCode,
    #[error("authorization code was issued to a different client")]
    ClientCodeMismatch,
    #[error("unsupported grant type `{0}`")]
    UnsupportedGrantType(String),
    #[error("failed to sign token: {0}")]
    SigningFailure(#[from] jsonwebtoken::errors::Error),
    #[error("failed to generate signing keys: {0}")]
    KeyGeneration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Body returned for every failed request. Carries the OAuth2 error code only.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: &'static str,
}

impl IdpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdpError::MissingParameter(_)
            | IdpError::MalformedRequest(_)
            | IdpError::UnknownClient(_)
            | IdpError::RedirectUriMismatch { .. }
            | IdpError::UnknownCode
            | IdpError::ClientCodeMismatch
            | IdpError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            IdpError::ClientAuthenticationFailed(_)
            | IdpError::AuthenticationFailed(_)
            | IdpError::IdentityMismatch(_) => StatusCode::UNAUTHORIZED,
            IdpError::SigningFailure(_) | IdpError::KeyGeneration(_) | IdpError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// OAuth2 error code exposed to the caller.
    ///
    /// Failures that must not be told apart (missing vs. foreign code, unknown client vs.
    /// bad redirect) share a code.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            IdpError::MissingParameter(_)
            | IdpError::MalformedRequest(_)
            | IdpError::UnknownClient(_)
            | IdpError::RedirectUriMismatch { .. } => "invalid_request",
            IdpError::UnknownCode | IdpError::ClientCodeMismatch => "invalid_grant",
            IdpError::UnsupportedGrantType(_) => "unsupported_grant_type",
            IdpError::ClientAuthenticationFailed(_) => "invalid_client",
            IdpError::AuthenticationFailed(_) | IdpError::IdentityMismatch(_) => "access_denied",
            IdpError::SigningFailure(_) | IdpError::KeyGeneration(_) | IdpError::Internal(_) => {
                "server_error"
            }
        }
    }

    pub fn is_server_fault(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for IdpError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.oauth_error(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_failures_are_indistinguishable() {
        let missing = IdpError::UnknownCode;
        let foreign = IdpError::ClientCodeMismatch;
        assert_eq!(missing.status_code(), foreign.status_code());
        assert_eq!(missing.oauth_error(), foreign.oauth_error());
    }

    #[test]
    fn client_and_redirect_failures_are_indistinguishable() {
        let unknown = IdpError::UnknownClient("c1".into());
        let redirect = IdpError::RedirectUriMismatch {
            client_id: "c1".into(),
            redirect_uri: "https://evil.example/cb".into(),
        };
        assert_eq!(unknown.status_code(), redirect.status_code());
        assert_eq!(unknown.oauth_error(), redirect.oauth_error());
    }

    #[test]
    fn authentication_failures_are_unauthorized() {
        assert_eq!(
            IdpError::AuthenticationFailed("alice".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IdpError::IdentityMismatch("alice".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IdpError::ClientAuthenticationFailed("c1".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn key_and_signing_failures_are_server_faults() {
        assert!(IdpError::KeyGeneration("entropy".into()).is_server_fault());
        assert!(IdpError::Internal("boom".into()).is_server_fault());
        assert!(!IdpError::UnknownCode.is_server_fault());
    }
}
