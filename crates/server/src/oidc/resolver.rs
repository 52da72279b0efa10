//! Turning request credentials into a verified [`Principal`].

use crate::directory::{Directory, DirectoryError, Principal};
use crate::error::IdpError;
use std::fmt;
use std::sync::Arc;

/// Identity taken from a client certificate that passed mutual-TLS verification.
///
/// Only complete identities are ever constructed by the TLS layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub common_name: String,
    pub organization: String,
    pub email: String,
}

/// How the end user proved who they are.
pub enum Credentials {
    Password { name: String, password: String },
    Certificate(CertificateIdentity),
}

impl Credentials {
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::Certificate(_) => "certificate",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { name, .. } => f
                .debug_struct("Password")
                .field("name", name)
                .finish_non_exhaustive(),
            Credentials::Certificate(identity) => {
                f.debug_tuple("Certificate").field(identity).finish()
            }
        }
    }
}

#[derive(Clone)]
pub struct PrincipalResolver {
    directory: Arc<dyn Directory>,
}

impl PrincipalResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Verify `credentials` against the directory. Directory calls run on the blocking pool.
    pub async fn resolve(&self, credentials: Credentials) -> Result<Principal, IdpError> {
        let directory = Arc::clone(&self.directory);
        tokio::task::spawn_blocking(move || resolve_blocking(directory.as_ref(), credentials))
            .await
            .map_err(|e| IdpError::Internal(format!("directory task failed: {e}")))?
    }
}

fn resolve_blocking(
    directory: &dyn Directory,
    credentials: Credentials,
) -> Result<Principal, IdpError> {
    match credentials {
        Credentials::Password { name, password } => {
            if name.is_empty() {
                return Err(IdpError::MissingParameter("name"));
            }
            if password.is_empty() {
                return Err(IdpError::MissingParameter("password"));
            }
            directory
                .verify_credentials(&name, &password)
                .map_err(|e| directory_failure(&name, e))
        }
        Credentials::Certificate(identity) => {
            let principal = directory
                .lookup_principal(&identity.common_name)
                .map_err(|e| directory_failure(&identity.common_name, e))?;
            if principal.email != identity.email {
                tracing::warn!(
                    common_name = %identity.common_name,
                    organization = %identity.organization,
                    "certificate email differs from directory record"
                );
                return Err(IdpError::IdentityMismatch(identity.common_name));
            }
            Ok(principal)
        }
    }
}

fn directory_failure(name: &str, err: DirectoryError) -> IdpError {
    match err {
        DirectoryError::InvalidCredentials(_) | DirectoryError::NotFound(_) => {
            IdpError::AuthenticationFailed(name.to_string())
        }
        other => IdpError::Internal(other.to_string()),
    }
}
