//! OpenID Connect provider core.
//!
//! ## Endpoints
//!
//! Frontend (end-user agents, optionally behind mutual TLS):
//! - `GET /auth` - login page, or direct authorization for certificate holders
//! - `POST /auth` - password or certificate authorization
//!
//! Backend (registered clients only):
//! - `POST /token` - redeem an authorization code
//! - `GET /keys` - JSON Web Key Set
//! - `GET /.well-known/openid-configuration` - discovery document

pub mod authorize;
pub mod client_auth;
pub mod discovery;
pub mod endpoints;
pub mod exchange;
pub mod login;
pub mod resolver;
pub mod state;
pub mod tokens;

pub use endpoints::{backend_router, frontend_router};
pub use resolver::{CertificateIdentity, Credentials};
pub use state::{OidcSettings, OidcState};
pub use tokens::TokenBundle;

/// OpenAPI tag for OIDC endpoints
pub const OIDC_TAG: &str = "OpenID Connect";
