//! Listener assembly.
//!
//! - frontend: `/auth` and `/healthz`, reached by end-user agents
//! - backend: `/token`, `/keys`, discovery, `/healthz` and `/api-docs`, reached by clients

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::config::{AppConfig, Listener};
use crate::oidc::client_auth::require_client;
use crate::oidc::{OidcState, backend_router, frontend_router};
use axum::{Router, middleware};
use color_eyre::eyre::{WrapErr, eyre};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Router for the end-user facing listener.
pub fn frontend_app(state: OidcState) -> Router {
    let (router, _) = OpenApiRouter::new()
        .merge(frontend_router(state))
        .routes(routes!(health::health))
        .layer(TraceLayer::new_for_http())
        .split_for_parts();
    router
}

/// Router for the client facing listener. Everything but health and docs needs client credentials.
pub fn backend_app(state: OidcState) -> Router {
    let clients = Arc::clone(&state.clients);
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(backend_router(state))
        .routes(routes!(health::health))
        .split_for_parts();

    router
        .merge(Redoc::with_url("/api-docs", api))
        .layer(middleware::from_fn_with_state(clients, require_client))
        .layer(TraceLayer::new_for_http())
}

async fn serve(
    name: &'static str,
    listener: Listener,
    app: Router,
    config: &AppConfig,
) -> color_eyre::Result<()> {
    let tcp = tokio::net::TcpListener::bind(&listener.address)
        .await
        .wrap_err_with(|| format!("failed to bind {name} listener on {}", listener.address))?;
    tracing::info!(listener = name, addr = %listener.address, tls = listener.tls, "listening");

    if listener.tls {
        let https = config
            .https
            .as_ref()
            .ok_or_else(|| eyre!("{name} listener is https but no https section is configured"))?;
        let tls = crate::tls::server_config(https)
            .wrap_err_with(|| format!("failed to set up TLS for {name} listener"))?;
        crate::tls::serve_tls(tcp, tls, app).await;
        Ok(())
    } else {
        axum::serve(tcp, app)
            .await
            .wrap_err_with(|| format!("{name} listener failed"))
    }
}

/// Run both listeners until one of them fails.
#[tracing::instrument(skip_all)]
pub async fn start_webserver(config: &AppConfig, state: OidcState) -> color_eyre::Result<()> {
    let frontend = serve(
        "frontend",
        config.frontend_listener()?,
        frontend_app(state.clone()),
        config,
    );
    let backend = serve(
        "backend",
        config.backend_listener()?,
        backend_app(state),
        config,
    );
    tokio::try_join!(frontend, backend)?;
    Ok(())
}
