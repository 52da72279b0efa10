//! An OpenID Connect identity provider.
//!
//! End users authenticate with a password or a mutual-TLS client certificate and are
//! sent back to the relying party with a one-time authorization code. The relying party
//! redeems the code on a separate, client-authenticated listener for an RS256-signed
//! access token and, when `openid` was requested, an ID token.

pub mod api;
pub mod clients;
pub mod config;
pub mod directory;
pub mod error;
pub mod keys;
pub mod logging;
pub mod oidc;
pub mod password;
pub mod tls;

use crate::oidc::exchange::ExchangeStore;
use std::sync::Arc;
use std::time::Duration;

/// Periodically drop expired authorization codes.
pub fn spawn_exchange_sweeper(
    exchanges: Arc<ExchangeStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = exchanges.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = exchanges.len(), "swept expired codes");
            }
        }
    })
}
