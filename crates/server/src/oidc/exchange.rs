//! One-time authorization codes.
//!
//! A code maps to the token bundle minted when the user authorized, plus the client
//! that may redeem it. Successful redemption removes the entry; a redemption by the
//! wrong client leaves it in place for the rightful one.

use crate::error::IdpError;
use crate::oidc::tokens::TokenBundle;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const CODE_BYTES: usize = 32;

#[derive(Debug)]
struct PendingExchange {
    client_id: String,
    bundle: TokenBundle,
    created: Instant,
}

#[derive(Debug)]
pub struct ExchangeStore {
    pending: Mutex<HashMap<String, PendingExchange>>,
    ttl: Duration,
}

impl ExchangeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingExchange>> {
        // entries are inserted and removed whole, a poisoned map is still consistent
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `bundle` for `client_id` and return a fresh unguessable code.
    pub fn put(&self, client_id: &str, bundle: TokenBundle) -> String {
        let mut pending = self.lock();
        let code = loop {
            let candidate = new_code();
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(
            code.clone(),
            PendingExchange {
                client_id: client_id.to_string(),
                bundle,
                created: Instant::now(),
            },
        );
        code
    }

    /// Redeem `code` on behalf of `client_id`. At most one call ever succeeds per code.
    pub fn get(&self, client_id: &str, code: &str) -> Result<TokenBundle, IdpError> {
        let mut pending = self.lock();
        let Some(entry) = pending.get(code) else {
            return Err(IdpError::UnknownCode);
        };
        if entry.created.elapsed() >= self.ttl {
            pending.remove(code);
            return Err(IdpError::UnknownCode);
        }
        if entry.client_id != client_id {
            return Err(IdpError::ClientCodeMismatch);
        }
        pending
            .remove(code)
            .map(|entry| entry.bundle)
            .ok_or(IdpError::UnknownCode)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, entry| entry.created.elapsed() < self.ttl);
        before - pending.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_code() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
