//! Signing key management.
//!
//! Keys are generated once at startup and never rotated. Callers only see the
//! [`KeyProvider`] trait so a rotating implementation can replace [`KeyManager`]
//! without touching the token issuer or the JWKS endpoint.

use crate::error::IdpError;
use jsonwebtoken::EncodingKey;
use rand::Rng;
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use std::fmt;

/// Modulus size of every generated key.
pub const RSA_KEY_BITS: usize = 2048;

/// Source of signing keys and their public halves.
pub trait KeyProvider: Send + Sync {
    /// All public keys currently held, by key id.
    fn public_keys(&self) -> HashMap<String, RsaPublicKey>;

    /// A key to sign one token with. Successive calls may return different keys.
    fn signing_key(&self) -> &SigningKey;
}

/// An RSA key pair together with its key id and a ready-to-use JWT encoding key.
pub struct SigningKey {
    key_id: String,
    private_key: RsaPrivateKey,
    encoding_key: EncodingKey,
}

impl SigningKey {
    pub fn generate() -> Result<Self, IdpError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| IdpError::KeyGeneration(e.to_string()))?;
        Self::from_private_key(uuid::Uuid::new_v4().to_string(), private_key)
    }

    pub fn from_private_key(key_id: String, private_key: RsaPrivateKey) -> Result<Self, IdpError> {
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| IdpError::KeyGeneration(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());
        Ok(Self {
            key_id,
            private_key,
            encoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Fixed set of keys generated at construction.
#[derive(Debug)]
pub struct KeyManager {
    // never empty
    keys: Vec<SigningKey>,
}

impl KeyManager {
    /// Generate `count` independent key pairs. Fails as a whole if any generation fails.
    pub fn new(count: usize) -> Result<Self, IdpError> {
        if count == 0 {
            return Err(IdpError::KeyGeneration(
                "at least one signing key is required".into(),
            ));
        }
        let keys = (0..count)
            .map(|_| SigningKey::generate())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(count, bits = RSA_KEY_BITS, "generated signing keys");
        Ok(Self { keys })
    }

    /// Build a manager around keys created elsewhere.
    pub fn from_keys(keys: Vec<SigningKey>) -> Result<Self, IdpError> {
        if keys.is_empty() {
            return Err(IdpError::KeyGeneration(
                "at least one signing key is required".into(),
            ));
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(SigningKey::key_id)
    }
}

impl KeyProvider for KeyManager {
    fn public_keys(&self) -> HashMap<String, RsaPublicKey> {
        self.keys
            .iter()
            .map(|key| (key.key_id.clone(), key.public_key()))
            .collect()
    }

    fn signing_key(&self) -> &SigningKey {
        let index = rand::thread_rng().gen_range(0..self.keys.len());
        &self.keys[index]
    }
}
