//! Game login credential issued when an account is linked.

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use md5::{Digest, Md5};

/// Number of random bytes in a generated key (hex-encoded to twice as many chars).
const API_KEY_BYTES: usize = 8;

/// Opaque credential the player uses to log into the game client.
///
/// The plaintext is kept in the identity ledger so the player can fetch it
/// again; the game store only ever sees [`ApiKey::digest`].
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Generate a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; API_KEY_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(SecretString::from(hex::encode(bytes)))
    }

    /// Wrap a key loaded from storage.
    #[must_use]
    pub fn from_stored(value: String) -> Self {
        Self(SecretString::from(value))
    }

    /// The plaintext key.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Hex MD5 digest sent to the game store as the account password.
    ///
    /// The game client hashes the key the same way at login, and the game
    /// store's password column holds exactly 32 characters.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Md5::digest(self.expose().as_bytes()))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}
