//! HMAC-SHA512 callback authentication.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use super::payload::TransactionObject;

type HmacSha512 = Hmac<Sha512>;

/// Verifies callback signatures with the shared webhook secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    // HMAC accepts keys of any length; `None` is unreachable in practice.
    fn mac(&self, transaction: &TransactionObject) -> Option<HmacSha512> {
        let mut mac = <HmacSha512 as Mac>::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(transaction.signing_string().as_bytes());
        Some(mac)
    }

    /// Lower-case hex signature the provider would send for `transaction`.
    pub fn sign(&self, transaction: &TransactionObject) -> String {
        self.mac(transaction)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Checks `signature` in constant time. Undecodable hex fails verification.
    pub fn verify(&self, transaction: &TransactionObject, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(transaction)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}
