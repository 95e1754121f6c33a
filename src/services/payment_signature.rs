//! Gateway callback signatures
//!
//! The gateway signs `order_id|payment_id` with HMAC-SHA256 keyed by the
//! merchant secret and sends the lowercase hex digest.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct PaymentSignatureVerifier {
    secret: String,
}

impl PaymentSignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex signature the gateway is expected to send
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        format!("{:x}", mac.finalize().into_bytes())
    }

    /// Constant-time comparison against the received signature
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let expected = self.sign(order_id, payment_id);
        let received = signature.trim().to_ascii_lowercase();
        !expected.is_empty() && constant_time_eq(expected.as_bytes(), received.as_bytes())
    }
}

impl std::fmt::Debug for PaymentSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSignatureVerifier").finish_non_exhaustive()
    }
}
