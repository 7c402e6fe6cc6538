//! Event envelope signing for transport payloads.

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// A transport payload: the serialized event plus its HMAC signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: serde_json::Value,
    pub signature: String,
}

/// Signs a payload using HMAC-SHA256.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a payload signature using constant-time comparison.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_payload(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

impl SignedEnvelope {
    /// Wraps a JSON payload with its signature.
    pub fn seal(payload: serde_json::Value, secret: &str) -> Self {
        let signature = sign_payload(payload.to_string().as_bytes(), secret);
        Self { payload, signature }
    }

    /// Checks the signature against the carried payload.
    pub fn verify(&self, secret: &str) -> bool {
        verify_signature(self.payload.to_string().as_bytes(), &self.signature, secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_signing() {
        let payload = br#"{"event":"deposit.completed"}"#;
        let secret = "envelope_secret_123";

        let signature = sign_payload(payload, secret);
        assert!(verify_signature(payload, &signature, secret));
        assert!(!verify_signature(payload, &signature, "wrong_secret"));
        assert!(!verify_signature(b"tampered", &signature, secret));
    }

    #[test]
    fn test_envelope_seal_and_verify() {
        let value = serde_json::json!({"amount": 500, "currency": "USD"});
        let envelope = SignedEnvelope::seal(value, "secret");

        assert!(envelope.verify("secret"));

        let mut tampered = envelope.clone();
        tampered.payload = serde_json::json!({"amount": 9_999_999, "currency": "USD"});
        assert!(!tampered.verify("secret"));
    }
}
