//! Signed configuration tokens
//!
//! The Document Server accepts editor configurations signed as compact
//! HS256 JSON Web Tokens and signs its own callbacks the same way.
//!
//! # Format
//!
//! `base64url(header) "." base64url(payload) "." base64url(signature)`
//!
//! - header is always `{"alg":"HS256","typ":"JWT"}`
//! - signature is HMAC-SHA256 over `header "." payload` keyed by the shared secret
//! - all three segments use unpadded base64url
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies; the server wraps these for its handlers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// JOSE header; field order is fixed so signed output is reproducible
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Signs and verifies HS256 tokens with a shared secret
///
/// An empty secret disables signing: [`TokenSigner::sign_optional`] then
/// yields `None` and the Document Server must run without JWT checks.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Sign `payload` as a compact JWT
    ///
    /// # Examples
    ///
    /// ```
    /// use docdesk_common::token::TokenSigner;
    /// use serde_json::json;
    ///
    /// let signer = TokenSigner::new("secret");
    /// let token = signer.sign(&json!({"key": "abc"})).unwrap();
    /// assert_eq!(token.split('.').count(), 3);
    /// assert_eq!(signer.verify(&token).unwrap()["key"], "abc");
    /// ```
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        if !self.is_enabled() {
            return Err(Error::Token("Signing disabled (empty secret)".to_string()));
        }

        let header = serde_json::to_vec(&Header::hs256())
            .map_err(|e| Error::Token(format!("Failed to encode header: {}", e)))?;
        let payload = serde_json::to_vec(payload)
            .map_err(|e| Error::Token(format!("Failed to encode payload: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signing_input.as_bytes())?.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Sign when enabled, otherwise `Ok(None)`
    pub fn sign_optional<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Option<String>> {
        if self.is_enabled() {
            self.sign(payload).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Verify a compact HS256 token and return its payload
    ///
    /// Rejects malformed tokens, any algorithm other than HS256, and
    /// signature mismatches. The comparison is constant-time.
    pub fn verify(&self, token: &str) -> Result<Value> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(Error::Token("Malformed token".to_string())),
            };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::Token(format!("Unsupported algorithm: {}", header.alg)));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| Error::Token(format!("Invalid signature encoding: {}", e)))?;

        let signing_input = format!("{}.{}", header_b64, payload_b64);
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| Error::Token("Signature mismatch".to_string()))?;

        decode_segment(payload_b64)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Token(format!("Invalid key: {}", e)))?;
        mac.update(data);
        Ok(mac)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::Token(format!("Invalid base64url segment: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Token(format!("Invalid JSON segment: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_segment_is_fixed() {
        let signer = TokenSigner::new("secret");
        let token = signer.sign(&json!({})).unwrap();
        let header = token.split('.').next().unwrap();
        assert_eq!(
            URL_SAFE_NO_PAD.decode(header).unwrap(),
            br#"{"alg":"HS256","typ":"JWT"}"#
        );
    }

    #[test]
    fn test_known_signature() {
        // Reference HS256 vector: header {"alg":"HS256","typ":"JWT"},
        // payload {"sub":"1234567890","name":"John Doe","iat":1516239022},
        // secret "your-256-bit-secret"
        let signer = TokenSigner::new("your-256-bit-secret");
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                     eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ.\
                     SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c";
        let payload = signer.verify(token).unwrap();
        assert_eq!(payload["name"], "John Doe");
    }

    #[test]
    fn test_no_padding_in_output() {
        let signer = TokenSigner::new("secret");
        let token = signer.sign(&json!({"a": "b"})).unwrap();
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenSigner::new("secret").sign(&json!({"x": 1})).unwrap();
        let err = TokenSigner::new("other").verify(&token).unwrap_err();
        assert!(matches!(err, Error::Token(_)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("secret");
        let token = signer.sign(&json!({"mode": "view"})).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"mode":"edit"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(signer.verify(&forged).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let signer = TokenSigner::new("secret");
        assert!(signer.verify("").is_err());
        assert!(signer.verify("a.b").is_err());
        assert!(signer.verify("a.b.c.d").is_err());
        assert!(signer.verify("!!!.???.***").is_err());
    }

    #[test]
    fn test_non_hs256_rejected() {
        let signer = TokenSigner::new("secret");
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{}"#);
        let token = format!("{}.{}.", header, payload);
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_empty_secret_disables_signing() {
        let signer = TokenSigner::new("");
        assert!(!signer.is_enabled());
        assert!(signer.sign(&json!({})).is_err());
        assert_eq!(signer.sign_optional(&json!({})).unwrap(), None);
    }
}
