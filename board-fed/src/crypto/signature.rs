//! HTTP signature composition and verification (draft-cavage style), matching the
//! reference peer's `CheckHeaders`/signing logic.

use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, SigningKey, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Requests older than this are rejected outright, replay protection.
pub const REPLAY_WINDOW_SECS: i64 = 30;

/// The three request facts a signature is computed over.
#[derive(Debug, Clone)]
pub struct SignedRequestParts {
    pub method: String,
    pub path: String,
    pub host: String,
    pub date: DateTime<Utc>,
}

impl SignedRequestParts {
    /// Always reconstructs `(request-target) host date` in that fixed order rather than
    /// the `headers=` order parsed from the inbound header; every peer this server talks
    /// to sends that exact order.
    fn signing_string(&self) -> String {
        format!(
            "(request-target): {} {}\nhost: {}\ndate: {}",
            self.method.to_lowercase(),
            self.path,
            self.host,
            self.date.format("%a, %d %b %Y %H:%M:%S GMT"),
        )
    }
}

/// Sign `parts` with `private_key`, returning the full `Signature` header value.
pub fn sign_request(parts: &SignedRequestParts, key_id: &str, private_key: &RsaPrivateKey) -> Result<String> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, parts.signing_string().as_bytes());
    let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, signature.to_bytes());

    Ok(format!(
        r#"keyId="{key_id}",headers="(request-target) host date",signature="{b64}""#
    ))
}

/// Verify an inbound `Signature` header against `public_key`. `now` is injected so
/// tests can control the replay window.
pub fn verify_signature(
    header_value: &str,
    parts: &SignedRequestParts,
    public_key: &RsaPublicKey,
    now: DateTime<Utc>,
) -> Result<()> {
    if (now - parts.date).num_seconds().abs() > REPLAY_WINDOW_SECS {
        return Err(Error::StaleDate);
    }

    let fields = parse_signature_header(header_value)?;
    let signature_b64 = fields
        .get("signature")
        .ok_or_else(|| Error::Unauthorized("missing signature field".into()))?;
    let signature_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_b64)
        .map_err(|e| Error::BadSignature(format!("bad base64: {e}")))?;
    let signature = Pkcs1v15Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| Error::BadSignature(format!("bad signature encoding: {e}")))?;

    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(parts.signing_string().as_bytes(), &signature)
        .map_err(|_| Error::BadSignature("signature does not verify".into()))
}

/// Parse `key="value",key2="value2"` tolerating quoted values, per the reference
/// peer's header parser.
fn parse_signature_header(header: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for part in header.split(',') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        map.insert(key.trim().to_string(), value.to_string());
    }
    if map.is_empty() {
        return Err(Error::Unauthorized("empty signature header".into()));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use chrono::Duration;

    fn sample_parts(date: DateTime<Utc>) -> SignedRequestParts {
        SignedRequestParts {
            method: "POST".to_string(),
            path: "/g/inbox".to_string(),
            host: "example.com".to_string(),
            date,
        }
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let kp = Keypair::generate().unwrap();
        let private = crate::crypto::keys::parse_private_key(&kp.private_key_pem).unwrap();
        let public = crate::crypto::keys::parse_public_key(&kp.public_key_pem).unwrap();

        let now = Utc::now();
        let parts = sample_parts(now);
        let header = sign_request(&parts, "https://example.com/g#key", &private).unwrap();

        verify_signature(&header, &parts, &public, now).unwrap();
    }

    #[test]
    fn stale_date_is_rejected() {
        let kp = Keypair::generate().unwrap();
        let private = crate::crypto::keys::parse_private_key(&kp.private_key_pem).unwrap();
        let public = crate::crypto::keys::parse_public_key(&kp.public_key_pem).unwrap();

        let old = Utc::now() - Duration::seconds(60);
        let parts = sample_parts(old);
        let header = sign_request(&parts, "https://example.com/g#key", &private).unwrap();

        let err = verify_signature(&header, &parts, &public, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::StaleDate));
    }

    #[test]
    fn tampered_signature_fails_to_verify() {
        let kp = Keypair::generate().unwrap();
        let private = crate::crypto::keys::parse_private_key(&kp.private_key_pem).unwrap();
        let public = crate::crypto::keys::parse_public_key(&kp.public_key_pem).unwrap();

        let now = Utc::now();
        let parts = sample_parts(now);
        let header = sign_request(&parts, "https://example.com/g#key", &private).unwrap();
        let other_parts = SignedRequestParts {
            path: "/g/outbox".to_string(),
            ..parts.clone()
        };

        let err = verify_signature(&header, &other_parts, &public, now).unwrap_err();
        assert!(matches!(err, Error::BadSignature(_)));
    }
}
