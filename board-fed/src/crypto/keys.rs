//! Per-board RSA-2048 keypair generation and PEM (de)serialization.
//!
//! Private keys use PKCS#1, public keys use PKIX/SPKI, matching the reference peer's
//! encoding (see `examples/original_source/crypto/pem.go`).

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{Error, Result};

const KEY_BITS: usize = 2048;

/// A board's keypair, PEM-encoded for storage.
pub struct Keypair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

impl Keypair {
    /// Generate a fresh RSA-2048 keypair.
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| Error::Internal(format!("key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map_err(|e| Error::Internal(format!("private key encode failed: {e}")))?
            .to_string();
        let public_key_pem = public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| Error::Internal(format!("public key encode failed: {e}")))?;

        Ok(Self {
            private_key_pem,
            public_key_pem,
        })
    }
}

pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| Error::Internal(format!("bad private key pem: {e}")))
}

pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| Error::BadSignature(format!("bad public key pem: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_roundtrips_through_pem() {
        let kp = Keypair::generate().unwrap();
        assert!(kp.private_key_pem.contains("BEGIN RSA PRIVATE KEY"));
        assert!(kp.public_key_pem.contains("BEGIN PUBLIC KEY"));

        let private = parse_private_key(&kp.private_key_pem).unwrap();
        let public = parse_public_key(&kp.public_key_pem).unwrap();
        assert_eq!(RsaPublicKey::from(&private), public);
    }
}
