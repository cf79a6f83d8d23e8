//! RSA keypairs, HTTP signature composition/verification, and tripcode hashing.

pub mod keys;
pub mod signature;
pub mod tripcode;

pub use keys::Keypair;
pub use signature::{sign_request, verify_signature, SignedRequestParts};
pub use tripcode::{hash_tripcode, Trip};
