//! Tripcode hashing, mirroring `examples/original_source/crypto/crypto.go`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// A resolved `(display name, tripcode)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub name: String,
    pub trip: String,
}

/// Split `name` on the first `#`, hash the remainder per the normal/secure trip rules,
/// and fall back to `Anonymous` for an empty display name.
pub fn hash_tripcode(name: &str, secret: &str) -> Trip {
    let display = if name.is_empty() { "Anonymous" } else { name };

    let Some(hash_pos) = display.find('#') else {
        return Trip {
            name: display.to_string(),
            trip: String::new(),
        };
    };

    let (shown, rest) = display.split_at(hash_pos);
    let shown = if shown.is_empty() { "Anonymous" } else { shown };

    if let Some(secure_pass) = rest.strip_prefix("##") {
        if secure_pass == "mod" {
            return Trip {
                name: shown.to_string(),
                trip: "mod".to_string(),
            };
        }
        let salted = format!("{secure_pass}{secret}");
        Trip {
            name: shown.to_string(),
            trip: format!("!!{}", do_trip(&salted)),
        }
    } else {
        let pass = &rest[1..];
        Trip {
            name: shown.to_string(),
            trip: format!("!{}", do_trip(pass)),
        }
    }
}

/// `base64url(sha1(pass))[:10]`, the core of both the normal and secure trip.
fn do_trip(pass: &str) -> String {
    let digest = Sha1::digest(pass.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.chars().take(10).collect()
}
