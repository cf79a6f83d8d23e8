//! Native data model shared by the storage engine, ingest pipeline and transform layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post flag bitfield.
pub mod post_flags {
    pub const SAGE: i64 = 1 << 0;
    pub const SJIS: i64 = 1 << 1;
}

/// A board: identity, metadata, and the actor it federates under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Lowercase alphanumeric identity, also used to name the per-board SQL tables.
    pub id: String,
    pub title: String,
    pub description: String,
    /// PEM-encoded RSA public key, exposed at `{actor_url}#key`.
    pub public_key_pem: String,
    /// PEM-encoded RSA private key. Never serialized to an outbound response.
    #[serde(skip_serializing)]
    pub private_key_pem: String,
}

impl Board {
    /// `{transport}://{fqdn}/{id}`
    pub fn actor_url(&self, transport: &str, fqdn: &str) -> String {
        format!("{transport}://{fqdn}/{}", self.id)
    }
}

/// A single post, local or federated in origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub board: String,
    pub id: i64,
    /// 0 if this post is itself a thread OP; otherwise the OP's id on this board.
    pub thread: i64,
    /// Globally unique federation identity. Mandatory, unique per board, never rewritten.
    pub apid: String,
    pub name: String,
    pub tripcode: String,
    pub subject: String,
    /// Poster's client IP for local posts, or the remote actor URL for federated posts.
    pub source: String,
    /// Unformatted user input, preserved verbatim for outbound federation.
    pub raw: String,
    /// HTML-safe rendered form.
    pub content: String,
    pub date: DateTime<Utc>,
    /// Zero means "do not bump".
    pub bumpdate: DateTime<Utc>,
    pub flags: i64,
}

impl Post {
    pub fn is_sage(&self) -> bool {
        self.flags & post_flags::SAGE != 0
    }

    pub fn is_sjis(&self) -> bool {
        self.flags & post_flags::SJIS != 0
    }

    /// A federated post's `source` is a URL; a local post's is a client IP.
    pub fn is_federated(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

/// Directed reply edge `(source_post_id, target_post_id)` within one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEdge {
    pub source: i64,
    pub target: i64,
}

/// A ban, keyed by source (IP or actor URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub source: String,
    pub reason: String,
    pub placed: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// A user-filed report against a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub source: String,
    pub board: String,
    pub post: i64,
    pub reason: String,
    pub date: DateTime<Utc>,
    pub resolved: bool,
}

/// The kind of destructive/administrative action an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Ban,
    Warn,
    Delete,
}

impl AuditType {
    pub fn as_i64(self) -> i64 {
        match self {
            AuditType::Ban => 0,
            AuditType::Warn => 1,
            AuditType::Delete => 2,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => AuditType::Ban,
            1 => AuditType::Warn,
            _ => AuditType::Delete,
        }
    }
}

/// A single audit log entry, always written in the same transaction as the action it records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub kind: AuditType,
    pub date: DateTime<Utc>,
    pub author: String,
    pub board: String,
    pub post: i64,
    pub reason: String,
}

/// Moderator privilege level, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Janitor,
    Moderator,
    Admin,
}

/// A moderator account row. The login flow itself (session issuance) is an external
/// collaborator; this type exists so storage invariants over the row shape hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moderator {
    pub username: String,
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub salt: Vec<u8>,
    pub privilege: Privilege,
}

/// A CAPTCHA challenge. Image bytes are produced by an external generator; this crate
/// only stores and compares them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaEntry {
    /// 16 lowercase hex characters.
    pub id: String,
    /// 5 uppercase hex characters.
    pub solution: String,
    #[serde(skip_serializing)]
    pub image: Vec<u8>,
}

/// A compiled content-filter regex, consulted on every post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexFilter {
    pub id: i64,
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federated_detection_by_source_scheme() {
        let mut p = sample_post();
        p.source = "https://peer.example/u/alice".to_string();
        assert!(p.is_federated());
        p.source = "203.0.113.7".to_string();
        assert!(!p.is_federated());
    }

    #[test]
    fn sage_flag_roundtrips() {
        let mut p = sample_post();
        p.flags = post_flags::SAGE;
        assert!(p.is_sage());
        assert!(!p.is_sjis());
    }

    fn sample_post() -> Post {
        Post {
            board: "g".into(),
            id: 1,
            thread: 0,
            apid: "https://example.com/g/A0000001".into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            subject: String::new(),
            source: "127.0.0.1".into(),
            raw: "hello".into(),
            content: "hello".into(),
            date: Utc::now(),
            bumpdate: Utc::now(),
            flags: 0,
        }
    }
}
