//! One Object record subsumes Note, Group, Collection, OrderedCollection and Activity,
//! since federation peers conflate them on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dual::{LinkOrObject, StringOrList};

/// The full ActivityPub record used for actors, notes, activities and collections alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "preferredUsername", skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(rename = "attributedTo", skip_serializing_if = "Option::is_none")]
    pub attributed_to: Option<LinkOrObject>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<LinkOrObject>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<LinkOrObject>>,

    /// Shallow (id, type, actor) references only — never the full cited object, to
    /// avoid quadratic recursion when a thread is embedded.
    #[serde(rename = "inReplyTo", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Vec<LinkOrObject>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<StringOrList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<StringOrList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbox: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,

    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,

    /// Present on a thread's outbound Object when `withReplies` is requested: one
    /// level of replies, never recursive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Box<Object>>,

    /// Collection/OrderedCollection items. Zero-item collections are represented as
    /// `None` (omitted on encode) unless the no-collapse peer quirk is active.
    #[serde(rename = "orderedItems", skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Object>>,

    #[serde(rename = "totalItems", skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

/// The board's RSA public key, embedded in its actor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: String,
    pub owner: String,
    #[serde(rename = "publicKeyPem")]
    pub public_key_pem: String,
}

impl Object {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// True if this carries nothing beyond an id — the encode rule for
    /// [`LinkOrObject`] collapses such objects to a bare URL string.
    pub fn is_id_only(&self) -> bool {
        self.id.is_some()
            && self.name.is_none()
            && self.preferred_username.is_none()
            && self.summary.is_none()
            && self.content.is_none()
            && self.published.is_none()
            && self.attributed_to.is_none()
            && self.actor.is_none()
            && self.object.is_none()
            && self.in_reply_to.is_none()
            && self.to.is_none()
            && self.cc.is_none()
            && self.inbox.is_none()
            && self.public_key.is_none()
            && self.items.is_none()
            && (self.kind.is_empty() || self.kind == "Link")
    }

    /// Build a zero-item collection, applying the peer's sentinel-serialization quirk
    /// when `no_collapse` is set in federation config.
    pub fn empty_collection(kind: &str, id: String, no_collapse: bool) -> Self {
        Self {
            id: Some(id),
            kind: kind.to_string(),
            total_items: Some(0),
            items: if no_collapse { Some(Vec::new()) } else { None },
            ..Default::default()
        }
    }

    /// A single empty placeholder entry, used for the peer quirk that crashes on a
    /// thread's outbound Object having no `inReplyTo` at all.
    pub fn empty_in_reply_to_placeholder() -> Vec<LinkOrObject> {
        vec![LinkOrObject::full(Object::default())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_only_object_is_detected() {
        let o = Object {
            id: Some("https://example.com/g/A0000001".into()),
            ..Default::default()
        };
        assert!(o.is_id_only());
    }

    #[test]
    fn object_with_content_is_not_id_only() {
        let o = Object {
            id: Some("https://example.com/g/A0000001".into()),
            content: Some("hello".into()),
            ..Default::default()
        };
        assert!(!o.is_id_only());
    }

    #[test]
    fn empty_collection_omits_items_by_default() {
        let c = Object::empty_collection("OrderedCollection", "https://example.com/g/outbox".into(), false);
        assert!(c.items.is_none());
        assert_eq!(c.total_items, Some(0));
    }

    #[test]
    fn empty_collection_respects_no_collapse() {
        let c = Object::empty_collection("OrderedCollection", "https://example.com/g/outbox".into(), true);
        assert_eq!(c.items, Some(Vec::new()));
    }
}
