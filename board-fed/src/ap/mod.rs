//! ActivityPub object model: the minimal Note/Group/Follow/Undo/Create/Delete/Accept
//! subset needed to interoperate with a sibling textboard implementation.

pub mod dual;
pub mod object;

pub use dual::{LinkOrObject, StringOrList};
pub use object::{Object, PublicKey};

/// An actor is just an Object of kind `"Group"` — one board, one actor.
pub type Actor = Object;

pub const AP_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

pub const KIND_NOTE: &str = "Note";
pub const KIND_GROUP: &str = "Group";
pub const KIND_FOLLOW: &str = "Follow";
pub const KIND_UNDO: &str = "Undo";
pub const KIND_CREATE: &str = "Create";
pub const KIND_DELETE: &str = "Delete";
pub const KIND_ACCEPT: &str = "Accept";
pub const KIND_ORDERED_COLLECTION: &str = "OrderedCollection";

pub fn ap_context() -> serde_json::Value {
    serde_json::Value::String(AP_CONTEXT.to_string())
}
