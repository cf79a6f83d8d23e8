//! Shape-polymorphic serde types the ActivityPub wire format requires.

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::object::Object;

/// Either a bare URL (an id-only reference) or a fully populated object.
///
/// Encodes as a string when it carries only an id; as a full object otherwise.
/// Decoding tries the string form first, falling back to the object form — the
/// practical equivalent of sniffing the first non-whitespace byte.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LinkOrObject {
    Link(String),
    Full(Box<Object>),
}

impl LinkOrObject {
    pub fn shallow(id: impl Into<String>) -> Self {
        LinkOrObject::Link(id.into())
    }

    pub fn full(object: Object) -> Self {
        LinkOrObject::Full(Box::new(object))
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            LinkOrObject::Link(s) => Some(s.as_str()),
            LinkOrObject::Full(o) => o.id.as_deref(),
        }
    }
}

impl Serialize for LinkOrObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            LinkOrObject::Link(s) => serializer.serialize_str(s),
            LinkOrObject::Full(obj) if obj.is_id_only() => {
                serializer.serialize_str(obj.id.as_deref().unwrap_or_default())
            }
            LinkOrObject::Full(obj) => obj.serialize(serializer),
        }
    }
}

/// Either a single string or a list of strings: `to`/`cc`-style AP fields.
///
/// Serializes as a bare string when it holds exactly one entry, as an array
/// otherwise — required because several fields in this vocabulary are declared
/// as `[String]` but peers commonly emit or expect the scalar shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringOrList(pub Vec<String>);

impl StringOrList {
    pub fn one(value: impl Into<String>) -> Self {
        StringOrList(vec![value.into()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Serialize for StringOrList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.as_slice() {
            [one] => serializer.serialize_str(one),
            many => {
                let mut seq = serializer.serialize_seq(Some(many.len()))?;
                for item in many {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StringOrList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrListVisitor;

        impl<'de> Visitor<'de> for StringOrListVisitor {
            type Value = StringOrList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or an array of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringOrList(vec![v.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(StringOrList(items))
            }
        }

        deserializer.deserialize_any(StringOrListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_serializes_as_bare_string() {
        let value = StringOrList::one("https://example.com/a");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""https://example.com/a""#);
    }

    #[test]
    fn multiple_entries_serialize_as_array() {
        let value = StringOrList(vec!["a".into(), "b".into()]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn link_shallow_serializes_as_bare_string() {
        let link = LinkOrObject::shallow("https://example.com/g/A0000001");
        assert_eq!(
            serde_json::to_string(&link).unwrap(),
            r#""https://example.com/g/A0000001""#
        );
    }

    #[test]
    fn link_deserializes_from_bare_string() {
        let parsed: LinkOrObject = serde_json::from_str(r#""https://example.com/g/A0000001""#).unwrap();
        assert_eq!(parsed.id(), Some("https://example.com/g/A0000001"));
    }
}
