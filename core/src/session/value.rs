//! Tagged value type stored in a session payload.
//!
//! Values serialize to their natural JSON shape: strings, numbers, booleans
//! and nested objects map one to one, and byte blobs become arrays of
//! integers in `0..=255`. Since the payload has no list kind, an array can
//! only ever decode back into [`SessionValue::Bytes`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single value held under a session key
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, SessionValue>),
}

impl SessionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SessionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SessionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SessionValue::Float(f) => Some(*f),
            SessionValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SessionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SessionValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, SessionValue>> {
        match self {
            SessionValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        SessionValue::String(value.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        SessionValue::String(value)
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        SessionValue::Int(value)
    }
}

impl From<i32> for SessionValue {
    fn from(value: i32) -> Self {
        SessionValue::Int(value.into())
    }
}

impl From<u32> for SessionValue {
    fn from(value: u32) -> Self {
        SessionValue::Int(value.into())
    }
}

impl From<f64> for SessionValue {
    fn from(value: f64) -> Self {
        SessionValue::Float(value)
    }
}

impl From<bool> for SessionValue {
    fn from(value: bool) -> Self {
        SessionValue::Bool(value)
    }
}

impl From<Vec<u8>> for SessionValue {
    fn from(value: Vec<u8>) -> Self {
        SessionValue::Bytes(value)
    }
}

impl From<&[u8]> for SessionValue {
    fn from(value: &[u8]) -> Self {
        SessionValue::Bytes(value.to_vec())
    }
}

impl From<BTreeMap<String, SessionValue>> for SessionValue {
    fn from(value: BTreeMap<String, SessionValue>) -> Self {
        SessionValue::Map(value)
    }
}

impl Serialize for SessionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SessionValue::String(s) => serializer.serialize_str(s),
            SessionValue::Int(i) => serializer.serialize_i64(*i),
            // JSON would silently turn these into `null`
            SessionValue::Float(f) if !f.is_finite() => Err(S::Error::custom(format!(
                "non-finite float {} cannot be stored in a session",
                f
            ))),
            SessionValue::Float(f) => serializer.serialize_f64(*f),
            SessionValue::Bool(b) => serializer.serialize_bool(*b),
            SessionValue::Bytes(b) => serializer.serialize_bytes(b),
            SessionValue::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct SessionValueVisitor;

impl<'de> Visitor<'de> for SessionValueVisitor {
    type Value = SessionValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, boolean, byte array or map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<SessionValue, E> {
        Ok(SessionValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<SessionValue, E> {
        Ok(SessionValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<SessionValue, E> {
        i64::try_from(v)
            .map(SessionValue::Int)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &"an i64 integer"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<SessionValue, E> {
        Ok(SessionValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<SessionValue, E> {
        Ok(SessionValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<SessionValue, E> {
        Ok(SessionValue::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<SessionValue, E> {
        Ok(SessionValue::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<SessionValue, E> {
        Ok(SessionValue::Bytes(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SessionValue, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Ok(SessionValue::Bytes(bytes))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SessionValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((k, v)) = access.next_entry::<String, SessionValue>()? {
            map.insert(k, v);
        }
        Ok(SessionValue::Map(map))
    }
}

impl<'de> Deserialize<'de> for SessionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SessionValueVisitor)
    }
}
