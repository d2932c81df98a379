use std::fmt;
use std::ops::Deref;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque byte payload carried inside a msgpack record.
///
/// Written as msgpack `bin`. Peers built on string types send the same
/// payload as `str` (not necessarily valid UTF-8), so both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WireBytes(pub Vec<u8>);

impl WireBytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for WireBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for WireBytes {
    fn from(v: Vec<u8>) -> Self {
        WireBytes(v)
    }
}

impl From<&[u8]> for WireBytes {
    fn from(v: &[u8]) -> Self {
        WireBytes(v.to_vec())
    }
}

impl From<&str> for WireBytes {
    fn from(v: &str) -> Self {
        WireBytes(v.as_bytes().to_vec())
    }
}

impl Serialize for WireBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct WireBytesVisitor;

impl<'de> Visitor<'de> for WireBytesVisitor {
    type Value = WireBytes;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<WireBytes, E> {
        Ok(WireBytes(v.as_bytes().to_vec()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<WireBytes, E> {
        Ok(WireBytes(v.into_bytes()))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<WireBytes, E> {
        Ok(WireBytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<WireBytes, E> {
        Ok(WireBytes(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<WireBytes, E> {
        Ok(WireBytes::default())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<WireBytes, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            out.push(b);
        }
        Ok(WireBytes(out))
    }
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WireBytesVisitor)
    }
}
