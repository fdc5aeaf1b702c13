// SPDX-License-Identifier: MIT

use base64::{engine::general_purpose::STANDARD, Engine as _};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{error::Error, result::Result};

/// A byte string: a CBOR bstr, standard base64 text in JSON.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, From, AsRef, AsMut, Deref, DerefMut)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Bytes {
    fn from(value: [u8; N]) -> Self {
        Self(value.to_vec())
    }
}

impl std::fmt::Debug for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bytes({})", hex::encode(&self.0))
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&base64_encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BytesVisitor;

        impl Visitor<'_> for BytesVisitor {
            type Value = Bytes;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a byte string or base64 text")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Self::Value, E> {
                Ok(Bytes(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Self::Value, E> {
                Ok(Bytes(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                base64_decode(v).map(Bytes).map_err(E::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(BytesVisitor)
        } else {
            deserializer.deserialize_bytes(BytesVisitor)
        }
    }
}

pub(crate) fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub(crate) fn base64_decode(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|err| Error::invalid(format!("invalid base64 {data:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_serde() {
        let bytes = Bytes::from([0xde, 0xad, 0xbe, 0xef]);

        let mut cbor = vec![];
        ciborium::into_writer(&bytes, &mut cbor).unwrap();
        assert_eq!(cbor, vec![0x44, 0xde, 0xad, 0xbe, 0xef]);

        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(json, "\"3q2+7w==\"");

        let de: Bytes = serde_json::from_str(&json).unwrap();
        assert_eq!(de, bytes);

        let de: Bytes = ciborium::from_reader(cbor.as_slice()).unwrap();
        assert_eq!(de, bytes);
    }

    #[test]
    fn test_bad_base64() {
        assert!(serde_json::from_str::<Bytes>("\"not base64!\"").is_err());
    }
}
