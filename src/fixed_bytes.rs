// SPDX-License-Identifier: MIT

//! Fixed-length byte arrays.
//!
//! [`FixedBytes`] backs identifiers whose length is part of their type, such
//! as the 16 bytes of a UUID. Deserialization rejects any other length, so a
//! decoded value never needs a separate length check.
//!
//! ```rust
//! use rats_corim::fixed_bytes::FixedBytes;
//!
//! let bytes: FixedBytes<4> = FixedBytes([1, 2, 3, 4]);
//! let array: &[u8; 4] = bytes.as_ref();
//! assert_eq!(array, &[1, 2, 3, 4]);
//! ```
use std::marker::PhantomData;

use derive_more::{AsMut, AsRef, Deref, DerefMut, From};
use serde::{
    de::{Error, Visitor},
    Deserialize, Serialize, Serializer,
};

use crate::codec::{base64_decode, base64_encode};

/// Visitor implementation for deserializing fixed-size byte arrays
struct FixedBytesVisitor<'de, const N: usize>(PhantomData<&'de [u8; N]>);

impl<'de, const N: usize> Visitor<'de> for FixedBytesVisitor<'de, N> {
    type Value = FixedBytes<N>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a byte array of length {}", N)
    }

    fn visit_borrowed_bytes<E: Error>(self, v: &'de [u8]) -> Result<Self::Value, E> {
        self.visit_bytes(v)
    }

    fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        self.visit_bytes(&v)
    }

    fn visit_bytes<E: Error>(self, value: &[u8]) -> Result<Self::Value, E> {
        FixedBytes::try_from(value).map_err(E::custom)
    }

    fn visit_str<E: Error>(self, value: &str) -> Result<Self::Value, E> {
        let decoded = base64_decode(value).map_err(E::custom)?;
        self.visit_bytes(&decoded)
    }
}

/// A byte array of exactly `N` bytes: a CBOR bstr, base64 text in JSON.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, AsMut, AsRef, Deref, DerefMut)]
pub struct FixedBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> TryFrom<&[u8]> for FixedBytes<N> {
    type Error = String;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != N {
            return Err(format!(
                "expected a byte array of length {}, but got {}",
                N,
                value.len()
            ));
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(value);
        Ok(FixedBytes(arr))
    }
}

impl<const N: usize> Serialize for FixedBytes<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&base64_encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedBytes<N> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(FixedBytesVisitor(PhantomData))
        } else {
            deserializer.deserialize_bytes(FixedBytesVisitor(PhantomData))
        }
    }
}

impl<const N: usize> std::fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FixedBytes<{}>{:02x?}", N, &self.0[..])
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_bytes_debug_format() {
        let bytes: FixedBytes<3> = FixedBytes([10, 11, 12]);
        assert_eq!(format!("{:?}", bytes), "FixedBytes<3>[0a, 0b, 0c]");
    }

    #[test]
    fn test_fixed_bytes_serde() {
        let bytes: FixedBytes<3> = FixedBytes([1, 2, 3]);

        let mut cbor = vec![];
        ciborium::into_writer(&bytes, &mut cbor).unwrap();
        assert_eq!(cbor, vec![0x43, 0x01, 0x02, 0x03]);

        let de: FixedBytes<3> = ciborium::from_reader(cbor.as_slice()).unwrap();
        assert_eq!(de, bytes);

        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(json, "\"AQID\"");

        let de: FixedBytes<3> = serde_json::from_str(&json).unwrap();
        assert_eq!(de, bytes);
    }

    #[test]
    fn test_fixed_bytes_wrong_length() {
        let cbor = vec![0x42, 0x01, 0x02];

        let err = ciborium::from_reader::<FixedBytes<3>, _>(cbor.as_slice())
            .unwrap_err()
            .to_string();

        assert!(err.contains("expected a byte array of length 3, but got 2"));
    }
}
