// SPDX-License-Identifier: MIT

//! Map keys of the hand-written record codecs.
//!
//! A record declares each of its fields as a [`Key`], pairing the integer
//! used in CBOR with the string used in JSON. Visitors read incoming keys as
//! [`MapKey`] and resolve them against the record's keys; anything that does
//! not resolve is either an extension field or an error, depending on the
//! record.

use serde::{
    de::{self, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// A field's CBOR and JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub cbor: i64,
    pub json: &'static str,
}

impl Key {
    pub const fn new(cbor: i64, json: &'static str) -> Self {
        Self { cbor, json }
    }

    /// Writes `value` under this key, picking the key form from the format.
    pub fn serialize_entry<M, V>(
        &self,
        map: &mut M,
        is_human_readable: bool,
        value: &V,
    ) -> Result<(), M::Error>
    where
        M: SerializeMap,
        V: ?Sized + Serialize,
    {
        if is_human_readable {
            map.serialize_entry(self.json, value)
        } else {
            map.serialize_entry(&self.cbor, value)
        }
    }

    pub fn matches(&self, key: &MapKey, is_human_readable: bool) -> bool {
        match key {
            MapKey::Int(i) => !is_human_readable && *i == self.cbor,
            MapKey::Text(s) => is_human_readable && s == self.json,
        }
    }
}

/// A key as read off the wire.
///
/// JSON keys that spell an integer decode as [`MapKey::Int`], so extension
/// fields keep the same identity in both formats.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Int(i64),
    Text(String),
}

impl MapKey {
    /// The record key `self` refers to, if any.
    pub fn resolve(&self, is_human_readable: bool, keys: &[Key]) -> Option<Key> {
        keys.iter()
            .copied()
            .find(|key| key.matches(self, is_human_readable))
    }

    fn from_json_key(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(i) => MapKey::Int(i),
            Err(_) => MapKey::Text(s.to_string()),
        }
    }
}

impl std::fmt::Display for MapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl Serialize for MapKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Int(i) if serializer.is_human_readable() => {
                serializer.serialize_str(&i.to_string())
            }
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapKeyVisitor {
            is_human_readable: bool,
        }

        impl Visitor<'_> for MapKeyVisitor {
            type Value = MapKey;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an integer or a string map key")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(MapKey::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(MapKey::Int)
                    .map_err(|_| E::custom(format!("map key {v} out of range")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if self.is_human_readable {
                    Ok(MapKey::from_json_key(v))
                } else {
                    Ok(MapKey::Text(v.to_string()))
                }
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_any(MapKeyVisitor { is_human_readable })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: Key = Key::new(0, "name");
    const ROLES: Key = Key::new(2, "roles");

    #[test]
    fn test_resolve() {
        let keys = [NAME, ROLES];

        assert_eq!(MapKey::Int(2).resolve(false, &keys), Some(ROLES));
        assert_eq!(MapKey::Int(2).resolve(true, &keys), None);
        assert_eq!(MapKey::from("name").resolve(true, &keys), Some(NAME));
        assert_eq!(MapKey::from("name").resolve(false, &keys), None);
        assert_eq!(MapKey::Int(7).resolve(false, &keys), None);
    }

    #[test]
    fn test_json_integer_keys() {
        let key: MapKey = serde_json::from_str("\"-70000\"").unwrap();
        assert_eq!(key, MapKey::Int(-70000));

        let key: MapKey = serde_json::from_str("\"tee.vendor\"").unwrap();
        assert_eq!(key, MapKey::from("tee.vendor"));

        assert_eq!(serde_json::to_string(&MapKey::Int(-1)).unwrap(), "\"-1\"");
    }

    #[test]
    fn test_cbor_keys() {
        let mut buf = vec![];
        ciborium::into_writer(&MapKey::Int(-1), &mut buf).unwrap();
        assert_eq!(buf, vec![0x20]);

        let key: MapKey = ciborium::from_reader([0x61, 0x78].as_slice()).unwrap();
        assert_eq!(key, MapKey::from("x"));
    }
}
