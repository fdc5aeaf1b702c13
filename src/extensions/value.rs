// SPDX-License-Identifier: MIT

//! Dynamic values carried by extension fields and the unknown-field cache.

use std::collections::BTreeMap;

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{base64_decode, base64_encode},
    error::Error,
    result::Result,
};

/// A CBOR data item, independent of the wire format it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Tag(u64, Box<ExtensionValue>),
    Array(Vec<ExtensionValue>),
    Map(Vec<(ExtensionValue, ExtensionValue)>),
}

/// The shape an extension field's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Any,
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Bytes,
    Array,
    Map,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Array => "array",
            Self::Map => "map",
        }
    }

    /// Converts `value` to this kind, or hands it back unchanged on failure.
    ///
    /// Text is accepted for bytes (as base64, the JSON form of a byte
    /// string) and integers for floats.
    pub fn coerce(&self, value: ExtensionValue) -> std::result::Result<ExtensionValue, ExtensionValue> {
        match (self, value) {
            (Self::Any, v) => Ok(v),
            (Self::Bool, v @ ExtensionValue::Bool(_)) => Ok(v),
            (Self::Int, v @ ExtensionValue::Integer(_)) => Ok(v),
            (Self::Uint, ExtensionValue::Integer(i)) if i >= 0 => Ok(ExtensionValue::Integer(i)),
            (Self::Float, v @ ExtensionValue::Float(_)) => Ok(v),
            (Self::Float, ExtensionValue::Integer(i)) => Ok(ExtensionValue::Float(i as f64)),
            (Self::Text, v @ ExtensionValue::Text(_)) => Ok(v),
            (Self::Bytes, v @ ExtensionValue::Bytes(_)) => Ok(v),
            (Self::Bytes, ExtensionValue::Text(s)) => match base64_decode(&s) {
                Ok(decoded) => Ok(ExtensionValue::Bytes(decoded)),
                Err(_) => Err(ExtensionValue::Text(s)),
            },
            (Self::Array, v @ ExtensionValue::Array(_)) => Ok(v),
            (Self::Map, v @ ExtensionValue::Map(_)) => Ok(v),
            (_, v) => Err(v),
        }
    }
}

impl ExtensionValue {
    /// Name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Tag(_, _) => "tag",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Integer(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ExtensionValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a map whose keys are all text.
    pub fn as_string_map(&self) -> Option<BTreeMap<String, ExtensionValue>> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                .collect(),
            _ => None,
        }
    }

    pub fn to_cbor_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => match Integer::try_from(*i) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Float(*i as f64),
            },
            Self::Float(f) => Value::Float(*f),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Bytes(b) => Value::Bytes(b.clone()),
            Self::Tag(tag, inner) => Value::Tag(*tag, Box::new(inner.to_cbor_value())),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_cbor_value).collect()),
            Self::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_cbor_value(), v.to_cbor_value()))
                    .collect(),
            ),
        }
    }

    /// The JSON rendering: bytes become base64 text and tags are dropped in
    /// favor of their content.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => {
                if let Ok(v) = i64::try_from(*i) {
                    v.into()
                } else if let Ok(v) = u64::try_from(*i) {
                    v.into()
                } else {
                    serde_json::Value::String(i.to_string())
                }
            }
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::String(base64_encode(b)),
            Self::Tag(_, inner) => inner.to_json_value(),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json_value).collect())
            }
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::Text(s) => s.clone(),
                            Self::Integer(i) => i.to_string(),
                            other => other.to_json_value().to_string(),
                        };
                        (key, v.to_json_value())
                    })
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for ExtensionValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Integer(i) => Self::Integer(i128::from(i)),
            Value::Float(f) => Self::Float(f),
            Value::Text(s) => Self::Text(s),
            Value::Bytes(b) => Self::Bytes(b),
            Value::Tag(tag, inner) => Self::Tag(tag, Box::new(Self::try_from(*inner)?)),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((Self::try_from(k)?, Self::try_from(v)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            #[allow(unreachable_patterns)]
            _ => return Err(Error::invalid("unsupported CBOR item")),
        })
    }
}

impl From<serde_json::Value> for ExtensionValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Self::Integer(u as i128)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Self::Text(k), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ExtensionValue {
                fn from(value: $t) -> Self {
                    Self::Integer(value as i128)
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ExtensionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for ExtensionValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for ExtensionValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<ExtensionValue>> for ExtensionValue {
    fn from(value: Vec<ExtensionValue>) -> Self {
        Self::Array(value)
    }
}

impl From<BTreeMap<String, ExtensionValue>> for ExtensionValue {
    fn from(value: BTreeMap<String, ExtensionValue>) -> Self {
        Self::Map(
            value
                .into_iter()
                .map(|(k, v)| (Self::Text(k), v))
                .collect(),
        )
    }
}

impl Serialize for ExtensionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_json_value().serialize(serializer)
        } else {
            self.to_cbor_value().serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ExtensionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Ok(serde_json::Value::deserialize(deserializer)?.into())
        } else {
            let value = Value::deserialize(deserializer)?;
            ExtensionValue::try_from(value).map_err(crate::codec::de_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(
            FieldKind::Bytes.coerce(ExtensionValue::from("AQI=")),
            Ok(ExtensionValue::Bytes(vec![1, 2]))
        );
        assert_eq!(
            FieldKind::Float.coerce(ExtensionValue::from(3)),
            Ok(ExtensionValue::Float(3.0))
        );
        assert_eq!(
            FieldKind::Uint.coerce(ExtensionValue::from(-1)),
            Err(ExtensionValue::Integer(-1))
        );
        assert_eq!(
            FieldKind::Text.coerce(ExtensionValue::from(true)),
            Err(ExtensionValue::Bool(true))
        );
    }

    #[test]
    fn test_cbor_round_trip() {
        let value = ExtensionValue::Map(vec![
            (ExtensionValue::from(-1), ExtensionValue::from(vec![0xde, 0xad])),
            (
                ExtensionValue::from("k"),
                ExtensionValue::Tag(37, Box::new(ExtensionValue::from(vec![0u8; 16]))),
            ),
        ]);

        let mut cbor = vec![];
        ciborium::into_writer(&value, &mut cbor).unwrap();

        let de: ExtensionValue = ciborium::from_reader(cbor.as_slice()).unwrap();

        assert_eq!(de, value);
    }

    #[test]
    fn test_json_rendering() {
        let value = ExtensionValue::Map(vec![
            (ExtensionValue::from(-1), ExtensionValue::from(vec![1u8, 2])),
            (ExtensionValue::from("n"), ExtensionValue::from(7u64)),
        ]);

        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"-1":"AQI=","n":7}"#
        );
    }

    #[test]
    fn test_string_map() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), ExtensionValue::from(1));

        let value = ExtensionValue::from(m.clone());

        assert_eq!(value.as_string_map(), Some(m));
        assert_eq!(ExtensionValue::from(1).as_string_map(), None);
    }
}
