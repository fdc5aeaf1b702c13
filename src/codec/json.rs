// SPDX-License-Identifier: MIT

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{CodecError, Error},
    result::Result,
};

/// Serializes `value` to compact JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| CodecError::Json(err).into())
}

/// Serializes `value` to indented JSON.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|err| CodecError::Json(err).into())
}

/// Deserializes `T` from JSON.
pub fn from_json<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|err| CodecError::Json(err).into())
}

pub(crate) fn json_describe(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub(crate) fn expect_json_str(value: serde_json::Value, what: &str) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(Error::invalid(format!(
            "{what}: expected string, found {}",
            json_describe(&other)
        ))),
    }
}
