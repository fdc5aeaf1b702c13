// SPDX-License-Identifier: MIT

use ciborium::value::Value;
use ciborium_ll::{Decoder, Header};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{CodecError, Error},
    result::Result,
};

/// Nesting limit of `ciborium::from_reader`.
const RECURSION_LIMIT: usize = 256;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum nesting of arrays, maps and tags.
    pub max_nesting: usize,
    /// Reject maps that repeat a key.
    pub reject_duplicate_keys: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_nesting: 128,
            reject_duplicate_keys: true,
        }
    }
}

/// Serializes `value` to canonical CBOR.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let canonical = canonicalize(to_value(value)?)?;
    write_value(&canonical)
}

/// Deserializes `T` from CBOR with the default [`DecodeOptions`].
pub fn from_cbor<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_cbor_with(data, &DecodeOptions::default())
}

/// Deserializes `T` from CBOR.
pub fn from_cbor_with<T: DeserializeOwned>(data: &[u8], opts: &DecodeOptions) -> Result<T> {
    let end = scan_item(data)?;
    if end != data.len() {
        return Err(CodecError::ExtraneousData {
            count: data.len() - end,
            index: end,
        }
        .into());
    }

    let value: Value = ciborium::de::from_reader_with_recursion_limit(data, opts.max_nesting)
        .map_err(|err| decode_error(err, opts.max_nesting))?;

    if opts.reject_duplicate_keys {
        check_duplicates(&value)?;
    }

    from_value(value)
}

/// Sorts every map of `value` canonically and rejects duplicate keys.
pub fn canonicalize(value: Value) -> Result<Value> {
    Ok(match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(canonicalize)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(entries) => {
            let mut keyed = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = canonicalize(key)?;
                keyed.push((write_value(&key)?, key, canonicalize(value)?));
            }

            keyed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

            if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(CodecError::DuplicateKey(describe_key(&pair[0].1)).into());
            }

            log::trace!("canonical map with {} entries", keyed.len());

            Value::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
        Value::Tag(tag, inner) => Value::Tag(tag, Box::new(canonicalize(*inner)?)),
        other => other,
    })
}

pub(crate) fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    let raw = write_value(value)?;
    ciborium::from_reader(raw.as_slice())
        .map_err(|err| decode_error(err, RECURSION_LIMIT).into())
}

/// Decodes a `T` out of an already parsed item.
pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    let raw = write_value(&value)?;
    ciborium::from_reader(raw.as_slice())
        .map_err(|err| decode_error(err, RECURSION_LIMIT).into())
}

fn write_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = vec![];
    ciborium::into_writer(value, &mut buf).map_err(|err| match err {
        ciborium::ser::Error::Io(err) => CodecError::Encode(err.to_string()),
        ciborium::ser::Error::Value(msg) => CodecError::Encode(msg),
    })?;
    Ok(buf)
}

fn decode_error(err: ciborium::de::Error<std::io::Error>, limit: usize) -> CodecError {
    match err {
        ciborium::de::Error::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            CodecError::UnexpectedEof
        }
        ciborium::de::Error::Io(err) => CodecError::Io(err.to_string()),
        ciborium::de::Error::Syntax(offset) => CodecError::Syntax(offset),
        ciborium::de::Error::Semantic(_, msg) => CodecError::Semantic(msg),
        ciborium::de::Error::RecursionLimitExceeded => CodecError::NestingLimit(limit),
    }
}

fn check_duplicates(value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(check_duplicates),
        Value::Map(entries) => {
            let mut seen = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let encoded = write_value(key)?;
                if seen.contains(&encoded) {
                    return Err(CodecError::DuplicateKey(describe_key(key)).into());
                }
                seen.push(encoded);
                check_duplicates(key)?;
                check_duplicates(value)?;
            }
            Ok(())
        }
        Value::Tag(_, inner) => check_duplicates(inner),
        _ => Ok(()),
    }
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Text(s) => format!("{s:?}"),
        other => describe(other),
    }
}

/// Short description of an item, used in error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Integer(_) => "integer".to_string(),
        Value::Bytes(_) => "byte string".to_string(),
        Value::Float(_) => "float".to_string(),
        Value::Text(_) => "text string".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
        Value::Tag(tag, _) => format!("tag {tag}"),
        Value::Array(_) => "array".to_string(),
        Value::Map(_) => "map".to_string(),
        _ => "unknown item".to_string(),
    }
}

pub(crate) fn expect_bytes(value: Value, what: &str) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        other => Err(Error::invalid(format!(
            "{what}: expected byte string, found {}",
            describe(&other)
        ))),
    }
}

pub(crate) fn expect_text(value: Value, what: &str) -> Result<String> {
    match value {
        Value::Text(text) => Ok(text),
        other => Err(Error::invalid(format!(
            "{what}: expected text string, found {}",
            describe(&other)
        ))),
    }
}

pub(crate) fn expect_integer(value: Value, what: &str) -> Result<i128> {
    match value {
        Value::Integer(i) => Ok(i128::from(i)),
        other => Err(Error::invalid(format!(
            "{what}: expected integer, found {}",
            describe(&other)
        ))),
    }
}

/// Converts a crate error raised inside a `Deserialize` impl.
pub(crate) fn de_error<E: serde::de::Error>(err: Error) -> E {
    match err {
        Error::Codec(CodecError::Semantic(msg)) => E::custom(msg),
        other => E::custom(other),
    }
}

/// Converts a crate error raised inside a `Serialize` impl.
pub(crate) fn ser_error<E: serde::ser::Error>(err: Error) -> E {
    E::custom(err)
}

/// Walks the item headers of `data`, returning the offset just past the
/// first complete item.
fn scan_item(data: &[u8]) -> std::result::Result<usize, CodecError> {
    let mut decoder = Decoder::from(data);
    // Items still owed by each open container, `None` when indefinite.
    let mut open: Vec<Option<u64>> = Vec::new();
    let mut chunk = [0u8; 64];

    loop {
        let header = decoder.pull().map_err(|err| scan_error(err, data))?;

        let complete = match header {
            Header::Array(Some(0)) | Header::Map(Some(0)) => true,
            Header::Array(len) => {
                open.push(len.map(|n| n as u64));
                false
            }
            Header::Map(len) => {
                open.push(len.map(|n| (n as u64).saturating_mul(2)));
                false
            }
            Header::Tag(_) => {
                open.push(Some(1));
                false
            }
            Header::Break => match open.last() {
                Some(None) => {
                    open.pop();
                    true
                }
                _ => return Err(CodecError::UnexpectedBreak),
            },
            Header::Bytes(len) => {
                let mut segments = decoder.bytes(len);
                while let Some(mut segment) = segments.pull().map_err(|err| scan_error(err, data))? {
                    while segment.pull(&mut chunk).map_err(|err| scan_error(err, data))?.is_some() {}
                }
                true
            }
            Header::Text(len) => {
                let mut segments = decoder.text(len);
                while let Some(mut segment) = segments.pull().map_err(|err| scan_error(err, data))? {
                    while segment.pull(&mut chunk).map_err(|err| scan_error(err, data))?.is_some() {}
                }
                true
            }
            _ => true,
        };

        if !complete {
            continue;
        }

        loop {
            match open.last_mut() {
                None => return Ok(decoder.offset()),
                Some(None) => break,
                Some(Some(remaining)) => {
                    *remaining -= 1;
                    if *remaining > 0 {
                        break;
                    }
                    open.pop();
                }
            }
        }
    }
}

fn scan_error(err: ciborium_ll::Error<std::io::Error>, data: &[u8]) -> CodecError {
    match err {
        ciborium_ll::Error::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            CodecError::UnexpectedEof
        }
        ciborium_ll::Error::Io(err) => CodecError::Io(err.to_string()),
        ciborium_ll::Error::Syntax(offset) => match data.get(offset) {
            Some(&initial) => {
                let (major, info) = (initial >> 5, initial & 0x1f);
                if (28..=30).contains(&info) || (info == 31 && matches!(major, 0 | 1 | 6)) {
                    CodecError::InvalidAdditionalInfo { major, info }
                } else {
                    CodecError::Syntax(offset)
                }
            }
            None => CodecError::Syntax(offset),
        },
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_break_code() {
        let err = from_cbor::<Value>(&[0xff, 0xff]).unwrap_err();

        assert_eq!(err.to_string(), "cbor: unexpected \"break\" code");
    }

    #[test]
    fn test_truncated() {
        let err = from_cbor::<Value>(&[0x82, 0x01]).unwrap_err();

        assert_eq!(err.to_string(), "cbor: unexpected EOF");
    }

    #[test]
    fn test_extraneous_data() {
        let err = from_cbor::<Value>(&[0x01, 0x02]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "cbor: 1 bytes of extraneous data starting at index 1"
        );
    }

    #[test]
    fn test_extraneous_after_tagged_empty_array() {
        let bytes = vec![
            0xc1, // tag(1)
              0x80, // array(0)
            0x00,
        ];

        let err = from_cbor::<Value>(&bytes).unwrap_err();

        assert_eq!(
            err.to_string(),
            "cbor: 1 bytes of extraneous data starting at index 2"
        );
    }

    #[test]
    fn test_wrong_chunk_type() {
        let bytes = vec![
            0x5f,             // bytes(*)
              0x61, 0x61,     // "a"
              0xff,
        ];

        let err = from_cbor::<Value>(&bytes).unwrap_err();

        assert!(matches!(err, Error::Codec(CodecError::Syntax(_))), "{err}");
    }

    #[test]
    fn test_reserved_additional_info() {
        let err = from_cbor::<Value>(&[0x1c]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "cbor: invalid additional information 28 for type 0"
        );
    }

    #[test]
    fn test_duplicate_key() {
        let bytes = vec![
            0xa2, // map(2)
              0x01, 0x01,
              0x01, 0x02,
        ];

        let err = from_cbor::<Value>(&bytes).unwrap_err();

        assert_eq!(err.to_string(), "cbor: found duplicate map key 1");

        let lenient = DecodeOptions {
            reject_duplicate_keys: false,
            ..Default::default()
        };
        assert!(from_cbor_with::<Value>(&bytes, &lenient).is_ok());
    }

    #[test]
    fn test_nesting_limit() {
        let opts = DecodeOptions {
            max_nesting: 2,
            ..Default::default()
        };

        let err = from_cbor_with::<Value>(&[0x81, 0x81, 0x81, 0x01], &opts).unwrap_err();

        assert_eq!(err.to_string(), "cbor: exceeded max nested level 2");
    }

    #[test]
    fn test_canonical_order_and_definite_lengths() {
        let mut map: BTreeMap<String, i32> = BTreeMap::new();
        map.insert("bb".to_string(), 2);
        map.insert("a".to_string(), 1);
        map.insert("c".to_string(), 3);

        let mut entries = vec![];
        for (k, v) in map.iter().rev() {
            entries.push((Value::Text(k.clone()), Value::Integer((*v).into())));
        }
        entries.push((Value::Integer(10.into()), Value::Null));
        entries.push((Value::Integer((-1).into()), Value::Null));

        let actual = to_cbor(&Value::Map(entries)).unwrap();

        let expected = vec![
            0xa5,
              0x0a, 0xf6,             // 10: null
              0x20, 0xf6,             // -1: null
              0x61, 0x61, 0x01,       // "a": 1
              0x61, 0x63, 0x03,       // "c": 3
              0x62, 0x62, 0x62, 0x02, // "bb": 2
        ];

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_indefinite_input_accepted() {
        let bytes = vec![
            0xbf,       // map(*)
              0x01,
              0x9f,     // array(*)
                0x01,
                0xff,
              0xff,
        ];

        let value: Value = from_cbor(&bytes).unwrap();
        let reencoded = to_cbor(&value).unwrap();

        assert_eq!(reencoded, vec![0xa1, 0x01, 0x81, 0x01]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let value = Value::Map(vec![
            (Value::Integer(2.into()), Value::Text("two".to_string())),
            (Value::Integer(0.into()), Value::Bytes(vec![0, 1])),
        ]);

        assert_eq!(to_cbor(&value).unwrap(), to_cbor(&value).unwrap());
    }

    #[test]
    fn test_canonicalize_rejects_duplicates() {
        let value = Value::Map(vec![
            (Value::Integer(1.into()), Value::Null),
            (Value::Integer(1.into()), Value::Bool(true)),
        ]);

        assert!(to_cbor(&value).is_err());
    }
}
