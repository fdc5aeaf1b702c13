// SPDX-License-Identifier: MIT

//! Deterministic CBOR and JSON codecs.
//!
//! CBOR output is canonical: map keys sorted by the length and then the bytes
//! of their encoding, every item definite-length. Decoding accepts
//! indefinite-length items, rejects duplicate map keys and trailing data, and
//! reports malformed input in the same terms regardless of the target type.
//!
//! JSON uses string keys, `{"type": ..., "value": ...}` objects for type
//! choices, RFC 3339 times and standard base64 for byte strings.

mod bytes;
mod cbor;
mod json;
pub mod keys;
pub mod tags;
pub mod time;

pub use bytes::Bytes;
pub use cbor::{canonicalize, from_cbor, from_cbor_with, to_cbor, DecodeOptions};
pub use json::{from_json, to_json, to_json_pretty};
pub use keys::{Key, MapKey};
pub use time::Time;

pub(crate) use bytes::{base64_decode, base64_encode};
pub(crate) use cbor::{
    de_error, describe, expect_bytes, expect_integer, expect_text, from_value, ser_error,
    to_value,
};
pub(crate) use json::{expect_json_str, json_describe};
