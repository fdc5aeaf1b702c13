// SPDX-License-Identifier: MIT

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::codec::{from_cbor, from_json, to_cbor, to_json};

/// Asserts the exact CBOR bytes and JSON text of `value`, and that both
/// decode back to it.
pub(crate) struct SerdeTestCase<T> {
    pub(crate) value: T,
    pub(crate) expected_json: &'static str,
    pub(crate) expected_cbor: Vec<u8>,
}

impl<T> SerdeTestCase<T>
where
    T: Debug + Serialize + DeserializeOwned + PartialEq,
{
    pub(crate) fn run(&self) {
        let actual_cbor = to_cbor(&self.value).unwrap();

        assert_eq!(actual_cbor, self.expected_cbor);

        let value_de: T = from_cbor(actual_cbor.as_slice()).unwrap();

        assert_eq!(value_de, self.value);

        let actual_json = String::from_utf8(to_json(&self.value).unwrap()).unwrap();

        assert_eq!(actual_json, self.expected_json);

        let value_de: T = from_json(actual_json.as_bytes()).unwrap();

        assert_eq!(value_de, self.value);
    }
}
