// SPDX-License-Identifier: MIT

//! Time values: RFC 3339 text in JSON, tagged time in CBOR.
//!
//! Whole seconds are emitted as a tag 1 integer. Anything finer goes out as
//! tag 0 text so nanoseconds survive. Decoding also accepts tag 1 floats;
//! untagged times are rejected.

use chrono::{DateTime, SecondsFormat, Utc};
use ciborium::value::Value;
use derive_more::{Deref, From};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{
    cbor::describe,
    tags::{TAG_EPOCH_TIME, TAG_RFC3339_TIME},
};
use crate::{error::Error, result::Result};

/// A point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Deref)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    /// Builds a time from epoch seconds and nanoseconds.
    pub fn from_timestamp(secs: i64, nanos: u32) -> Result<Self> {
        DateTime::from_timestamp(secs, nanos)
            .map(Time)
            .ok_or_else(|| Error::invalid(format!("time {secs}.{nanos:09} out of range")))
    }

    pub fn parse_rfc3339(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s)
            .map(|t| Time(t.with_timezone(&Utc)))
            .map_err(|err| Error::invalid(format!("invalid RFC 3339 time {s:?}: {err}")))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub(crate) fn to_cbor_value(self) -> Value {
        if self.0.timestamp_subsec_nanos() == 0 {
            let secs = self.0.timestamp();
            Value::Tag(TAG_EPOCH_TIME, Box::new(Value::Integer(secs.into())))
        } else {
            Value::Tag(TAG_RFC3339_TIME, Box::new(Value::Text(self.to_rfc3339())))
        }
    }

    pub(crate) fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_EPOCH_TIME, inner) => match *inner {
                Value::Integer(i) => {
                    let secs = i64::try_from(i)
                        .map_err(|_| Error::invalid("epoch time out of range"))?;
                    Self::from_timestamp(secs, 0)
                }
                Value::Float(f) if f.is_finite() => {
                    let secs = f.floor();
                    let nanos = ((f - secs) * 1e9).round() as u32;
                    if nanos >= 1_000_000_000 {
                        Self::from_timestamp(secs as i64 + 1, 0)
                    } else {
                        Self::from_timestamp(secs as i64, nanos)
                    }
                }
                other => Err(Error::invalid(format!(
                    "epoch time: unexpected {}",
                    describe(&other)
                ))),
            },
            Value::Tag(TAG_RFC3339_TIME, inner) => match *inner {
                Value::Text(s) => Self::parse_rfc3339(&s),
                other => Err(Error::invalid(format!(
                    "RFC 3339 time: unexpected {}",
                    describe(&other)
                ))),
            },
            other => Err(Error::invalid(format!(
                "time must be tagged with 0 or 1, found {}",
                describe(&other)
            ))),
        }
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_rfc3339())
        } else {
            self.to_cbor_value().serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Time::parse_rfc3339(&s).map_err(super::de_error)
        } else {
            let value = Value::deserialize(deserializer)?;
            Time::from_cbor_value(value).map_err(super::de_error)
        }
    }
}
