// SPDX-License-Identifier: MIT

//! Measurements: a key naming what was measured and the values observed or
//! expected for it.

use std::{collections::BTreeMap, fmt, net::IpAddr as StdIpAddr, sync::Arc};

use ciborium::Value;
use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use super::cryptokey::CryptoKeyTypeChoice;
use crate::{
    codec::{
        base64_decode, base64_encode, describe, expect_bytes, expect_json_str,
        from_value, json_describe,
        tags::{
            TAG_BYTES, TAG_MASKED_RAW_VALUE, TAG_MIN_SVN, TAG_NUMERIC_EXPRESSION, TAG_OID,
            TAG_PSA_REFVAL_ID, TAG_SVN, TAG_UUID,
        },
        to_value, Bytes, Key, MapKey,
    },
    core::{valid_digests, Digest, OidType, UeidType, UuidType, VersionScheme},
    error::{Error, TypeChoiceError},
    extensions::{Extensible, ExtensionShape, ExtensionValue, Extensions},
    numbers::{Number, NumericExpression},
    result::Result,
    type_choice::{ChoiceExtension, TypeChoice},
    valid::{valid_each, ResultExt, Valid},
};

/// The PSA reference-value identifier (tag 601).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsaRefValId {
    pub label: Option<String>,
    pub version: Option<String>,
    pub signer_id: Bytes,
}

impl PsaRefValId {
    pub const LABEL: Key = Key::new(1, "label");
    pub const VERSION: Key = Key::new(4, "version");
    pub const SIGNER_ID: Key = Key::new(5, "signer-id");

    pub const KEYS: &'static [Key] = &[Self::LABEL, Self::VERSION, Self::SIGNER_ID];
}

impl Valid for PsaRefValId {
    fn valid(&self) -> Result<()> {
        match self.signer_id.len() {
            32 | 48 | 64 => Ok(()),
            n => Err(Error::invalid(format!(
                "invalid signer-id length {n}: want 32, 48 or 64 bytes"
            ))),
        }
    }
}

impl Serialize for PsaRefValId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(label) = &self.label {
            Self::LABEL.serialize_entry(&mut map, hr, label)?;
        }
        if let Some(version) = &self.version {
            Self::VERSION.serialize_entry(&mut map, hr, version)?;
        }
        Self::SIGNER_ID.serialize_entry(&mut map, hr, &self.signer_id)?;

        map.end()
    }
}

impl<'de> Deserialize<'de> for PsaRefValId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PsaRefValIdVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for PsaRefValIdVisitor {
            type Value = PsaRefValId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing PsaRefValId fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut id = PsaRefValId::default();
                let mut signer_id = None;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, PsaRefValId::KEYS) {
                        Some(PsaRefValId::LABEL) => id.label = Some(map.next_value()?),
                        Some(PsaRefValId::VERSION) => id.version = Some(map.next_value()?),
                        Some(PsaRefValId::SIGNER_ID) => signer_id = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!(
                                "unexpected psa.refval-id key {key}"
                            )))
                        }
                    }
                }

                id.signer_id = signer_id.ok_or_else(|| de::Error::missing_field("signer-id"))?;
                Ok(id)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(PsaRefValIdVisitor { is_human_readable })
    }
}

/// Names the measured element.
#[derive(Debug, Clone, PartialEq)]
pub enum MkeyTypeChoice {
    Uuid(UuidType),
    Oid(OidType),
    Tstr(String),
    Uint(u64),
    PsaRefValId(PsaRefValId),
    Extension(ChoiceExtension),
}

impl TypeChoice for MkeyTypeChoice {
    const CHOICE: &'static str = "Mkey";
    const TYPE_NAMES: &'static [&'static str] = &["uuid", "oid", "string", "uint", "psa.refval-id"];
    const TAGS: &'static [u64] = &[TAG_UUID, TAG_OID, TAG_PSA_REFVAL_ID];

    fn type_name(&self) -> &str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::Oid(_) => "oid",
            Self::Tstr(_) => "string",
            Self::Uint(_) => "uint",
            Self::PsaRefValId(_) => "psa.refval-id",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Uuid(u) => u.to_tagged_value(),
            Self::Oid(o) => o.to_tagged_value(),
            Self::Tstr(s) => Value::Text(s.clone()),
            Self::Uint(u) => Value::Integer((*u).into()),
            Self::PsaRefValId(id) => Value::Tag(TAG_PSA_REFVAL_ID, Box::new(to_value(id)?)),
            Self::Extension(ext) => ext.to_cbor_value(),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_UUID, inner) => {
                UuidType::try_from(expect_bytes(*inner, "uuid")?.as_slice()).map(Self::Uuid)
            }
            Value::Tag(TAG_OID, inner) => {
                OidType::from_ber(&expect_bytes(*inner, "oid")?).map(Self::Oid)
            }
            Value::Tag(TAG_PSA_REFVAL_ID, inner) => from_value(*inner).map(Self::PsaRefValId),
            Value::Text(s) => Ok(Self::Tstr(s)),
            Value::Integer(i) => u64::try_from(i)
                .map(Self::Uint)
                .map_err(|_| Error::invalid("mkey must be an unsigned integer")),
            other @ Value::Tag(..) => {
                ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension)
            }
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::Oid(o) => serde_json::Value::String(o.to_string()),
            Self::Tstr(s) => serde_json::Value::String(s.clone()),
            Self::Uint(u) => (*u).into(),
            Self::PsaRefValId(id) => serde_json::to_value(id)?,
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "uuid" => UuidType::parse(&expect_json_str(value, type_name)?).map(Self::Uuid),
            "oid" => OidType::parse(&expect_json_str(value, type_name)?).map(Self::Oid),
            "string" => expect_json_str(value, type_name).map(Self::Tstr),
            "uint" => value.as_u64().map(Self::Uint).ok_or_else(|| {
                Error::invalid(format!("uint: expected unsigned integer, found {}", json_describe(&value)))
            }),
            "psa.refval-id" => Ok(Self::PsaRefValId(serde_json::from_value(value)?)),
            other => ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension),
        }
    }
}

impl Valid for MkeyTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Tstr(s) if s.is_empty() => Err(Error::invalid("empty string key")),
            Self::PsaRefValId(id) => id.valid(),
            Self::Extension(ext) => ext.valid(),
            _ => Ok(()),
        }
    }
}

impl_type_choice_serde!(MkeyTypeChoice);

choice_accessors!(MkeyTypeChoice {
    get_uuid => Uuid(UuidType),
    get_oid => Oid(OidType),
    get_string => Tstr(String),
    get_uint => Uint(u64),
    get_psa_refval_id => PsaRefValId(PsaRefValId),
});

/// A security version number, exact or as a lower bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SvnTypeChoice {
    ExactValue(u64),
    MinValue(u64),
    NumericExpression(NumericExpression),
}

impl TypeChoice for SvnTypeChoice {
    const CHOICE: &'static str = "SVN";
    const TYPE_NAMES: &'static [&'static str] = &["exact-value", "min-value", "numeric-expression"];
    const TAGS: &'static [u64] = &[TAG_SVN, TAG_MIN_SVN, TAG_NUMERIC_EXPRESSION];

    fn type_name(&self) -> &str {
        match self {
            Self::ExactValue(_) => "exact-value",
            Self::MinValue(_) => "min-value",
            Self::NumericExpression(_) => "numeric-expression",
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::ExactValue(v) => Value::Tag(TAG_SVN, Box::new(Value::Integer((*v).into()))),
            Self::MinValue(v) => Value::Tag(TAG_MIN_SVN, Box::new(Value::Integer((*v).into()))),
            Self::NumericExpression(expr) => expr.to_cbor_value()?,
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        let uint = |value: Value| -> Result<u64> {
            match value {
                Value::Integer(i) => {
                    u64::try_from(i).map_err(|_| Error::invalid("svn must be an unsigned integer"))
                }
                other => Err(Error::invalid(format!(
                    "svn: expected integer, found {}",
                    describe(&other)
                ))),
            }
        };

        match value {
            v @ Value::Integer(_) => uint(v).map(Self::ExactValue),
            Value::Tag(TAG_SVN, inner) => uint(*inner).map(Self::ExactValue),
            Value::Tag(TAG_MIN_SVN, inner) => uint(*inner).map(Self::MinValue),
            Value::Tag(TAG_NUMERIC_EXPRESSION, inner) => {
                NumericExpression::from_cbor_content(*inner).map(Self::NumericExpression)
            }
            Value::Tag(tag, _) => Err(TypeChoiceError::UnknownTag {
                choice: Self::CHOICE,
                tag,
            }
            .into()),
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::ExactValue(v) | Self::MinValue(v) => (*v).into(),
            Self::NumericExpression(expr) => serde_json::to_value(expr)?,
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        let uint = |value: &serde_json::Value| -> Result<u64> {
            value.as_u64().ok_or_else(|| {
                Error::invalid(format!(
                    "{type_name}: expected unsigned integer, found {}",
                    json_describe(value)
                ))
            })
        };

        match type_name {
            "exact-value" => uint(&value).map(Self::ExactValue),
            "min-value" => uint(&value).map(Self::MinValue),
            "numeric-expression" => Ok(Self::NumericExpression(serde_json::from_value(value)?)),
            other => Err(TypeChoiceError::UnknownType {
                choice: Self::CHOICE,
                name: other.to_string(),
            }
            .into()),
        }
    }
}

impl Valid for SvnTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::NumericExpression(expr) => match expr.operand {
                Number::Uint(_) => Ok(()),
                other => Err(Error::invalid(format!(
                    "svn operand must be an unsigned integer, got {}",
                    other.type_name()
                ))),
            },
            _ => Ok(()),
        }
    }
}

impl_type_choice_serde!(SvnTypeChoice);

/// A raw measured value, optionally masked.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValueTypeChoice {
    Bytes(Bytes),
    MaskedBytes { value: Bytes, mask: Bytes },
}

impl TypeChoice for RawValueTypeChoice {
    const CHOICE: &'static str = "RawValue";
    const TYPE_NAMES: &'static [&'static str] = &["bytes", "masked-bytes"];
    const TAGS: &'static [u64] = &[TAG_BYTES, TAG_MASKED_RAW_VALUE];

    fn type_name(&self) -> &str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::MaskedBytes { .. } => "masked-bytes",
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Bytes(b) => Value::Tag(TAG_BYTES, Box::new(Value::Bytes(b.to_vec()))),
            Self::MaskedBytes { value, mask } => Value::Tag(
                TAG_MASKED_RAW_VALUE,
                Box::new(Value::Array(vec![
                    Value::Bytes(value.to_vec()),
                    Value::Bytes(mask.to_vec()),
                ])),
            ),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_BYTES, inner) => Ok(Self::Bytes(expect_bytes(*inner, "raw-value")?.into())),
            Value::Tag(TAG_MASKED_RAW_VALUE, inner) => match *inner {
                Value::Array(items) if items.len() == 2 => {
                    let mut items = items.into_iter();
                    let (Some(value), Some(mask)) = (items.next(), items.next()) else {
                        return Err(Error::invalid("masked-bytes: expected [value, mask]"));
                    };
                    Ok(Self::MaskedBytes {
                        value: expect_bytes(value, "masked-bytes value")?.into(),
                        mask: expect_bytes(mask, "masked-bytes mask")?.into(),
                    })
                }
                other => Err(Error::invalid(format!(
                    "masked-bytes: expected [value, mask], found {}",
                    describe(&other)
                ))),
            },
            Value::Tag(tag, _) => Err(TypeChoiceError::UnknownTag {
                choice: Self::CHOICE,
                tag,
            }
            .into()),
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Bytes(b) => serde_json::Value::String(base64_encode(b)),
            Self::MaskedBytes { value, mask } => serde_json::json!({
                "value": base64_encode(value),
                "mask": base64_encode(mask),
            }),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "bytes" => base64_decode(&expect_json_str(value, type_name)?).map(|b| Self::Bytes(b.into())),
            "masked-bytes" => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Masked {
                    value: Bytes,
                    mask: Bytes,
                }

                let masked: Masked = serde_json::from_value(value)?;
                Ok(Self::MaskedBytes {
                    value: masked.value,
                    mask: masked.mask,
                })
            }
            other => Err(TypeChoiceError::UnknownType {
                choice: Self::CHOICE,
                name: other.to_string(),
            }
            .into()),
        }
    }
}

impl Valid for RawValueTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Bytes(_) => Ok(()),
            Self::MaskedBytes { value, mask } if value.len() != mask.len() => {
                Err(Error::invalid(format!(
                    "value length {} does not match mask length {}",
                    value.len(),
                    mask.len()
                )))
            }
            Self::MaskedBytes { .. } => Ok(()),
        }
    }
}

impl_type_choice_serde!(RawValueTypeChoice);

/// A version string and the scheme it follows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionMap {
    pub version: String,
    pub scheme: Option<VersionScheme>,
}

impl VersionMap {
    pub const VERSION: Key = Key::new(0, "value");
    pub const SCHEME: Key = Key::new(1, "scheme");

    pub const KEYS: &'static [Key] = &[Self::VERSION, Self::SCHEME];
}

impl Valid for VersionMap {
    fn valid(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::invalid("empty version"));
        }
        Ok(())
    }
}

impl Serialize for VersionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        Self::VERSION.serialize_entry(&mut map, hr, &self.version)?;
        if let Some(scheme) = &self.scheme {
            Self::SCHEME.serialize_entry(&mut map, hr, scheme)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for VersionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct VersionMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for VersionMapVisitor {
            type Value = VersionMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing VersionMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut version = None;
                let mut scheme = None;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, VersionMap::KEYS) {
                        Some(VersionMap::VERSION) => version = Some(map.next_value()?),
                        Some(VersionMap::SCHEME) => scheme = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!("unexpected version key {key}")))
                        }
                    }
                }

                Ok(VersionMap {
                    version: version.ok_or_else(|| de::Error::missing_field("value"))?,
                    scheme,
                })
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(VersionMapVisitor { is_human_readable })
    }
}

/// An EUI-48 or EUI-64 address; colon-separated hex in JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddr(Vec<u8>);

impl MacAddr {
    pub fn new(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            6 | 8 => Ok(Self(bytes.to_vec())),
            n => Err(Error::invalid(format!(
                "invalid MAC address length {n}: want 6 or 8 bytes"
            ))),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s
            .split(|c| c == ':' || c == '-')
            .map(|octet| {
                if octet.len() != 2 {
                    return Err(Error::invalid(format!("invalid MAC address {s:?}")));
                }
                u8::from_str_radix(octet, 16)
                    .map_err(|_| Error::invalid(format!("invalid MAC address {s:?}")))
            })
            .collect::<Result<Vec<u8>>>()?;

        Self::new(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octets: Vec<String> = self.0.iter().map(|b| format!("{b:02x}")).collect();
        f.write_str(&octets.join(":"))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::parse(&s).map_err(de::Error::custom)
        } else {
            let bytes = Bytes::deserialize(deserializer)?;
            Self::new(&bytes).map_err(de::Error::custom)
        }
    }
}

/// An IPv4 or IPv6 address; 4 or 16 bytes in CBOR, text in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAddr(pub StdIpAddr);

impl IpAddr {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
            return Ok(Self(StdIpAddr::from(v4)));
        }
        if let Ok(v6) = <[u8; 16]>::try_from(bytes) {
            return Ok(Self(StdIpAddr::from(v6)));
        }
        Err(Error::invalid(format!(
            "invalid IP address length {}: want 4 or 16 bytes",
            bytes.len()
        )))
    }

    pub fn octets(&self) -> Vec<u8> {
        match self.0 {
            StdIpAddr::V4(v4) => v4.octets().to_vec(),
            StdIpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }
}

impl Serialize for IpAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0.to_string())
        } else {
            serializer.serialize_bytes(&self.octets())
        }
    }
}

impl<'de> Deserialize<'de> for IpAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse::<StdIpAddr>()
                .map(Self)
                .map_err(|err| de::Error::custom(format!("invalid IP address {s:?}: {err}")))
        } else {
            let bytes = Bytes::deserialize(deserializer)?;
            Self::from_bytes(&bytes).map_err(de::Error::custom)
        }
    }
}

/// Boolean security properties of an environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagsMap {
    pub is_configured: Option<bool>,
    pub is_secure: Option<bool>,
    pub is_recovery: Option<bool>,
    pub is_debug: Option<bool>,
    pub is_replay_protected: Option<bool>,
    pub is_integrity_protected: Option<bool>,
    pub is_runtime_meas: Option<bool>,
    pub is_immutable: Option<bool>,
    pub is_tcb: Option<bool>,
    pub is_confidentiality_protected: Option<bool>,
    pub extensions: Extensions,
}

impl FlagsMap {
    pub const IS_CONFIGURED: Key = Key::new(0, "is-configured");
    pub const IS_SECURE: Key = Key::new(1, "is-secure");
    pub const IS_RECOVERY: Key = Key::new(2, "is-recovery");
    pub const IS_DEBUG: Key = Key::new(3, "is-debug");
    pub const IS_REPLAY_PROTECTED: Key = Key::new(4, "is-replay-protected");
    pub const IS_INTEGRITY_PROTECTED: Key = Key::new(5, "is-integrity-protected");
    pub const IS_RUNTIME_MEAS: Key = Key::new(6, "is-runtime-meas");
    pub const IS_IMMUTABLE: Key = Key::new(7, "is-immutable");
    pub const IS_TCB: Key = Key::new(8, "is-tcb");
    pub const IS_CONFIDENTIALITY_PROTECTED: Key = Key::new(9, "is-confidentiality-protected");

    fn fields(&self) -> [(Key, Option<bool>); 10] {
        [
            (Self::IS_CONFIGURED, self.is_configured),
            (Self::IS_SECURE, self.is_secure),
            (Self::IS_RECOVERY, self.is_recovery),
            (Self::IS_DEBUG, self.is_debug),
            (Self::IS_REPLAY_PROTECTED, self.is_replay_protected),
            (Self::IS_INTEGRITY_PROTECTED, self.is_integrity_protected),
            (Self::IS_RUNTIME_MEAS, self.is_runtime_meas),
            (Self::IS_IMMUTABLE, self.is_immutable),
            (Self::IS_TCB, self.is_tcb),
            (Self::IS_CONFIDENTIALITY_PROTECTED, self.is_confidentiality_protected),
        ]
    }

    fn field_mut(&mut self, key: Key) -> Option<&mut Option<bool>> {
        Some(match key {
            Self::IS_CONFIGURED => &mut self.is_configured,
            Self::IS_SECURE => &mut self.is_secure,
            Self::IS_RECOVERY => &mut self.is_recovery,
            Self::IS_DEBUG => &mut self.is_debug,
            Self::IS_REPLAY_PROTECTED => &mut self.is_replay_protected,
            Self::IS_INTEGRITY_PROTECTED => &mut self.is_integrity_protected,
            Self::IS_RUNTIME_MEAS => &mut self.is_runtime_meas,
            Self::IS_IMMUTABLE => &mut self.is_immutable,
            Self::IS_TCB => &mut self.is_tcb,
            Self::IS_CONFIDENTIALITY_PROTECTED => &mut self.is_confidentiality_protected,
            _ => return None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none()) && self.extensions.is_empty()
    }
}

impl Extensible for FlagsMap {
    const NAME: &'static str = "flags";
    const KEYS: &'static [Key] = &[
        Self::IS_CONFIGURED,
        Self::IS_SECURE,
        Self::IS_RECOVERY,
        Self::IS_DEBUG,
        Self::IS_REPLAY_PROTECTED,
        Self::IS_INTEGRITY_PROTECTED,
        Self::IS_RUNTIME_MEAS,
        Self::IS_IMMUTABLE,
        Self::IS_TCB,
        Self::IS_CONFIDENTIALITY_PROTECTED,
    ];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for FlagsMap {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("no flag set"));
        }
        self.extensions.valid()
    }
}

impl Serialize for FlagsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        for (key, value) in self.fields() {
            if let Some(value) = value {
                key.serialize_entry(&mut map, hr, &value)?;
            }
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlagsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FlagsMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for FlagsMapVisitor {
            type Value = FlagsMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing FlagsMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut flags = FlagsMap::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    let slot = key
                        .resolve(self.is_human_readable, FlagsMap::KEYS)
                        .and_then(|k| flags.field_mut(k));

                    match slot {
                        Some(slot) => *slot = Some(map.next_value()?),
                        None => flags
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(crate::codec::de_error)?,
                    }
                }

                Ok(flags)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(FlagsMapVisitor { is_human_readable })
    }
}

/// Identifies an integrity register by index or name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegisterId {
    Uint(u64),
    Text(String),
}

impl Serialize for RegisterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Uint(u) if serializer.is_human_readable() => {
                serializer.serialize_str(&u.to_string())
            }
            Self::Uint(u) => serializer.serialize_u64(*u),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for RegisterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RegisterIdVisitor {
            is_human_readable: bool,
        }

        impl Visitor<'_> for RegisterIdVisitor {
            type Value = RegisterId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an unsigned integer or text register id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                Ok(RegisterId::Uint(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                u64::try_from(v)
                    .map(RegisterId::Uint)
                    .map_err(|_| E::custom(format!("negative register id {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                match v.parse::<u64>() {
                    Ok(u) if self.is_human_readable => Ok(RegisterId::Uint(u)),
                    _ => Ok(RegisterId::Text(v.to_string())),
                }
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_any(RegisterIdVisitor { is_human_readable })
    }
}

/// Digests held in each integrity register.
pub type IntegrityRegisters = BTreeMap<RegisterId, Vec<Digest>>;

/// The values of a measurement. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementValuesMap {
    pub version: Option<VersionMap>,
    pub svn: Option<SvnTypeChoice>,
    pub digests: Option<Vec<Digest>>,
    pub flags: Option<FlagsMap>,
    pub raw_value: Option<RawValueTypeChoice>,
    pub raw_value_mask: Option<Bytes>,
    pub mac_addr: Option<MacAddr>,
    pub ip_addr: Option<IpAddr>,
    pub serial_number: Option<String>,
    pub ueid: Option<UeidType>,
    pub uuid: Option<UuidType>,
    pub name: Option<String>,
    pub cryptokeys: Option<Vec<CryptoKeyTypeChoice>>,
    pub integrity_registers: Option<IntegrityRegisters>,
    pub extensions: Extensions,
}

impl MeasurementValuesMap {
    pub const VERSION: Key = Key::new(0, "version");
    pub const SVN: Key = Key::new(1, "svn");
    pub const DIGESTS: Key = Key::new(2, "digests");
    pub const FLAGS: Key = Key::new(3, "flags");
    pub const RAW_VALUE: Key = Key::new(4, "raw-value");
    pub const RAW_VALUE_MASK: Key = Key::new(5, "raw-value-mask");
    pub const MAC_ADDR: Key = Key::new(6, "mac-addr");
    pub const IP_ADDR: Key = Key::new(7, "ip-addr");
    pub const SERIAL_NUMBER: Key = Key::new(8, "serial-number");
    pub const UEID: Key = Key::new(9, "ueid");
    pub const UUID: Key = Key::new(10, "uuid");
    pub const MEASURED_NAME: Key = Key::new(11, "name");
    pub const CRYPTOKEYS: Key = Key::new(13, "cryptokeys");
    pub const INTEGRITY_REGISTERS: Key = Key::new(14, "integrity-registers");

    pub fn with_digests(digests: Vec<Digest>) -> Self {
        Self {
            digests: Some(digests),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.svn.is_none()
            && self.digests.is_none()
            && self.flags.is_none()
            && self.raw_value.is_none()
            && self.raw_value_mask.is_none()
            && self.mac_addr.is_none()
            && self.ip_addr.is_none()
            && self.serial_number.is_none()
            && self.ueid.is_none()
            && self.uuid.is_none()
            && self.name.is_none()
            && self.cryptokeys.is_none()
            && self.integrity_registers.is_none()
            && self.extensions.is_empty()
    }
}

impl Extensible for MeasurementValuesMap {
    const NAME: &'static str = "measurement-values-map";
    const KEYS: &'static [Key] = &[
        Self::VERSION,
        Self::SVN,
        Self::DIGESTS,
        Self::FLAGS,
        Self::RAW_VALUE,
        Self::RAW_VALUE_MASK,
        Self::MAC_ADDR,
        Self::IP_ADDR,
        Self::SERIAL_NUMBER,
        Self::UEID,
        Self::UUID,
        Self::MEASURED_NAME,
        Self::CRYPTOKEYS,
        Self::INTEGRITY_REGISTERS,
    ];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for MeasurementValuesMap {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("no measurement value set"));
        }

        if let Some(version) = &self.version {
            version.valid().context("version")?;
        }
        if let Some(svn) = &self.svn {
            svn.valid().context("svn")?;
        }
        if let Some(digests) = &self.digests {
            valid_digests(digests).context("digests")?;
        }
        if let Some(flags) = &self.flags {
            flags.valid().context("flags")?;
        }
        if let Some(raw_value) = &self.raw_value {
            raw_value.valid().context("raw-value")?;
        }
        if let Some(ueid) = &self.ueid {
            ueid.valid().context("ueid")?;
        }
        if let Some(cryptokeys) = &self.cryptokeys {
            crate::valid::non_empty(cryptokeys, "no cryptokeys").context("cryptokeys")?;
            valid_each(cryptokeys, "cryptokey").context("cryptokeys")?;
        }
        if let Some(registers) = &self.integrity_registers {
            for (id, digests) in registers {
                valid_digests(digests)
                    .with_context(|| format!("integrity-registers: register {id:?}"))?;
            }
        }

        self.extensions.valid().context("extensions")
    }
}

impl Serialize for MeasurementValuesMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(v) = &self.version {
            Self::VERSION.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.svn {
            Self::SVN.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.digests {
            Self::DIGESTS.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.flags {
            Self::FLAGS.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.raw_value {
            Self::RAW_VALUE.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.raw_value_mask {
            Self::RAW_VALUE_MASK.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.mac_addr {
            Self::MAC_ADDR.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.ip_addr {
            Self::IP_ADDR.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.serial_number {
            Self::SERIAL_NUMBER.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.ueid {
            Self::UEID.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.uuid {
            Self::UUID.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.name {
            Self::MEASURED_NAME.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.cryptokeys {
            Self::CRYPTOKEYS.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.integrity_registers {
            Self::INTEGRITY_REGISTERS.serialize_entry(&mut map, hr, v)?;
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for MeasurementValuesMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MvalVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for MvalVisitor {
            type Value = MeasurementValuesMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing MeasurementValuesMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                type M = MeasurementValuesMap;
                let mut mval = M::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, M::KEYS) {
                        Some(M::VERSION) => mval.version = Some(map.next_value()?),
                        Some(M::SVN) => mval.svn = Some(map.next_value()?),
                        Some(M::DIGESTS) => mval.digests = Some(map.next_value()?),
                        Some(M::FLAGS) => mval.flags = Some(map.next_value()?),
                        Some(M::RAW_VALUE) => mval.raw_value = Some(map.next_value()?),
                        Some(M::RAW_VALUE_MASK) => mval.raw_value_mask = Some(map.next_value()?),
                        Some(M::MAC_ADDR) => mval.mac_addr = Some(map.next_value()?),
                        Some(M::IP_ADDR) => mval.ip_addr = Some(map.next_value()?),
                        Some(M::SERIAL_NUMBER) => mval.serial_number = Some(map.next_value()?),
                        Some(M::UEID) => mval.ueid = Some(map.next_value()?),
                        Some(M::UUID) => mval.uuid = Some(map.next_value()?),
                        Some(M::MEASURED_NAME) => mval.name = Some(map.next_value()?),
                        Some(M::CRYPTOKEYS) => mval.cryptokeys = Some(map.next_value()?),
                        Some(M::INTEGRITY_REGISTERS) => {
                            mval.integrity_registers = Some(map.next_value()?)
                        }
                        _ => mval
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(crate::codec::de_error)?,
                    }
                }

                Ok(mval)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(MvalVisitor { is_human_readable })
    }
}

/// A measured element: its key, its values and who may vouch for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementMap {
    pub mkey: Option<MkeyTypeChoice>,
    pub mval: MeasurementValuesMap,
    pub authorized_by: Option<Vec<CryptoKeyTypeChoice>>,
}

impl MeasurementMap {
    pub const MKEY: Key = Key::new(0, "key");
    pub const MVAL: Key = Key::new(1, "value");
    pub const AUTHORIZED_BY: Key = Key::new(2, "authorized-by");

    const OWN_KEYS: &'static [Key] = &[Self::MKEY, Self::MVAL, Self::AUTHORIZED_BY];

    pub fn new(mkey: Option<MkeyTypeChoice>, mval: MeasurementValuesMap) -> Self {
        Self {
            mkey,
            mval,
            authorized_by: None,
        }
    }

    /// Binds `shape` to the measurement's flags, when it has any.
    pub fn register_flags_extensions(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        match self.mval.flags.as_mut() {
            Some(flags) => flags.register_extensions(shape),
            None => Ok(()),
        }
    }
}

/// Extension fields of a measurement live in its values map.
impl Extensible for MeasurementMap {
    const NAME: &'static str = <MeasurementValuesMap as Extensible>::NAME;
    const KEYS: &'static [Key] = <MeasurementValuesMap as Extensible>::KEYS;

    fn extensions(&self) -> &Extensions {
        &self.mval.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.mval.extensions
    }
}

impl Valid for MeasurementMap {
    fn valid(&self) -> Result<()> {
        if let Some(mkey) = &self.mkey {
            mkey.valid().context("invalid measurement key")?;
        }

        self.mval.valid().context("invalid measurement values")?;

        if let Some(keys) = &self.authorized_by {
            valid_each(keys, "authorized-by key")?;
        }

        Ok(())
    }
}

impl Serialize for MeasurementMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(mkey) = &self.mkey {
            Self::MKEY.serialize_entry(&mut map, hr, mkey)?;
        }
        Self::MVAL.serialize_entry(&mut map, hr, &self.mval)?;
        if let Some(keys) = &self.authorized_by {
            Self::AUTHORIZED_BY.serialize_entry(&mut map, hr, keys)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for MeasurementMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MeasurementMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for MeasurementMapVisitor {
            type Value = MeasurementMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing MeasurementMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut m = MeasurementMap::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, MeasurementMap::OWN_KEYS) {
                        Some(MeasurementMap::MKEY) => m.mkey = Some(map.next_value()?),
                        Some(MeasurementMap::MVAL) => m.mval = map.next_value()?,
                        Some(MeasurementMap::AUTHORIZED_BY) => {
                            m.authorized_by = Some(map.next_value()?)
                        }
                        _ => {
                            return Err(de::Error::custom(format!(
                                "unexpected measurement key {key}"
                            )))
                        }
                    }
                }

                Ok(m)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(MeasurementMapVisitor { is_human_readable })
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        codec::{from_cbor, from_json, to_cbor, to_json},
        core::HashAlgorithm,
        extensions::FieldKind,
        numbers::NumericOperator,
    };

    #[test]
    fn test_measurement_with_digest() {
        let m = MeasurementMap::new(
            Some(MkeyTypeChoice::Tstr("firmware".to_string())),
            MeasurementValuesMap::with_digests(vec![Digest::new(
                HashAlgorithm::Sha256_32,
                vec![0x01, 0x02, 0x03, 0x04],
            )]),
        );
        m.valid().unwrap();

        let cbor = to_cbor(&m).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xa2, // map(2)
                  0x00, // key
                    0x68, 0x66, 0x69, 0x72, 0x6d, 0x77, 0x61, 0x72, 0x65,
                  0x01, // value
                    0xa1, // map(1)
                      0x02, // digests
                        0x81, 0x82, 0x06, 0x44, 0x01, 0x02, 0x03, 0x04,
            ]
        );
        assert_eq!(from_cbor::<MeasurementMap>(&cbor).unwrap(), m);

        let json = String::from_utf8(to_json(&m).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"key":{"type":"string","value":"firmware"},"value":{"digests":["sha-256-32;AQIDBA=="]}}"#
        );
        assert_eq!(from_json::<MeasurementMap>(json.as_bytes()).unwrap(), m);
    }

    #[test]
    fn test_empty_mval() {
        let m = MeasurementMap::default();

        assert_eq!(
            m.valid().unwrap_err().to_string(),
            "invalid measurement values: no measurement value set"
        );
    }

    #[test]
    fn test_name_value() {
        let mval = MeasurementValuesMap {
            name: Some("fw".to_string()),
            ..Default::default()
        };
        mval.valid().unwrap();

        let cbor = to_cbor(&mval).unwrap();
        assert_eq!(cbor, vec![0xa1, 0x0b, 0x62, 0x66, 0x77]);
        assert_eq!(from_cbor::<MeasurementValuesMap>(&cbor).unwrap(), mval);
        assert_eq!(to_json(&mval).unwrap(), br#"{"name":"fw"}"#.to_vec());

        // A measurement's extension slot is its values map.
        assert_eq!(<MeasurementMap as Extensible>::NAME, "measurement-values-map");
        assert!(<MeasurementMap as Extensible>::KEYS.contains(&MeasurementValuesMap::MEASURED_NAME));
    }

    #[test]
    fn test_svn() {
        let exact = SvnTypeChoice::ExactValue(2);
        assert_eq!(to_cbor(&exact).unwrap(), vec![0xd9, 0x02, 0x28, 0x02]);
        assert_eq!(from_cbor::<SvnTypeChoice>(&[0x02]).unwrap(), exact);

        let min = SvnTypeChoice::MinValue(5);
        assert_eq!(to_cbor(&min).unwrap(), vec![0xd9, 0x02, 0x29, 0x05]);
        assert_eq!(
            String::from_utf8(to_json(&min).unwrap()).unwrap(),
            r#"{"type":"min-value","value":5}"#
        );

        let expr = SvnTypeChoice::NumericExpression(NumericExpression::new(NumericOperator::Gt, 3u64));
        assert_eq!(
            to_cbor(&expr).unwrap(),
            vec![0xd9, 0x02, 0x35, 0x82, 0x00, 0x03]
        );
        assert_eq!(
            from_cbor::<SvnTypeChoice>(&[0xd9, 0x02, 0x35, 0x82, 0x00, 0x03]).unwrap(),
            expr
        );

        let negative = SvnTypeChoice::NumericExpression(NumericExpression::new(NumericOperator::Gt, -3i64));
        assert!(negative.valid().is_err());
    }

    #[test]
    fn test_masked_raw_value() {
        let raw = RawValueTypeChoice::MaskedBytes {
            value: vec![0x01, 0x02].into(),
            mask: vec![0xff].into(),
        };

        assert_eq!(
            raw.valid().unwrap_err().to_string(),
            "value length 2 does not match mask length 1"
        );

        let raw = RawValueTypeChoice::MaskedBytes {
            value: vec![0x01, 0x02].into(),
            mask: vec![0xff, 0x00].into(),
        };
        let cbor = to_cbor(&raw).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xd9, 0x02, 0x33, // tag(563)
                  0x82, 0x42, 0x01, 0x02, 0x42, 0xff, 0x00,
            ]
        );
        assert_eq!(from_cbor::<RawValueTypeChoice>(&cbor).unwrap(), raw);

        let json = to_json(&raw).unwrap();
        assert_eq!(from_json::<RawValueTypeChoice>(&json).unwrap(), raw);
    }

    #[test]
    fn test_addresses() {
        let mval = MeasurementValuesMap {
            mac_addr: Some(MacAddr::parse("00:11:22:33:44:55").unwrap()),
            ip_addr: Some(IpAddr("192.168.1.13".parse().unwrap())),
            ..Default::default()
        };

        let cbor = to_cbor(&mval).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xa2,
                  0x06, 0x46, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
                  0x07, 0x44, 0xc0, 0xa8, 0x01, 0x0d,
            ]
        );

        let json = String::from_utf8(to_json(&mval).unwrap()).unwrap();
        assert_eq!(json, r#"{"mac-addr":"00:11:22:33:44:55","ip-addr":"192.168.1.13"}"#);
        assert_eq!(from_json::<MeasurementValuesMap>(json.as_bytes()).unwrap(), mval);

        assert!(MacAddr::new(&[0; 5]).is_err());
        assert!(IpAddr::from_bytes(&[0; 5]).is_err());
    }

    #[test]
    fn test_flags() {
        let flags = FlagsMap {
            is_debug: Some(false),
            is_tcb: Some(true),
            ..Default::default()
        };

        let cbor = to_cbor(&flags).unwrap();
        assert_eq!(cbor, vec![0xa2, 0x03, 0xf4, 0x08, 0xf5]);
        assert_eq!(from_cbor::<FlagsMap>(&cbor).unwrap(), flags);

        let json = String::from_utf8(to_json(&flags).unwrap()).unwrap();
        assert_eq!(json, r#"{"is-debug":false,"is-tcb":true}"#);

        assert_eq!(
            FlagsMap::default().valid().unwrap_err().to_string(),
            "no flag set"
        );
    }

    #[test]
    fn test_integrity_registers() {
        let mut registers = IntegrityRegisters::new();
        registers.insert(
            RegisterId::Uint(0),
            vec![Digest::new(HashAlgorithm::Sha256_32, vec![1, 2, 3, 4])],
        );
        registers.insert(
            RegisterId::Text("pcr-x".to_string()),
            vec![Digest::new(HashAlgorithm::Sha256_32, vec![5, 6, 7, 8])],
        );
        let mval = MeasurementValuesMap {
            integrity_registers: Some(registers),
            ..Default::default()
        };
        mval.valid().unwrap();

        let cbor = to_cbor(&mval).unwrap();
        assert_eq!(from_cbor::<MeasurementValuesMap>(&cbor).unwrap(), mval);

        let json = to_json(&mval).unwrap();
        assert_eq!(from_json::<MeasurementValuesMap>(&json).unwrap(), mval);
    }

    #[test]
    fn test_unknown_mval_fields_round_trip() {
        // {2: [[6, h'01020304']], -80: "0000"}
        let cbor = vec![
            0xa2,
              0x02, 0x81, 0x82, 0x06, 0x44, 0x01, 0x02, 0x03, 0x04,
              0x38, 0x4f, 0x64, 0x30, 0x30, 0x30, 0x30,
        ];

        let mut mval: MeasurementValuesMap = from_cbor(&cbor).unwrap();
        assert_eq!(mval.extensions.cached().len(), 1);
        assert_eq!(to_cbor(&mval).unwrap(), cbor);

        let shape = ExtensionShape::builder("tee")
            .field("pceid", "tee.pceid", -80, FieldKind::Text)
            .build()
            .unwrap();
        mval.register_extensions(Arc::new(shape)).unwrap();

        assert_eq!(mval.extensions.get_string("pceid").unwrap(), "0000");
        assert!(mval.extensions.cached().is_empty());
        assert_eq!(to_cbor(&mval).unwrap(), cbor);

        let json = String::from_utf8(to_json(&mval).unwrap()).unwrap();
        assert_eq!(json, r#"{"digests":["sha-256-32;AQIDBA=="],"tee.pceid":"0000"}"#);
    }

    #[test]
    fn test_psa_refval_id() {
        let mkey = MkeyTypeChoice::PsaRefValId(PsaRefValId {
            label: Some("BL".to_string()),
            version: Some("2.1.0".to_string()),
            signer_id: vec![0xac; 32].into(),
        });
        mkey.valid().unwrap();

        let cbor = to_cbor(&mkey).unwrap();
        assert_eq!(&cbor[..6], &[0xd9, 0x02, 0x59, 0xa3, 0x01, 0x62]);
        assert_eq!(from_cbor::<MkeyTypeChoice>(&cbor).unwrap(), mkey);

        let json = to_json(&mkey).unwrap();
        assert_eq!(from_json::<MkeyTypeChoice>(&json).unwrap(), mkey);

        let short = MkeyTypeChoice::PsaRefValId(PsaRefValId {
            signer_id: vec![0; 20].into(),
            ..Default::default()
        });
        assert_eq!(
            short.valid().unwrap_err().to_string(),
            "invalid signer-id length 20: want 32, 48 or 64 bytes"
        );
    }
}
