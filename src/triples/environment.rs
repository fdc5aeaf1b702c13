// SPDX-License-Identifier: MIT

//! Target environments: what a triple's subject is.

use std::fmt;

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
        json_describe,
        tags::{TAG_BYTES, TAG_OID, TAG_UEID, TAG_UUID},
        Bytes, Key, MapKey,
    },
    core::{OidType, UeidType, UuidType},
    error::{Error, TypeChoiceError},
    result::Result,
    type_choice::{ChoiceExtension, TypeChoice},
    valid::{ResultExt, Valid},
};

fn tagged_bytes(tag: u64, bytes: &[u8]) -> Value {
    Value::Tag(tag, Box::new(Value::Bytes(bytes.to_vec())))
}

fn json_bytes(value: serde_json::Value, what: &str) -> Result<Bytes> {
    base64_decode(&expect_json_str(value, what)?).map(Bytes::from)
}

fn non_empty_bytes(bytes: &Bytes) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::invalid("empty bytes"));
    }
    Ok(())
}

/// Identifies the class of an environment, e.g. a hardware model.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassIdTypeChoice {
    Uuid(UuidType),
    Oid(OidType),
    Bytes(Bytes),
    Int(i64),
    Extension(ChoiceExtension),
}

impl TypeChoice for ClassIdTypeChoice {
    const CHOICE: &'static str = "ClassID";
    const TYPE_NAMES: &'static [&'static str] = &["uuid", "oid", "bytes", "int"];
    const TAGS: &'static [u64] = &[TAG_UUID, TAG_OID, TAG_BYTES];

    fn type_name(&self) -> &str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::Oid(_) => "oid",
            Self::Bytes(_) => "bytes",
            Self::Int(_) => "int",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Uuid(u) => u.to_tagged_value(),
            Self::Oid(o) => o.to_tagged_value(),
            Self::Bytes(b) => tagged_bytes(TAG_BYTES, b),
            Self::Int(i) => Value::Integer((*i).into()),
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
            Value::Tag(TAG_BYTES, inner) => Ok(Self::Bytes(expect_bytes(*inner, "bytes")?.into())),
            Value::Integer(i) => i64::try_from(i)
                .map(Self::Int)
                .map_err(|_| Error::invalid("class id integer out of range")),
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
            Self::Bytes(b) => serde_json::Value::String(base64_encode(b)),
            Self::Int(i) => (*i).into(),
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "uuid" => UuidType::parse(&expect_json_str(value, type_name)?).map(Self::Uuid),
            "oid" => OidType::parse(&expect_json_str(value, type_name)?).map(Self::Oid),
            "bytes" => json_bytes(value, type_name).map(Self::Bytes),
            "int" => value.as_i64().map(Self::Int).ok_or_else(|| {
                Error::invalid(format!("int: expected integer, found {}", json_describe(&value)))
            }),
            other => ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension),
        }
    }
}

impl Valid for ClassIdTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Uuid(_) | Self::Oid(_) | Self::Int(_) => Ok(()),
            Self::Bytes(b) => non_empty_bytes(b),
            Self::Extension(ext) => ext.valid(),
        }
    }
}

impl_type_choice_serde!(ClassIdTypeChoice);

choice_accessors!(ClassIdTypeChoice {
    get_uuid => Uuid(UuidType),
    get_oid => Oid(OidType),
    get_bytes => Bytes(Bytes),
    get_int => Int(i64),
});

/// Identifies one instance of an environment.
///
/// Besides the UEID, UUID and bytes forms, any [`CryptoKeyTypeChoice`]
/// variant other than bytes may name the instance by its key.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceIdTypeChoice {
    Ueid(UeidType),
    Uuid(UuidType),
    Bytes(Bytes),
    CryptoKey(CryptoKeyTypeChoice),
    Extension(ChoiceExtension),
}

impl TypeChoice for InstanceIdTypeChoice {
    const CHOICE: &'static str = "InstanceID";
    const TYPE_NAMES: &'static [&'static str] = &[
        "ueid",
        "uuid",
        "bytes",
        "pkix-base64-key",
        "pkix-base64-cert",
        "pkix-base64-cert-path",
        "thumbprint",
        "cose-key",
        "cert-thumbprint",
        "cert-path-thumbprint",
        "pkix-asn1der-cert",
    ];
    const TAGS: &'static [u64] = &[
        TAG_UEID,
        TAG_UUID,
        TAG_BYTES,
        crate::codec::tags::TAG_PKIX_BASE64_KEY,
        crate::codec::tags::TAG_PKIX_BASE64_CERT,
        crate::codec::tags::TAG_PKIX_BASE64_CERT_PATH,
        crate::codec::tags::TAG_THUMBPRINT,
        crate::codec::tags::TAG_COSE_KEY,
        crate::codec::tags::TAG_CERT_THUMBPRINT,
        crate::codec::tags::TAG_CERT_PATH_THUMBPRINT,
        crate::codec::tags::TAG_PKIX_ASN1DER_CERT,
    ];

    fn type_name(&self) -> &str {
        match self {
            Self::Ueid(_) => "ueid",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
            Self::CryptoKey(key) => key.type_name(),
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Ueid(u) => tagged_bytes(TAG_UEID, u),
            Self::Uuid(u) => u.to_tagged_value(),
            Self::Bytes(b) => tagged_bytes(TAG_BYTES, b),
            Self::CryptoKey(key) => key.to_cbor_value()?,
            Self::Extension(ext) => ext.to_cbor_value(),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_UEID, inner) => {
                Ok(Self::Ueid(UeidType::new(expect_bytes(*inner, "ueid")?)))
            }
            Value::Tag(TAG_UUID, inner) => {
                UuidType::try_from(expect_bytes(*inner, "uuid")?.as_slice()).map(Self::Uuid)
            }
            Value::Tag(TAG_BYTES, inner) => Ok(Self::Bytes(expect_bytes(*inner, "bytes")?.into())),
            other => match CryptoKeyTypeChoice::decode_builtin(other)? {
                Ok(key) => Ok(Self::CryptoKey(key)),
                Err(other @ Value::Tag(..)) => {
                    ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension)
                }
                Err(other) => {
                    Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into())
                }
            },
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Ueid(u) => serde_json::Value::String(base64_encode(u)),
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::Bytes(b) => serde_json::Value::String(base64_encode(b)),
            Self::CryptoKey(key) => key.to_json_value()?,
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "ueid" => json_bytes(value, type_name).map(|b| Self::Ueid(UeidType(b))),
            "uuid" => UuidType::parse(&expect_json_str(value, type_name)?).map(Self::Uuid),
            "bytes" => json_bytes(value, type_name).map(Self::Bytes),
            other => match CryptoKeyTypeChoice::decode_builtin_json(other, value)? {
                Ok(key) => Ok(Self::CryptoKey(key)),
                Err(value) => {
                    ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension)
                }
            },
        }
    }
}

impl Valid for InstanceIdTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Ueid(u) => u.valid(),
            Self::Uuid(_) => Ok(()),
            Self::Bytes(b) => non_empty_bytes(b),
            Self::CryptoKey(key) => key.valid(),
            Self::Extension(ext) => ext.valid(),
        }
    }
}

impl_type_choice_serde!(InstanceIdTypeChoice);

choice_accessors!(InstanceIdTypeChoice {
    get_ueid => Ueid(UeidType),
    get_uuid => Uuid(UuidType),
    get_bytes => Bytes(Bytes),
    get_crypto_key => CryptoKey(CryptoKeyTypeChoice),
});

/// Identifies a group of environments.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupIdTypeChoice {
    Uuid(UuidType),
    Bytes(Bytes),
    Extension(ChoiceExtension),
}

impl TypeChoice for GroupIdTypeChoice {
    const CHOICE: &'static str = "GroupID";
    const TYPE_NAMES: &'static [&'static str] = &["uuid", "bytes"];
    const TAGS: &'static [u64] = &[TAG_UUID, TAG_BYTES];

    fn type_name(&self) -> &str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Uuid(u) => u.to_tagged_value(),
            Self::Bytes(b) => tagged_bytes(TAG_BYTES, b),
            Self::Extension(ext) => ext.to_cbor_value(),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_UUID, inner) => {
                UuidType::try_from(expect_bytes(*inner, "uuid")?.as_slice()).map(Self::Uuid)
            }
            Value::Tag(TAG_BYTES, inner) => Ok(Self::Bytes(expect_bytes(*inner, "bytes")?.into())),
            other @ Value::Tag(..) => {
                ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension)
            }
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::Bytes(b) => serde_json::Value::String(base64_encode(b)),
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "uuid" => UuidType::parse(&expect_json_str(value, type_name)?).map(Self::Uuid),
            "bytes" => json_bytes(value, type_name).map(Self::Bytes),
            other => ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension),
        }
    }
}

impl Valid for GroupIdTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Uuid(_) => Ok(()),
            Self::Bytes(b) => non_empty_bytes(b),
            Self::Extension(ext) => ext.valid(),
        }
    }
}

impl_type_choice_serde!(GroupIdTypeChoice);

choice_accessors!(GroupIdTypeChoice {
    get_uuid => Uuid(UuidType),
    get_bytes => Bytes(Bytes),
});

/// Describes the class of an environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMap {
    pub class_id: Option<ClassIdTypeChoice>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub layer: Option<u64>,
    pub index: Option<u64>,
}

impl ClassMap {
    pub const CLASS_ID: Key = Key::new(0, "id");
    pub const VENDOR: Key = Key::new(1, "vendor");
    pub const MODEL: Key = Key::new(2, "model");
    pub const LAYER: Key = Key::new(3, "layer");
    pub const INDEX: Key = Key::new(4, "index");

    pub const KEYS: &'static [Key] = &[
        Self::CLASS_ID,
        Self::VENDOR,
        Self::MODEL,
        Self::LAYER,
        Self::INDEX,
    ];

    pub fn from_id(class_id: ClassIdTypeChoice) -> Self {
        Self {
            class_id: Some(class_id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.class_id.is_none()
            && self.vendor.is_none()
            && self.model.is_none()
            && self.layer.is_none()
            && self.index.is_none()
    }
}

impl Valid for ClassMap {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("class must not be empty"));
        }

        if let Some(class_id) = &self.class_id {
            class_id.valid().context("invalid class id")?;
        }

        Ok(())
    }
}

impl Serialize for ClassMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(class_id) = &self.class_id {
            Self::CLASS_ID.serialize_entry(&mut map, hr, class_id)?;
        }
        if let Some(vendor) = &self.vendor {
            Self::VENDOR.serialize_entry(&mut map, hr, vendor)?;
        }
        if let Some(model) = &self.model {
            Self::MODEL.serialize_entry(&mut map, hr, model)?;
        }
        if let Some(layer) = &self.layer {
            Self::LAYER.serialize_entry(&mut map, hr, layer)?;
        }
        if let Some(index) = &self.index {
            Self::INDEX.serialize_entry(&mut map, hr, index)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ClassMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for ClassMapVisitor {
            type Value = ClassMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing ClassMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut class = ClassMap::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, ClassMap::KEYS) {
                        Some(ClassMap::CLASS_ID) => class.class_id = Some(map.next_value()?),
                        Some(ClassMap::VENDOR) => class.vendor = Some(map.next_value()?),
                        Some(ClassMap::MODEL) => class.model = Some(map.next_value()?),
                        Some(ClassMap::LAYER) => class.layer = Some(map.next_value()?),
                        Some(ClassMap::INDEX) => class.index = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!("unexpected class key {key}")))
                        }
                    }
                }

                Ok(class)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(ClassMapVisitor { is_human_readable })
    }
}

/// The subject of a triple: a class, an instance, a group, or a
/// combination of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentMap {
    pub class: Option<ClassMap>,
    pub instance: Option<InstanceIdTypeChoice>,
    pub group: Option<GroupIdTypeChoice>,
}

impl EnvironmentMap {
    pub const CLASS: Key = Key::new(0, "class");
    pub const INSTANCE: Key = Key::new(1, "instance");
    pub const GROUP: Key = Key::new(2, "group");

    pub const KEYS: &'static [Key] = &[Self::CLASS, Self::INSTANCE, Self::GROUP];

    pub fn from_class(class: ClassMap) -> Self {
        Self {
            class: Some(class),
            ..Default::default()
        }
    }

    pub fn from_instance(instance: InstanceIdTypeChoice) -> Self {
        Self {
            instance: Some(instance),
            ..Default::default()
        }
    }

    pub fn from_group(group: GroupIdTypeChoice) -> Self {
        Self {
            group: Some(group),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.class.is_none() && self.instance.is_none() && self.group.is_none()
    }
}

impl Valid for EnvironmentMap {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("environment must not be empty"));
        }

        if let Some(class) = &self.class {
            class.valid().context("class validation failed")?;
        }
        if let Some(instance) = &self.instance {
            instance.valid().context("instance validation failed")?;
        }
        if let Some(group) = &self.group {
            group.valid().context("group validation failed")?;
        }

        Ok(())
    }
}

impl Serialize for EnvironmentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(class) = &self.class {
            Self::CLASS.serialize_entry(&mut map, hr, class)?;
        }
        if let Some(instance) = &self.instance {
            Self::INSTANCE.serialize_entry(&mut map, hr, instance)?;
        }
        if let Some(group) = &self.group {
            Self::GROUP.serialize_entry(&mut map, hr, group)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvironmentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EnvironmentMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for EnvironmentMapVisitor {
            type Value = EnvironmentMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing EnvironmentMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut env = EnvironmentMap::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, EnvironmentMap::KEYS) {
                        Some(EnvironmentMap::CLASS) => env.class = Some(map.next_value()?),
                        Some(EnvironmentMap::INSTANCE) => env.instance = Some(map.next_value()?),
                        Some(EnvironmentMap::GROUP) => env.group = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!(
                                "unexpected environment key {key}"
                            )))
                        }
                    }
                }

                Ok(env)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(EnvironmentMapVisitor { is_human_readable })
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::codec::{from_cbor, from_json, to_cbor, to_json};

    fn acme_class() -> ClassMap {
        ClassMap {
            class_id: Some(ClassIdTypeChoice::Bytes(vec![0x00, 0x11, 0x22, 0x33].into())),
            vendor: Some("Example Vendor".to_string()),
            model: Some("Example Model".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_class_map() {
        let class = acme_class();

        let cbor = to_cbor(&class).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xa3, // map(3)
                  0x00, // id
                    0xd9, 0x02, 0x30, // tag(560)
                      0x44, 0x00, 0x11, 0x22, 0x33,
                  0x01, // vendor
                    0x6e, 0x45, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65,
                    0x20, 0x56, 0x65, 0x6e, 0x64, 0x6f, 0x72,
                  0x02, // model
                    0x6d, 0x45, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65,
                    0x20, 0x4d, 0x6f, 0x64, 0x65, 0x6c,
            ]
        );
        assert_eq!(from_cbor::<ClassMap>(&cbor).unwrap(), class);

        let json = String::from_utf8(to_json(&class).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"id":{"type":"bytes","value":"ABEiMw=="},"vendor":"Example Vendor","model":"Example Model"}"#
        );
        assert_eq!(from_json::<ClassMap>(json.as_bytes()).unwrap(), class);
    }

    #[test]
    fn test_class_id_variants() {
        let uuid = ClassIdTypeChoice::Uuid(UuidType::new([0x31; 16]));
        let cbor = to_cbor(&uuid).unwrap();
        assert_eq!(&cbor[..3], &[0xd8, 0x25, 0x50]);
        assert_eq!(from_cbor::<ClassIdTypeChoice>(&cbor).unwrap(), uuid);

        let int = ClassIdTypeChoice::Int(-3);
        assert_eq!(to_cbor(&int).unwrap(), vec![0x22]);

        assert_eq!(
            int.get_uuid().unwrap_err().to_string(),
            "ClassID type is: int"
        );

        let err = from_json::<ClassIdTypeChoice>(br#"{"type":"banana","value":1}"#).unwrap_err();
        assert!(err.to_string().contains("unknown ClassID type: banana"), "{err}");
    }

    #[test]
    fn test_instance_id_cert_thumbprint() {
        let json = br#"{"type":"cert-thumbprint","value":"sha-256-32;3q2+7w=="}"#;

        let id: InstanceIdTypeChoice = from_json(json).unwrap();

        assert_eq!(id.type_name(), "cert-thumbprint");
        assert!(id.get_crypto_key().is_ok());

        let cbor = to_cbor(&id).unwrap();
        assert_eq!(&cbor[..3], &[0xd9, 0x02, 0x2f]);
        assert_eq!(from_cbor::<InstanceIdTypeChoice>(&cbor).unwrap(), id);
    }

    #[test]
    fn test_instance_id_ueid() {
        let mut bytes = vec![0x01];
        bytes.extend([0xab; 32]);
        let id = InstanceIdTypeChoice::Ueid(UeidType::new(bytes));

        let cbor = to_cbor(&id).unwrap();
        assert_eq!(&cbor[..5], &[0xd9, 0x02, 0x26, 0x58, 0x21]);
        assert_eq!(from_cbor::<InstanceIdTypeChoice>(&cbor).unwrap(), id);

        let bad = vec![0xd9, 0x02, 0x26, 0x42, 0x02, 0x00];
        let err = from_cbor::<InstanceIdTypeChoice>(&bad).unwrap_err();
        assert!(err.to_string().contains("invalid ueid: invalid IEEE EUI UEID length 2"), "{err}");
    }

    #[test]
    fn test_environment() {
        let env = EnvironmentMap::from_group(GroupIdTypeChoice::Uuid(UuidType::new([0x42; 16])));
        env.valid().unwrap();

        let cbor = to_cbor(&env).unwrap();
        assert_eq!(&cbor[..5], &[0xa1, 0x02, 0xd8, 0x25, 0x50]);
        assert_eq!(from_cbor::<EnvironmentMap>(&cbor).unwrap(), env);

        assert_eq!(
            EnvironmentMap::default().valid().unwrap_err().to_string(),
            "environment must not be empty"
        );

        let empty_class = EnvironmentMap::from_class(ClassMap::default());
        assert_eq!(
            empty_class.valid().unwrap_err().to_string(),
            "class validation failed: class must not be empty"
        );
    }

    #[test]
    fn test_environment_unknown_key() {
        let err = from_cbor::<EnvironmentMap>(&[0xa1, 0x05, 0x00]).unwrap_err();

        assert!(err.to_string().contains("unexpected environment key 5"), "{err}");
    }
}
