// SPDX-License-Identifier: MIT

//! Primitive value types shared by every document.
//!
//! # Identifiers
//! * [`UuidType`]: 16 bytes, written as the 8-4-4-4-12 string in JSON
//! * [`OidType`]: BER-encoded object identifier, dotted text in JSON
//! * [`UriType`]: absolute URI, CBOR tag 32
//! * [`UeidType`]: EAT universal entity id
//! * [`TagIdTypeChoice`]: text or UUID tag identifier
//! * [`ProfileTypeChoice`]: EAT profile, URI or OID
//!
//! # Digests
//! * [`HashAlgorithm`]: the named-information hash algorithm registry
//! * [`Digest`]: algorithm and value, `[alg, bstr]` in CBOR and
//!   `"<alg>;<base64>"` in JSON
//!
//! [`VersionScheme`] is shared by CoSWID tags and measured versions.

use std::str::FromStr;

use ciborium::Value;
use const_oid::ObjectIdentifier;
use derive_more::{AsRef, Deref, From};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    codec::{
        base64_decode, base64_encode, describe,
        tags::{TAG_OID, TAG_URI, TAG_UUID},
        Bytes,
    },
    error::Error,
    fixed_bytes::FixedBytes,
    result::Result,
    valid::Valid,
};

/// A 16-byte UUID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From)]
pub struct UuidType(pub FixedBytes<16>);

impl UuidType {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(FixedBytes(bytes))
    }

    /// Parses the canonical 8-4-4-4-12 hex form.
    pub fn parse(s: &str) -> Result<Self> {
        let groups: Vec<&str> = s.split('-').collect();
        let lens: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lens != [8, 4, 4, 4, 12] {
            return Err(Error::invalid(format!("invalid UUID {s:?}")));
        }

        let bytes = hex::decode(groups.concat())
            .map_err(|err| Error::invalid(format!("invalid UUID {s:?}: {err}")))?;

        Self::try_from(bytes.as_slice())
    }

    /// True when `s` is in UUID string form.
    pub fn is_uuid_str(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0 .0
    }

    /// The value under tag 37.
    pub fn to_tagged_value(&self) -> Value {
        Value::Tag(TAG_UUID, Box::new(Value::Bytes(self.as_bytes().to_vec())))
    }
}

impl TryFrom<&[u8]> for UuidType {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        FixedBytes::try_from(value)
            .map(Self)
            .map_err(|err| Error::invalid(format!("invalid UUID: {err}")))
    }
}

impl FromStr for UuidType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for UuidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = hex::encode(self.as_bytes());
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl std::fmt::Debug for UuidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UuidType({self})")
    }
}

impl Serialize for UuidType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for UuidType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::parse(&s).map_err(de::Error::custom)
        } else {
            FixedBytes::<16>::deserialize(deserializer).map(Self)
        }
    }
}

/// An object identifier held in BER form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef)]
pub struct OidType(Vec<u8>);

impl OidType {
    /// Parses dotted-decimal text such as `2.16.840.1.113741.1.16.1`.
    pub fn parse(s: &str) -> Result<Self> {
        ObjectIdentifier::new(s)
            .map(|oid| Self(oid.as_bytes().to_vec()))
            .map_err(|err| Error::invalid(format!("invalid OID {s:?}: {err}")))
    }

    /// Takes BER content bytes.
    pub fn from_ber(bytes: &[u8]) -> Result<Self> {
        ObjectIdentifier::from_bytes(bytes)
            .map(|oid| Self(oid.as_bytes().to_vec()))
            .map_err(|err| Error::invalid(format!("invalid OID bytes {}: {err}", hex::encode(bytes))))
    }

    /// True when `s` looks like a dotted OID rather than a URI.
    pub fn is_oid_str(s: &str) -> bool {
        s.contains('.')
            && s.split('.').all(|arc| !arc.is_empty() && arc.bytes().all(|b| b.is_ascii_digit()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_tagged_value(&self) -> Value {
        Value::Tag(TAG_OID, Box::new(Value::Bytes(self.0.clone())))
    }
}

impl FromStr for OidType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for OidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match ObjectIdentifier::from_bytes(&self.0) {
            Ok(oid) => write!(f, "{oid}"),
            Err(_) => write!(f, "{}", hex::encode(&self.0)),
        }
    }
}

impl std::fmt::Debug for OidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OidType({self})")
    }
}

impl Serialize for OidType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for OidType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::parse(&s).map_err(de::Error::custom)
        } else {
            let bytes = Bytes::deserialize(deserializer)?;
            Self::from_ber(&bytes).map_err(de::Error::custom)
        }
    }
}

/// An absolute URI. Always carries tag 32 in CBOR.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, AsRef)]
pub struct UriType(String);

impl UriType {
    pub fn parse(s: &str) -> Result<Self> {
        let uri = Self(s.to_string());
        uri.valid()?;
        Ok(uri)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UriType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for UriType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Valid for UriType {
    fn valid(&self) -> Result<()> {
        url::Url::parse(&self.0)
            .map(|_| ())
            .map_err(|err| Error::invalid(format!("invalid URI {:?}: {err}", self.0)))
    }
}

impl Serialize for UriType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0)
        } else {
            ciborium::tag::Required::<&str, TAG_URI>(&self.0).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for UriType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            String::deserialize(deserializer).map(Self)
        } else {
            ciborium::tag::Accepted::<String, TAG_URI>::deserialize(deserializer).map(|t| Self(t.0))
        }
    }
}

/// An EAT universal entity id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Deref, AsRef)]
pub struct UeidType(pub Bytes);

impl UeidType {
    pub fn new<B: Into<Bytes>>(bytes: B) -> Self {
        Self(bytes.into())
    }
}

impl Valid for UeidType {
    fn valid(&self) -> Result<()> {
        let (kind, allowed): (&str, &[usize]) = match self.0.first() {
            None => return Err(Error::invalid("empty UEID")),
            Some(0x01) => ("RAND", &[17, 25, 33]),
            Some(0x02) => ("IEEE EUI", &[7]),
            Some(0x03) => ("IMEI", &[9]),
            Some(t) => return Err(Error::invalid(format!("unknown UEID type 0x{t:02x}"))),
        };

        if !allowed.contains(&self.0.len()) {
            return Err(Error::invalid(format!(
                "invalid {kind} UEID length {}",
                self.0.len()
            )));
        }

        Ok(())
    }
}

impl Serialize for UeidType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UeidType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Bytes::deserialize(deserializer).map(Self)
    }
}

/// A tag identifier: text, or a 16-byte UUID.
///
/// JSON has no separate form for the UUID case; text in UUID form is read
/// back as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagIdTypeChoice {
    Tstr(String),
    Uuid(UuidType),
}

impl Default for TagIdTypeChoice {
    fn default() -> Self {
        Self::Tstr(String::new())
    }
}

impl TagIdTypeChoice {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Tstr(s) if s.is_empty())
    }

    fn from_text(s: String) -> Self {
        match UuidType::parse(&s) {
            Ok(uuid) => Self::Uuid(uuid),
            Err(_) => Self::Tstr(s),
        }
    }
}

impl From<&str> for TagIdTypeChoice {
    fn from(value: &str) -> Self {
        Self::from_text(value.to_string())
    }
}

impl From<String> for TagIdTypeChoice {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}

impl From<UuidType> for TagIdTypeChoice {
    fn from(value: UuidType) -> Self {
        Self::Uuid(value)
    }
}

impl std::fmt::Display for TagIdTypeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tstr(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl Valid for TagIdTypeChoice {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("empty tag-id"));
        }
        Ok(())
    }
}

impl Serialize for TagIdTypeChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Tstr(s) => serializer.serialize_str(s),
            Self::Uuid(u) => u.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TagIdTypeChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TagIdVisitor {
            is_human_readable: bool,
        }

        impl Visitor<'_> for TagIdVisitor {
            type Value = TagIdTypeChoice;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a text or UUID tag identifier")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                if self.is_human_readable {
                    Ok(TagIdTypeChoice::from_text(v.to_string()))
                } else {
                    Ok(TagIdTypeChoice::Tstr(v.to_string()))
                }
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Self::Value, E> {
                UuidType::try_from(v)
                    .map(TagIdTypeChoice::Uuid)
                    .map_err(|_| E::custom(format!("tag-id bytes must be 16 long, got {}", v.len())))
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_any(TagIdVisitor { is_human_readable })
    }
}

/// An EAT profile identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProfileTypeChoice {
    Uri(UriType),
    Oid(OidType),
}

impl ProfileTypeChoice {
    /// Reads dotted-decimal text as an OID and anything else as a URI.
    pub fn parse(s: &str) -> Result<Self> {
        if OidType::is_oid_str(s) {
            OidType::parse(s).map(Self::Oid)
        } else {
            UriType::parse(s).map(Self::Uri)
        }
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(Self::Uri(UriType(s))),
            Value::Bytes(b) => OidType::from_ber(&b).map(Self::Oid),
            Value::Tag(TAG_URI, inner) => match *inner {
                Value::Text(s) => Ok(Self::Uri(UriType(s))),
                other => Err(Error::invalid(format!(
                    "profile: tag 32 over {}",
                    describe(&other)
                ))),
            },
            Value::Tag(TAG_OID, inner) => match *inner {
                Value::Bytes(b) => OidType::from_ber(&b).map(Self::Oid),
                other => Err(Error::invalid(format!(
                    "profile: tag 111 over {}",
                    describe(&other)
                ))),
            },
            other => Err(Error::invalid(format!(
                "profile: expected URI or OID, found {}",
                describe(&other)
            ))),
        }
    }
}

impl FromStr for ProfileTypeChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ProfileTypeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri(u) => write!(f, "{u}"),
            Self::Oid(o) => write!(f, "{o}"),
        }
    }
}

impl Valid for ProfileTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Uri(u) => u.valid(),
            Self::Oid(o) => OidType::from_ber(o.as_bytes()).map(|_| ()),
        }
    }
}

impl Serialize for ProfileTypeChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Uri(u) => serializer.serialize_str(u.as_str()),
            Self::Oid(o) => o.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ProfileTypeChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            if OidType::is_oid_str(&s) {
                OidType::parse(&s).map(Self::Oid).map_err(de::Error::custom)
            } else {
                Ok(Self::Uri(UriType(s)))
            }
        } else {
            let value = Value::deserialize(deserializer)?;
            Self::from_cbor_value(value).map_err(de::Error::custom)
        }
    }
}

/// Hash algorithms of the IANA named-information registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha256_128,
    Sha256_120,
    Sha256_96,
    Sha256_64,
    Sha256_32,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    /// An algorithm outside the registry; any digest length is accepted.
    Other(i64),
}

const HASH_ALGORITHMS: &[(HashAlgorithm, i64, &str, usize)] = &[
    (HashAlgorithm::Sha256, 1, "sha-256", 32),
    (HashAlgorithm::Sha256_128, 2, "sha-256-128", 16),
    (HashAlgorithm::Sha256_120, 3, "sha-256-120", 15),
    (HashAlgorithm::Sha256_96, 4, "sha-256-96", 12),
    (HashAlgorithm::Sha256_64, 5, "sha-256-64", 8),
    (HashAlgorithm::Sha256_32, 6, "sha-256-32", 4),
    (HashAlgorithm::Sha384, 7, "sha-384", 48),
    (HashAlgorithm::Sha512, 8, "sha-512", 64),
    (HashAlgorithm::Sha3_224, 9, "sha3-224", 28),
    (HashAlgorithm::Sha3_256, 10, "sha3-256", 32),
    (HashAlgorithm::Sha3_384, 11, "sha3-384", 48),
    (HashAlgorithm::Sha3_512, 12, "sha3-512", 64),
];

impl HashAlgorithm {
    fn entry(&self) -> Option<&'static (HashAlgorithm, i64, &'static str, usize)> {
        HASH_ALGORITHMS.iter().find(|(alg, ..)| alg == self)
    }

    pub fn from_id(id: i64) -> Self {
        HASH_ALGORITHMS
            .iter()
            .find(|(_, i, ..)| *i == id)
            .map(|(alg, ..)| *alg)
            .unwrap_or(Self::Other(id))
    }

    /// Looks up a registry name, or a numeric id given as text.
    pub fn from_name(name: &str) -> Result<Self> {
        if let Some((alg, ..)) = HASH_ALGORITHMS.iter().find(|(_, _, n, _)| *n == name) {
            return Ok(*alg);
        }

        name.parse::<i64>()
            .map(Self::from_id)
            .map_err(|_| Error::invalid(format!("unknown hash algorithm {name:?}")))
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Other(id) => *id,
            known => known.entry().map(|(_, id, ..)| *id).unwrap_or_default(),
        }
    }

    /// Registry name; `None` for algorithms outside the registry.
    pub fn name(&self) -> Option<&'static str> {
        self.entry().map(|(_, _, name, _)| *name)
    }

    /// Expected digest length in bytes, when known.
    pub fn digest_len(&self) -> Option<usize> {
        self.entry().map(|(.., len)| *len)
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.id()),
        }
    }
}

/// A digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    pub alg: HashAlgorithm,
    pub val: Bytes,
}

impl Digest {
    pub fn new<B: Into<Bytes>>(alg: HashAlgorithm, val: B) -> Self {
        Self {
            alg,
            val: val.into(),
        }
    }

    /// Parses the `"<alg>;<base64>"` text form.
    pub fn parse(s: &str) -> Result<Self> {
        let (alg, val) = s
            .split_once(';')
            .ok_or_else(|| Error::invalid(format!("invalid digest {s:?}: expected <alg>;<base64>")))?;

        Ok(Self::new(HashAlgorithm::from_name(alg)?, base64_decode(val)?))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{}", self.alg, base64_encode(&self.val))
    }
}

impl Valid for Digest {
    fn valid(&self) -> Result<()> {
        if self.val.is_empty() {
            return Err(Error::invalid("empty digest"));
        }

        if let Some(want) = self.alg.digest_len() {
            if self.val.len() != want {
                return Err(Error::invalid(format!(
                    "length mismatch for hash algorithm {}: want {} bytes, got {}",
                    self.alg,
                    want,
                    self.val.len()
                )));
            }
        }

        Ok(())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            (self.alg.id(), &self.val).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::parse(&s).map_err(de::Error::custom)
        } else {
            let (alg, val) = <(i64, Bytes)>::deserialize(deserializer)?;
            Ok(Self::new(HashAlgorithm::from_id(alg), val))
        }
    }
}

code_enum!(
    /// Version numbering schemes of the CoSWID registry.
    VersionScheme, "version scheme" {
        Multipartnumeric = 1 => "multipartnumeric",
        MultipartnumericSuffix = 2 => "multipartnumeric+suffix",
        Alphanumeric = 3 => "alphanumeric",
        Decimal = 4 => "decimal",
        Semver = 16384 => "semver",
    }
);

/// Validates every digest of a list, which must not be empty.
pub(crate) fn valid_digests(digests: &[Digest]) -> Result<()> {
    crate::valid::non_empty(digests, "no digests")?;
    crate::valid::valid_each(digests, "digest")
}
