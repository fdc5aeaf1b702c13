// SPDX-License-Identifier: MIT

//! # Concise Reference Integrity Manifest (CoRIM)
//!
//! A CoRIM bundles CoMID, CoSWID and CoTS tags with the metadata needed to
//! distribute them: an identifier, dependent manifests, a profile, a
//! validity period and the entities responsible for the manifest.
//!
//! ## Data Model
//!
//! ```text
//! Corim
//! ├── UnsignedCorim (tag 501)
//! │   ├── corim-id
//! │   ├── tags
//! │   ├── dependent-rims
//! │   ├── profile
//! │   ├── rim-validity
//! │   ├── entities
//! │   └── extensions
//! │
//! └── SignedCorim (COSE_Sign1, tag 18)
//!     ├── protected (alg, content-type, kid, corim-meta)
//!     ├── unprotected
//!     ├── payload: tagged UnsignedCorim
//!     └── signature
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use rats_corim::corim::UnsignedCorim;
//!
//! let corim = UnsignedCorim::new("5c57e8f4-46cd-421b-91c9-08cf93e13cfc");
//! assert_eq!(corim.file_name(), "5c57e8f4-46cd-421b-91c9-08cf93e13cfc.cbor");
//! ```

pub mod signed;

pub use signed::{CorimMetaMap, CorimSignerMap, CoseSigner, CoseVerifier, SignedCorim};

use std::fmt;

use ciborium::Value;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    codec::{
        self, de_error, from_value,
        tags::{add_prefix, strip_prefix, tag_prefix, TAG_COMID, TAG_COSE_SIGN1, TAG_COSWID,
               TAG_COTS, TAG_UNSIGNED_CORIM},
        Key, MapKey, Time,
    },
    comid::{ConciseMidTag, TaggedConciseMidTag},
    core::{Digest, ProfileTypeChoice, TagIdTypeChoice, UriType},
    coswid::{ConciseSwidTag, TaggedConciseSwidTag},
    cots::{ConciseTaStore, TaggedConciseTaStore},
    error::{CorimError, Error},
    extensions::{
        bind, Collection, Extensible, ExtensionPoint, ExtensionValue, Extensions, ExtensionsMap,
    },
    profiles,
    result::Result,
    valid::{valid_each, ResultExt, Valid},
};

generate_tagged!((
    501,
    TaggedUnsignedCorim,
    UnsignedCorim,
    "corim",
    "An unsigned CoRIM wrapped in CBOR tag 501"
));

/// Identifier of a CoRIM: text or a UUID.
pub type CorimIdTypeChoice = TagIdTypeChoice;

/// A tag carried in a CoRIM.
#[derive(Debug, Clone, PartialEq)]
pub enum ConciseTagTypeChoice {
    Comid(TaggedConciseMidTag),
    Coswid(TaggedConciseSwidTag),
    Cots(TaggedConciseTaStore),
}

impl ConciseTagTypeChoice {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Comid(_) => TaggedConciseMidTag::TYPE_NAME,
            Self::Coswid(_) => TaggedConciseSwidTag::TYPE_NAME,
            Self::Cots(_) => TaggedConciseTaStore::TYPE_NAME,
        }
    }

    pub fn as_comid(&self) -> Option<&ConciseMidTag> {
        match self {
            Self::Comid(comid) => Some(comid.as_ref()),
            _ => None,
        }
    }

    pub fn as_coswid(&self) -> Option<&ConciseSwidTag> {
        match self {
            Self::Coswid(coswid) => Some(coswid.as_ref()),
            _ => None,
        }
    }

    pub fn as_cots(&self) -> Option<&ConciseTaStore> {
        match self {
            Self::Cots(cots) => Some(cots.as_ref()),
            _ => None,
        }
    }
}

impl From<ConciseMidTag> for ConciseTagTypeChoice {
    fn from(value: ConciseMidTag) -> Self {
        Self::Comid(value.into())
    }
}

impl From<ConciseSwidTag> for ConciseTagTypeChoice {
    fn from(value: ConciseSwidTag) -> Self {
        Self::Coswid(value.into())
    }
}

impl From<ConciseTaStore> for ConciseTagTypeChoice {
    fn from(value: ConciseTaStore) -> Self {
        Self::Cots(value.into())
    }
}

impl Valid for ConciseTagTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Comid(comid) => comid.valid(),
            Self::Coswid(coswid) => coswid.valid(),
            Self::Cots(cots) => cots.valid(),
        }
    }
}

impl Serialize for ConciseTagTypeChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Comid(comid) => comid.serialize(serializer),
            Self::Coswid(coswid) => coswid.serialize(serializer),
            Self::Cots(cots) => cots.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConciseTagTypeChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        if deserializer.is_human_readable() {
            let value = serde_json::Value::deserialize(deserializer)?;
            let type_name = value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| D::Error::custom("tag has no \"type\" entry"))?;

            match type_name {
                TaggedConciseMidTag::TYPE_NAME => serde_json::from_value(value).map(Self::Comid),
                TaggedConciseSwidTag::TYPE_NAME => serde_json::from_value(value).map(Self::Coswid),
                TaggedConciseTaStore::TYPE_NAME => serde_json::from_value(value).map(Self::Cots),
                other => return Err(D::Error::custom(format!("unknown tag type {other:?}"))),
            }
            .map_err(D::Error::custom)
        } else {
            let value = Value::deserialize(deserializer)?;

            match &value {
                Value::Tag(TAG_COMID, _) => from_value(value).map(Self::Comid),
                Value::Tag(TAG_COSWID, _) => from_value(value).map(Self::Coswid),
                Value::Tag(TAG_COTS, _) => from_value(value).map(Self::Cots),
                Value::Tag(tag, _) => return Err(D::Error::custom(format!("unexpected tag {tag} in CoRIM tags"))),
                other => {
                    return Err(D::Error::custom(format!(
                        "expected a tagged CoMID, CoSWID or CoTS, found {}",
                        codec::describe(other)
                    )))
                }
            }
            .map_err(D::Error::custom)
        }
    }
}

keyed_record!(
    /// Where a dependent manifest can be found.
    CorimLocatorMap, "locator" {
        href: UriType => (0, "href"),
        thumbprint: Digest => (1, "thumbprint"),
    }
);

impl CorimLocatorMap {
    pub fn new(href: UriType, thumbprint: Option<Digest>) -> Self {
        Self {
            href: Some(href),
            thumbprint,
        }
    }
}

impl Valid for CorimLocatorMap {
    fn valid(&self) -> Result<()> {
        match &self.href {
            Some(href) => href.valid()?,
            None => return Err(Error::invalid("missing href")),
        }

        if let Some(thumbprint) = &self.thumbprint {
            thumbprint.valid().context("invalid thumbprint")?;
        }

        Ok(())
    }
}

keyed_record!(
    /// A validity period. `not-after` is mandatory.
    ValidityMap, "validity" {
        not_before: Time => (0, "not-before"),
        not_after: Time => (1, "not-after"),
    }
);

impl ValidityMap {
    pub fn new(not_before: Option<Time>, not_after: Time) -> Self {
        Self {
            not_before,
            not_after: Some(not_after),
        }
    }
}

impl Valid for ValidityMap {
    fn valid(&self) -> Result<()> {
        let Some(not_after) = &self.not_after else {
            return Err(Error::invalid("missing not-after"));
        };

        match &self.not_before {
            Some(not_before) if not_before > not_after => Err(Error::invalid(format!(
                "not-before {} is after not-after {}",
                not_before.to_rfc3339(),
                not_after.to_rfc3339()
            ))),
            _ => Ok(()),
        }
    }
}

code_enum!(
    /// Roles of a CoRIM entity.
    CorimRole, "corim role" {
        ManifestCreator = 1 => "manifest-creator",
        ManifestSigner = 2 => "manifest-signer",
    }
);

/// An entity responsible for the manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorimEntityMap {
    pub name: String,
    pub reg_id: Option<UriType>,
    pub roles: Vec<CorimRole>,
    pub extensions: Extensions,
}

impl CorimEntityMap {
    pub const ENTITY_NAME: Key = Key::new(0, "name");
    pub const REG_ID: Key = Key::new(1, "regid");
    pub const ROLES: Key = Key::new(2, "roles");

    pub fn new(name: &str, roles: Vec<CorimRole>) -> Self {
        Self {
            name: name.to_string(),
            roles,
            ..Default::default()
        }
    }

    pub fn with_reg_id(mut self, reg_id: UriType) -> Self {
        self.reg_id = Some(reg_id);
        self
    }
}

impl Extensible for CorimEntityMap {
    const NAME: &'static str = "corim entity";
    const KEYS: &'static [Key] = &[Self::ENTITY_NAME, Self::REG_ID, Self::ROLES];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for CorimEntityMap {
    fn valid(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid("empty entity name"));
        }
        if let Some(reg_id) = &self.reg_id {
            reg_id.valid().context("invalid regid")?;
        }
        if self.roles.is_empty() {
            return Err(Error::invalid("empty roles"));
        }
        for role in &self.roles {
            role.known()?;
        }

        self.extensions.valid()
    }
}

impl Serialize for CorimEntityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        Self::ENTITY_NAME.serialize_entry(&mut map, hr, &self.name)?;
        if let Some(reg_id) = &self.reg_id {
            Self::REG_ID.serialize_entry(&mut map, hr, reg_id)?;
        }
        Self::ROLES.serialize_entry(&mut map, hr, &self.roles)?;

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for CorimEntityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntityVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for EntityVisitor {
            type Value = CorimEntityMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing CorimEntityMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entity = CorimEntityMap::default();
                let mut seen_name = false;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, <CorimEntityMap as Extensible>::KEYS) {
                        Some(CorimEntityMap::ENTITY_NAME) => {
                            entity.name = map.next_value()?;
                            seen_name = true;
                        }
                        Some(CorimEntityMap::REG_ID) => entity.reg_id = Some(map.next_value()?),
                        Some(CorimEntityMap::ROLES) => entity.roles = map.next_value()?,
                        _ => entity
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(de_error)?,
                    }
                }

                if !seen_name {
                    return Err(serde::de::Error::missing_field("name"));
                }

                Ok(entity)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(EntityVisitor { is_human_readable })
    }
}

/// An unsigned CoRIM (the `corim-map`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnsignedCorim {
    pub id: CorimIdTypeChoice,
    pub tags: Vec<ConciseTagTypeChoice>,
    pub dependent_rims: Option<Vec<CorimLocatorMap>>,
    pub profile: Option<ProfileTypeChoice>,
    pub rim_validity: Option<ValidityMap>,
    pub entities: Collection<CorimEntityMap>,
    pub extensions: Extensions,
}

impl UnsignedCorim {
    pub const ID: Key = Key::new(0, "corim-id");
    pub const TAGS: Key = Key::new(1, "tags");
    pub const DEPENDENT_RIMS: Key = Key::new(2, "dependent-rims");
    pub const PROFILE: Key = Key::new(3, "profile");
    pub const RIM_VALIDITY: Key = Key::new(4, "validity");
    pub const ENTITIES: Key = Key::new(5, "entities");

    pub fn new<T: Into<CorimIdTypeChoice>>(id: T) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn add_comid(&mut self, comid: ConciseMidTag) -> Result<&mut Self> {
        comid.valid().context("invalid comid")?;
        self.tags.push(comid.into());
        Ok(self)
    }

    pub fn add_coswid(&mut self, coswid: ConciseSwidTag) -> Result<&mut Self> {
        coswid.valid().context("invalid coswid")?;
        self.tags.push(coswid.into());
        Ok(self)
    }

    pub fn add_cots(&mut self, cots: ConciseTaStore) -> Result<&mut Self> {
        cots.valid().context("invalid cots")?;
        self.tags.push(cots.into());
        Ok(self)
    }

    pub fn comids(&self) -> Vec<&ConciseMidTag> {
        self.tags.iter().filter_map(ConciseTagTypeChoice::as_comid).collect()
    }

    pub fn coswids(&self) -> Vec<&ConciseSwidTag> {
        self.tags.iter().filter_map(ConciseTagTypeChoice::as_coswid).collect()
    }

    pub fn cots(&self) -> Vec<&ConciseTaStore> {
        self.tags.iter().filter_map(ConciseTagTypeChoice::as_cots).collect()
    }

    pub fn add_dependent_rim(&mut self, href: UriType, thumbprint: Option<Digest>) -> Result<&mut Self> {
        let locator = CorimLocatorMap::new(href, thumbprint);
        locator.valid().context("invalid locator")?;
        self.dependent_rims.get_or_insert_with(Vec::new).push(locator);
        Ok(self)
    }

    pub fn set_profile(&mut self, profile: ProfileTypeChoice) -> Result<&mut Self> {
        profile.valid().context("invalid profile")?;
        self.profile = Some(profile);
        Ok(self)
    }

    pub fn set_validity(&mut self, not_before: Option<Time>, not_after: Time) -> Result<&mut Self> {
        let validity = ValidityMap::new(not_before, not_after);
        validity.valid().context("invalid validity")?;
        self.rim_validity = Some(validity);
        Ok(self)
    }

    pub fn add_entity(&mut self, entity: CorimEntityMap) -> Result<&mut Self> {
        entity.valid().context("invalid entity")?;
        self.entities.add(entity)?;
        Ok(self)
    }

    /// Name under which the manifest is conventionally stored.
    pub fn file_name(&self) -> String {
        format!("{}.cbor", self.id)
    }

    /// Binds a profile's CoRIM-level shapes and those of every embedded CoMID.
    pub fn bind_extensions(&mut self, points: &ExtensionsMap) -> Result<()> {
        bind(self, points, ExtensionPoint::Corim)?;
        if let Some(shape) = points.get(ExtensionPoint::CorimEntity) {
            self.entities.register_extensions(shape.clone())?;
        }

        for tag in self.tags.iter_mut() {
            if let ConciseTagTypeChoice::Comid(comid) = tag {
                comid.as_mut().bind_extensions(points)?;
            }
        }

        Ok(())
    }

    /// Binds the extensions of the manifest's profile, if that profile is
    /// registered.
    pub fn apply_profile(&mut self) -> Result<()> {
        let Some(profile) = &self.profile else {
            return Ok(());
        };

        match profiles::get_profile_manifest(profile) {
            Some(manifest) => self.bind_extensions(manifest.extensions()),
            None => {
                log::debug!("profile {profile} not registered; no extensions bound");
                Ok(())
            }
        }
    }

    /// Validates and encodes the manifest under tag 501.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        Ok(add_prefix(TAG_UNSIGNED_CORIM, &codec::to_cbor(self)?))
    }

    /// Checks the tag 501 prefix, decodes the body, applies the profile and
    /// validates.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let mut corim: Self = codec::from_cbor(strip_prefix(TAG_UNSIGNED_CORIM, data)?)?;
        corim.apply_profile()?;
        corim.valid()?;
        Ok(corim)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let mut corim = Self::from_json_template(data)?;
        corim.apply_profile()?;
        corim.valid()?;
        Ok(corim)
    }

    /// Decodes a possibly incomplete manifest without validating it.
    ///
    /// Used to start from a template holding the id and metadata, to which
    /// tags are then added.
    pub fn from_json_template(data: &[u8]) -> Result<Self> {
        codec::from_json(data)
    }
}

impl Extensible for UnsignedCorim {
    const NAME: &'static str = "corim";
    const KEYS: &'static [Key] = &[
        Self::ID,
        Self::TAGS,
        Self::DEPENDENT_RIMS,
        Self::PROFILE,
        Self::RIM_VALIDITY,
        Self::ENTITIES,
    ];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for UnsignedCorim {
    fn valid(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::invalid("empty corim-id"));
        }

        if self.tags.is_empty() {
            return Err(Error::invalid("no tags").context("tags validation failed"));
        }
        valid_each(&self.tags, "tag").context("tags validation failed")?;

        if let Some(locators) = &self.dependent_rims {
            valid_each(locators, "locator").context("dependent-rims validation failed")?;
        }
        if let Some(profile) = &self.profile {
            profile.valid().context("profile validation failed")?;
        }
        if let Some(validity) = &self.rim_validity {
            validity.valid().context("validity validation failed")?;
        }

        valid_each(&self.entities, "entity").context("entities validation failed")?;

        self.extensions.valid().context("extensions validation failed")
    }
}

impl Serialize for UnsignedCorim {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        Self::ID.serialize_entry(&mut map, hr, &self.id)?;
        Self::TAGS.serialize_entry(&mut map, hr, &self.tags)?;
        if let Some(locators) = &self.dependent_rims {
            Self::DEPENDENT_RIMS.serialize_entry(&mut map, hr, locators)?;
        }
        if let Some(profile) = &self.profile {
            Self::PROFILE.serialize_entry(&mut map, hr, profile)?;
        }
        if let Some(validity) = &self.rim_validity {
            Self::RIM_VALIDITY.serialize_entry(&mut map, hr, validity)?;
        }
        if !self.entities.is_empty() {
            Self::ENTITIES.serialize_entry(&mut map, hr, &self.entities)?;
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for UnsignedCorim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CorimVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for CorimVisitor {
            type Value = UnsignedCorim;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing UnsignedCorim fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut corim = UnsignedCorim::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, <UnsignedCorim as Extensible>::KEYS) {
                        Some(UnsignedCorim::ID) => corim.id = map.next_value()?,
                        Some(UnsignedCorim::TAGS) => corim.tags = map.next_value()?,
                        Some(UnsignedCorim::DEPENDENT_RIMS) => {
                            corim.dependent_rims = Some(map.next_value()?)
                        }
                        Some(UnsignedCorim::PROFILE) => corim.profile = Some(map.next_value()?),
                        Some(UnsignedCorim::RIM_VALIDITY) => {
                            corim.rim_validity = Some(map.next_value()?)
                        }
                        Some(UnsignedCorim::ENTITIES) => corim.entities = map.next_value()?,
                        _ => corim
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(de_error)?,
                    }
                }

                Ok(corim)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(CorimVisitor { is_human_readable })
    }
}

/// A CoRIM in either form.
#[derive(Debug, Clone, PartialEq)]
pub enum Corim {
    Unsigned(UnsignedCorim),
    Signed(SignedCorim),
}

impl Corim {
    /// Decodes a tag 501 or tag 18 document.
    ///
    /// A signed CoRIM is decoded but its signature is not checked; see
    /// [`SignedCorim::verify`].
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        if data.starts_with(&tag_prefix(TAG_UNSIGNED_CORIM)) {
            UnsignedCorim::from_cbor(data).map(Self::Unsigned)
        } else if data.starts_with(&tag_prefix(TAG_COSE_SIGN1)) {
            SignedCorim::from_cbor(data).map(Self::Signed)
        } else {
            Err(CorimError::UnknownEnvelope.into())
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    /// The manifest, with the signature envelope removed if there is one.
    pub fn unsigned(&self) -> &UnsignedCorim {
        match self {
            Self::Unsigned(corim) => corim,
            Self::Signed(signed) => signed.corim(),
        }
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        comid::{ComidEntityMap, ComidRole},
        core::HashAlgorithm,
        coswid::{EntityEntry, Role},
        triples::tests::reference_value,
    };

    pub(crate) fn sample_comid() -> ConciseMidTag {
        let mut comid = ConciseMidTag::new();
        comid
            .set_tag_identity("acme", None)
            .unwrap()
            .add_entity(ComidEntityMap::new("ACME", vec![ComidRole::TagCreator]))
            .unwrap()
            .add_reference_value(reference_value())
            .unwrap();
        comid
    }

    pub(crate) fn sample_coswid() -> ConciseSwidTag {
        ConciseSwidTag::new("rr".into(), "rr-fw", EntityEntry::new("ACME", vec![Role::TagCreator]))
    }

    #[test]
    fn test_minimal_corim_create() {
        let template = br#"{"corim-id":"5c57e8f4-46cd-421b-91c9-08cf93e13cfc"}"#;
        let mut corim = UnsignedCorim::from_json_template(template).unwrap();
        corim
            .add_comid(sample_comid())
            .unwrap()
            .add_coswid(sample_coswid())
            .unwrap();

        assert_eq!(corim.file_name(), "5c57e8f4-46cd-421b-91c9-08cf93e13cfc.cbor");

        let cbor = corim.to_cbor().unwrap();
        assert_eq!(&cbor[..3], &[0xd9, 0x01, 0xf5]);
        // corim-id is a 16-byte UUID
        assert_eq!(&cbor[3..7], &[0xa2, 0x00, 0x50, 0x5c]);

        let decoded = UnsignedCorim::from_cbor(&cbor).unwrap();
        assert_eq!(decoded, corim);
        assert_eq!(decoded.comids(), vec![&sample_comid()]);
        assert_eq!(decoded.coswids(), vec![&sample_coswid()]);
        assert!(decoded.cots().is_empty());
    }

    #[test]
    fn test_corim_json_tags() {
        let mut corim = UnsignedCorim::new("corim-1");
        corim.add_coswid(sample_coswid()).unwrap();

        let json = String::from_utf8(corim.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"corim-id":"corim-1","tags":[{"type":"coswid","value":"#,
                r#"{"tag-id":"rr","software-name":"rr-fw","entity":{"entity-name":"ACME","role":"tag-creator"}}}]}"#,
            )
        );
        assert_eq!(UnsignedCorim::from_json(json.as_bytes()).unwrap(), corim);
    }

    #[test]
    fn test_corim_validation() {
        assert_eq!(
            UnsignedCorim::default().valid().unwrap_err().to_string(),
            "empty corim-id"
        );
        assert_eq!(
            UnsignedCorim::new("x").valid().unwrap_err().to_string(),
            "tags validation failed: no tags"
        );

        let mut corim = UnsignedCorim::new("x");
        corim.add_coswid(sample_coswid()).unwrap();
        corim.rim_validity = Some(ValidityMap::new(
            Some(Time::from_timestamp(2_000_000_000, 0).unwrap()),
            Time::from_timestamp(1_000_000_000, 0).unwrap(),
        ));
        assert_eq!(
            corim.valid().unwrap_err().to_string(),
            "validity validation failed: not-before 2033-05-18T03:33:20Z is after not-after 2001-09-09T01:46:40Z"
        );

        corim.rim_validity = None;
        corim.entities = vec![CorimEntityMap::new("ACME", vec![])].into();
        assert_eq!(
            corim.valid().unwrap_err().to_string(),
            "entities validation failed: invalid entity at index 0: empty roles"
        );

        let err = corim
            .add_comid(ConciseMidTag::new())
            .unwrap_err()
            .to_string();
        assert_eq!(err, "invalid comid: tag-identity validation failed: empty tag-id");
    }

    #[test]
    fn test_corim_metadata_round_trip() {
        let mut corim = UnsignedCorim::new("corim-2");
        corim
            .add_comid(sample_comid())
            .unwrap()
            .add_dependent_rim(
                UriType::parse("https://example.com/dependent.cbor").unwrap(),
                Some(Digest::new(HashAlgorithm::Sha256_32, vec![1, 2, 3, 4])),
            )
            .unwrap()
            .set_profile(ProfileTypeChoice::parse("tag:example.com,2025:profile").unwrap())
            .unwrap()
            .set_validity(None, Time::from_timestamp(1_700_000_000, 0).unwrap())
            .unwrap()
            .add_entity(CorimEntityMap::new(
                "ACME",
                vec![CorimRole::ManifestCreator, CorimRole::ManifestSigner],
            ))
            .unwrap();

        let cbor = corim.to_cbor().unwrap();
        assert_eq!(UnsignedCorim::from_cbor(&cbor).unwrap(), corim);

        let json = corim.to_json().unwrap();
        assert_eq!(UnsignedCorim::from_json(&json).unwrap(), corim);
    }

    #[test]
    fn test_corim_dispatch() {
        let mut corim = UnsignedCorim::new("corim-3");
        corim.add_coswid(sample_coswid()).unwrap();
        let cbor = corim.to_cbor().unwrap();

        let decoded = Corim::from_cbor(&cbor).unwrap();
        assert!(!decoded.is_signed());
        assert_eq!(decoded.unsigned(), &corim);

        let err = Corim::from_cbor(&cbor[3..]).unwrap_err();
        assert_eq!(err.to_string(), "not a CoRIM: expected tag 501 or 18");

        let err = UnsignedCorim::from_cbor(&cbor[3..]).unwrap_err();
        assert!(err.to_string().starts_with("cbor: expected tag 501"), "{err}");
    }

    #[test]
    fn test_unexpected_tag_in_tags() {
        // {0: "x", 1: [37(h'00')]}
        let body = [0xa2, 0x00, 0x61, 0x78, 0x01, 0x81, 0xd8, 0x25, 0x41, 0x00];
        let err = UnsignedCorim::from_cbor(&add_prefix(TAG_UNSIGNED_CORIM, &body)).unwrap_err();

        assert!(err.to_string().contains("unexpected tag 37 in CoRIM tags"), "{err}");
    }
}
