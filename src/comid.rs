// SPDX-License-Identifier: MIT

//! Concise Module Identifier (CoMID) tags.
//!
//! A CoMID describes one module of an attester: who made the tag, which
//! other tags it relates to, and the triples asserting reference values,
//! endorsements, keys and relations between environments. Embedded in a
//! CoRIM it carries CBOR tag 506 ([`TaggedConciseMidTag`]).
//!
//! # Key Components
//!
//! * [`ConciseMidTag`] - the tag itself, extensible at the top level
//! * [`TagIdentityMap`] - the tag's id and version
//! * [`ComidEntityMap`] - an entity and its roles, extensible
//! * [`LinkedTagMap`] - a relation to another tag
//! * [`TriplesMap`] - the assertions
//!
//! # Example
//!
//! ```rust
//! use rats_corim::{
//!     comid::{ComidEntityMap, ComidRole, ConciseMidTag},
//!     core::{Digest, HashAlgorithm},
//!     triples::{ClassIdTypeChoice, ClassMap, EnvironmentMap, MeasurementMap,
//!               MeasurementValuesMap, ValueTriple},
//! };
//!
//! let mut reference_value = ValueTriple::new();
//! reference_value
//!     .set_environment(EnvironmentMap::from_class(ClassMap::from_id(
//!         ClassIdTypeChoice::Int(1),
//!     )))
//!     .unwrap()
//!     .add_measurement(MeasurementMap::new(
//!         None,
//!         MeasurementValuesMap::with_digests(vec![Digest::new(
//!             HashAlgorithm::Sha256_32,
//!             vec![0xde, 0xad, 0xbe, 0xef],
//!         )]),
//!     ))
//!     .unwrap();
//!
//! let mut comid = ConciseMidTag::new();
//! comid
//!     .set_tag_identity("acme-rr", Some(1))
//!     .unwrap()
//!     .add_entity(ComidEntityMap::new("ACME Inc.", vec![ComidRole::TagCreator]))
//!     .unwrap()
//!     .add_reference_value(reference_value)
//!     .unwrap();
//!
//! let cbor = comid.to_cbor().unwrap();
//! assert_eq!(ConciseMidTag::from_cbor(&cbor).unwrap(), comid);
//! ```

use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    codec::{self, de_error, Key, MapKey},
    core::{ProfileTypeChoice, TagIdTypeChoice, UriType},
    error::Error,
    extensions::{
        bind, Collection, Extensible, ExtensionPoint, ExtensionValue, Extensions, ExtensionsMap,
    },
    profiles,
    result::Result,
    triples::{
        ConditionalEndorsementSeriesTriple, ConditionalEndorsementTriple, CoswidTriple,
        DomainDependencyTriple, DomainMembershipTriple, KeyTriple, TriplesMap, ValueTriple,
    },
    valid::{valid_each, ResultExt, Valid},
};

generate_tagged!((
    506,
    TaggedConciseMidTag,
    ConciseMidTag,
    "comid",
    "A Concise Module Identifier (CoMID) structured tag"
));

code_enum!(
    /// Roles a CoMID entity can play.
    ComidRole, "comid role" {
        TagCreator = 0 => "tag-creator",
        Creator = 1 => "creator",
        Maintainer = 2 => "maintainer",
    }
);

code_enum!(
    /// Relation of a CoMID to a linked tag.
    TagRel, "tag relation" {
        Supplements = 0 => "supplements",
        Replaces = 1 => "replaces",
    }
);

keyed_record!(
    /// Identification information for a tag
    TagIdentityMap, "tag-identity" {
        tag_id: TagIdTypeChoice => (0, "id"),
        tag_version: u64 => (1, "version"),
    }
);

impl TagIdentityMap {
    pub fn new<T: Into<TagIdTypeChoice>>(tag_id: T, tag_version: Option<u64>) -> Self {
        Self {
            tag_id: Some(tag_id.into()),
            tag_version,
        }
    }
}

impl Valid for TagIdentityMap {
    fn valid(&self) -> Result<()> {
        match &self.tag_id {
            Some(tag_id) => tag_id.valid(),
            None => Err(Error::invalid("empty tag-id")),
        }
    }
}

keyed_record!(
    /// A reference from this tag to another one
    LinkedTagMap, "linked-tag" {
        linked_tag_id: TagIdTypeChoice => (0, "target"),
        tag_rel: TagRel => (1, "rel"),
    }
);

impl LinkedTagMap {
    pub fn new<T: Into<TagIdTypeChoice>>(target: T, rel: TagRel) -> Self {
        Self {
            linked_tag_id: Some(target.into()),
            tag_rel: Some(rel),
        }
    }
}

impl Valid for LinkedTagMap {
    fn valid(&self) -> Result<()> {
        match &self.linked_tag_id {
            Some(target) => target.valid().context("target")?,
            None => return Err(Error::invalid("empty target")),
        }

        match &self.tag_rel {
            Some(rel) => rel.known(),
            None => Err(Error::invalid("missing rel")),
        }
    }
}

/// Information about an entity associated with the tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComidEntityMap {
    pub name: String,
    pub reg_id: Option<UriType>,
    pub roles: Vec<ComidRole>,
    pub extensions: Extensions,
}

impl ComidEntityMap {
    pub const ENTITY_NAME: Key = Key::new(0, "name");
    pub const REG_ID: Key = Key::new(1, "regid");
    pub const ROLES: Key = Key::new(2, "roles");

    pub fn new(name: &str, roles: Vec<ComidRole>) -> Self {
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

impl Extensible for ComidEntityMap {
    const NAME: &'static str = "entity";
    const KEYS: &'static [Key] = &[Self::ENTITY_NAME, Self::REG_ID, Self::ROLES];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for ComidEntityMap {
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

impl Serialize for ComidEntityMap {
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

impl<'de> Deserialize<'de> for ComidEntityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntityVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for EntityVisitor {
            type Value = ComidEntityMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing ComidEntityMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entity = ComidEntityMap::default();
                let mut seen_name = false;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, <ComidEntityMap as Extensible>::KEYS) {
                        Some(ComidEntityMap::ENTITY_NAME) => {
                            entity.name = map.next_value()?;
                            seen_name = true;
                        }
                        Some(ComidEntityMap::REG_ID) => entity.reg_id = Some(map.next_value()?),
                        Some(ComidEntityMap::ROLES) => entity.roles = map.next_value()?,
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

/// A Concise Module Identifier tag.
///
/// The tag identity and the triples are mandatory; a decoded tag missing
/// either fails validation rather than decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConciseMidTag {
    pub language: Option<String>,
    pub tag_identity: TagIdentityMap,
    pub entities: Collection<ComidEntityMap>,
    pub linked_tags: Option<Vec<LinkedTagMap>>,
    pub triples: TriplesMap,
    pub extensions: Extensions,
}

impl ConciseMidTag {
    pub const LANGUAGE: Key = Key::new(0, "lang");
    pub const TAG_IDENTITY: Key = Key::new(1, "tag-identity");
    pub const ENTITIES: Key = Key::new(2, "entities");
    pub const LINKED_TAGS: Key = Key::new(3, "linked-tags");
    pub const TRIPLES: Key = Key::new(4, "triples");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConciseMidTagBuilder {
        ConciseMidTagBuilder::default()
    }

    pub fn set_language(&mut self, language: &str) -> &mut Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn set_tag_identity<T: Into<TagIdTypeChoice>>(
        &mut self,
        tag_id: T,
        tag_version: Option<u64>,
    ) -> Result<&mut Self> {
        let identity = TagIdentityMap::new(tag_id, tag_version);
        identity.valid().context("tag-identity validation failed")?;
        self.tag_identity = identity;
        Ok(self)
    }

    pub fn add_entity(&mut self, entity: ComidEntityMap) -> Result<&mut Self> {
        entity.valid().context("entity validation failed")?;
        self.entities.add(entity)?;
        Ok(self)
    }

    pub fn add_linked_tag(&mut self, linked_tag: LinkedTagMap) -> Result<&mut Self> {
        linked_tag.valid().context("linked-tag validation failed")?;
        self.linked_tags.get_or_insert_with(Vec::new).push(linked_tag);
        Ok(self)
    }

    pub fn add_reference_value(&mut self, triple: ValueTriple) -> Result<&mut Self> {
        self.triples.add_reference_value(triple)?;
        Ok(self)
    }

    pub fn add_endorsed_value(&mut self, triple: ValueTriple) -> Result<&mut Self> {
        self.triples.add_endorsed_value(triple)?;
        Ok(self)
    }

    pub fn add_dev_identity_key(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        self.triples.add_dev_identity_key(triple)?;
        Ok(self)
    }

    pub fn add_attester_verification_key(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        self.triples.add_attester_verification_key(triple)?;
        Ok(self)
    }

    pub fn add_dependency_triple(&mut self, triple: DomainDependencyTriple) -> Result<&mut Self> {
        self.triples.add_dependency_triple(triple)?;
        Ok(self)
    }

    pub fn add_membership_triple(&mut self, triple: DomainMembershipTriple) -> Result<&mut Self> {
        self.triples.add_membership_triple(triple)?;
        Ok(self)
    }

    pub fn add_coswid_triple(&mut self, triple: CoswidTriple) -> Result<&mut Self> {
        self.triples.add_coswid_triple(triple)?;
        Ok(self)
    }

    pub fn add_conditional_endorsement(
        &mut self,
        triple: ConditionalEndorsementTriple,
    ) -> Result<&mut Self> {
        self.triples.add_conditional_endorsement(triple)?;
        Ok(self)
    }

    pub fn add_conditional_endorsement_series(
        &mut self,
        triple: ConditionalEndorsementSeriesTriple,
    ) -> Result<&mut Self> {
        self.triples.add_conditional_endorsement_series(triple)?;
        Ok(self)
    }

    /// Binds a profile's CoMID-level shapes: the tag itself, its entities
    /// and everything under the triples map.
    pub fn bind_extensions(&mut self, points: &ExtensionsMap) -> Result<()> {
        bind(self, points, ExtensionPoint::Comid)?;
        if let Some(shape) = points.get(ExtensionPoint::Entity) {
            self.entities.register_extensions(shape.clone())?;
        }
        self.triples.bind_extensions(points)
    }

    /// Validates and encodes the untagged tag.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_cbor(self)
    }

    /// Decodes an untagged tag and validates it.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        Self::from_cbor_with_profile(data, None)
    }

    /// Decodes an untagged tag, binds the extensions of `profile` if given,
    /// then validates.
    pub fn from_cbor_with_profile(data: &[u8], profile: Option<&ProfileTypeChoice>) -> Result<Self> {
        let comid: Self = codec::from_cbor(data)?;
        comid.finish_decode(profile)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Self::from_json_with_profile(data, None)
    }

    pub fn from_json_with_profile(data: &[u8], profile: Option<&ProfileTypeChoice>) -> Result<Self> {
        let comid: Self = codec::from_json(data)?;
        comid.finish_decode(profile)
    }

    fn finish_decode(mut self, profile: Option<&ProfileTypeChoice>) -> Result<Self> {
        if let Some(profile) = profile {
            let manifest = profiles::lookup(profile)?;
            self.bind_extensions(manifest.extensions())?;
        }

        self.valid()?;
        Ok(self)
    }
}

impl Extensible for ConciseMidTag {
    const NAME: &'static str = "comid";
    const KEYS: &'static [Key] = &[
        Self::LANGUAGE,
        Self::TAG_IDENTITY,
        Self::ENTITIES,
        Self::LINKED_TAGS,
        Self::TRIPLES,
    ];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for ConciseMidTag {
    fn valid(&self) -> Result<()> {
        self.tag_identity
            .valid()
            .context("tag-identity validation failed")?;

        if self.entities.is_empty() {
            return Err(Error::invalid("no entities").context("entities validation failed"));
        }
        valid_each(&self.entities, "entity").context("entities validation failed")?;

        if let Some(linked_tags) = &self.linked_tags {
            valid_each(linked_tags, "linked-tag").context("linked-tags validation failed")?;
        }

        self.triples.valid().context("triples validation failed")?;

        self.extensions.valid().context("extensions validation failed")
    }
}

impl Serialize for ConciseMidTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(language) = &self.language {
            Self::LANGUAGE.serialize_entry(&mut map, hr, language)?;
        }
        Self::TAG_IDENTITY.serialize_entry(&mut map, hr, &self.tag_identity)?;
        if !self.entities.is_empty() {
            Self::ENTITIES.serialize_entry(&mut map, hr, &self.entities)?;
        }
        if let Some(linked_tags) = &self.linked_tags {
            Self::LINKED_TAGS.serialize_entry(&mut map, hr, linked_tags)?;
        }
        Self::TRIPLES.serialize_entry(&mut map, hr, &self.triples)?;

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConciseMidTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ComidVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for ComidVisitor {
            type Value = ConciseMidTag;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing ConciseMidTag fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut comid = ConciseMidTag::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, <ConciseMidTag as Extensible>::KEYS) {
                        Some(ConciseMidTag::LANGUAGE) => comid.language = Some(map.next_value()?),
                        Some(ConciseMidTag::TAG_IDENTITY) => comid.tag_identity = map.next_value()?,
                        Some(ConciseMidTag::ENTITIES) => comid.entities = map.next_value()?,
                        Some(ConciseMidTag::LINKED_TAGS) => {
                            comid.linked_tags = Some(map.next_value()?)
                        }
                        Some(ConciseMidTag::TRIPLES) => comid.triples = map.next_value()?,
                        _ => comid
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(de_error)?,
                    }
                }

                Ok(comid)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(ComidVisitor { is_human_readable })
    }
}

/// Assembles a [`ConciseMidTag`] and validates it on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ConciseMidTagBuilder {
    language: Option<String>,
    tag_identity: Option<TagIdentityMap>,
    entities: Vec<ComidEntityMap>,
    linked_tags: Vec<LinkedTagMap>,
    triples: Option<TriplesMap>,
    extensions: ExtensionsMap,
}

impl ConciseMidTagBuilder {
    pub fn language(mut self, value: &str) -> Self {
        self.language = Some(value.to_string());
        self
    }

    pub fn tag_identity(mut self, value: TagIdentityMap) -> Self {
        self.tag_identity = Some(value);
        self
    }

    pub fn entity(mut self, value: ComidEntityMap) -> Self {
        self.entities.push(value);
        self
    }

    pub fn linked_tag(mut self, value: LinkedTagMap) -> Self {
        self.linked_tags.push(value);
        self
    }

    pub fn triples(mut self, value: TriplesMap) -> Self {
        self.triples = Some(value);
        self
    }

    /// Shapes bound to the tag before validation.
    pub fn extensions(mut self, value: ExtensionsMap) -> Self {
        self.extensions = value;
        self
    }

    pub fn build(self) -> Result<ConciseMidTag> {
        let mut comid = ConciseMidTag {
            language: self.language,
            tag_identity: self
                .tag_identity
                .ok_or_else(|| Error::invalid("unset mandatory field tag-identity"))?,
            entities: self.entities.into(),
            linked_tags: (!self.linked_tags.is_empty()).then_some(self.linked_tags),
            triples: self
                .triples
                .ok_or_else(|| Error::invalid("unset mandatory field triples"))?,
            extensions: Extensions::default(),
        };

        comid.bind_extensions(&self.extensions)?;
        comid.valid()?;
        Ok(comid)
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        core::{Digest, HashAlgorithm},
        extensions::{ExtensionShape, FieldKind},
        test::SerdeTestCase,
        triples::{ClassIdTypeChoice, ClassMap, EnvironmentMap, MeasurementMap, MeasurementValuesMap},
    };

    fn reference_value() -> ValueTriple {
        let mut triple = ValueTriple::new();
        triple
            .set_environment(EnvironmentMap::from_class(ClassMap::from_id(
                ClassIdTypeChoice::Int(1),
            )))
            .unwrap()
            .add_measurement(MeasurementMap::new(
                None,
                MeasurementValuesMap::with_digests(vec![Digest::new(
                    HashAlgorithm::Sha256_32,
                    vec![0xde, 0xad, 0xbe, 0xef],
                )]),
            ))
            .unwrap();
        triple
    }

    fn minimal_comid() -> ConciseMidTag {
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

    #[test]
    fn test_comid_serde() {
        SerdeTestCase {
            value: minimal_comid(),
            expected_json: concat!(
                r#"{"tag-identity":{"id":"acme"},"#,
                r#""entities":[{"name":"ACME","roles":["tag-creator"]}],"#,
                r#""triples":{"reference-values":[{"environment":{"class":{"id":{"type":"int","value":1}}},"#,
                r#""measurements":[{"value":{"digests":["sha-256-32;3q2+7w=="]}}]}]}}"#,
            ),
            expected_cbor: vec![
                0xa3, // map(3)
                  0x01, // tag-identity
                    0xa1, 0x00, 0x64, 0x61, 0x63, 0x6d, 0x65, // {0: "acme"}
                  0x02, // entities
                    0x81, 0xa2,
                      0x00, 0x64, 0x41, 0x43, 0x4d, 0x45, // name: "ACME"
                      0x02, 0x81, 0x00, // roles: [tag-creator]
                  0x04, // triples
                    0xa1, 0x00, 0x81, // reference-values: [
                      0x82,
                        0xa1, 0x00, 0xa1, 0x00, 0x01, // {class: {id: 1}}
                        0x81, 0xa1, 0x01, 0xa1, 0x02, 0x81, // [{value: {digests: [
                          0x82, 0x06, 0x44, 0xde, 0xad, 0xbe, 0xef, // [6, h'deadbeef']
            ],
        }
        .run();
    }

    #[test]
    fn test_tagged_comid_prefix() {
        let tagged = TaggedConciseMidTag::new(minimal_comid());
        let cbor = codec::to_cbor(&tagged).unwrap();

        assert_eq!(&cbor[..3], &[0xd9, 0x01, 0xfa]);
        assert_eq!(codec::from_cbor::<TaggedConciseMidTag>(&cbor).unwrap(), tagged);
    }

    #[test]
    fn test_empty_map() {
        let err = ConciseMidTag::from_cbor(&[0xa0]).unwrap_err();

        assert_eq!(err.to_string(), "tag-identity validation failed: empty tag-id");
    }

    #[test]
    fn test_bad_cbor() {
        let err = ConciseMidTag::from_cbor(&[0xff, 0xff]).unwrap_err();

        assert!(
            err.to_string().contains(r#"cbor: unexpected "break" code"#),
            "{err}"
        );
    }

    #[test]
    fn test_validation_order() {
        let mut comid = ConciseMidTag::new();
        comid.set_tag_identity("acme", Some(3)).unwrap();
        assert_eq!(
            comid.valid().unwrap_err().to_string(),
            "entities validation failed: no entities"
        );

        comid.entities = vec![ComidEntityMap::new("ACME", vec![])].into();
        assert_eq!(
            comid.valid().unwrap_err().to_string(),
            "entities validation failed: invalid entity at index 0: empty roles"
        );

        comid.entities = vec![ComidEntityMap::new("ACME", vec![ComidRole::Creator])].into();
        comid.linked_tags = Some(vec![LinkedTagMap {
            linked_tag_id: Some("other".into()),
            tag_rel: None,
        }]);
        assert_eq!(
            comid.valid().unwrap_err().to_string(),
            "linked-tags validation failed: invalid linked-tag at index 0: missing rel"
        );

        comid.linked_tags = Some(vec![LinkedTagMap::new("other", TagRel::Supplements)]);
        assert_eq!(
            comid.valid().unwrap_err().to_string(),
            "triples validation failed: no triples"
        );

        comid.add_reference_value(reference_value()).unwrap();
        assert!(comid.valid().is_ok());
    }

    #[test]
    fn test_entity_regid() {
        let entity = ComidEntityMap::new("ACME", vec![ComidRole::TagCreator, ComidRole::Maintainer])
            .with_reg_id(UriType::parse("https://acme.example").unwrap());

        let cbor = codec::to_cbor(&entity).unwrap();
        // regid carries tag 32
        assert_eq!(&cbor[7..10], &[0x01, 0xd8, 0x20]);

        let json = String::from_utf8(codec::to_json(&entity).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"name":"ACME","regid":"https://acme.example","roles":["tag-creator","maintainer"]}"#
        );
        assert_eq!(codec::from_json::<ComidEntityMap>(json.as_bytes()).unwrap(), entity);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let mut comid = minimal_comid();
        comid.extensions.accept(MapKey::Int(-1), "fw".into()).unwrap();

        let cbor = codec::to_cbor(&comid).unwrap();
        let decoded = ConciseMidTag::from_cbor(&cbor).unwrap();
        assert_eq!(decoded.extensions.cached().len(), 1);
        assert_eq!(codec::to_cbor(&decoded).unwrap(), cbor);

        let shape = ExtensionShape::builder("platform")
            .field("firmware", "firmware", -1, FieldKind::Text)
            .build()
            .unwrap();
        let mut bound = decoded.clone();
        bound
            .bind_extensions(&ExtensionsMap::new().with(ExtensionPoint::Comid, shape))
            .unwrap();
        assert_eq!(bound.extensions.get_string("firmware").unwrap(), "fw");
        assert_eq!(codec::to_cbor(&bound).unwrap(), cbor);
    }

    #[test]
    fn test_entity_extensions() {
        let shape = ExtensionShape::builder("address")
            .required_field("address", "address", -1, FieldKind::Text)
            .build()
            .unwrap();

        let mut comid = ConciseMidTag::builder()
            .tag_identity(TagIdentityMap::new("acme", None))
            .entity(ComidEntityMap::new("ACME", vec![ComidRole::TagCreator]))
            .triples({
                let mut triples = TriplesMap::new();
                triples.add_reference_value(reference_value()).unwrap();
                triples
            })
            .build()
            .unwrap();

        comid
            .bind_extensions(&ExtensionsMap::new().with(ExtensionPoint::Entity, shape))
            .unwrap();
        assert!(comid
            .valid()
            .unwrap_err()
            .to_string()
            .starts_with("entities validation failed: invalid entity at index 0: "));

        comid.entities[0]
            .extensions
            .set("address", "1 Road Runner Way")
            .unwrap();
        assert!(comid.valid().is_ok());

        let json = comid.to_json().unwrap();
        assert!(String::from_utf8(json.clone())
            .unwrap()
            .contains(r#""address":"1 Road Runner Way""#));
        assert_eq!(ConciseMidTag::from_json(&json).unwrap().entities[0].extensions.cached().len(), 1);
    }

    #[test]
    fn test_builder_mandatory_fields() {
        let err = ConciseMidTag::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "unset mandatory field tag-identity");

        let err = ConciseMidTag::builder()
            .tag_identity(TagIdentityMap::new("acme", None))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "unset mandatory field triples");
    }
}
