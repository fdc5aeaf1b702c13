// SPDX-License-Identifier: MIT

//! Concise Evidence (CoEv).
//!
//! Evidence produced by an attester, expressed with the same environment and
//! measurement vocabulary as CoMID. A document is carried under CBOR tag 571.

use std::fmt;

use ciborium::Value;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    codec::{
        self, de_error, describe, expect_bytes, expect_json_str,
        tags::{add_prefix, strip_prefix, TAG_CONCISE_EVIDENCE, TAG_UUID},
        Key, MapKey,
    },
    core::{ProfileTypeChoice, UuidType},
    error::{Error, TypeChoiceError},
    extensions::{
        bind, Extensible, ExtensionPoint, ExtensionValue, Extensions, ExtensionsMap,
    },
    profiles,
    result::Result,
    triples::{
        DomainDependencyTriple, DomainMembershipTriple, EvCoswidTriple, KeyTriple, ValueTriple,
    },
    type_choice::{ChoiceExtension, TypeChoice},
    valid::{non_empty, valid_each, ResultExt, Valid},
};

/// Identifies a piece of evidence.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceIdTypeChoice {
    Uuid(UuidType),
    Extension(ChoiceExtension),
}

impl TypeChoice for EvidenceIdTypeChoice {
    const CHOICE: &'static str = "EvidenceID";
    const TYPE_NAMES: &'static [&'static str] = &["uuid"];
    const TAGS: &'static [u64] = &[TAG_UUID];

    fn type_name(&self) -> &str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Uuid(u) => u.to_tagged_value(),
            Self::Extension(ext) => ext.to_cbor_value(),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Tag(TAG_UUID, inner) => {
                UuidType::try_from(expect_bytes(*inner, "uuid")?.as_slice()).map(Self::Uuid)
            }
            other @ Value::Tag(..) => {
                ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension)
            }
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match type_name {
            "uuid" => UuidType::parse(&expect_json_str(value, type_name)?).map(Self::Uuid),
            other => ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension),
        }
    }
}

impl Valid for EvidenceIdTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Uuid(_) => Ok(()),
            Self::Extension(ext) => ext.valid(),
        }
    }
}

impl_type_choice_serde!(EvidenceIdTypeChoice);

choice_accessors!(EvidenceIdTypeChoice {
    get_uuid => Uuid(UuidType),
});

impl From<UuidType> for EvidenceIdTypeChoice {
    fn from(value: UuidType) -> Self {
        Self::Uuid(value)
    }
}

/// The triples of a Concise Evidence.
#[derive(Debug, Clone, Default)]
pub struct EvTriples {
    pub evidence_triples: Option<Vec<ValueTriple>>,
    pub identity_triples: Option<Vec<KeyTriple>>,
    pub dependency_triples: Option<Vec<DomainDependencyTriple>>,
    pub membership_triples: Option<Vec<DomainMembershipTriple>>,
    pub coswid_triples: Option<Vec<EvCoswidTriple>>,
    pub attest_key_triples: Option<Vec<KeyTriple>>,
    pub extensions: Extensions,
    points: ExtensionsMap,
}

impl PartialEq for EvTriples {
    fn eq(&self, other: &Self) -> bool {
        self.evidence_triples == other.evidence_triples
            && self.identity_triples == other.identity_triples
            && self.dependency_triples == other.dependency_triples
            && self.membership_triples == other.membership_triples
            && self.coswid_triples == other.coswid_triples
            && self.attest_key_triples == other.attest_key_triples
            && self.extensions == other.extensions
    }
}

impl EvTriples {
    pub const EVIDENCE_TRIPLES: Key = Key::new(0, "evidence-triples");
    pub const IDENTITY_TRIPLES: Key = Key::new(1, "identity-triples");
    pub const DEPENDENCY_TRIPLES: Key = Key::new(2, "dependency-triples");
    pub const MEMBERSHIP_TRIPLES: Key = Key::new(3, "membership-triples");
    pub const COSWID_TRIPLES: Key = Key::new(4, "coswid-triples");
    pub const ATTEST_KEY_TRIPLES: Key = Key::new(5, "attest-key-triples");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence_triples.is_none()
            && self.identity_triples.is_none()
            && self.dependency_triples.is_none()
            && self.membership_triples.is_none()
            && self.coswid_triples.is_none()
            && self.attest_key_triples.is_none()
    }

    /// Binds the evidence-triples shape and the evidence measurement shape.
    /// Evidence triples added later get the same shape.
    pub fn bind_extensions(&mut self, points: &ExtensionsMap) -> Result<()> {
        bind(self, points, ExtensionPoint::EvTriples)?;

        if let Some(shape) = points.get(ExtensionPoint::EvidenceValue) {
            for triple in self.evidence_triples.iter_mut().flatten() {
                triple.register_measurement_extensions(shape.clone())?;
            }
        }

        self.points = points.clone();
        Ok(())
    }

    pub fn add_evidence_triple(&mut self, mut triple: ValueTriple) -> Result<&mut Self> {
        if let Some(shape) = self.points.get(ExtensionPoint::EvidenceValue) {
            triple.register_measurement_extensions(shape.clone())?;
        }
        triple.valid().context("invalid evidence-triple")?;
        self.evidence_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_identity_triple(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        triple.valid().context("invalid identity-triple")?;
        self.identity_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_dependency_triple(&mut self, triple: DomainDependencyTriple) -> Result<&mut Self> {
        triple.valid().context("invalid dependency-triple")?;
        self.dependency_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_membership_triple(&mut self, triple: DomainMembershipTriple) -> Result<&mut Self> {
        triple.valid().context("invalid membership-triple")?;
        self.membership_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_coswid_triple(&mut self, triple: EvCoswidTriple) -> Result<&mut Self> {
        triple.valid().context("invalid coswid-triple")?;
        self.coswid_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_attest_key_triple(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        triple.valid().context("invalid attest-key-triple")?;
        self.attest_key_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }
}

impl Extensible for EvTriples {
    const NAME: &'static str = "ev-triples";
    const KEYS: &'static [Key] = &[
        Self::EVIDENCE_TRIPLES,
        Self::IDENTITY_TRIPLES,
        Self::DEPENDENCY_TRIPLES,
        Self::MEMBERSHIP_TRIPLES,
        Self::COSWID_TRIPLES,
        Self::ATTEST_KEY_TRIPLES,
    ];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

fn valid_list<T: Valid>(list: &Option<Vec<T>>, what: &str) -> Result<()> {
    match list {
        Some(items) => {
            non_empty(items, &format!("empty {what} list"))?;
            valid_each(items, what)
        }
        None => Ok(()),
    }
}

impl Valid for EvTriples {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("no triples"));
        }

        valid_list(&self.evidence_triples, "evidence-triple")?;
        valid_list(&self.identity_triples, "identity-triple")?;
        valid_list(&self.dependency_triples, "dependency-triple")?;
        valid_list(&self.membership_triples, "membership-triple")?;
        valid_list(&self.coswid_triples, "coswid-triple")?;
        valid_list(&self.attest_key_triples, "attest-key-triple")?;

        self.extensions.valid().context("extensions")
    }
}

impl Serialize for EvTriples {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(v) = &self.evidence_triples {
            Self::EVIDENCE_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.identity_triples {
            Self::IDENTITY_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.dependency_triples {
            Self::DEPENDENCY_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.membership_triples {
            Self::MEMBERSHIP_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.coswid_triples {
            Self::COSWID_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.attest_key_triples {
            Self::ATTEST_KEY_TRIPLES.serialize_entry(&mut map, hr, v)?;
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for EvTriples {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EvTriplesVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for EvTriplesVisitor {
            type Value = EvTriples;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing EvTriples fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                type T = EvTriples;
                let mut triples = T::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, T::KEYS) {
                        Some(T::EVIDENCE_TRIPLES) => {
                            triples.evidence_triples = Some(map.next_value()?)
                        }
                        Some(T::IDENTITY_TRIPLES) => {
                            triples.identity_triples = Some(map.next_value()?)
                        }
                        Some(T::DEPENDENCY_TRIPLES) => {
                            triples.dependency_triples = Some(map.next_value()?)
                        }
                        Some(T::MEMBERSHIP_TRIPLES) => {
                            triples.membership_triples = Some(map.next_value()?)
                        }
                        Some(T::COSWID_TRIPLES) => triples.coswid_triples = Some(map.next_value()?),
                        Some(T::ATTEST_KEY_TRIPLES) => {
                            triples.attest_key_triples = Some(map.next_value()?)
                        }
                        _ => triples
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(de_error)?,
                    }
                }

                Ok(triples)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(EvTriplesVisitor { is_human_readable })
    }
}

/// A Concise Evidence document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConciseEvidence {
    pub ev_triples: EvTriples,
    pub evidence_id: Option<EvidenceIdTypeChoice>,
    pub profile: Option<ProfileTypeChoice>,
    pub extensions: Extensions,
}

impl ConciseEvidence {
    pub const EV_TRIPLES: Key = Key::new(0, "ev-triples");
    pub const EVIDENCE_ID: Key = Key::new(1, "evidence-id");
    pub const PROFILE: Key = Key::new(2, "profile");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_evidence_triple(&mut self, triple: ValueTriple) -> Result<&mut Self> {
        self.ev_triples.add_evidence_triple(triple)?;
        Ok(self)
    }

    pub fn add_identity_triple(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        self.ev_triples.add_identity_triple(triple)?;
        Ok(self)
    }

    pub fn add_dependency_triple(&mut self, triple: DomainDependencyTriple) -> Result<&mut Self> {
        self.ev_triples.add_dependency_triple(triple)?;
        Ok(self)
    }

    pub fn add_membership_triple(&mut self, triple: DomainMembershipTriple) -> Result<&mut Self> {
        self.ev_triples.add_membership_triple(triple)?;
        Ok(self)
    }

    pub fn add_coswid_triple(&mut self, triple: EvCoswidTriple) -> Result<&mut Self> {
        self.ev_triples.add_coswid_triple(triple)?;
        Ok(self)
    }

    pub fn add_attest_key_triple(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        self.ev_triples.add_attest_key_triple(triple)?;
        Ok(self)
    }

    pub fn set_evidence_id<T: Into<EvidenceIdTypeChoice>>(&mut self, id: T) -> Result<&mut Self> {
        let id = id.into();
        id.valid().context("invalid evidence-id")?;
        self.evidence_id = Some(id);
        Ok(self)
    }

    pub fn set_profile(&mut self, profile: ProfileTypeChoice) -> Result<&mut Self> {
        profile.valid().context("invalid profile")?;
        self.profile = Some(profile);
        Ok(self)
    }

    pub fn bind_extensions(&mut self, points: &ExtensionsMap) -> Result<()> {
        bind(self, points, ExtensionPoint::ConciseEvidence)?;
        self.ev_triples.bind_extensions(points)
    }

    /// Binds the extensions of the document's profile, if that profile is
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

    /// Validates and encodes the document under tag 571.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        Ok(add_prefix(TAG_CONCISE_EVIDENCE, &codec::to_cbor(self)?))
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let mut evidence: Self = codec::from_cbor(strip_prefix(TAG_CONCISE_EVIDENCE, data)?)?;
        evidence.apply_profile()?;
        evidence.valid()?;
        Ok(evidence)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let mut evidence: Self = codec::from_json(data)?;
        evidence.apply_profile()?;
        evidence.valid()?;
        Ok(evidence)
    }
}

impl Extensible for ConciseEvidence {
    const NAME: &'static str = "concise-evidence";
    const KEYS: &'static [Key] = &[Self::EV_TRIPLES, Self::EVIDENCE_ID, Self::PROFILE];

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Valid for ConciseEvidence {
    fn valid(&self) -> Result<()> {
        self.ev_triples
            .valid()
            .context("ev-triples validation failed")?;

        if let Some(id) = &self.evidence_id {
            id.valid().context("evidence-id validation failed")?;
        }
        if let Some(profile) = &self.profile {
            profile.valid().context("profile validation failed")?;
        }

        self.extensions.valid().context("extensions validation failed")
    }
}

impl Serialize for ConciseEvidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        Self::EV_TRIPLES.serialize_entry(&mut map, hr, &self.ev_triples)?;
        if let Some(id) = &self.evidence_id {
            Self::EVIDENCE_ID.serialize_entry(&mut map, hr, id)?;
        }
        if let Some(profile) = &self.profile {
            Self::PROFILE.serialize_entry(&mut map, hr, profile)?;
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConciseEvidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EvidenceVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for EvidenceVisitor {
            type Value = ConciseEvidence;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing ConciseEvidence fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                type T = ConciseEvidence;
                let mut evidence = T::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, <T as Extensible>::KEYS) {
                        Some(T::EV_TRIPLES) => evidence.ev_triples = map.next_value()?,
                        Some(T::EVIDENCE_ID) => evidence.evidence_id = Some(map.next_value()?),
                        Some(T::PROFILE) => evidence.profile = Some(map.next_value()?),
                        _ => evidence
                            .extensions
                            .accept(key, map.next_value::<ExtensionValue>()?)
                            .map_err(de_error)?,
                    }
                }

                Ok(evidence)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(EvidenceVisitor { is_human_readable })
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        extensions::{ExtensionShape, FieldKind},
        triples::tests::{class_env, reference_value},
    };

    const EVIDENCE_UUID: &str = "31fb5abf-023e-4992-aa4e-95f9c1503bfa";

    fn evidence_id() -> EvidenceIdTypeChoice {
        UuidType::parse(EVIDENCE_UUID).unwrap().into()
    }

    fn dependency(dependents: &[i64]) -> DomainDependencyTriple {
        let mut triple = DomainDependencyTriple::new();
        triple.set_domain(class_env(1)).unwrap();
        for id in dependents {
            triple.add_dependent(class_env(*id)).unwrap();
        }
        triple
    }

    fn membership(members: &[i64]) -> DomainMembershipTriple {
        let mut triple = DomainMembershipTriple::new();
        triple.set_domain(class_env(1)).unwrap();
        for id in members {
            triple.add_member(class_env(*id)).unwrap();
        }
        triple
    }

    fn with_id() -> ConciseEvidence {
        let mut evidence = ConciseEvidence::new();
        evidence.set_evidence_id(evidence_id()).unwrap();
        evidence
    }

    // The size tests below use this module's own fixtures: the evidence-id
    // is EVIDENCE_UUID, every domain is `class_env(1)` and every dependent or
    // member is `class_env(N)`, an integer class id.

    #[test]
    fn test_dependency_triples_size() {
        // with_id() + dependency(&[2, 3])
        let mut evidence = with_id();
        evidence.add_dependency_triple(dependency(&[2, 3])).unwrap();

        let cbor = evidence.to_cbor().unwrap();
        assert_eq!(&cbor[..3], &[0xd9, 0x02, 0x3b]);
        assert_eq!(&cbor[3..10], &[
            0xa2, // map(2)
              0x00, 0xa1, // ev-triples: {
                0x02, 0x81, // dependency-triples: [
                  0x82, 0xa1, // [domain
        ]);
        assert_eq!(cbor.len(), 45);
        assert_eq!(ConciseEvidence::from_cbor(&cbor).unwrap(), evidence);
    }

    #[test]
    fn test_membership_triples_size() {
        // with_id() + membership(&[2, 3])
        let mut evidence = with_id();
        evidence.add_membership_triple(membership(&[2, 3])).unwrap();

        let cbor = evidence.to_cbor().unwrap();
        assert_eq!(cbor[6], 0x03);
        assert_eq!(cbor.len(), 45);
        assert_eq!(ConciseEvidence::from_cbor(&cbor).unwrap(), evidence);
    }

    #[test]
    fn test_dependency_and_membership_size() {
        // with_id() + dependency(&[2]) + membership(&[3])
        let mut evidence = with_id();
        evidence
            .add_dependency_triple(dependency(&[2]))
            .unwrap()
            .add_membership_triple(membership(&[3]))
            .unwrap();

        let cbor = evidence.to_cbor().unwrap();
        assert_eq!(cbor.len(), 54);
        assert_eq!(ConciseEvidence::from_cbor(&cbor).unwrap(), evidence);
    }

    #[test]
    fn test_evidence_json() {
        let mut evidence = with_id();
        evidence.add_evidence_triple(reference_value()).unwrap();

        let json = String::from_utf8(evidence.to_json().unwrap()).unwrap();
        assert!(json.starts_with(r#"{"ev-triples":{"evidence-triples":[{"environment":"#), "{json}");
        assert!(json.ends_with(&format!(
            r#""evidence-id":{{"type":"uuid","value":"{EVIDENCE_UUID}"}}}}"#
        )));
        assert_eq!(ConciseEvidence::from_json(json.as_bytes()).unwrap(), evidence);
    }

    #[test]
    fn test_unknown_evidence_id_type() {
        let json = r#"{"ev-triples":{},"evidence-id":{"type":"serial","value":"x"}}"#;
        let err = ConciseEvidence::from_json(json.as_bytes()).unwrap_err();

        assert!(err.to_string().contains("unknown EvidenceID type: serial"), "{err}");
    }

    #[test]
    fn test_empty_ev_triples() {
        assert_eq!(
            with_id().valid().unwrap_err().to_string(),
            "ev-triples validation failed: no triples"
        );

        let mut evidence = with_id();
        let err = evidence
            .add_dependency_triple(DomainDependencyTriple::new())
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid dependency-triple"), "{err}");
    }

    #[test]
    fn test_prefix_check() {
        let mut evidence = with_id();
        evidence.add_dependency_triple(dependency(&[2])).unwrap();
        let cbor = evidence.to_cbor().unwrap();

        let err = ConciseEvidence::from_cbor(&cbor[3..]).unwrap_err();
        assert!(err.to_string().starts_with("cbor: expected tag 571"), "{err}");
    }

    #[test]
    fn test_evidence_value_extensions() {
        let shape = ExtensionShape::builder("tee")
            .field("tcbdate", "tee.tcbdate", -72, FieldKind::Text)
            .build()
            .unwrap();
        let points = ExtensionsMap::new().with(ExtensionPoint::EvidenceValue, shape);

        let mut evidence = with_id();
        evidence.bind_extensions(&points).unwrap();
        evidence.add_evidence_triple(reference_value()).unwrap();

        let triples = evidence.ev_triples.evidence_triples.as_ref().unwrap();
        assert!(triples[0].measurements[0].mval.extensions.is_registered());
    }
}
