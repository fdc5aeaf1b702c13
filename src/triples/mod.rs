// SPDX-License-Identifier: MIT

//! Triple records: the assertions a CoMID or a piece of evidence makes about
//! an environment.
//!
//! Every triple is a CBOR array in which the first item names an environment
//! and the second holds the payload. In JSON the same triple is an object
//! with named members:
//!
//! | Triple | JSON members |
//! |--------|--------------|
//! | [`ValueTriple`] | `environment`, `measurements` |
//! | [`KeyTriple`] | `environment`, `verification-keys` |
//! | [`DomainDependencyTriple`] | `domain`, `dependents` |
//! | [`DomainMembershipTriple`] | `domain`, `members` |
//! | [`CoswidTriple`] | `environment`, `tag-ids` |
//! | [`EvCoswidTriple`] | `environment`, `evidence` |
//! | [`ConditionalEndorsementTriple`] | `conditions`, `endorsements` |
//! | [`ConditionalEndorsementSeriesTriple`] | `condition`, `series` |
//!
//! ```
//! use rats_corim::{
//!     core::{Digest, HashAlgorithm},
//!     triples::{ClassMap, ClassIdTypeChoice, EnvironmentMap, MeasurementMap,
//!               MeasurementValuesMap, ValueTriple},
//!     valid::Valid,
//! };
//!
//! let mut triple = ValueTriple::new();
//! triple
//!     .set_environment(EnvironmentMap::from_class(ClassMap::from_id(
//!         ClassIdTypeChoice::Int(7),
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
//! assert!(triple.valid().is_ok());
//! ```

pub mod cryptokey;
pub mod environment;
pub mod measurement;

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::{
    de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeTuple},
    Deserialize, Deserializer, Serialize, Serializer,
};

pub use cryptokey::CryptoKeyTypeChoice;
pub use environment::{
    ClassIdTypeChoice, ClassMap, EnvironmentMap, GroupIdTypeChoice, InstanceIdTypeChoice,
};
pub use measurement::{
    FlagsMap, IntegrityRegisters, IpAddr, MacAddr, MeasurementMap, MeasurementValuesMap,
    MkeyTypeChoice, PsaRefValId, RawValueTypeChoice, RegisterId, SvnTypeChoice, VersionMap,
};

use crate::{
    codec::{de_error, Key, MapKey},
    core::TagIdTypeChoice,
    coswid::Evidence,
    error::Error,
    extensions::{
        Collection, Extensible, ExtensionPoint, ExtensionShape, ExtensionValue, Extensions,
        ExtensionsMap,
    },
    result::Result,
    valid::{non_empty, valid_each, ResultExt, Valid},
};

/// Writes a two-item record: an array in CBOR, an object in JSON.
fn serialize_pair<S, A, B>(
    serializer: S,
    names: [&'static str; 2],
    first: &A,
    second: &B,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    A: Serialize + ?Sized,
    B: Serialize + ?Sized,
{
    if serializer.is_human_readable() {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(names[0], first)?;
        map.serialize_entry(names[1], second)?;
        map.end()
    } else {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(first)?;
        tuple.serialize_element(second)?;
        tuple.end()
    }
}

struct PairVisitor<A, B> {
    record: &'static str,
    names: [&'static str; 2],
    marker: PhantomData<(A, B)>,
}

impl<'de, A, B> Visitor<'de> for PairVisitor<A, B>
where
    A: Deserialize<'de>,
    B: Deserialize<'de>,
{
    type Value = (A, B);

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a {} as a two-item array or an object", self.record)
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> std::result::Result<Self::Value, S::Error> {
        let first = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let second = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;

        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::custom(format!(
                "too many items in {}",
                self.record
            )));
        }

        Ok((first, second))
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> std::result::Result<Self::Value, M::Error> {
        let mut first = None;
        let mut second = None;

        while let Some(key) = map.next_key::<String>()? {
            if key == self.names[0] {
                first = Some(map.next_value()?);
            } else if key == self.names[1] {
                second = Some(map.next_value()?);
            } else {
                return Err(de::Error::custom(format!(
                    "unexpected {} key {key}",
                    self.record
                )));
            }
        }

        Ok((
            first.ok_or_else(|| de::Error::missing_field(self.names[0]))?,
            second.ok_or_else(|| de::Error::missing_field(self.names[1]))?,
        ))
    }
}

fn deserialize_pair<'de, D, A, B>(
    deserializer: D,
    record: &'static str,
    names: [&'static str; 2],
) -> std::result::Result<(A, B), D::Error>
where
    D: Deserializer<'de>,
    A: Deserialize<'de>,
    B: Deserialize<'de>,
{
    deserializer.deserialize_any(PairVisitor {
        record,
        names,
        marker: PhantomData,
    })
}

/// Implements the pair codec for a two-field triple.
macro_rules! impl_pair_serde {
    ($type:ident, $record:literal, $first:ident: $first_name:literal, $second:ident: $second_name:literal) => {
        impl Serialize for $type {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serialize_pair(serializer, [$first_name, $second_name], &self.$first, &self.$second)
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let ($first, $second) =
                    deserialize_pair(deserializer, $record, [$first_name, $second_name])?;
                Ok(Self { $first, $second })
            }
        }
    };
}

fn checked_environment(environment: EnvironmentMap) -> Result<EnvironmentMap> {
    environment.valid().context("invalid environment")?;
    Ok(environment)
}

/// An environment and measurements of it.
///
/// Used for reference values, endorsed values and evidence alike; the triple
/// map key says which.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTriple {
    pub environment: EnvironmentMap,
    pub measurements: Collection<MeasurementMap>,
}

impl ValueTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_environment(&mut self, environment: EnvironmentMap) -> Result<&mut Self> {
        self.environment = checked_environment(environment)?;
        Ok(self)
    }

    pub fn add_measurement(&mut self, measurement: MeasurementMap) -> Result<&mut Self> {
        measurement.valid().context("invalid measurement")?;
        self.measurements.add(measurement)?;
        Ok(self)
    }

    /// Binds `shape` to the values map of every measurement.
    pub fn register_measurement_extensions(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        self.measurements.register_extensions(shape)
    }

    /// Binds `shape` to the flags of every measurement that has flags.
    pub fn register_flags_extensions(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        for measurement in self.measurements.iter_mut() {
            measurement.register_flags_extensions(Arc::clone(&shape))?;
        }
        Ok(())
    }
}

impl Valid for ValueTriple {
    fn valid(&self) -> Result<()> {
        self.environment
            .valid()
            .context("environment validation failed")?;
        non_empty(self.measurements.as_slice(), "no measurements")?;
        valid_each(&self.measurements, "measurement")
    }
}

impl_pair_serde!(ValueTriple, "value triple", environment: "environment", measurements: "measurements");

/// An environment together with measurements describing its state; the
/// condition half of a conditional endorsement.
pub type StatefulEnvironmentRecord = ValueTriple;

/// An environment and the keys it holds: identity or attestation keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyTriple {
    pub environment: EnvironmentMap,
    pub keys: Vec<CryptoKeyTypeChoice>,
}

impl KeyTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_environment(&mut self, environment: EnvironmentMap) -> Result<&mut Self> {
        self.environment = checked_environment(environment)?;
        Ok(self)
    }

    pub fn add_key(&mut self, key: CryptoKeyTypeChoice) -> Result<&mut Self> {
        key.valid().context("invalid key")?;
        self.keys.push(key);
        Ok(self)
    }
}

impl Valid for KeyTriple {
    fn valid(&self) -> Result<()> {
        self.environment
            .valid()
            .context("environment validation failed")?;
        non_empty(&self.keys, "no keys")?;
        valid_each(&self.keys, "key")
    }
}

impl_pair_serde!(KeyTriple, "key triple", environment: "environment", keys: "verification-keys");

/// A domain and the environments that depend on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainDependencyTriple {
    pub domain: EnvironmentMap,
    pub dependents: Vec<EnvironmentMap>,
}

impl DomainDependencyTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_domain(&mut self, domain: EnvironmentMap) -> Result<&mut Self> {
        self.domain = checked_environment(domain)?;
        Ok(self)
    }

    pub fn add_dependent(&mut self, dependent: EnvironmentMap) -> Result<&mut Self> {
        self.dependents.push(checked_environment(dependent)?);
        Ok(self)
    }
}

impl Valid for DomainDependencyTriple {
    fn valid(&self) -> Result<()> {
        self.domain.valid().context("domain validation failed")?;
        non_empty(&self.dependents, "no dependents")?;
        valid_each(&self.dependents, "dependent")
    }
}

impl_pair_serde!(DomainDependencyTriple, "dependency triple", domain: "domain", dependents: "dependents");

/// A domain and its member environments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainMembershipTriple {
    pub domain: EnvironmentMap,
    pub members: Vec<EnvironmentMap>,
}

impl DomainMembershipTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_domain(&mut self, domain: EnvironmentMap) -> Result<&mut Self> {
        self.domain = checked_environment(domain)?;
        Ok(self)
    }

    pub fn add_member(&mut self, member: EnvironmentMap) -> Result<&mut Self> {
        self.members.push(checked_environment(member)?);
        Ok(self)
    }
}

impl Valid for DomainMembershipTriple {
    fn valid(&self) -> Result<()> {
        self.domain.valid().context("domain validation failed")?;
        non_empty(&self.members, "no members")?;
        valid_each(&self.members, "member")
    }
}

impl_pair_serde!(DomainMembershipTriple, "membership triple", domain: "domain", members: "members");

/// An environment and the CoSWID tags describing its software.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoswidTriple {
    pub environment: EnvironmentMap,
    pub tag_ids: Vec<TagIdTypeChoice>,
}

impl CoswidTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_environment(&mut self, environment: EnvironmentMap) -> Result<&mut Self> {
        self.environment = checked_environment(environment)?;
        Ok(self)
    }

    pub fn add_tag_id(&mut self, tag_id: TagIdTypeChoice) -> Result<&mut Self> {
        tag_id.valid().context("invalid tag-id")?;
        self.tag_ids.push(tag_id);
        Ok(self)
    }
}

impl Valid for CoswidTriple {
    fn valid(&self) -> Result<()> {
        self.environment
            .valid()
            .context("environment validation failed")?;
        non_empty(&self.tag_ids, "no tag-ids")?;
        valid_each(&self.tag_ids, "tag-id")
    }
}

impl_pair_serde!(CoswidTriple, "coswid triple", environment: "environment", tag_ids: "tag-ids");

/// Evidence collected against a CoSWID tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoswidEvidenceMap {
    pub tag_id: Option<TagIdTypeChoice>,
    pub evidence: Evidence,
    pub authorized_by: Option<Vec<CryptoKeyTypeChoice>>,
}

impl CoswidEvidenceMap {
    pub const TAG_ID: Key = Key::new(0, "tag-id");
    pub const EVIDENCE: Key = Key::new(1, "evidence");
    pub const AUTHORIZED_BY: Key = Key::new(2, "authorized-by");

    pub const KEYS: &'static [Key] = &[Self::TAG_ID, Self::EVIDENCE, Self::AUTHORIZED_BY];
}

impl Valid for CoswidEvidenceMap {
    fn valid(&self) -> Result<()> {
        if let Some(tag_id) = &self.tag_id {
            tag_id.valid().context("invalid tag-id")?;
        }
        self.evidence.valid().context("invalid evidence")?;
        if let Some(keys) = &self.authorized_by {
            valid_each(keys, "authorized-by key")?;
        }
        Ok(())
    }
}

impl Serialize for CoswidEvidenceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(tag_id) = &self.tag_id {
            Self::TAG_ID.serialize_entry(&mut map, hr, tag_id)?;
        }
        Self::EVIDENCE.serialize_entry(&mut map, hr, &self.evidence)?;
        if let Some(keys) = &self.authorized_by {
            Self::AUTHORIZED_BY.serialize_entry(&mut map, hr, keys)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for CoswidEvidenceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CoswidEvidenceVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for CoswidEvidenceVisitor {
            type Value = CoswidEvidenceMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing CoswidEvidenceMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut tag_id = None;
                let mut evidence = None;
                let mut authorized_by = None;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, CoswidEvidenceMap::KEYS) {
                        Some(CoswidEvidenceMap::TAG_ID) => tag_id = Some(map.next_value()?),
                        Some(CoswidEvidenceMap::EVIDENCE) => evidence = Some(map.next_value()?),
                        Some(CoswidEvidenceMap::AUTHORIZED_BY) => {
                            authorized_by = Some(map.next_value()?)
                        }
                        _ => {
                            return Err(de::Error::custom(format!(
                                "unexpected coswid-evidence key {key}"
                            )))
                        }
                    }
                }

                Ok(CoswidEvidenceMap {
                    tag_id,
                    evidence: evidence.ok_or_else(|| de::Error::missing_field("evidence"))?,
                    authorized_by,
                })
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(CoswidEvidenceVisitor { is_human_readable })
    }
}

/// An environment and the CoSWID evidence collected from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvCoswidTriple {
    pub environment: EnvironmentMap,
    pub evidence: Vec<CoswidEvidenceMap>,
}

impl EvCoswidTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_environment(&mut self, environment: EnvironmentMap) -> Result<&mut Self> {
        self.environment = checked_environment(environment)?;
        Ok(self)
    }

    pub fn add_evidence(&mut self, evidence: CoswidEvidenceMap) -> Result<&mut Self> {
        evidence.valid().context("invalid coswid evidence")?;
        self.evidence.push(evidence);
        Ok(self)
    }
}

impl Valid for EvCoswidTriple {
    fn valid(&self) -> Result<()> {
        self.environment
            .valid()
            .context("environment validation failed")?;
        non_empty(&self.evidence, "no evidence")?;
        valid_each(&self.evidence, "coswid evidence")
    }
}

impl_pair_serde!(EvCoswidTriple, "coswid evidence triple", environment: "environment", evidence: "evidence");

/// Endorsements that apply once every condition matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalEndorsementTriple {
    pub conditions: Vec<StatefulEnvironmentRecord>,
    pub endorsements: Vec<ValueTriple>,
}

impl ConditionalEndorsementTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condition(&mut self, condition: StatefulEnvironmentRecord) -> Result<&mut Self> {
        condition.valid().context("invalid condition")?;
        self.conditions.push(condition);
        Ok(self)
    }

    pub fn add_endorsement(&mut self, endorsement: ValueTriple) -> Result<&mut Self> {
        endorsement.valid().context("invalid endorsement")?;
        self.endorsements.push(endorsement);
        Ok(self)
    }
}

impl Valid for ConditionalEndorsementTriple {
    fn valid(&self) -> Result<()> {
        non_empty(&self.conditions, "no conditions")?;
        valid_each(&self.conditions, "condition")?;
        non_empty(&self.endorsements, "no endorsements")?;
        valid_each(&self.endorsements, "endorsement")
    }
}

impl_pair_serde!(ConditionalEndorsementTriple, "conditional endorsement", conditions: "conditions", endorsements: "endorsements");

/// One step of a conditional series: when `selection` matches, `addition`
/// is endorsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalSeriesRecord {
    pub selection: Collection<MeasurementMap>,
    pub addition: Collection<MeasurementMap>,
}

impl Valid for ConditionalSeriesRecord {
    fn valid(&self) -> Result<()> {
        non_empty(self.selection.as_slice(), "no selection")?;
        valid_each(&self.selection, "selection measurement")?;
        non_empty(self.addition.as_slice(), "no addition")?;
        valid_each(&self.addition, "addition measurement")
    }
}

impl_pair_serde!(ConditionalSeriesRecord, "conditional series record", selection: "selection", addition: "addition");

/// A condition and an ordered series of selection/addition steps; the first
/// step whose selection matches applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalEndorsementSeriesTriple {
    pub condition: StatefulEnvironmentRecord,
    pub series: Vec<ConditionalSeriesRecord>,
}

impl ConditionalEndorsementSeriesTriple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_condition(&mut self, condition: StatefulEnvironmentRecord) -> Result<&mut Self> {
        condition.valid().context("invalid condition")?;
        self.condition = condition;
        Ok(self)
    }

    pub fn add_series(&mut self, record: ConditionalSeriesRecord) -> Result<&mut Self> {
        record.valid().context("invalid series record")?;
        self.series.push(record);
        Ok(self)
    }
}

impl Valid for ConditionalEndorsementSeriesTriple {
    fn valid(&self) -> Result<()> {
        self.condition.valid().context("condition validation failed")?;
        non_empty(&self.series, "no series")?;
        valid_each(&self.series, "series record")
    }
}

impl_pair_serde!(ConditionalEndorsementSeriesTriple, "conditional endorsement series", condition: "condition", series: "series");

/// The triples of a CoMID, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct TriplesMap {
    pub reference_values: Option<Vec<ValueTriple>>,
    pub endorsed_values: Option<Vec<ValueTriple>>,
    pub dev_identity_keys: Option<Vec<KeyTriple>>,
    pub attester_verification_keys: Option<Vec<KeyTriple>>,
    pub dependency_triples: Option<Vec<DomainDependencyTriple>>,
    pub membership_triples: Option<Vec<DomainMembershipTriple>>,
    pub coswid_triples: Option<Vec<CoswidTriple>>,
    pub conditional_endorsements: Option<Vec<ConditionalEndorsementTriple>>,
    pub conditional_endorsement_series: Option<Vec<ConditionalEndorsementSeriesTriple>>,
    pub extensions: Extensions,
    points: ExtensionsMap,
}

impl PartialEq for TriplesMap {
    fn eq(&self, other: &Self) -> bool {
        self.reference_values == other.reference_values
            && self.endorsed_values == other.endorsed_values
            && self.dev_identity_keys == other.dev_identity_keys
            && self.attester_verification_keys == other.attester_verification_keys
            && self.dependency_triples == other.dependency_triples
            && self.membership_triples == other.membership_triples
            && self.coswid_triples == other.coswid_triples
            && self.conditional_endorsements == other.conditional_endorsements
            && self.conditional_endorsement_series == other.conditional_endorsement_series
            && self.extensions == other.extensions
    }
}

/// Binds the value and flags shapes of one measurement family to `triple`.
fn bind_value_triple(
    triple: &mut ValueTriple,
    points: &ExtensionsMap,
    values: ExtensionPoint,
    flags: ExtensionPoint,
) -> Result<()> {
    if let Some(shape) = points.get(values) {
        triple.register_measurement_extensions(Arc::clone(shape))?;
    }
    if let Some(shape) = points.get(flags) {
        triple.register_flags_extensions(Arc::clone(shape))?;
    }
    Ok(())
}

impl TriplesMap {
    pub const REFERENCE_VALUES: Key = Key::new(0, "reference-values");
    pub const ENDORSED_VALUES: Key = Key::new(1, "endorsed-values");
    pub const DEV_IDENTITY_KEYS: Key = Key::new(2, "dev-identity-keys");
    pub const ATTESTER_VERIFICATION_KEYS: Key = Key::new(3, "attester-verification-keys");
    pub const DEPENDENCY_TRIPLES: Key = Key::new(4, "dependency-triples");
    pub const MEMBERSHIP_TRIPLES: Key = Key::new(5, "membership-triples");
    pub const COSWID_TRIPLES: Key = Key::new(6, "coswid-triples");
    pub const CONDITIONAL_ENDORSEMENTS: Key = Key::new(7, "conditional-endorsements");
    pub const CONDITIONAL_ENDORSEMENT_SERIES: Key = Key::new(8, "conditional-endorsement-series");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.reference_values.is_none()
            && self.endorsed_values.is_none()
            && self.dev_identity_keys.is_none()
            && self.attester_verification_keys.is_none()
            && self.dependency_triples.is_none()
            && self.membership_triples.is_none()
            && self.coswid_triples.is_none()
            && self.conditional_endorsements.is_none()
            && self.conditional_endorsement_series.is_none()
    }

    /// Binds a profile's triple-level shapes.
    ///
    /// Covers the triples map itself plus the reference-value and
    /// endorsed-value measurement and flags points. Triples added later get
    /// the same shapes.
    pub fn bind_extensions(&mut self, points: &ExtensionsMap) -> Result<()> {
        crate::extensions::bind(self, points, ExtensionPoint::Triples)?;

        for triple in self.reference_values.iter_mut().flatten() {
            bind_value_triple(
                triple,
                points,
                ExtensionPoint::ReferenceValue,
                ExtensionPoint::ReferenceValueFlags,
            )?;
        }
        for triple in self.endorsed_values.iter_mut().flatten() {
            bind_value_triple(
                triple,
                points,
                ExtensionPoint::EndorsedValue,
                ExtensionPoint::EndorsedValueFlags,
            )?;
        }

        self.points = points.clone();
        Ok(())
    }

    pub fn add_reference_value(&mut self, mut triple: ValueTriple) -> Result<&mut Self> {
        bind_value_triple(
            &mut triple,
            &self.points,
            ExtensionPoint::ReferenceValue,
            ExtensionPoint::ReferenceValueFlags,
        )?;
        triple.valid().context("invalid reference-value")?;
        self.reference_values.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_endorsed_value(&mut self, mut triple: ValueTriple) -> Result<&mut Self> {
        bind_value_triple(
            &mut triple,
            &self.points,
            ExtensionPoint::EndorsedValue,
            ExtensionPoint::EndorsedValueFlags,
        )?;
        triple.valid().context("invalid endorsed-value")?;
        self.endorsed_values.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_dev_identity_key(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        triple.valid().context("invalid dev-identity-key")?;
        self.dev_identity_keys.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_attester_verification_key(&mut self, triple: KeyTriple) -> Result<&mut Self> {
        triple.valid().context("invalid attester-verification-key")?;
        self.attester_verification_keys
            .get_or_insert_with(Vec::new)
            .push(triple);
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

    pub fn add_coswid_triple(&mut self, triple: CoswidTriple) -> Result<&mut Self> {
        triple.valid().context("invalid coswid-triple")?;
        self.coswid_triples.get_or_insert_with(Vec::new).push(triple);
        Ok(self)
    }

    pub fn add_conditional_endorsement(
        &mut self,
        triple: ConditionalEndorsementTriple,
    ) -> Result<&mut Self> {
        triple.valid().context("invalid conditional-endorsement")?;
        self.conditional_endorsements
            .get_or_insert_with(Vec::new)
            .push(triple);
        Ok(self)
    }

    pub fn add_conditional_endorsement_series(
        &mut self,
        triple: ConditionalEndorsementSeriesTriple,
    ) -> Result<&mut Self> {
        triple
            .valid()
            .context("invalid conditional-endorsement-series")?;
        self.conditional_endorsement_series
            .get_or_insert_with(Vec::new)
            .push(triple);
        Ok(self)
    }
}

impl Extensible for TriplesMap {
    const NAME: &'static str = "triples";
    const KEYS: &'static [Key] = &[
        Self::REFERENCE_VALUES,
        Self::ENDORSED_VALUES,
        Self::DEV_IDENTITY_KEYS,
        Self::ATTESTER_VERIFICATION_KEYS,
        Self::DEPENDENCY_TRIPLES,
        Self::MEMBERSHIP_TRIPLES,
        Self::COSWID_TRIPLES,
        Self::CONDITIONAL_ENDORSEMENTS,
        Self::CONDITIONAL_ENDORSEMENT_SERIES,
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

impl Valid for TriplesMap {
    fn valid(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("no triples"));
        }

        valid_list(&self.reference_values, "reference-value")?;
        valid_list(&self.endorsed_values, "endorsed-value")?;
        valid_list(&self.dev_identity_keys, "dev-identity-key")?;
        valid_list(&self.attester_verification_keys, "attester-verification-key")?;
        valid_list(&self.dependency_triples, "dependency-triple")?;
        valid_list(&self.membership_triples, "membership-triple")?;
        valid_list(&self.coswid_triples, "coswid-triple")?;
        valid_list(&self.conditional_endorsements, "conditional-endorsement")?;
        valid_list(
            &self.conditional_endorsement_series,
            "conditional-endorsement-series",
        )?;

        self.extensions.valid().context("extensions")
    }
}

impl Serialize for TriplesMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(v) = &self.reference_values {
            Self::REFERENCE_VALUES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.endorsed_values {
            Self::ENDORSED_VALUES.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.dev_identity_keys {
            Self::DEV_IDENTITY_KEYS.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.attester_verification_keys {
            Self::ATTESTER_VERIFICATION_KEYS.serialize_entry(&mut map, hr, v)?;
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
        if let Some(v) = &self.conditional_endorsements {
            Self::CONDITIONAL_ENDORSEMENTS.serialize_entry(&mut map, hr, v)?;
        }
        if let Some(v) = &self.conditional_endorsement_series {
            Self::CONDITIONAL_ENDORSEMENT_SERIES.serialize_entry(&mut map, hr, v)?;
        }

        self.extensions.serialize_entries(&mut map, hr)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TriplesMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TriplesMapVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for TriplesMapVisitor {
            type Value = TriplesMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing TriplesMap fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                type T = TriplesMap;
                let mut triples = T::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, T::KEYS) {
                        Some(T::REFERENCE_VALUES) => {
                            triples.reference_values = Some(map.next_value()?)
                        }
                        Some(T::ENDORSED_VALUES) => {
                            triples.endorsed_values = Some(map.next_value()?)
                        }
                        Some(T::DEV_IDENTITY_KEYS) => {
                            triples.dev_identity_keys = Some(map.next_value()?)
                        }
                        Some(T::ATTESTER_VERIFICATION_KEYS) => {
                            triples.attester_verification_keys = Some(map.next_value()?)
                        }
                        Some(T::DEPENDENCY_TRIPLES) => {
                            triples.dependency_triples = Some(map.next_value()?)
                        }
                        Some(T::MEMBERSHIP_TRIPLES) => {
                            triples.membership_triples = Some(map.next_value()?)
                        }
                        Some(T::COSWID_TRIPLES) => triples.coswid_triples = Some(map.next_value()?),
                        Some(T::CONDITIONAL_ENDORSEMENTS) => {
                            triples.conditional_endorsements = Some(map.next_value()?)
                        }
                        Some(T::CONDITIONAL_ENDORSEMENT_SERIES) => {
                            triples.conditional_endorsement_series = Some(map.next_value()?)
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
        deserializer.deserialize_map(TriplesMapVisitor { is_human_readable })
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        codec::{from_cbor, from_json, to_cbor, to_json, Bytes},
        core::{Digest, HashAlgorithm},
        extensions::FieldKind,
        test::SerdeTestCase,
    };

    pub(crate) fn class_env(id: i64) -> EnvironmentMap {
        EnvironmentMap::from_class(ClassMap::from_id(ClassIdTypeChoice::Int(id)))
    }

    pub(crate) fn digest_measurement() -> MeasurementMap {
        MeasurementMap::new(
            None,
            MeasurementValuesMap::with_digests(vec![Digest::new(
                HashAlgorithm::Sha256_32,
                vec![0xde, 0xad, 0xbe, 0xef],
            )]),
        )
    }

    pub(crate) fn reference_value() -> ValueTriple {
        let mut triple = ValueTriple::new();
        triple
            .set_environment(class_env(1))
            .unwrap()
            .add_measurement(digest_measurement())
            .unwrap();
        triple
    }

    #[test]
    fn test_value_triple_serde() {
        SerdeTestCase {
            value: reference_value(),
            expected_json: r#"{"environment":{"class":{"id":{"type":"int","value":1}}},"measurements":[{"value":{"digests":["sha-256-32;3q2+7w=="]}}]}"#,
            expected_cbor: vec![
                0x82, // array(2)
                  0xa1, // environment
                    0x00, 0xa1, 0x00, 0x01,
                  0x81, // measurements
                    0xa1,
                      0x01, 0xa1,
                        0x02, 0x81, 0x82, 0x06, 0x44, 0xde, 0xad, 0xbe, 0xef,
            ],
        }
        .run();
    }

    #[test]
    fn test_empty_payloads() {
        let mut rv = ValueTriple::new();
        rv.set_environment(class_env(1)).unwrap();
        assert_eq!(rv.valid().unwrap_err().to_string(), "no measurements");

        let mut keys = KeyTriple::new();
        keys.set_environment(class_env(1)).unwrap();
        assert_eq!(keys.valid().unwrap_err().to_string(), "no keys");

        let mut dep = DomainDependencyTriple::new();
        dep.set_domain(class_env(1)).unwrap();
        assert_eq!(dep.valid().unwrap_err().to_string(), "no dependents");

        let mut mem = DomainMembershipTriple::new();
        mem.set_domain(class_env(1)).unwrap();
        assert_eq!(mem.valid().unwrap_err().to_string(), "no members");

        let mut coswid = CoswidTriple::new();
        coswid.set_environment(class_env(1)).unwrap();
        assert_eq!(coswid.valid().unwrap_err().to_string(), "no tag-ids");

        let mut ev = EvCoswidTriple::new();
        ev.set_environment(class_env(1)).unwrap();
        assert_eq!(ev.valid().unwrap_err().to_string(), "no evidence");

        let mut cond = ConditionalEndorsementTriple::new();
        cond.add_condition(reference_value()).unwrap();
        assert_eq!(cond.valid().unwrap_err().to_string(), "no endorsements");
    }

    #[test]
    fn test_empty_environment() {
        let triple = ValueTriple {
            environment: EnvironmentMap::default(),
            measurements: vec![digest_measurement()].into(),
        };
        assert_eq!(
            triple.valid().unwrap_err().to_string(),
            "environment validation failed: environment must not be empty"
        );

        let err = ValueTriple::new()
            .set_environment(EnvironmentMap::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid environment: environment must not be empty"
        );
    }

    #[test]
    fn test_key_triple_json() {
        let mut triple = KeyTriple::new();
        triple
            .set_environment(class_env(2))
            .unwrap()
            .add_key(CryptoKeyTypeChoice::Bytes(Bytes::from(vec![0x01, 0x02])))
            .unwrap();

        let json = String::from_utf8(to_json(&triple).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"environment":{"class":{"id":{"type":"int","value":2}}},"verification-keys":[{"type":"bytes","value":"AQI="}]}"#
        );
        assert_eq!(from_json::<KeyTriple>(json.as_bytes()).unwrap(), triple);

        let cbor = to_cbor(&triple).unwrap();
        assert_eq!(from_cbor::<KeyTriple>(&cbor).unwrap(), triple);
    }

    #[test]
    fn test_pair_errors() {
        let err = from_cbor::<KeyTriple>(&[0x83, 0xa1, 0x00, 0xa1, 0x00, 0x01, 0x80, 0x80]).unwrap_err();
        assert!(err.to_string().contains("too many items in key triple"));

        let err = from_json::<KeyTriple>(br#"{"environment":{},"keys":[]}"#).unwrap_err();
        assert!(err.to_string().contains("unexpected key triple key keys"));
    }

    #[test]
    fn test_conditional_series() {
        let mut series = ConditionalEndorsementSeriesTriple::new();
        series
            .set_condition(reference_value())
            .unwrap()
            .add_series(ConditionalSeriesRecord {
                selection: vec![digest_measurement()].into(),
                addition: vec![digest_measurement()].into(),
            })
            .unwrap();
        series.valid().unwrap();

        let cbor = to_cbor(&series).unwrap();
        assert_eq!(from_cbor::<ConditionalEndorsementSeriesTriple>(&cbor).unwrap(), series);

        let json = to_json(&series).unwrap();
        assert_eq!(from_json::<ConditionalEndorsementSeriesTriple>(&json).unwrap(), series);

        let empty = ConditionalSeriesRecord::default();
        assert_eq!(empty.valid().unwrap_err().to_string(), "no selection");
    }

    #[test]
    fn test_triples_map() {
        let mut triples = TriplesMap::new();
        assert_eq!(triples.valid().unwrap_err().to_string(), "no triples");

        triples.add_reference_value(reference_value()).unwrap();
        triples.valid().unwrap();

        triples.endorsed_values = Some(vec![ValueTriple {
            environment: class_env(3),
            measurements: Collection::new(),
        }]);
        assert_eq!(
            triples.valid().unwrap_err().to_string(),
            "invalid endorsed-value at index 0: no measurements"
        );
    }

    #[test]
    fn test_triples_map_keys() {
        let mut dep = DomainDependencyTriple::new();
        dep.set_domain(class_env(1))
            .unwrap()
            .add_dependent(class_env(2))
            .unwrap();

        let mut triples = TriplesMap::new();
        triples.add_dependency_triple(dep).unwrap();

        let cbor = to_cbor(&triples).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xa1,
                  0x04, 0x81, // dependency-triples
                    0x82,
                      0xa1, 0x00, 0xa1, 0x00, 0x01,
                      0x81, 0xa1, 0x00, 0xa1, 0x00, 0x02,
            ]
        );
        assert_eq!(from_cbor::<TriplesMap>(&cbor).unwrap(), triples);
    }

    #[test]
    fn test_reference_value_extensions() {
        let shape = ExtensionShape::builder("tee")
            .field("tcbdate", "tee.tcbdate", -72, FieldKind::Text)
            .build()
            .unwrap();
        let points = ExtensionsMap::new().with(ExtensionPoint::ReferenceValue, shape);

        // A measurement carrying an extension field the decoder does not know yet.
        let mut measurement = digest_measurement();
        measurement
            .mval
            .extensions
            .accept(MapKey::Int(-72), ExtensionValue::from("2024-01-01"))
            .unwrap();
        let mut triple = reference_value();
        triple.measurements = vec![measurement].into();

        let mut triples = TriplesMap::new();
        triples.reference_values = Some(vec![triple]);
        triples.bind_extensions(&points).unwrap();

        let rv = &triples.reference_values.as_ref().unwrap()[0];
        assert_eq!(
            rv.measurements[0].mval.extensions.get_string("tcbdate").unwrap(),
            "2024-01-01"
        );

        triples.add_reference_value(reference_value()).unwrap();
        let added = &triples.reference_values.as_ref().unwrap()[1];
        assert!(added.measurements[0].mval.extensions.is_registered());
    }
}
