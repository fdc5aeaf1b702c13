// SPDX-License-Identifier: MIT

//! Concise Selector for Endorsements and Reference Values (CoSERV).
//!
//! A CoSERV query names the kind of artifact wanted, the profile it should
//! conform to and the environments it is about. A service answers with the
//! same query plus a result set whose contents must match the artifact type.
//!
//! ```text
//! Coserv
//! ├── artifact-type          (endorsed-values | trust-anchors | reference-values)
//! ├── profile
//! ├── environment-selector   (exactly one of classes | instances | groups)
//! └── results?
//!     ├── reference-values      [+ {authorities, rv-triple}]
//!     ├── attestation-keys      [+ {authorities, ak-triple}]
//!     ├── trust-anchor-stores   [+ CoTS]
//!     ├── expiry
//!     └── source-artifacts
//! ```

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use mime::Mime;
use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    codec::{self, Bytes, Key, MapKey, Time},
    core::ProfileTypeChoice,
    cots::ConciseTaStore,
    error::{CoservError, Error},
    result::Result,
    triples::{
        ClassMap, CryptoKeyTypeChoice, GroupIdTypeChoice, InstanceIdTypeChoice, KeyTriple,
        ValueTriple,
    },
    valid::{non_empty, valid_each, ResultExt, Valid},
};

/// Media type of a CBOR-encoded CoSERV.
pub const COSERV_MEDIA_TYPE: &str = "application/coserv+cbor";

code_enum!(
    /// Kind of artifact a query asks for.
    ArtifactType, "artifact type" {
        EndorsedValues = 0 => "endorsed-values",
        TrustAnchors = 1 => "trust-anchors",
        ReferenceValues = 2 => "reference-values",
    }
);

/// The environments a query is about, named in one of three ways.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentSelector {
    pub classes: Option<Vec<ClassMap>>,
    pub instances: Option<Vec<InstanceIdTypeChoice>>,
    pub groups: Option<Vec<GroupIdTypeChoice>>,
}

impl EnvironmentSelector {
    pub const CLASSES: Key = Key::new(0, "classes");
    pub const INSTANCES: Key = Key::new(1, "instances");
    pub const GROUPS: Key = Key::new(2, "groups");

    const KEYS: &'static [Key] = &[Self::CLASSES, Self::INSTANCES, Self::GROUPS];

    pub fn from_classes(classes: Vec<ClassMap>) -> Self {
        Self {
            classes: Some(classes),
            ..Default::default()
        }
    }

    pub fn from_instances(instances: Vec<InstanceIdTypeChoice>) -> Self {
        Self {
            instances: Some(instances),
            ..Default::default()
        }
    }

    pub fn from_groups(groups: Vec<GroupIdTypeChoice>) -> Self {
        Self {
            groups: Some(groups),
            ..Default::default()
        }
    }

    pub fn add_class(&mut self, class: ClassMap) -> &mut Self {
        self.classes.get_or_insert_with(Vec::new).push(class);
        self
    }

    pub fn add_instance(&mut self, instance: InstanceIdTypeChoice) -> &mut Self {
        self.instances.get_or_insert_with(Vec::new).push(instance);
        self
    }

    pub fn add_group(&mut self, group: GroupIdTypeChoice) -> &mut Self {
        self.groups.get_or_insert_with(Vec::new).push(group);
        self
    }

    /// Checks that exactly one kind of selector is set.
    fn check_kind(&self) -> Result<()> {
        let set = [
            self.classes.is_some(),
            self.instances.is_some(),
            self.groups.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        match set {
            0 => Err(CoservError::NoSelector.into()),
            1 => Ok(()),
            _ => Err(CoservError::MultipleSelectors.into()),
        }
    }
}

impl Valid for EnvironmentSelector {
    fn valid(&self) -> Result<()> {
        self.check_kind()?;

        if let Some(classes) = &self.classes {
            if classes.is_empty() {
                return Err(CoservError::EmptySelector("class").into());
            }
            valid_each(classes, "class")?;
        }
        if let Some(instances) = &self.instances {
            if instances.is_empty() {
                return Err(CoservError::EmptySelector("instance").into());
            }
            valid_each(instances, "instance")?;
        }
        if let Some(groups) = &self.groups {
            if groups.is_empty() {
                return Err(CoservError::EmptySelector("group").into());
            }
            valid_each(groups, "group")?;
        }

        Ok(())
    }
}

impl Serialize for EnvironmentSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        if let Some(classes) = &self.classes {
            Self::CLASSES.serialize_entry(&mut map, hr, classes)?;
        }
        if let Some(instances) = &self.instances {
            Self::INSTANCES.serialize_entry(&mut map, hr, instances)?;
        }
        if let Some(groups) = &self.groups {
            Self::GROUPS.serialize_entry(&mut map, hr, groups)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvironmentSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SelectorVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for SelectorVisitor {
            type Value = EnvironmentSelector;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing EnvironmentSelector fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                type T = EnvironmentSelector;
                let mut selector = T::default();

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, T::KEYS) {
                        Some(T::CLASSES) => selector.classes = Some(map.next_value()?),
                        Some(T::INSTANCES) => selector.instances = Some(map.next_value()?),
                        Some(T::GROUPS) => selector.groups = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!(
                                "unexpected environment selector key {key}"
                            )))
                        }
                    }
                }

                selector.check_kind().map_err(codec::de_error)?;
                Ok(selector)
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(SelectorVisitor { is_human_readable })
    }
}

keyed_record!(
    /// A reference value and the keys vouching for it.
    RefValQuad, "reference value quad" {
        authorities: Vec<CryptoKeyTypeChoice> => (1, "authorities"),
        rv_triple: ValueTriple => (2, "rv-triple"),
    }
);

impl RefValQuad {
    pub fn new(authorities: Vec<CryptoKeyTypeChoice>, rv_triple: ValueTriple) -> Self {
        Self {
            authorities: Some(authorities),
            rv_triple: Some(rv_triple),
        }
    }
}

impl Valid for RefValQuad {
    fn valid(&self) -> Result<()> {
        if let Some(authorities) = &self.authorities {
            non_empty(authorities, "no authorities")?;
            valid_each(authorities, "authority")?;
        }

        match &self.rv_triple {
            Some(triple) => triple.valid().context("rv-triple validation failed"),
            None => Err(Error::invalid("missing rv-triple")),
        }
    }
}

keyed_record!(
    /// An attestation key and the keys vouching for it.
    AkQuad, "attestation key quad" {
        authorities: Vec<CryptoKeyTypeChoice> => (1, "authorities"),
        ak_triple: KeyTriple => (2, "ak-triple"),
    }
);

impl AkQuad {
    pub fn new(authorities: Vec<CryptoKeyTypeChoice>, ak_triple: KeyTriple) -> Self {
        Self {
            authorities: Some(authorities),
            ak_triple: Some(ak_triple),
        }
    }
}

impl Valid for AkQuad {
    fn valid(&self) -> Result<()> {
        if let Some(authorities) = &self.authorities {
            non_empty(authorities, "no authorities")?;
            valid_each(authorities, "authority")?;
        }

        match &self.ak_triple {
            Some(triple) => triple.valid().context("ak-triple validation failed"),
            None => Err(Error::invalid("missing ak-triple")),
        }
    }
}

keyed_record!(
    /// Artifacts returned for a query.
    ResultSet, "result set" {
        rv_quads: Vec<RefValQuad> => (0, "reference-values"),
        ak_quads: Vec<AkQuad> => (3, "attestation-keys"),
        ta_stores: Vec<ConciseTaStore> => (4, "trust-anchor-stores"),
        expiry: Time => (10, "expiry"),
        source_artifacts: Vec<Bytes> => (11, "source-artifacts"),
    }
);

impl ResultSet {
    pub fn new(expiry: Time) -> Self {
        Self {
            expiry: Some(expiry),
            ..Default::default()
        }
    }

    pub fn add_rv_quad(&mut self, quad: RefValQuad) -> Result<&mut Self> {
        quad.valid().context("invalid reference value quad")?;
        self.rv_quads.get_or_insert_with(Vec::new).push(quad);
        Ok(self)
    }

    pub fn add_ak_quad(&mut self, quad: AkQuad) -> Result<&mut Self> {
        quad.valid().context("invalid attestation key quad")?;
        self.ak_quads.get_or_insert_with(Vec::new).push(quad);
        Ok(self)
    }

    pub fn add_ta_store(&mut self, store: ConciseTaStore) -> Result<&mut Self> {
        store.valid().context("invalid trust anchor store")?;
        self.ta_stores.get_or_insert_with(Vec::new).push(store);
        Ok(self)
    }

    pub fn add_source_artifact<B: Into<Bytes>>(&mut self, artifact: B) -> &mut Self {
        self.source_artifacts
            .get_or_insert_with(Vec::new)
            .push(artifact.into());
        self
    }

    /// Fails if the set holds artifacts of a kind `artifact` does not allow.
    fn check_consistency(&self, artifact: ArtifactType) -> Result<()> {
        let present = [
            ("reference-values", self.rv_quads.is_some()),
            ("attestation-keys", self.ak_quads.is_some()),
            ("trust-anchor-stores", self.ta_stores.is_some()),
        ];

        let allowed: &[&str] = match artifact {
            ArtifactType::ReferenceValues => &["reference-values"],
            ArtifactType::TrustAnchors => &["attestation-keys", "trust-anchor-stores"],
            _ => &[],
        };

        for (found, set) in present {
            if set && !allowed.contains(&found) {
                return Err(CoservError::InconsistentResults {
                    artifact: artifact.to_string(),
                    found,
                }
                .into());
            }
        }

        Ok(())
    }
}

fn valid_optional<T: Valid>(list: &Option<Vec<T>>, what: &str) -> Result<()> {
    match list {
        Some(items) => valid_each(items, what),
        None => Ok(()),
    }
}

impl Valid for ResultSet {
    fn valid(&self) -> Result<()> {
        if self.expiry.is_none() {
            return Err(Error::invalid("missing expiry"));
        }

        valid_optional(&self.rv_quads, "reference value quad")?;
        valid_optional(&self.ak_quads, "attestation key quad")?;
        valid_optional(&self.ta_stores, "trust anchor store")
    }
}

/// A CoSERV query, optionally with its results.
#[derive(Debug, Clone, PartialEq)]
pub struct Coserv {
    pub artifact_type: ArtifactType,
    pub profile: ProfileTypeChoice,
    pub environment_selector: EnvironmentSelector,
    pub results: Option<ResultSet>,
}

impl Coserv {
    pub const ARTIFACT_TYPE: Key = Key::new(0, "artifact-type");
    pub const PROFILE: Key = Key::new(1, "profile");
    pub const ENVIRONMENT_SELECTOR: Key = Key::new(2, "environment-selector");
    pub const RESULTS: Key = Key::new(3, "results");

    const KEYS: &'static [Key] = &[
        Self::ARTIFACT_TYPE,
        Self::PROFILE,
        Self::ENVIRONMENT_SELECTOR,
        Self::RESULTS,
    ];

    /// Builds and validates a query.
    pub fn new(
        artifact_type: ArtifactType,
        profile: ProfileTypeChoice,
        environment_selector: EnvironmentSelector,
    ) -> Result<Self> {
        let coserv = Self {
            artifact_type,
            profile,
            environment_selector,
            results: None,
        };
        coserv.valid()?;
        Ok(coserv)
    }

    /// Attaches results, checking they fit the artifact type.
    pub fn set_results(&mut self, results: ResultSet) -> Result<&mut Self> {
        results.valid().context("results validation failed")?;
        results.check_consistency(self.artifact_type)?;
        self.results = Some(results);
        Ok(self)
    }

    /// `application/coserv+cbor; profile="<profile>"`.
    pub fn media_type(&self) -> Result<Mime> {
        format!("{COSERV_MEDIA_TYPE}; profile=\"{}\"", self.profile)
            .parse()
            .map_err(|err: mime::FromStrError| CoservError::MediaType(err.to_string()).into())
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_cbor(self)
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let coserv: Self = codec::from_cbor(data)?;
        coserv.valid()?;
        Ok(coserv)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let coserv: Self = codec::from_json(data)?;
        coserv.valid()?;
        Ok(coserv)
    }

    /// The CBOR form as unpadded base64url, as used in query URLs.
    pub fn to_base64_url(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_cbor()?))
    }

    pub fn from_base64_url(data: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|err| Error::invalid(format!("invalid base64url: {err}")))?;
        Self::from_cbor(&bytes)
    }
}

impl Valid for Coserv {
    fn valid(&self) -> Result<()> {
        if let ArtifactType::Other(code) = self.artifact_type {
            return Err(CoservError::InvalidArtifactType(code.to_string()).into());
        }

        self.profile.valid().context("profile validation failed")?;
        self.environment_selector.valid()?;

        if let Some(results) = &self.results {
            results.valid().context("results validation failed")?;
            results.check_consistency(self.artifact_type)?;
        }

        Ok(())
    }
}

impl Serialize for Coserv {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hr = serializer.is_human_readable();
        let mut map = serializer.serialize_map(None)?;

        Self::ARTIFACT_TYPE.serialize_entry(&mut map, hr, &self.artifact_type)?;
        Self::PROFILE.serialize_entry(&mut map, hr, &self.profile)?;
        Self::ENVIRONMENT_SELECTOR.serialize_entry(&mut map, hr, &self.environment_selector)?;
        if let Some(results) = &self.results {
            Self::RESULTS.serialize_entry(&mut map, hr, results)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for Coserv {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CoservVisitor {
            is_human_readable: bool,
        }

        impl<'de> Visitor<'de> for CoservVisitor {
            type Value = Coserv;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map containing Coserv fields")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut artifact_type = None;
                let mut profile = None;
                let mut environment_selector = None;
                let mut results = None;

                while let Some(key) = map.next_key::<MapKey>()? {
                    match key.resolve(self.is_human_readable, Coserv::KEYS) {
                        Some(Coserv::ARTIFACT_TYPE) => artifact_type = Some(map.next_value()?),
                        Some(Coserv::PROFILE) => profile = Some(map.next_value()?),
                        Some(Coserv::ENVIRONMENT_SELECTOR) => {
                            environment_selector = Some(map.next_value()?)
                        }
                        Some(Coserv::RESULTS) => results = Some(map.next_value()?),
                        _ => {
                            return Err(de::Error::custom(format!("unexpected coserv key {key}")))
                        }
                    }
                }

                Ok(Coserv {
                    artifact_type: artifact_type
                        .ok_or_else(|| de::Error::missing_field("artifact-type"))?,
                    profile: profile.ok_or_else(|| de::Error::missing_field("profile"))?,
                    environment_selector: environment_selector
                        .ok_or_else(|| de::Error::missing_field("environment-selector"))?,
                    results,
                })
            }
        }

        let is_human_readable = deserializer.is_human_readable();
        deserializer.deserialize_map(CoservVisitor { is_human_readable })
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        codec::tags::TAG_BYTES,
        cots::{EnvironmentGroup, TrustAnchor, TrustAnchorFormat},
        triples::{tests::{class_env, reference_value}, ClassIdTypeChoice},
    };

    const PROFILE: &str = "tag:example.com,2025:cc-platform#1.0.0";

    fn example_class() -> ClassMap {
        ClassMap {
            class_id: Some(ClassIdTypeChoice::Bytes(vec![0x00, 0x11, 0x22, 0x33].into())),
            vendor: Some("Example Vendor".to_string()),
            model: Some("Example Model".to_string()),
            ..Default::default()
        }
    }

    fn refval_query() -> Coserv {
        Coserv::new(
            ArtifactType::ReferenceValues,
            ProfileTypeChoice::parse(PROFILE).unwrap(),
            EnvironmentSelector::from_classes(vec![example_class()]),
        )
        .unwrap()
    }

    #[test]
    fn test_refval_query_cbor() {
        let cbor = refval_query().to_cbor().unwrap();

        let mut expected = vec![
            0xa3, // map(3)
              0x00, 0x02, // artifact-type: reference-values
              0x01, 0x78, 0x26, // profile: text(38)
        ];
        expected.extend_from_slice(PROFILE.as_bytes());
        expected.extend_from_slice(&[
              0x02, 0xa1, // environment-selector: {
                0x00, 0x81, // classes: [
                  0xa3, // {
                    0x00, 0xd9, 0x02, 0x30, 0x44, 0x00, 0x11, 0x22, 0x33, // id: 560(h'00112233')
                    0x01, 0x6e, // vendor: text(14)
        ]);
        expected.extend_from_slice(b"Example Vendor");
        expected.extend_from_slice(&[0x02, 0x6d]); // model: text(13)
        expected.extend_from_slice(b"Example Model");

        assert_eq!(cbor, expected);
        assert_eq!(TAG_BYTES, 560);
        assert_eq!(Coserv::from_cbor(&cbor).unwrap(), refval_query());
    }

    #[test]
    fn test_refval_query_json() {
        let json = String::from_utf8(refval_query().to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            concat!(
                r#"{"artifact-type":"reference-values","profile":"tag:example.com,2025:cc-platform#1.0.0","#,
                r#""environment-selector":{"classes":[{"id":{"type":"bytes","value":"ABEiMw=="},"#,
                r#""vendor":"Example Vendor","model":"Example Model"}]}}"#,
            )
        );
        assert_eq!(Coserv::from_json(json.as_bytes()).unwrap(), refval_query());
    }

    #[test]
    fn test_selector_kinds() {
        let mut selector = EnvironmentSelector::from_classes(vec![example_class()]);
        selector.add_group(GroupIdTypeChoice::Bytes(vec![0x01].into()));

        // Encoding does not validate.
        let cbor = codec::to_cbor(&selector).unwrap();
        assert_eq!(
            selector.valid().unwrap_err().to_string(),
            "only one selector type is allowed"
        );

        let err = codec::from_cbor::<EnvironmentSelector>(&cbor).unwrap_err();
        assert!(err.to_string().contains("only one selector type is allowed"), "{err}");

        assert_eq!(
            EnvironmentSelector::default().valid().unwrap_err().to_string(),
            "no selector set"
        );
        let err = codec::from_cbor::<EnvironmentSelector>(&[0xa0]).unwrap_err();
        assert!(err.to_string().contains("no selector set"), "{err}");

        assert_eq!(
            EnvironmentSelector::from_classes(vec![]).valid().unwrap_err().to_string(),
            "empty class selector"
        );
    }

    #[test]
    fn test_result_consistency() {
        let expiry = Time::from_timestamp(1_750_000_000, 0).unwrap();
        let mut query = refval_query();

        let mut results = ResultSet::new(expiry);
        results
            .add_rv_quad(RefValQuad::new(
                vec![CryptoKeyTypeChoice::Bytes(vec![0xaa].into())],
                reference_value(),
            ))
            .unwrap()
            .add_source_artifact(vec![0xd9, 0x01, 0xf5]);
        query.set_results(results).unwrap();

        let cbor = query.to_cbor().unwrap();
        assert_eq!(Coserv::from_cbor(&cbor).unwrap(), query);

        let mut store = ConciseTaStore::new();
        store
            .add_environment_group(EnvironmentGroup::from_environment(class_env(1)))
            .unwrap()
            .add_trust_anchor(TrustAnchor::new(TrustAnchorFormat::Spki, vec![0x30, 0x00]))
            .unwrap();
        let mut ta_results = ResultSet::new(expiry);
        ta_results.add_ta_store(store).unwrap();

        let err = query.set_results(ta_results.clone()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "trust-anchor-stores not allowed in reference-values results"
        );

        let mut ta_query = Coserv::new(
            ArtifactType::TrustAnchors,
            ProfileTypeChoice::parse(PROFILE).unwrap(),
            EnvironmentSelector::from_classes(vec![example_class()]),
        )
        .unwrap();
        ta_query.set_results(ta_results).unwrap();

        let mut ev_query = ta_query.clone();
        ev_query.artifact_type = ArtifactType::EndorsedValues;
        assert_eq!(
            ev_query.valid().unwrap_err().to_string(),
            "trust-anchor-stores not allowed in endorsed-values results"
        );

        assert_eq!(
            query.set_results(ResultSet::default()).unwrap_err().to_string(),
            "results validation failed: missing expiry"
        );
    }

    #[test]
    fn test_media_type() {
        let media_type = refval_query().media_type().unwrap();

        assert_eq!(media_type.essence_str(), COSERV_MEDIA_TYPE);
        assert_eq!(
            media_type.to_string(),
            r#"application/coserv+cbor; profile="tag:example.com,2025:cc-platform#1.0.0""#
        );
    }

    #[test]
    fn test_base64_url() {
        let encoded = refval_query().to_base64_url().unwrap();

        assert!(encoded.starts_with("owACAXgmdGFnOmV4YW1wbGUuY29t"), "{encoded}");
        assert!(!encoded.contains('='));
        assert_eq!(Coserv::from_base64_url(&encoded).unwrap(), refval_query());
    }

    #[test]
    fn test_invalid_artifact_type() {
        let mut query = refval_query();
        query.artifact_type = ArtifactType::from_code(7);

        assert_eq!(
            query.valid().unwrap_err().to_string(),
            "invalid artifact type `7`"
        );
    }
}
