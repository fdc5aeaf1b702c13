// SPDX-License-Identifier: MIT

//! Concise Trust Anchor Stores (CoTS).
//!
//! A CoTS binds a set of trust anchors (and optionally CA certificates) to
//! the environments that should use them, with optional purposes and claim
//! constraints. A single store is carried under CBOR tag 507
//! ([`TaggedConciseTaStore`]); [`ConciseTaStores`] is a list of tagged stores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, tags::{add_prefix, strip_prefix, TAG_COTS}, Bytes, MapKey},
    comid::TagIdentityMap,
    coswid::ConciseSwidTag,
    error::Error,
    extensions::ExtensionValue,
    result::Result,
    triples::EnvironmentMap,
    valid::{non_empty, valid_each, ResultExt, Valid},
};

generate_tagged!((
    507,
    TaggedConciseTaStore,
    ConciseTaStore,
    "cots",
    "A Concise Trust Anchor Store wrapped in CBOR tag 507"
));

code_enum!(
    /// Encoding of a trust anchor's data.
    TrustAnchorFormat, "trust anchor format" {
        Certificate = 0 => "certificate",
        TrustAnchorInfo = 1 => "trust-anchor-info",
        Spki = 2 => "spki",
    }
);

/// Claims a trust anchor is permitted, or forbidden, to vouch for.
///
/// The contents are not interpreted; entries are kept as read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimsMap(pub BTreeMap<MapKey, ExtensionValue>);

keyed_record!(
    /// A trust anchor in one of the registered formats.
    TrustAnchor, "trust anchor" {
        format: TrustAnchorFormat => (0, "format"),
        data: Bytes => (1, "data"),
    }
);

impl TrustAnchor {
    pub fn new<B: Into<Bytes>>(format: TrustAnchorFormat, data: B) -> Self {
        Self {
            format: Some(format),
            data: Some(data.into()),
        }
    }
}

impl Valid for TrustAnchor {
    fn valid(&self) -> Result<()> {
        match &self.format {
            Some(format) => format.known()?,
            None => return Err(Error::invalid("missing format")),
        }

        match &self.data {
            Some(data) if !data.is_empty() => Ok(()),
            _ => Err(Error::invalid("empty data")),
        }
    }
}

keyed_record!(
    /// Trust anchors and the CA certificates that go with them.
    TasAndCas, "keys" {
        tas: Vec<TrustAnchor> => (0, "tas"),
        cas: Vec<Bytes> => (1, "cas"),
    }
);

impl TasAndCas {
    pub fn trust_anchors(&self) -> &[TrustAnchor] {
        self.tas.as_deref().unwrap_or_default()
    }
}

impl Valid for TasAndCas {
    fn valid(&self) -> Result<()> {
        non_empty(self.trust_anchors(), "no trust anchors")?;
        valid_each(self.trust_anchors(), "trust anchor")
    }
}

keyed_record!(
    /// Environments a store applies to, named in one of several ways.
    EnvironmentGroup, "environment group" {
        environment: EnvironmentMap => (0, "environment"),
        abbreviated_swid_tag: ConciseSwidTag => (1, "abbreviated-swid-tag"),
        named_ta_store: String => (2, "named-ta-store"),
    }
);

impl EnvironmentGroup {
    pub fn from_environment(environment: EnvironmentMap) -> Self {
        Self {
            environment: Some(environment),
            ..Default::default()
        }
    }

    pub fn from_named_ta_store(name: &str) -> Self {
        Self {
            named_ta_store: Some(name.to_string()),
            ..Default::default()
        }
    }
}

impl Valid for EnvironmentGroup {
    fn valid(&self) -> Result<()> {
        if self.environment.is_none()
            && self.abbreviated_swid_tag.is_none()
            && self.named_ta_store.is_none()
        {
            return Err(Error::invalid("empty environment group"));
        }

        if let Some(environment) = &self.environment {
            environment.valid().context("invalid environment")?;
        }

        Ok(())
    }
}

keyed_record!(
    /// A Concise Trust Anchor Store.
    ConciseTaStore, "cots" {
        language: String => (0, "language"),
        tag_identity: TagIdentityMap => (1, "tag-identity"),
        environments: Vec<EnvironmentGroup> => (2, "environments"),
        purposes: Vec<String> => (3, "purposes"),
        perm_claims: Vec<ClaimsMap> => (4, "permclaims"),
        excl_claims: Vec<ClaimsMap> => (5, "exclclaims"),
        keys: TasAndCas => (6, "keys"),
    }
);

impl ConciseTaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_environment_group(&mut self, group: EnvironmentGroup) -> Result<&mut Self> {
        group.valid().context("environment group validation failed")?;
        self.environments.get_or_insert_with(Vec::new).push(group);
        Ok(self)
    }

    pub fn add_purpose(&mut self, purpose: &str) -> &mut Self {
        self.purposes
            .get_or_insert_with(Vec::new)
            .push(purpose.to_string());
        self
    }

    pub fn add_trust_anchor(&mut self, ta: TrustAnchor) -> Result<&mut Self> {
        ta.valid().context("trust anchor validation failed")?;
        self.keys
            .get_or_insert_with(TasAndCas::default)
            .tas
            .get_or_insert_with(Vec::new)
            .push(ta);
        Ok(self)
    }

    pub fn add_ca_certificate<B: Into<Bytes>>(&mut self, cert: B) -> &mut Self {
        self.keys
            .get_or_insert_with(TasAndCas::default)
            .cas
            .get_or_insert_with(Vec::new)
            .push(cert.into());
        self
    }

    /// Validates and encodes the store under tag 507.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        Ok(add_prefix(TAG_COTS, &codec::to_cbor(self)?))
    }

    /// Checks the tag 507 prefix, decodes the store and validates it.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let store: Self = codec::from_cbor(strip_prefix(TAG_COTS, data)?)?;
        store.valid()?;
        Ok(store)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let store: Self = codec::from_json(data)?;
        store.valid()?;
        Ok(store)
    }
}

impl Valid for ConciseTaStore {
    fn valid(&self) -> Result<()> {
        if let Some(tag_identity) = &self.tag_identity {
            tag_identity
                .valid()
                .context("tag-identity validation failed")?;
        }

        let environments = self.environments.as_deref().unwrap_or_default();
        non_empty(environments, "no environments")
            .and_then(|_| valid_each(environments, "environment group"))
            .context("environments validation failed")?;

        match &self.keys {
            Some(keys) => keys.valid().context("keys validation failed"),
            None => Err(Error::invalid("no trust anchors").context("keys validation failed")),
        }
    }
}

/// A list of tagged trust anchor stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConciseTaStores(pub Vec<TaggedConciseTaStore>);

impl ConciseTaStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, store: ConciseTaStore) -> Result<&mut Self> {
        store.valid()?;
        self.0.push(store.into());
        Ok(self)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_cbor(self)
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let stores: Self = codec::from_cbor(data)?;
        stores.valid()?;
        Ok(stores)
    }
}

impl Valid for ConciseTaStores {
    fn valid(&self) -> Result<()> {
        non_empty(&self.0, "no stores")?;
        for (i, store) in self.0.iter().enumerate() {
            store
                .as_ref()
                .valid()
                .with_context(|| format!("invalid cots at index {i}"))?;
        }
        Ok(())
    }
}
