// SPDX-License-Identifier: MIT

//! Concise Software Identification (CoSWID) tags, RFC 9393.
//!
//! A CoSWID tag names a software component, the entities responsible for it
//! and, optionally, its expected payload or the evidence observed on a
//! device. Embedded in a CoRIM the tag carries CBOR tag 505
//! ([`TaggedConciseSwidTag`]).
//!
//! Fields holding "one or more" of something accept either a single item or
//! an array and re-encode in the form they were read in ([`OneOrMore`]).
//!
//! # Example
//!
//! ```rust
//! use rats_corim::coswid::{ConciseSwidTag, EntityEntry, Role};
//!
//! let tag = ConciseSwidTag::new(
//!     "acme-rr-fw".into(),
//!     "Roadrunner firmware",
//!     EntityEntry::new("ACME Inc.", vec![Role::TagCreator, Role::SoftwareCreator]),
//! );
//!
//! let cbor = tag.to_cbor().unwrap();
//! assert_eq!(ConciseSwidTag::from_cbor(&cbor).unwrap(), tag);
//! ```

use ciborium::Value;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{self, from_value, Time},
    core::{Digest, TagIdTypeChoice, VersionScheme},
    error::Error,
    result::Result,
    valid::{valid_each, ResultExt, Valid},
};

generate_tagged!((
    505,
    TaggedConciseSwidTag,
    ConciseSwidTag,
    "coswid",
    "A CoSWID tag wrapped in CBOR tag 505"
));

/// A single item or an array of items.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMore<T> {
    One(T),
    More(Vec<T>),
}

impl<T> OneOrMore<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::More(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> From<T> for OneOrMore<T> {
    fn from(item: T) -> Self {
        Self::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMore<T> {
    fn from(items: Vec<T>) -> Self {
        Self::More(items)
    }
}

impl<T: Serialize> Serialize for OneOrMore<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::One(item) => item.serialize(serializer),
            Self::More(items) => items.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMore<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        // Peek at the shape through the format's own value type, so the item
        // decoder still sees the right is_human_readable().
        if deserializer.is_human_readable() {
            match serde_json::Value::deserialize(deserializer)? {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<std::result::Result<Vec<T>, _>>()
                    .map(Self::More)
                    .map_err(D::Error::custom),
                other => serde_json::from_value(other)
                    .map(Self::One)
                    .map_err(D::Error::custom),
            }
        } else {
            match Value::deserialize(deserializer)? {
                Value::Array(items) => items
                    .into_iter()
                    .map(from_value)
                    .collect::<Result<Vec<T>>>()
                    .map(Self::More)
                    .map_err(D::Error::custom),
                other => from_value(other).map(Self::One).map_err(D::Error::custom),
            }
        }
    }
}

code_enum!(
    /// Roles an entity plays for a tag.
    Role, "role" {
        TagCreator = 1 => "tag-creator",
        SoftwareCreator = 2 => "software-creator",
        Aggregator = 3 => "aggregator",
        Distributor = 4 => "distributor",
        Licensor = 5 => "licensor",
        Maintainer = 6 => "maintainer",
    }
);

code_enum!(
    /// Relation of a linked resource to the tag.
    LinkRel, "link relation" {
        Ancestor = 1 => "ancestor",
        Component = 2 => "component",
        Feature = 3 => "feature",
        InstallationMedia = 4 => "installationmedia",
        PackageInstaller = 5 => "packageinstaller",
        Parent = 6 => "parent",
        Patches = 7 => "patches",
        Requires = 8 => "requires",
        SeeAlso = 9 => "see-also",
        Supersedes = 10 => "supersedes",
        Supplemental = 11 => "supplemental",
    }
);

code_enum!(
    Ownership, "ownership" {
        Abandon = 1 => "abandon",
        Private = 2 => "private",
        Shared = 3 => "shared",
    }
);

code_enum!(
    /// How strongly a linked resource is needed.
    Use, "use" {
        Optional = 1 => "optional",
        Required = 2 => "required",
        Recommended = 3 => "recommended",
    }
);

keyed_record!(
    /// A Concise Software Identity tag.
    ///
    /// Fields are listed in key order; `tag_id`, `software_name` and
    /// `entity` are mandatory.
    ConciseSwidTag, "coswid" {
        tag_id: TagIdTypeChoice => (0, "tag-id"),
        software_name: String => (1, "software-name"),
        entity: OneOrMore<EntityEntry> => (2, "entity"),
        evidence: Evidence => (3, "evidence"),
        link: OneOrMore<LinkEntry> => (4, "link"),
        software_meta: OneOrMore<SoftwareMetaEntry> => (5, "software-meta"),
        payload: Payload => (6, "payload"),
        corpus: bool => (8, "corpus"),
        patch: bool => (9, "patch"),
        media: String => (10, "media"),
        supplemental: bool => (11, "supplemental"),
        tag_version: i64 => (12, "tag-version"),
        software_version: String => (13, "software-version"),
        version_scheme: VersionScheme => (14, "version-scheme"),
        lang: String => (15, "lang"),
    }
);

impl ConciseSwidTag {
    pub fn new(tag_id: TagIdTypeChoice, software_name: &str, entity: EntityEntry) -> Self {
        Self {
            tag_id: Some(tag_id),
            software_name: Some(software_name.to_string()),
            entity: Some(OneOrMore::One(entity)),
            ..Default::default()
        }
    }

    pub fn entities(&self) -> &[EntityEntry] {
        self.entity.as_ref().map(OneOrMore::as_slice).unwrap_or_default()
    }

    /// Validates and encodes the untagged tag.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_cbor(self)
    }

    /// Decodes an untagged tag and validates it.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let tag: Self = codec::from_cbor(data)?;
        tag.valid()?;
        Ok(tag)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.valid()?;
        codec::to_json(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let tag: Self = codec::from_json(data)?;
        tag.valid()?;
        Ok(tag)
    }
}

impl Valid for ConciseSwidTag {
    fn valid(&self) -> Result<()> {
        match &self.tag_id {
            Some(tag_id) => tag_id.valid()?,
            None => return Err(Error::invalid("empty tag-id")),
        }

        if self.software_name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::invalid("empty software-name"));
        }

        let entities = self.entities();
        if entities.is_empty() {
            return Err(Error::invalid("no entities"));
        }
        valid_each(entities, "entity")?;
        if !entities.iter().any(|e| e.has_role(Role::TagCreator)) {
            return Err(Error::invalid("no entity with the tag-creator role"));
        }

        if let Some(links) = &self.link {
            valid_each(links.iter(), "link")?;
        }
        if let Some(payload) = &self.payload {
            payload.valid().context("payload")?;
        }
        if let Some(evidence) = &self.evidence {
            evidence.valid().context("evidence")?;
        }
        if self.payload.is_some() && self.evidence.is_some() {
            return Err(Error::invalid("payload and evidence are mutually exclusive"));
        }

        Ok(())
    }
}

keyed_record!(
    /// An organization or person responsible for the tag or the software.
    EntityEntry, "coswid entity" {
        entity_name: String => (31, "entity-name"),
        reg_id: String => (32, "reg-id"),
        role: OneOrMore<Role> => (33, "role"),
        thumbprint: Digest => (34, "thumbprint"),
    }
);

impl EntityEntry {
    pub fn new(name: &str, roles: Vec<Role>) -> Self {
        let role = match <[Role; 1]>::try_from(roles) {
            Ok([role]) => OneOrMore::One(role),
            Err(roles) => OneOrMore::More(roles),
        };

        Self {
            entity_name: Some(name.to_string()),
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role
            .as_ref()
            .map(|roles| roles.iter().any(|r| *r == role))
            .unwrap_or_default()
    }
}

impl Valid for EntityEntry {
    fn valid(&self) -> Result<()> {
        if self.entity_name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::invalid("empty entity-name"));
        }

        match &self.role {
            Some(roles) if !roles.is_empty() => {}
            _ => return Err(Error::invalid("empty roles")),
        }

        if let Some(thumbprint) = &self.thumbprint {
            thumbprint.valid().context("thumbprint")?;
        }

        Ok(())
    }
}

keyed_record!(
    /// A reference to another tag or resource.
    LinkEntry, "coswid link" {
        media: String => (10, "media"),
        artifact: String => (37, "artifact"),
        href: String => (38, "href"),
        ownership: Ownership => (39, "ownership"),
        rel: LinkRel => (40, "rel"),
        media_type: String => (41, "media-type"),
        r#use: Use => (42, "use"),
    }
);

impl Valid for LinkEntry {
    fn valid(&self) -> Result<()> {
        if self.href.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::invalid("empty href"));
        }
        if self.rel.is_none() {
            return Err(Error::invalid("missing rel"));
        }
        Ok(())
    }
}

keyed_record!(
    SoftwareMetaEntry, "coswid software-meta" {
        activation_status: String => (43, "activation-status"),
        channel_type: String => (44, "channel-type"),
        colloquial_version: String => (45, "colloquial-version"),
        description: String => (46, "description"),
        edition: String => (47, "edition"),
        entitlement_data_required: bool => (48, "entitlement-data-required"),
        entitlement_key: String => (49, "entitlement-key"),
        generator: String => (50, "generator"),
        persistent_id: String => (51, "persistent-id"),
        product: String => (52, "product"),
        product_family: String => (53, "product-family"),
        revision: String => (54, "revision"),
        summary: String => (55, "summary"),
        unspsc_code: String => (56, "unspsc-code"),
        unspsc_version: String => (57, "unspsc-version"),
    }
);

keyed_record!(
    /// The files, directories, processes and resources a product installs.
    Payload, "coswid payload" {
        directory: OneOrMore<DirectoryEntry> => (16, "directory"),
        file: OneOrMore<FileEntry> => (17, "file"),
        process: OneOrMore<ProcessEntry> => (18, "process"),
        resource: OneOrMore<ResourceEntry> => (19, "resource"),
    }
);

impl Valid for Payload {
    fn valid(&self) -> Result<()> {
        valid_resources(&self.directory, &self.file)
    }
}

keyed_record!(
    /// What was observed on a device, and when.
    Evidence, "coswid evidence" {
        directory: OneOrMore<DirectoryEntry> => (16, "directory"),
        file: OneOrMore<FileEntry> => (17, "file"),
        process: OneOrMore<ProcessEntry> => (18, "process"),
        resource: OneOrMore<ResourceEntry> => (19, "resource"),
        location: String => (23, "location"),
        date: Time => (35, "date"),
        device_id: String => (36, "device-id"),
    }
);

impl Valid for Evidence {
    fn valid(&self) -> Result<()> {
        valid_resources(&self.directory, &self.file)
    }
}

fn valid_resources(
    directories: &Option<OneOrMore<DirectoryEntry>>,
    files: &Option<OneOrMore<FileEntry>>,
) -> Result<()> {
    if let Some(directories) = directories {
        valid_each(directories.iter(), "directory")?;
    }
    if let Some(files) = files {
        valid_each(files.iter(), "file")?;
    }
    Ok(())
}

keyed_record!(
    FileEntry, "coswid file" {
        hash: Digest => (7, "hash"),
        size: u64 => (20, "size"),
        file_version: String => (21, "file-version"),
        key: bool => (22, "key"),
        location: String => (23, "location"),
        fs_name: String => (24, "fs-name"),
        root: String => (25, "root"),
    }
);

impl Valid for FileEntry {
    fn valid(&self) -> Result<()> {
        if self.fs_name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::invalid("empty fs-name"));
        }
        if let Some(hash) = &self.hash {
            hash.valid().context("hash")?;
        }
        Ok(())
    }
}

keyed_record!(
    DirectoryEntry, "coswid directory" {
        key: bool => (22, "key"),
        location: String => (23, "location"),
        fs_name: String => (24, "fs-name"),
        root: String => (25, "root"),
        path_elements: Box<PathElements> => (26, "path-elements"),
    }
);

impl Valid for DirectoryEntry {
    fn valid(&self) -> Result<()> {
        if self.fs_name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::invalid("empty fs-name"));
        }
        if let Some(elements) = &self.path_elements {
            valid_resources(&elements.directory, &elements.file)
                .context("path-elements")?;
        }
        Ok(())
    }
}

keyed_record!(
    /// Nested directory contents.
    PathElements, "coswid path-elements" {
        directory: OneOrMore<DirectoryEntry> => (16, "directory"),
        file: OneOrMore<FileEntry> => (17, "file"),
    }
);

keyed_record!(
    ProcessEntry, "coswid process" {
        process_name: String => (27, "process-name"),
        pid: i64 => (28, "pid"),
    }
);

keyed_record!(
    ResourceEntry, "coswid resource" {
        r#type: String => (29, "type"),
    }
);

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        core::{HashAlgorithm, UuidType},
        test::SerdeTestCase,
    };

    fn minimal() -> ConciseSwidTag {
        ConciseSwidTag::new("rr".into(), "rr-fw", EntityEntry::new("ACME", vec![Role::TagCreator]))
    }

    #[test]
    fn test_minimal_coswid() {
        SerdeTestCase {
            value: minimal(),
            expected_json: r#"{"tag-id":"rr","software-name":"rr-fw","entity":{"entity-name":"ACME","role":"tag-creator"}}"#,
            expected_cbor: vec![
                0xa3, // map(3)
                  0x00, 0x62, 0x72, 0x72, // tag-id: "rr"
                  0x01, 0x65, 0x72, 0x72, 0x2d, 0x66, 0x77, // software-name: "rr-fw"
                  0x02, // entity
                    0xa2,
                      0x18, 0x1f, 0x64, 0x41, 0x43, 0x4d, 0x45, // entity-name: "ACME"
                      0x18, 0x21, 0x01, // role: tag-creator
            ],
        }
        .run();
    }

    #[test]
    fn test_tagged_coswid() {
        let tagged = TaggedConciseSwidTag::new(minimal());
        let cbor = codec::to_cbor(&tagged).unwrap();

        assert_eq!(&cbor[..4], &[0xd9, 0x01, 0xf9, 0xa3]);
        assert_eq!(codec::from_cbor::<TaggedConciseSwidTag>(&cbor).unwrap(), tagged);

        let json = String::from_utf8(codec::to_json(&tagged).unwrap()).unwrap();
        assert!(json.starts_with(r#"{"type":"coswid","value":{"tag-id":"rr""#));
    }

    #[test]
    fn test_roles_array() {
        let mut tag = minimal();
        tag.entity = Some(OneOrMore::More(vec![EntityEntry::new(
            "ACME",
            vec![Role::SoftwareCreator, Role::Maintainer],
        )]));

        assert_eq!(
            tag.valid().unwrap_err().to_string(),
            "no entity with the tag-creator role"
        );

        let json = String::from_utf8(codec::to_json(&tag).unwrap()).unwrap();
        assert!(json.contains(r#""entity":[{"entity-name":"ACME","role":["software-creator","maintainer"]}]"#));

        let cbor = codec::to_cbor(&tag).unwrap();
        assert_eq!(codec::from_cbor::<ConciseSwidTag>(&cbor).unwrap(), tag);
    }

    #[test]
    fn test_mandatory_fields() {
        assert_eq!(
            ConciseSwidTag::default().valid().unwrap_err().to_string(),
            "empty tag-id"
        );

        let mut tag = minimal();
        tag.software_name = None;
        assert_eq!(tag.valid().unwrap_err().to_string(), "empty software-name");

        let mut tag = minimal();
        tag.entity = Some(OneOrMore::More(vec![]));
        assert_eq!(tag.valid().unwrap_err().to_string(), "no entities");

        let mut tag = minimal();
        tag.entity = Some(EntityEntry::new("ACME", vec![]).into());
        assert_eq!(
            tag.valid().unwrap_err().to_string(),
            "invalid entity at index 0: empty roles"
        );
    }

    #[test]
    fn test_tag_id_length() {
        // {0: h'00..0e' (15 bytes), 1: "x"}
        let mut cbor = vec![0xa2, 0x00, 0x4f];
        cbor.extend_from_slice(&[0u8; 15]);
        cbor.extend_from_slice(&[0x01, 0x61, 0x78]);

        let err = codec::from_cbor::<ConciseSwidTag>(&cbor).unwrap_err();
        assert!(err.to_string().contains("tag-id bytes must be 16 long, got 15"));
    }

    #[test]
    fn test_uuid_tag_id_and_payload() {
        let mut tag = ConciseSwidTag::new(
            UuidType::new([0x5c; 16]).into(),
            "rr-fw",
            EntityEntry::new("ACME", vec![Role::TagCreator]),
        );
        tag.software_version = Some("1.0.0".to_string());
        tag.version_scheme = Some(VersionScheme::Semver);
        tag.payload = Some(Payload {
            file: Some(OneOrMore::One(FileEntry {
                fs_name: Some("rr.bin".to_string()),
                size: Some(4096),
                hash: Some(Digest::new(HashAlgorithm::Sha256_32, vec![1, 2, 3, 4])),
                ..Default::default()
            })),
            ..Default::default()
        });

        let cbor = tag.to_cbor().unwrap();
        assert_eq!(ConciseSwidTag::from_cbor(&cbor).unwrap(), tag);

        let json = tag.to_json().unwrap();
        assert_eq!(ConciseSwidTag::from_json(&json).unwrap(), tag);

        tag.evidence = Some(Evidence::default());
        assert_eq!(
            tag.valid().unwrap_err().to_string(),
            "payload and evidence are mutually exclusive"
        );
    }

    #[test]
    fn test_nested_directories() {
        let ssl = DirectoryEntry {
            fs_name: Some("ssl".to_string()),
            ..Default::default()
        };
        let hosts = FileEntry {
            fs_name: Some("hosts".to_string()),
            ..Default::default()
        };
        let etc = DirectoryEntry {
            fs_name: Some("etc".to_string()),
            path_elements: Some(Box::new(PathElements {
                directory: Some(ssl.into()),
                file: Some(hosts.into()),
            })),
            ..Default::default()
        };
        etc.valid().unwrap();

        SerdeTestCase {
            value: etc,
            expected_json: r#"{"fs-name":"etc","path-elements":{"directory":{"fs-name":"ssl"},"file":{"fs-name":"hosts"}}}"#,
            expected_cbor: vec![
                0xa2, // map(2)
                  0x18, 0x18, 0x63, 0x65, 0x74, 0x63, // fs-name: "etc"
                  0x18, 0x1a, // path-elements
                    0xa2,
                      0x10, // directory
                        0xa1, 0x18, 0x18, 0x63, 0x73, 0x73, 0x6c, // fs-name: "ssl"
                      0x11, // file
                        0xa1, 0x18, 0x18, 0x65, 0x68, 0x6f, 0x73, 0x74, 0x73, // fs-name: "hosts"
            ],
        }
        .run();
    }

    #[test]
    fn test_unknown_key() {
        // {99: 1}
        let err = codec::from_cbor::<ConciseSwidTag>(&[0xa1, 0x18, 0x63, 0x01]).unwrap_err();
        assert!(err.to_string().contains("unexpected coswid key 99"));
    }
}
