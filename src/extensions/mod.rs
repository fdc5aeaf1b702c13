// SPDX-License-Identifier: MIT

//! Runtime extension of records with profile-defined fields.
//!
//! Extensible records embed an [`Extensions`] slot. While decoding, any map
//! entry the record does not know lands in the slot's cache, keyed by the
//! wire key and kept verbatim. Binding an [`ExtensionShape`] to the slot
//! (directly, or through a profile) moves matching cache entries into typed
//! fields; entries nobody claims keep round-tripping unchanged.
//!
//! ```
//! use std::sync::Arc;
//! use rats_corim::extensions::{Extensions, ExtensionShape, FieldKind};
//!
//! let shape = ExtensionShape::builder("tee")
//!     .field("pceid", "tee.pceid", -80, FieldKind::Text)
//!     .build()
//!     .unwrap();
//!
//! let mut ext = Extensions::new();
//! ext.register(Arc::new(shape)).unwrap();
//! ext.set("pceid", "0000").unwrap();
//!
//! assert_eq!(ext.get_string("tee.pceid").unwrap(), "0000");
//! ```

pub mod collection;
mod value;

use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::Arc,
};

use serde::ser::SerializeMap;

pub use collection::Collection;
pub use value::{ExtensionValue, FieldKind};

use crate::{
    codec::{Key, MapKey},
    error::{Error, ExtensionError},
    result::Result,
};

/// Record-level checks run after the required fields are confirmed set.
pub type ShapeValidator = Arc<dyn Fn(&Extensions) -> Result<()> + Send + Sync>;

/// One profile-defined field.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionField {
    pub name: String,
    pub json_key: String,
    pub cbor_key: i64,
    pub kind: FieldKind,
    pub required: bool,
}

impl ExtensionField {
    fn matches_key(&self, key: &MapKey) -> bool {
        match key {
            MapKey::Int(i) => *i == self.cbor_key,
            MapKey::Text(s) => *s == self.json_key,
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.json_key == name || self.cbor_key.to_string() == name
    }
}

/// The set of fields a profile adds at one extension point.
#[derive(Clone)]
pub struct ExtensionShape {
    name: String,
    fields: Vec<ExtensionField>,
    validator: Option<ShapeValidator>,
}

impl ExtensionShape {
    pub fn builder(name: &str) -> ExtensionShapeBuilder {
        ExtensionShapeBuilder {
            name: name.to_string(),
            fields: vec![],
            validator: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[ExtensionField] {
        &self.fields
    }

    /// Looks a field up by name, JSON key or CBOR key (in decimal).
    pub fn field(&self, name: &str) -> Option<&ExtensionField> {
        self.fields.iter().find(|f| f.matches_name(name))
    }

    fn field_for_key(&self, key: &MapKey) -> Option<&ExtensionField> {
        self.fields.iter().find(|f| f.matches_key(key))
    }
}

impl std::fmt::Debug for ExtensionShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionShape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

pub struct ExtensionShapeBuilder {
    name: String,
    fields: Vec<ExtensionField>,
    validator: Option<ShapeValidator>,
}

impl ExtensionShapeBuilder {
    pub fn field(self, name: &str, json_key: &str, cbor_key: i64, kind: FieldKind) -> Self {
        self.push(name, json_key, cbor_key, kind, false)
    }

    pub fn required_field(
        self,
        name: &str,
        json_key: &str,
        cbor_key: i64,
        kind: FieldKind,
    ) -> Self {
        self.push(name, json_key, cbor_key, kind, true)
    }

    fn push(
        mut self,
        name: &str,
        json_key: &str,
        cbor_key: i64,
        kind: FieldKind,
        required: bool,
    ) -> Self {
        self.fields.push(ExtensionField {
            name: name.to_string(),
            json_key: json_key.to_string(),
            cbor_key,
            kind,
            required,
        });
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Extensions) -> Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Fails if two fields share a name, JSON key or CBOR key.
    pub fn build(self) -> Result<ExtensionShape> {
        for (i, field) in self.fields.iter().enumerate() {
            let clash = self.fields[..i].iter().any(|other| {
                other.name == field.name
                    || other.json_key == field.json_key
                    || other.cbor_key == field.cbor_key
            });

            if clash {
                return Err(ExtensionError::DuplicateField {
                    shape: self.name.clone(),
                    field: field.name.clone(),
                }
                .into());
            }
        }

        Ok(ExtensionShape {
            name: self.name,
            fields: self.fields,
            validator: self.validator,
        })
    }
}

/// The extension slot embedded in an extensible record.
#[derive(Clone, Default)]
pub struct Extensions {
    shape: Option<Arc<ExtensionShape>>,
    values: BTreeMap<String, ExtensionValue>,
    cache: BTreeMap<MapKey, ExtensionValue>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self) -> Option<&Arc<ExtensionShape>> {
        self.shape.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.shape.is_some()
    }

    /// True when there is nothing to encode.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.cache.is_empty()
    }

    /// Entries decoded from the wire that no bound field claims.
    pub fn cached(&self) -> &BTreeMap<MapKey, ExtensionValue> {
        &self.cache
    }

    /// Binds `shape`, replacing any earlier binding.
    ///
    /// Values of the earlier shape go back to the cache under their CBOR
    /// keys. Cache entries matching a field of `shape` by CBOR or JSON key
    /// are converted to the field's kind and hoisted out of the cache.
    pub fn register(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        if let Some(old) = self.shape.take() {
            for field in old.fields() {
                if let Some(value) = self.values.remove(&field.name) {
                    self.cache.insert(MapKey::Int(field.cbor_key), value);
                }
            }
        }

        let mut hoisted = BTreeMap::new();
        for field in shape.fields() {
            let keys = [
                MapKey::Int(field.cbor_key),
                MapKey::Text(field.json_key.clone()),
            ];

            for key in keys {
                if let Some(raw) = self.cache.remove(&key) {
                    let value = field.kind.coerce(raw).map_err(|got| {
                        Error::from(ExtensionError::IncompatibleValue {
                            field: field.name.clone(),
                            expected: field.kind.name().to_string(),
                            got: got.kind_name().to_string(),
                        })
                    })?;
                    hoisted.insert(field.name.clone(), value);
                }
            }
        }

        log::debug!(
            "bound extension {} ({} cached field(s) hoisted)",
            shape.name(),
            hoisted.len()
        );

        self.values = hoisted;
        self.shape = Some(shape);

        Ok(())
    }

    fn field(&self, name: &str) -> Result<&ExtensionField> {
        let shape = self.shape.as_ref().ok_or(ExtensionError::NotRegistered)?;
        shape
            .field(name)
            .ok_or_else(|| ExtensionError::FieldNotFound(name.to_string()).into())
    }

    /// The value of a bound field, looked up by name, JSON key or CBOR key.
    pub fn get(&self, name: &str) -> Result<&ExtensionValue> {
        let field = self.field(name)?;
        self.values
            .get(&field.name)
            .ok_or_else(|| ExtensionError::FieldNotSet(name.to_string()).into())
    }

    fn get_as<T, F>(&self, name: &str, expected: &str, f: F) -> Result<T>
    where
        F: FnOnce(&ExtensionValue) -> Option<T>,
    {
        let value = self.get(name)?;
        f(value).ok_or_else(|| {
            ExtensionError::IncompatibleValue {
                field: name.to_string(),
                expected: expected.to_string(),
                got: value.kind_name().to_string(),
            }
            .into()
        })
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        self.get_as(name, "int", ExtensionValue::as_int)
    }

    pub fn get_uint(&self, name: &str) -> Result<u64> {
        self.get_as(name, "uint", ExtensionValue::as_uint)
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        self.get_as(name, "float", ExtensionValue::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.get_as(name, "bool", ExtensionValue::as_bool)
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        self.get_as(name, "text", |v| v.as_str().map(str::to_string))
    }

    pub fn get_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.get_as(name, "bytes", |v| v.as_bytes().map(<[u8]>::to_vec))
    }

    pub fn get_slice(&self, name: &str) -> Result<Vec<ExtensionValue>> {
        self.get_as(name, "array", |v| v.as_array().map(<[ExtensionValue]>::to_vec))
    }

    pub fn get_string_map(&self, name: &str) -> Result<BTreeMap<String, ExtensionValue>> {
        self.get_as(name, "map", ExtensionValue::as_string_map)
    }

    /// Sets a bound field, converting `value` to the field's kind.
    pub fn set<V: Into<ExtensionValue>>(&mut self, name: &str, value: V) -> Result<()> {
        let field = self.field(name)?.clone();
        let value = field.kind.coerce(value.into()).map_err(|got| {
            Error::from(ExtensionError::IncompatibleValue {
                field: field.name.clone(),
                expected: field.kind.name().to_string(),
                got: got.kind_name().to_string(),
            })
        })?;

        self.values.insert(field.name, value);
        Ok(())
    }

    /// Removes a bound field's value. Returns the old value, if any.
    pub fn unset(&mut self, name: &str) -> Result<Option<ExtensionValue>> {
        let field = self.field(name)?.name.clone();
        Ok(self.values.remove(&field))
    }

    /// Takes an entry the host record's decoder did not recognise.
    pub fn accept(&mut self, key: MapKey, value: ExtensionValue) -> Result<()> {
        if let Some(field) = self.shape.as_ref().and_then(|s| s.field_for_key(&key)) {
            let value = field.kind.coerce(value).map_err(|got| {
                Error::from(ExtensionError::IncompatibleValue {
                    field: field.name.clone(),
                    expected: field.kind.name().to_string(),
                    got: got.kind_name().to_string(),
                })
            })?;
            self.values.insert(field.name.clone(), value);
        } else {
            self.cache.insert(key, value);
        }

        Ok(())
    }

    /// Writes bound fields, then cached entries, into the host record's map.
    pub fn serialize_entries<M: SerializeMap>(
        &self,
        map: &mut M,
        is_human_readable: bool,
    ) -> std::result::Result<(), M::Error> {
        if let Some(shape) = &self.shape {
            for field in shape.fields() {
                if let Some(value) = self.values.get(&field.name) {
                    if is_human_readable {
                        map.serialize_entry(&field.json_key, value)?;
                    } else {
                        map.serialize_entry(&field.cbor_key, value)?;
                    }
                }
            }
        }

        for (key, value) in &self.cache {
            map.serialize_entry(key, value)?;
        }

        Ok(())
    }

    /// Required fields must be set, then the shape's validator must pass.
    pub fn valid(&self) -> Result<()> {
        let Some(shape) = &self.shape else {
            return Ok(());
        };

        for field in shape.fields().iter().filter(|f| f.required) {
            if !self.values.contains_key(&field.name) {
                return Err(ExtensionError::MissingField(field.name.clone()).into());
            }
        }

        if let Some(validator) = &shape.validator {
            validator(self)?;
        }

        Ok(())
    }
}

impl PartialEq for Extensions {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.cache == other.cache
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("shape", &self.shape.as_ref().map(|s| s.name()))
            .field("values", &self.values)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Fails if `shape` reuses one of the host record's keys.
pub fn check_reserved(shape: &ExtensionShape, host: &'static str, keys: &[Key]) -> Result<()> {
    for field in shape.fields() {
        for key in keys {
            if key.cbor == field.cbor_key || key.json == field.json_key {
                return Err(ExtensionError::ReservedKey {
                    shape: shape.name().to_string(),
                    field: field.name.clone(),
                    host,
                    key: key.json.to_string(),
                }
                .into());
            }
        }
    }

    Ok(())
}

/// A record with an extension slot.
pub trait Extensible {
    /// Record name used in error messages.
    const NAME: &'static str;

    /// Keys of the record's own fields; extension fields may not reuse them.
    const KEYS: &'static [Key];

    fn extensions(&self) -> &Extensions;

    fn extensions_mut(&mut self) -> &mut Extensions;

    fn register_extensions(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        check_reserved(&shape, Self::NAME, Self::KEYS)?;
        self.extensions_mut().register(shape)
    }
}

/// Places in the document model a profile can extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionPoint {
    Comid,
    Entity,
    Triples,
    ReferenceValue,
    ReferenceValueFlags,
    EndorsedValue,
    EndorsedValueFlags,
    Corim,
    CorimEntity,
    ConciseEvidence,
    EvTriples,
    EvidenceValue,
}

impl ExtensionPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comid => "comid",
            Self::Entity => "entity",
            Self::Triples => "triples",
            Self::ReferenceValue => "reference-value",
            Self::ReferenceValueFlags => "reference-value-flags",
            Self::EndorsedValue => "endorsed-value",
            Self::EndorsedValueFlags => "endorsed-value-flags",
            Self::Corim => "corim",
            Self::CorimEntity => "corim-entity",
            Self::ConciseEvidence => "concise-evidence",
            Self::EvTriples => "ev-triples",
            Self::EvidenceValue => "evidence-value",
        }
    }
}

impl std::fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "comid" => Self::Comid,
            "entity" => Self::Entity,
            "triples" => Self::Triples,
            "reference-value" => Self::ReferenceValue,
            "reference-value-flags" => Self::ReferenceValueFlags,
            "endorsed-value" => Self::EndorsedValue,
            "endorsed-value-flags" => Self::EndorsedValueFlags,
            "corim" => Self::Corim,
            "corim-entity" => Self::CorimEntity,
            "concise-evidence" => Self::ConciseEvidence,
            "ev-triples" => Self::EvTriples,
            "evidence-value" => Self::EvidenceValue,
            other => return Err(ExtensionError::UnexpectedPoint(other.to_string()).into()),
        })
    }
}

/// Shapes keyed by the point they extend.
#[derive(Debug, Clone, Default)]
pub struct ExtensionsMap(BTreeMap<ExtensionPoint, Arc<ExtensionShape>>);

impl ExtensionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, point: ExtensionPoint, shape: ExtensionShape) -> Self {
        self.0.insert(point, Arc::new(shape));
        self
    }

    pub fn insert(&mut self, point: ExtensionPoint, shape: Arc<ExtensionShape>) {
        self.0.insert(point, shape);
    }

    /// Builds a map from point names; fails on a name that is not a point.
    pub fn from_named<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, ExtensionShape)>,
    {
        let mut map = Self::new();
        for (name, shape) in entries {
            map.insert(name.parse()?, Arc::new(shape));
        }
        Ok(map)
    }

    pub fn get(&self, point: ExtensionPoint) -> Option<&Arc<ExtensionShape>> {
        self.0.get(&point)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExtensionPoint, &Arc<ExtensionShape>)> {
        self.0.iter()
    }
}

/// Binds the shape registered at `point`, if any, to `record`.
pub fn bind<T: Extensible>(record: &mut T, exts: &ExtensionsMap, point: ExtensionPoint) -> Result<()> {
    match exts.get(point) {
        Some(shape) => record.register_extensions(Arc::clone(shape)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee_shape() -> ExtensionShape {
        ExtensionShape::builder("tee")
            .field("pceid", "tee.pceid", -80, FieldKind::Text)
            .field("miscselect", "tee.miscselect", -81, FieldKind::Bytes)
            .required_field("isvprodid", "tee.isvprodid", -85, FieldKind::Uint)
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_field() {
        let err = ExtensionShape::builder("x")
            .field("a", "a", -1, FieldKind::Int)
            .field("b", "b", -1, FieldKind::Int)
            .build()
            .unwrap_err();

        assert_eq!(err.to_string(), "duplicate field b in extension x");
    }

    #[test]
    fn test_unregistered_access() {
        let ext = Extensions::new();

        assert_eq!(
            ext.get("pceid").unwrap_err().to_string(),
            "no extensions registered"
        );
    }

    #[test]
    fn test_hoisting() {
        let mut ext = Extensions::new();
        ext.accept(MapKey::Int(-80), ExtensionValue::from("0000"))
            .unwrap();
        ext.accept(MapKey::from("tee.miscselect"), ExtensionValue::from("AQI="))
            .unwrap();
        ext.accept(MapKey::Int(-99), ExtensionValue::from(1))
            .unwrap();

        assert_eq!(ext.cached().len(), 3);

        ext.register(Arc::new(tee_shape())).unwrap();

        assert_eq!(ext.get_string("pceid").unwrap(), "0000");
        assert_eq!(ext.get_bytes("-81").unwrap(), vec![1, 2]);
        assert_eq!(ext.cached().len(), 1);
        assert_eq!(
            ext.get("isvprodid").unwrap_err().to_string(),
            "extension field isvprodid is not set"
        );
        assert_eq!(
            ext.get("nope").unwrap_err().to_string(),
            "extension field not found: nope"
        );
    }

    #[test]
    fn test_hoisting_incompatible() {
        let mut ext = Extensions::new();
        ext.accept(MapKey::Int(-85), ExtensionValue::from("x"))
            .unwrap();

        let err = ext.register(Arc::new(tee_shape())).unwrap_err();

        assert_eq!(
            err.to_string(),
            "incompatible value for extension field isvprodid: expected uint, got text"
        );
    }

    #[test]
    fn test_set_and_valid() {
        let mut ext = Extensions::new();
        ext.register(Arc::new(tee_shape())).unwrap();

        assert_eq!(
            ext.valid().unwrap_err().to_string(),
            "missing mandatory extension field isvprodid"
        );

        assert!(ext.set("isvprodid", -1).is_err());
        ext.set("isvprodid", 1u64).unwrap();
        ext.valid().unwrap();

        assert_eq!(ext.get_uint("tee.isvprodid").unwrap(), 1);
        assert_eq!(
            ext.get_string("isvprodid").unwrap_err().to_string(),
            "incompatible value for extension field isvprodid: expected text, got int"
        );
    }

    #[test]
    fn test_shape_validator() {
        let shape = ExtensionShape::builder("v")
            .field("n", "n", -1, FieldKind::Int)
            .validator(|ext| match ext.get_int("n") {
                Ok(n) if n < 0 => Err(Error::invalid("n must not be negative")),
                _ => Ok(()),
            })
            .build()
            .unwrap();

        let mut ext = Extensions::new();
        ext.register(Arc::new(shape)).unwrap();
        ext.set("n", -3).unwrap();

        assert_eq!(ext.valid().unwrap_err().to_string(), "n must not be negative");
    }

    #[test]
    fn test_rebinding_returns_values_to_cache() {
        let mut ext = Extensions::new();
        ext.register(Arc::new(tee_shape())).unwrap();
        ext.set("pceid", "ab").unwrap();

        let other = ExtensionShape::builder("other")
            .field("z", "z", -1, FieldKind::Int)
            .build()
            .unwrap();
        ext.register(Arc::new(other)).unwrap();

        assert_eq!(
            ext.cached().get(&MapKey::Int(-80)),
            Some(&ExtensionValue::from("ab"))
        );
    }

    #[test]
    fn test_serialize_entries() {
        struct Host<'a>(&'a Extensions);

        impl serde::Serialize for Host<'_> {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let hr = serializer.is_human_readable();
                let mut map = serializer.serialize_map(None)?;
                self.0.serialize_entries(&mut map, hr)?;
                map.end()
            }
        }

        let mut ext = Extensions::new();
        ext.accept(MapKey::Int(-99), ExtensionValue::from(1))
            .unwrap();
        ext.register(Arc::new(tee_shape())).unwrap();
        ext.set("pceid", "ab").unwrap();

        assert_eq!(
            serde_json::to_string(&Host(&ext)).unwrap(),
            r#"{"tee.pceid":"ab","-99":1}"#
        );

        let mut cbor = vec![];
        ciborium::into_writer(&Host(&ext), &mut cbor).unwrap();
        assert_eq!(
            cbor,
            vec![0xbf, 0x38, 0x4f, 0x62, 0x61, 0x62, 0x38, 0x62, 0x01, 0xff]
        );
    }

    #[test]
    fn test_extension_point_names() {
        assert_eq!(
            "reference-value".parse::<ExtensionPoint>().unwrap(),
            ExtensionPoint::ReferenceValue
        );
        assert_eq!(
            "bogus".parse::<ExtensionPoint>().unwrap_err().to_string(),
            "unexpected extension point: bogus"
        );
        assert!(ExtensionsMap::from_named([("bogus", tee_shape())]).is_err());
    }

    #[test]
    fn test_reserved_keys() {
        const KEYS: &[Key] = &[Key::new(-80, "x")];

        let err = check_reserved(&tee_shape(), "test", KEYS).unwrap_err();

        assert_eq!(
            err.to_string(),
            "extension tee field pceid collides with test key x"
        );
    }
}
