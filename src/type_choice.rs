// SPDX-License-Identifier: MIT

//! Sum types with a tagged CBOR form and a `{"type", "value"}` JSON form.
//!
//! Every choice in the crate implements [`TypeChoice`] and gets its serde
//! impls from `impl_type_choice_serde!`. Choices that profiles may extend
//! carry an `Extension(ChoiceExtension)` variant; the variants it can hold are
//! declared at runtime through [`register_variant`].

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use ciborium::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{de_error, describe, ser_error, tags},
    error::{CodecError, Error, TypeChoiceError},
    extensions::{ExtensionValue, FieldKind},
    result::Result,
    valid::Valid,
};

/// A value holding exactly one of a closed (or registry-extended) set of
/// variants.
pub trait TypeChoice: Sized + Valid {
    /// Name of the choice used in error messages, e.g. `ClassID`.
    const CHOICE: &'static str;

    /// JSON type names of the built-in variants.
    const TYPE_NAMES: &'static [&'static str];

    /// CBOR tags claimed by the built-in variants.
    const TAGS: &'static [u64];

    /// JSON type name of the variant held.
    fn type_name(&self) -> &str;

    fn to_cbor_value(&self) -> Result<Value>;

    fn from_cbor_value(value: Value) -> Result<Self>;

    /// The `value` half of the JSON form.
    fn to_json_value(&self) -> Result<serde_json::Value>;

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self>;
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeAndValue {
    #[serde(rename = "type")]
    type_name: String,
    value: serde_json::Value,
}

pub fn serialize_choice<T, S>(choice: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: TypeChoice,
    S: Serializer,
{
    if serializer.is_human_readable() {
        TypeAndValue {
            type_name: choice.type_name().to_string(),
            value: choice.to_json_value().map_err(ser_error)?,
        }
        .serialize(serializer)
    } else {
        choice
            .to_cbor_value()
            .map_err(ser_error)?
            .serialize(serializer)
    }
}

/// Decodes a choice and checks the variant it landed on.
pub fn deserialize_choice<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
where
    T: TypeChoice,
    D: Deserializer<'de>,
{
    let choice = if deserializer.is_human_readable() {
        let tv = TypeAndValue::deserialize(deserializer)?;
        T::from_json_value(&tv.type_name, tv.value)
    } else {
        T::from_cbor_value(Value::deserialize(deserializer)?)
    }
    .map_err(de_error)?;

    choice.valid().map_err(|err| {
        de_error(
            TypeChoiceError::InvalidValue {
                type_name: choice.type_name().to_string(),
                reason: err.to_string(),
            }
            .into(),
        )
    })?;

    Ok(choice)
}

/// Checks of a registered variant's value beyond its [`FieldKind`].
pub type VariantValidator = Arc<dyn Fn(&ExtensionValue) -> Result<()> + Send + Sync>;

/// A variant added to a choice at runtime.
#[derive(Clone)]
pub struct VariantSpec {
    pub type_name: String,
    /// CBOR tag of the variant. Untagged variants only exist in JSON.
    pub tag: Option<u64>,
    pub kind: FieldKind,
    pub validator: Option<VariantValidator>,
}

impl VariantSpec {
    pub fn new(type_name: &str, tag: Option<u64>, kind: FieldKind) -> Self {
        Self {
            type_name: type_name.to_string(),
            tag,
            kind,
            validator: None,
        }
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ExtensionValue) -> Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl std::fmt::Debug for VariantSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantSpec")
            .field("type_name", &self.type_name)
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

static VARIANTS: Lazy<RwLock<HashMap<&'static str, Vec<Arc<VariantSpec>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Adds a variant to choice `T`.
///
/// Fails when the name or tag is already taken by a built-in or registered
/// variant of `T`, or when the tag belongs to something else in the codec
/// tag registry. Registration cannot be undone.
pub fn register_variant<T: TypeChoice>(variant: VariantSpec) -> Result<()> {
    let mut variants = VARIANTS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let registered = variants.entry(T::CHOICE).or_default();

    let name_taken = T::TYPE_NAMES.contains(&variant.type_name.as_str())
        || registered.iter().any(|v| v.type_name == variant.type_name);
    let tag_taken = variant.tag.is_some_and(|tag| {
        T::TAGS.contains(&tag) || registered.iter().any(|v| v.tag == Some(tag))
    });

    if name_taken || tag_taken {
        return Err(TypeChoiceError::DuplicateVariant {
            choice: T::CHOICE,
            name: variant.type_name,
        }
        .into());
    }

    if let Some(tag) = variant.tag {
        tags::register_tag(tag, &format!("{}/{}", T::CHOICE, variant.type_name))?;
    }

    log::debug!(
        "registered {} variant {} (tag {:?})",
        T::CHOICE,
        variant.type_name,
        variant.tag
    );
    registered.push(Arc::new(variant));

    Ok(())
}

fn lookup<F>(choice: &str, pred: F) -> Option<Arc<VariantSpec>>
where
    F: Fn(&VariantSpec) -> bool,
{
    let variants = VARIANTS
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    variants
        .get(choice)
        .and_then(|variants| variants.iter().find(|variant| pred(variant)).cloned())
}

pub fn variant_by_name(choice: &str, type_name: &str) -> Option<Arc<VariantSpec>> {
    lookup(choice, |variant| variant.type_name == type_name)
}

pub fn variant_by_tag(choice: &str, tag: u64) -> Option<Arc<VariantSpec>> {
    lookup(choice, |variant| variant.tag == Some(tag))
}

/// The value of a registered variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceExtension {
    choice: &'static str,
    type_name: String,
    tag: Option<u64>,
    value: ExtensionValue,
}

impl ChoiceExtension {
    /// Builds a value for the registered variant `type_name` of `choice`,
    /// converting `value` to the variant's kind.
    pub fn new<V: Into<ExtensionValue>>(
        choice: &'static str,
        type_name: &str,
        value: V,
    ) -> Result<Self> {
        let variant = variant_by_name(choice, type_name).ok_or_else(|| {
            Error::from(TypeChoiceError::UnknownType {
                choice,
                name: type_name.to_string(),
            })
        })?;

        Self::with_spec(choice, &variant, value.into())
    }

    fn with_spec(choice: &'static str, variant: &VariantSpec, value: ExtensionValue) -> Result<Self> {
        let value = variant.kind.coerce(value).map_err(|got| {
            Error::from(TypeChoiceError::InvalidValue {
                type_name: variant.type_name.clone(),
                reason: format!("expected {}, got {}", variant.kind.name(), got.kind_name()),
            })
        })?;

        Ok(Self {
            choice,
            type_name: variant.type_name.clone(),
            tag: variant.tag,
            value,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    pub fn value(&self) -> &ExtensionValue {
        &self.value
    }

    /// Decodes a CBOR item no built-in variant of `choice` claimed.
    pub(crate) fn from_cbor(choice: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Tag(tag, inner) => match variant_by_tag(choice, tag) {
                Some(variant) => Self::with_spec(choice, &variant, ExtensionValue::try_from(*inner)?),
                None if tags::is_registered(tag) => {
                    Err(TypeChoiceError::UnknownTag { choice, tag }.into())
                }
                None => Err(CodecError::UnknownTag(tag).into()),
            },
            other => Err(TypeChoiceError::unexpected(choice, describe(&other)).into()),
        }
    }

    /// Decodes a JSON value whose type name no built-in variant of `choice`
    /// claimed.
    pub(crate) fn from_json(
        choice: &'static str,
        type_name: &str,
        value: serde_json::Value,
    ) -> Result<Self> {
        let variant = variant_by_name(choice, type_name).ok_or_else(|| {
            Error::from(TypeChoiceError::UnknownType {
                choice,
                name: type_name.to_string(),
            })
        })?;

        Self::with_spec(choice, &variant, value.into())
    }

    pub fn to_cbor_value(&self) -> Value {
        match self.tag {
            Some(tag) => Value::Tag(tag, Box::new(self.value.to_cbor_value())),
            None => self.value.to_cbor_value(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        self.value.to_json_value()
    }
}

impl Valid for ChoiceExtension {
    fn valid(&self) -> Result<()> {
        let variant = variant_by_name(self.choice, &self.type_name).ok_or_else(|| {
            Error::from(TypeChoiceError::UnknownType {
                choice: self.choice,
                name: self.type_name.clone(),
            })
        })?;

        if let Some(validator) = &variant.validator {
            validator(&self.value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_cbor, from_json, to_cbor, to_json};

    #[derive(Debug, Clone, PartialEq)]
    enum SampleId {
        Name(String),
        Extension(ChoiceExtension),
    }

    impl TypeChoice for SampleId {
        const CHOICE: &'static str = "SampleID";
        const TYPE_NAMES: &'static [&'static str] = &["name"];
        const TAGS: &'static [u64] = &[];

        fn type_name(&self) -> &str {
            match self {
                Self::Name(_) => "name",
                Self::Extension(ext) => ext.type_name(),
            }
        }

        fn to_cbor_value(&self) -> Result<Value> {
            Ok(match self {
                Self::Name(s) => Value::Text(s.clone()),
                Self::Extension(ext) => ext.to_cbor_value(),
            })
        }

        fn from_cbor_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => Ok(Self::Name(s)),
                other => ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension),
            }
        }

        fn to_json_value(&self) -> Result<serde_json::Value> {
            Ok(match self {
                Self::Name(s) => serde_json::Value::String(s.clone()),
                Self::Extension(ext) => ext.to_json_value(),
            })
        }

        fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
            match type_name {
                "name" => crate::codec::expect_json_str(value, "name").map(Self::Name),
                other => ChoiceExtension::from_json(Self::CHOICE, other, value).map(Self::Extension),
            }
        }
    }

    impl Valid for SampleId {
        fn valid(&self) -> Result<()> {
            match self {
                Self::Name(s) if s.is_empty() => Err(Error::invalid("empty name")),
                Self::Name(_) => Ok(()),
                Self::Extension(ext) => ext.valid(),
            }
        }
    }

    impl_type_choice_serde!(SampleId);

    choice_accessors!(SampleId { get_name => Name(String) });

    fn register() {
        // Tests share the process-wide registry; the first caller wins.
        let _ = register_variant::<SampleId>(
            VariantSpec::new("serial", Some(60900), FieldKind::Uint).with_validator(|v| {
                match v.as_uint() {
                    Some(n) if n > 0 => Ok(()),
                    _ => Err(Error::invalid("serial must be positive")),
                }
            }),
        );
    }

    #[test]
    fn test_builtin_variant() {
        let id = SampleId::Name("x".to_string());

        assert_eq!(to_cbor(&id).unwrap(), vec![0x61, 0x78]);
        assert_eq!(
            String::from_utf8(to_json(&id).unwrap()).unwrap(),
            r#"{"type":"name","value":"x"}"#
        );
        assert_eq!(id.get_name().unwrap(), "x");
    }

    #[test]
    fn test_registered_variant() {
        register();

        let id = SampleId::Extension(ChoiceExtension::new("SampleID", "serial", 7u64).unwrap());
        let cbor = to_cbor(&id).unwrap();

        assert_eq!(cbor, vec![0xd9, 0xed, 0xe4, 0x07]);
        assert_eq!(from_cbor::<SampleId>(&cbor).unwrap(), id);

        let json = to_json(&id).unwrap();
        assert_eq!(
            String::from_utf8(json.clone()).unwrap(),
            r#"{"type":"serial","value":7}"#
        );
        assert_eq!(from_json::<SampleId>(&json).unwrap(), id);

        assert_eq!(
            id.get_name().unwrap_err().to_string(),
            "SampleID type is: serial"
        );
    }

    #[test]
    fn test_variant_validator_runs_on_decode() {
        register();

        let err = from_json::<SampleId>(br#"{"type":"serial","value":0}"#).unwrap_err();
        assert!(
            err.to_string().contains("invalid serial: serial must be positive"),
            "{err}"
        );
    }

    #[test]
    fn test_unknown_variant() {
        let err = from_json::<SampleId>(br#"{"type":"nope","value":1}"#).unwrap_err();
        assert!(err.to_string().contains("unknown SampleID type: nope"), "{err}");

        // tag 61000 is unknown to the codec
        let err = from_cbor::<SampleId>(&[0xd9, 0xee, 0x48, 0x01]).unwrap_err();
        assert!(err.to_string().contains("unknown tag 61000"), "{err}");

        // tag 37 is known, but not to this choice
        let err = from_cbor::<SampleId>(&[0xd8, 0x25, 0x40]).unwrap_err();
        assert!(err.to_string().contains("unknown tag 37 for SampleID"), "{err}");
    }

    #[test]
    fn test_duplicate_variant() {
        register();

        assert!(register_variant::<SampleId>(VariantSpec::new("name", None, FieldKind::Text))
            .is_err());
        assert!(register_variant::<SampleId>(VariantSpec::new(
            "other",
            Some(60900),
            FieldKind::Text
        ))
        .is_err());
    }
}
