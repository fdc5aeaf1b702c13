// SPDX-License-Identifier: MIT

/// Generates wrapper structs for CBOR-tagged documents.
///
/// Each tuple is `(tag_num, Title, Type, "json-type-name", "doc")`. The
/// generated struct wraps `::ciborium::tag::Required<Type, tag_num>`, so
/// decoding fails when the tag is absent or different. In JSON the wrapper is
/// written as `{"type": "json-type-name", "value": ...}`.
///
/// Generated items: `new()`, `unwrap()`, `AsRef`, `AsMut`, `Deref`,
/// `DerefMut`, `From<Type>`, `Serialize` and `Deserialize`.
macro_rules! generate_tagged {
    ($(($tag_num:expr, $title:ident, $type:ty, $name:literal, $doc_comments:literal)),* $(,)?) => {
        $(
            #[doc = $doc_comments]
            #[derive(Debug, PartialEq, Clone)]
            pub struct $title(pub ::ciborium::tag::Required<$type, $tag_num>);

            impl $title {
                /// CBOR tag of the wrapped document.
                pub const TAG: u64 = $tag_num;

                /// JSON type name of the wrapped document.
                pub const TYPE_NAME: &'static str = $name;

                /// Creates a new wrapped instance from the provided value
                #[inline]
                pub const fn new(value: $type) -> Self {
                    Self(::ciborium::tag::Required(value))
                }

                /// Unwrap the tag, returning the inner value
                #[inline]
                pub fn unwrap(self) -> $type {
                    self.0.0
                }
            }

            impl std::convert::AsRef<$type> for $title {
                fn as_ref(&self) -> &$type {
                    &self.0.0
                }
            }

            impl std::convert::AsMut<$type> for $title {
                fn as_mut(&mut self) -> &mut $type {
                    &mut self.0.0
                }
            }

            impl std::ops::Deref for $title {
                type Target = $type;

                fn deref(&self) -> &Self::Target {
                    &self.0.0
                }
            }

            impl std::ops::DerefMut for $title {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.0.0
                }
            }

            impl std::convert::From<$type> for $title {
                fn from(value: $type) -> Self {
                    Self::new(value)
                }
            }

            impl ::serde::ser::Serialize for $title {
                fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
                where
                    S: ::serde::Serializer,
                {
                    use ::serde::ser::SerializeMap;

                    if serializer.is_human_readable() {
                        let mut state = serializer.serialize_map(Some(2))?;
                        state.serialize_entry("type", $name)?;
                        state.serialize_entry("value", &self.0.0)?;
                        state.end()
                    } else {
                        ::serde::Serialize::serialize(&self.0, serializer)
                    }
                }
            }

            impl<'de> ::serde::de::Deserialize<'de> for $title {
                fn deserialize<D>(deserializer: D) -> ::core::result::Result<$title, D::Error>
                where
                    D: ::serde::de::Deserializer<'de>,
                {
                    struct __Visitor;

                    impl<'de> ::serde::de::Visitor<'de> for __Visitor {
                        type Value = $title;

                        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                            formatter.write_str(concat!("a tagged ", $name))
                        }

                        fn visit_map<A>(self, mut map: A) -> ::core::result::Result<Self::Value, A::Error>
                        where
                            A: ::serde::de::MapAccess<'de>
                        {
                            let mut ret = None;
                            let mut seen_tag: bool = false;
                            loop {
                                match map.next_key::<String>()?.as_deref() {
                                    Some("type") => {
                                        let typ: String = map.next_value()?;
                                        if typ != $name {
                                            return Err(::serde::de::Error::custom(format!(
                                                "expected type {}, found {}",
                                                $name,
                                                typ,
                                            )));
                                        }

                                        seen_tag = true;
                                    },
                                    Some("value") => {
                                        ret = Some($title::new(map.next_value::<$type>()?));
                                    },
                                    Some(s) => {
                                        return Err(::serde::de::Error::custom(
                                            format!("unexpected map entry: {}", s)
                                        ));
                                    },
                                    None => break,
                                }
                            }

                            if !seen_tag {
                                return Err(::serde::de::Error::custom("no \"type\" entry in map"));
                            }

                            ret.ok_or_else(|| ::serde::de::Error::custom("no \"value\" entry in map"))
                        }
                    }

                    if deserializer.is_human_readable() {
                        deserializer.deserialize_map(__Visitor)
                    } else {
                        Ok($title(
                            <::ciborium::tag::Required<$type, $tag_num> as ::serde::Deserialize>::deserialize(deserializer)?,
                        ))
                    }
                }
            }
        )*
    };
}

/// Implements `Serialize` and `Deserialize` for a [`TypeChoice`] through the
/// shared type-and-value codec.
///
/// [`TypeChoice`]: crate::type_choice::TypeChoice
macro_rules! impl_type_choice_serde {
    ($($type:ty),* $(,)?) => {
        $(
            impl ::serde::Serialize for $type {
                fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
                where
                    S: ::serde::Serializer,
                {
                    $crate::type_choice::serialize_choice(self, serializer)
                }
            }

            impl<'de> ::serde::Deserialize<'de> for $type {
                fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
                where
                    D: ::serde::Deserializer<'de>,
                {
                    $crate::type_choice::deserialize_choice(deserializer)
                }
            }
        )*
    };
}

/// Generates `get_*` accessors on a type choice. Each accessor returns the
/// variant's value, or `<choice> type is: <actual>` for any other variant.
macro_rules! choice_accessors {
    ($type:ty { $($fn_name:ident => $variant:ident($inner:ty)),* $(,)? }) => {
        impl $type {
            $(
                pub fn $fn_name(&self) -> $crate::result::Result<&$inner> {
                    match self {
                        Self::$variant(v) => Ok(v),
                        #[allow(unreachable_patterns)]
                        other => Err($crate::error::TypeChoiceError::WrongType {
                            choice: <Self as $crate::type_choice::TypeChoice>::CHOICE,
                            actual: $crate::type_choice::TypeChoice::type_name(other).to_string(),
                        }
                        .into()),
                    }
                }
            )*
        }
    };
}

/// Generates an enumeration of registered integer codes with a kebab-case
/// name per code.
///
/// CBOR carries the code; JSON carries the name, or the code when it is not
/// registered. Unregistered codes decode to `Other(code)` so that documents
/// using newer registry entries still round-trip.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
            /// A code outside the registered set.
            Other(i64),
        }

        impl $name {
            pub fn from_code(code: i64) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    other => Self::Other(other),
                }
            }

            pub fn code(&self) -> i64 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Other(code) => *code,
                }
            }

            pub fn name(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($label),)*
                    Self::Other(_) => None,
                }
            }

            /// Fails on a code outside the registered set.
            pub fn known(&self) -> $crate::result::Result<()> {
                match self {
                    Self::Other(code) => Err($crate::error::Error::invalid(format!(
                        concat!("unknown ", $what, " {}"),
                        code
                    ))),
                    _ => Ok(()),
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> $crate::result::Result<Self> {
                match s {
                    $($label => Ok(Self::$variant),)*
                    other => other.parse::<i64>().map(Self::from_code).map_err(|_| {
                        $crate::error::Error::invalid(format!(
                            concat!("unknown ", $what, " {:?}"),
                            other
                        ))
                    }),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}", self.code()),
                }
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                match self.name() {
                    Some(name) if serializer.is_human_readable() => serializer.serialize_str(name),
                    _ => serializer.serialize_i64(self.code()),
                }
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                struct __Visitor;

                impl ::serde::de::Visitor<'_> for __Visitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                        formatter.write_str(concat!("a ", $what, " name or code"))
                    }

                    fn visit_i64<E: ::serde::de::Error>(self, v: i64) -> ::core::result::Result<$name, E> {
                        Ok($name::from_code(v))
                    }

                    fn visit_u64<E: ::serde::de::Error>(self, v: u64) -> ::core::result::Result<$name, E> {
                        i64::try_from(v)
                            .map($name::from_code)
                            .map_err(|_| E::custom(format!(concat!($what, " {} out of range"), v)))
                    }

                    fn visit_str<E: ::serde::de::Error>(self, v: &str) -> ::core::result::Result<$name, E> {
                        v.parse().map_err(E::custom)
                    }
                }

                deserializer.deserialize_any(__Visitor)
            }
        }
    };
}

/// Generates a closed record of optional fields encoded as a map keyed by
/// integers in CBOR and by names in JSON.
///
/// Absent fields are omitted on encode. An unknown key fails the decode with
/// `unexpected <label> key <key>`; presence rules belong in the record's
/// `Valid` impl.
macro_rules! keyed_record {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($(#[$fmeta:meta])* $field:ident: $ty:ty => ($cbor:literal, $json:literal)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: Option<$ty>,)*
        }

        impl $name {
            pub const KEYS: &'static [$crate::codec::Key] = &[
                $($crate::codec::Key::new($cbor, $json),)*
            ];
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                use ::serde::ser::SerializeMap;

                let hr = serializer.is_human_readable();
                let mut map = serializer.serialize_map(None)?;
                $(
                    if let Some(value) = &self.$field {
                        $crate::codec::Key::new($cbor, $json).serialize_entry(&mut map, hr, value)?;
                    }
                )*
                map.end()
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                struct __Visitor {
                    is_human_readable: bool,
                }

                impl<'de> ::serde::de::Visitor<'de> for __Visitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                        formatter.write_str(concat!("a ", $label, " map"))
                    }

                    fn visit_map<A>(self, mut map: A) -> ::core::result::Result<$name, A::Error>
                    where
                        A: ::serde::de::MapAccess<'de>,
                    {
                        let mut record = $name::default();

                        while let Some(key) = map.next_key::<$crate::codec::MapKey>()? {
                            match key.resolve(self.is_human_readable, $name::KEYS).map(|k| k.cbor) {
                                $(Some($cbor) => record.$field = Some(map.next_value()?),)*
                                _ => {
                                    return Err(::serde::de::Error::custom(format!(
                                        concat!("unexpected ", $label, " key {}"),
                                        key
                                    )))
                                }
                            }
                        }

                        Ok(record)
                    }
                }

                let is_human_readable = deserializer.is_human_readable();
                deserializer.deserialize_map(__Visitor { is_human_readable })
            }
        }
    };
}
