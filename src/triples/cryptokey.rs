// SPDX-License-Identifier: MIT

//! Verification keys and key identifiers.

use ciborium::Value;
use coset::{AsCborValue, CborSerializable, CoseKey};

use crate::{
    codec::{
        base64_decode, base64_encode, describe, expect_bytes, expect_json_str, expect_text,
        tags::{
            TAG_BYTES, TAG_CERT_PATH_THUMBPRINT, TAG_CERT_THUMBPRINT, TAG_COSE_KEY,
            TAG_PKIX_ASN1DER_CERT, TAG_PKIX_BASE64_CERT, TAG_PKIX_BASE64_CERT_PATH,
            TAG_PKIX_BASE64_KEY, TAG_THUMBPRINT,
        },
        to_value, Bytes,
    },
    core::Digest,
    error::{Error, TypeChoiceError},
    result::Result,
    type_choice::{ChoiceExtension, TypeChoice},
    valid::Valid,
};

/// A key, certificate, or a thumbprint of one.
#[derive(Debug, Clone, PartialEq)]
pub enum CryptoKeyTypeChoice {
    PkixBase64Key(String),
    PkixBase64Cert(String),
    PkixBase64CertPath(String),
    Thumbprint(Digest),
    CoseKey(CoseKey),
    CertThumbprint(Digest),
    Bytes(Bytes),
    CertPathThumbprint(Digest),
    PkixAsn1DerCert(Bytes),
    Extension(ChoiceExtension),
}

impl CryptoKeyTypeChoice {
    pub(crate) const BUILTIN_TAGS: &'static [u64] = &[
        TAG_PKIX_BASE64_KEY,
        TAG_PKIX_BASE64_CERT,
        TAG_PKIX_BASE64_CERT_PATH,
        TAG_THUMBPRINT,
        TAG_COSE_KEY,
        TAG_CERT_THUMBPRINT,
        TAG_BYTES,
        TAG_CERT_PATH_THUMBPRINT,
        TAG_PKIX_ASN1DER_CERT,
    ];

    pub(crate) const BUILTIN_NAMES: &'static [&'static str] = &[
        "pkix-base64-key",
        "pkix-base64-cert",
        "pkix-base64-cert-path",
        "thumbprint",
        "cose-key",
        "cert-thumbprint",
        "bytes",
        "cert-path-thumbprint",
        "pkix-asn1der-cert",
    ];

    /// Decodes one of the built-in tagged forms; hands the item back when it
    /// is not one of them.
    pub(crate) fn decode_builtin(value: Value) -> Result<std::result::Result<Self, Value>> {
        let (tag, inner) = match value {
            Value::Tag(tag, inner) if Self::BUILTIN_TAGS.contains(&tag) => (tag, *inner),
            other => return Ok(Err(other)),
        };

        let key = match tag {
            TAG_PKIX_BASE64_KEY => Self::PkixBase64Key(expect_text(inner, "pkix-base64-key")?),
            TAG_PKIX_BASE64_CERT => Self::PkixBase64Cert(expect_text(inner, "pkix-base64-cert")?),
            TAG_PKIX_BASE64_CERT_PATH => {
                Self::PkixBase64CertPath(expect_text(inner, "pkix-base64-cert-path")?)
            }
            TAG_THUMBPRINT => Self::Thumbprint(crate::codec::from_value(inner)?),
            TAG_COSE_KEY => Self::CoseKey(
                CoseKey::from_cbor_value(inner)
                    .map_err(|err| Error::invalid(format!("cose-key: {err}")))?,
            ),
            TAG_CERT_THUMBPRINT => Self::CertThumbprint(crate::codec::from_value(inner)?),
            TAG_BYTES => Self::Bytes(expect_bytes(inner, "bytes")?.into()),
            TAG_CERT_PATH_THUMBPRINT => Self::CertPathThumbprint(crate::codec::from_value(inner)?),
            _ => Self::PkixAsn1DerCert(expect_bytes(inner, "pkix-asn1der-cert")?.into()),
        };

        Ok(Ok(key))
    }

    /// Decodes one of the built-in JSON forms; hands the value back when
    /// `type_name` is not one of them.
    pub(crate) fn decode_builtin_json(
        type_name: &str,
        value: serde_json::Value,
    ) -> Result<std::result::Result<Self, serde_json::Value>> {
        let digest = |value: serde_json::Value| -> Result<Digest> {
            Digest::parse(&expect_json_str(value, type_name)?)
        };
        let bytes = |value: serde_json::Value| -> Result<Bytes> {
            base64_decode(&expect_json_str(value, type_name)?).map(Bytes::from)
        };

        let key = match type_name {
            "pkix-base64-key" => Self::PkixBase64Key(expect_json_str(value, type_name)?),
            "pkix-base64-cert" => Self::PkixBase64Cert(expect_json_str(value, type_name)?),
            "pkix-base64-cert-path" => Self::PkixBase64CertPath(expect_json_str(value, type_name)?),
            "thumbprint" => Self::Thumbprint(digest(value)?),
            "cose-key" => Self::CoseKey(
                CoseKey::from_slice(&bytes(value)?)
                    .map_err(|err| Error::invalid(format!("cose-key: {err}")))?,
            ),
            "cert-thumbprint" => Self::CertThumbprint(digest(value)?),
            "bytes" => Self::Bytes(bytes(value)?),
            "cert-path-thumbprint" => Self::CertPathThumbprint(digest(value)?),
            "pkix-asn1der-cert" => Self::PkixAsn1DerCert(bytes(value)?),
            _ => return Ok(Err(value)),
        };

        Ok(Ok(key))
    }
}

impl TypeChoice for CryptoKeyTypeChoice {
    const CHOICE: &'static str = "CryptoKey";
    const TYPE_NAMES: &'static [&'static str] = Self::BUILTIN_NAMES;
    const TAGS: &'static [u64] = Self::BUILTIN_TAGS;

    fn type_name(&self) -> &str {
        match self {
            Self::PkixBase64Key(_) => "pkix-base64-key",
            Self::PkixBase64Cert(_) => "pkix-base64-cert",
            Self::PkixBase64CertPath(_) => "pkix-base64-cert-path",
            Self::Thumbprint(_) => "thumbprint",
            Self::CoseKey(_) => "cose-key",
            Self::CertThumbprint(_) => "cert-thumbprint",
            Self::Bytes(_) => "bytes",
            Self::CertPathThumbprint(_) => "cert-path-thumbprint",
            Self::PkixAsn1DerCert(_) => "pkix-asn1der-cert",
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        let (tag, inner) = match self {
            Self::PkixBase64Key(s) => (TAG_PKIX_BASE64_KEY, Value::Text(s.clone())),
            Self::PkixBase64Cert(s) => (TAG_PKIX_BASE64_CERT, Value::Text(s.clone())),
            Self::PkixBase64CertPath(s) => (TAG_PKIX_BASE64_CERT_PATH, Value::Text(s.clone())),
            Self::Thumbprint(d) => (TAG_THUMBPRINT, to_value(d)?),
            Self::CoseKey(k) => (
                TAG_COSE_KEY,
                k.clone()
                    .to_cbor_value()
                    .map_err(|err| Error::invalid(format!("cose-key: {err}")))?,
            ),
            Self::CertThumbprint(d) => (TAG_CERT_THUMBPRINT, to_value(d)?),
            Self::Bytes(b) => (TAG_BYTES, Value::Bytes(b.to_vec())),
            Self::CertPathThumbprint(d) => (TAG_CERT_PATH_THUMBPRINT, to_value(d)?),
            Self::PkixAsn1DerCert(b) => (TAG_PKIX_ASN1DER_CERT, Value::Bytes(b.to_vec())),
            Self::Extension(ext) => return Ok(ext.to_cbor_value()),
        };

        Ok(Value::Tag(tag, Box::new(inner)))
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match Self::decode_builtin(value)? {
            Ok(key) => Ok(key),
            Err(other @ Value::Tag(..)) => {
                ChoiceExtension::from_cbor(Self::CHOICE, other).map(Self::Extension)
            }
            Err(other) => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::PkixBase64Key(s) | Self::PkixBase64Cert(s) | Self::PkixBase64CertPath(s) => {
                serde_json::Value::String(s.clone())
            }
            Self::Thumbprint(d) | Self::CertThumbprint(d) | Self::CertPathThumbprint(d) => {
                serde_json::Value::String(d.to_string())
            }
            Self::CoseKey(k) => serde_json::Value::String(base64_encode(
                &k.clone()
                    .to_vec()
                    .map_err(|err| Error::invalid(format!("cose-key: {err}")))?,
            )),
            Self::Bytes(b) | Self::PkixAsn1DerCert(b) => {
                serde_json::Value::String(base64_encode(b))
            }
            Self::Extension(ext) => ext.to_json_value(),
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        match Self::decode_builtin_json(type_name, value)? {
            Ok(key) => Ok(key),
            Err(value) => {
                ChoiceExtension::from_json(Self::CHOICE, type_name, value).map(Self::Extension)
            }
        }
    }
}

/// Checks that `s` is base64, optionally wrapped in PEM armor.
fn valid_pkix_base64(s: &str) -> Result<()> {
    let body: String = s
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect();

    if body.is_empty() {
        return Err(Error::invalid("empty base64 key material"));
    }

    base64_decode(&body).map(|_| ())
}

impl Valid for CryptoKeyTypeChoice {
    fn valid(&self) -> Result<()> {
        match self {
            Self::PkixBase64Key(s) | Self::PkixBase64Cert(s) | Self::PkixBase64CertPath(s) => {
                valid_pkix_base64(s)
            }
            Self::Thumbprint(d) | Self::CertThumbprint(d) | Self::CertPathThumbprint(d) => {
                d.valid()
            }
            Self::CoseKey(_) => Ok(()),
            Self::Bytes(b) | Self::PkixAsn1DerCert(b) => {
                if b.is_empty() {
                    return Err(Error::invalid("empty key bytes"));
                }
                Ok(())
            }
            Self::Extension(ext) => ext.valid(),
        }
    }
}

impl_type_choice_serde!(CryptoKeyTypeChoice);

choice_accessors!(CryptoKeyTypeChoice {
    get_pkix_base64_key => PkixBase64Key(String),
    get_pkix_base64_cert => PkixBase64Cert(String),
    get_thumbprint => Thumbprint(Digest),
    get_cose_key => CoseKey(CoseKey),
    get_bytes => Bytes(Bytes),
});

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::{
        codec::{from_cbor, from_json, to_cbor, to_json},
        core::HashAlgorithm,
    };

    const PKIX_KEY: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEW1BvqF+/ry8BWa7ZEMU1xYYHEQ8BlLT4MFHOaO+ICTtIvrEeEpr/sfTAP66H2hCHdb5HEXKtRKod6QLcOLPA1Q==";

    #[test]
    fn test_pkix_base64_key() {
        let key = CryptoKeyTypeChoice::PkixBase64Key(PKIX_KEY.to_string());
        key.valid().unwrap();

        let cbor = to_cbor(&key).unwrap();
        assert_eq!(&cbor[..5], &[0xd9, 0x02, 0x2a, 0x78, 0x7c]);
        assert_eq!(from_cbor::<CryptoKeyTypeChoice>(&cbor).unwrap(), key);

        let json = to_json(&key).unwrap();
        assert_eq!(
            String::from_utf8(json.clone()).unwrap(),
            format!(r#"{{"type":"pkix-base64-key","value":"{PKIX_KEY}"}}"#)
        );
        assert_eq!(from_json::<CryptoKeyTypeChoice>(&json).unwrap(), key);
    }

    #[test]
    fn test_thumbprint() {
        let key = CryptoKeyTypeChoice::CertThumbprint(Digest::new(
            HashAlgorithm::Sha256_32,
            vec![0xde, 0xad, 0xbe, 0xef],
        ));

        let cbor = to_cbor(&key).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xd9, 0x02, 0x2f, // tag(559)
                  0x82,
                    0x06, // sha-256-32
                    0x44, 0xde, 0xad, 0xbe, 0xef,
            ]
        );
        assert_eq!(from_cbor::<CryptoKeyTypeChoice>(&cbor).unwrap(), key);
        assert_eq!(key.get_thumbprint().unwrap_err().to_string(), "CryptoKey type is: cert-thumbprint");
    }

    #[test]
    fn test_invalid_thumbprint_rejected_on_decode() {
        let json = br#"{"type":"thumbprint","value":"sha-256;3q2+7w=="}"#;

        let err = from_json::<CryptoKeyTypeChoice>(json).unwrap_err();

        assert!(
            err.to_string().contains(
                "invalid thumbprint: length mismatch for hash algorithm sha-256: want 32 bytes, got 4"
            ),
            "{err}"
        );
    }

    #[test]
    fn test_cose_key() {
        let key = coset::CoseKeyBuilder::new_ec2_pub_key(
            coset::iana::EllipticCurve::P_256,
            vec![1; 32],
            vec![2; 32],
        )
        .build();
        let choice = CryptoKeyTypeChoice::CoseKey(key);

        let cbor = to_cbor(&choice).unwrap();
        assert_eq!(&cbor[..3], &[0xd9, 0x02, 0x2e]);
        assert_eq!(from_cbor::<CryptoKeyTypeChoice>(&cbor).unwrap(), choice);

        let json = to_json(&choice).unwrap();
        assert_eq!(from_json::<CryptoKeyTypeChoice>(&json).unwrap(), choice);
    }

    #[test]
    fn test_bad_pkix_key() {
        let key = CryptoKeyTypeChoice::PkixBase64Key("not base64!".to_string());

        assert!(key.valid().is_err());
    }
}
