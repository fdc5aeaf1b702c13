// SPDX-License-Identifier: MIT

//! Process-wide CBOR tag registry.
//!
//! Every tag this crate encodes is registered up front, keyed by number and
//! owner. Profiles add their own tags through [`register_tag`]; type-choice
//! decoders consult the registry for tags none of their built-in variants
//! claim.

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use once_cell::sync::Lazy;

use crate::{error::CodecError, result::Result};

pub const TAG_RFC3339_TIME: u64 = 0;
pub const TAG_EPOCH_TIME: u64 = 1;
pub const TAG_COSE_SIGN1: u64 = 18;
pub const TAG_URI: u64 = 32;
pub const TAG_UUID: u64 = 37;
pub const TAG_OID: u64 = 111;
pub const TAG_UNSIGNED_CORIM: u64 = 501;
pub const TAG_COSWID: u64 = 505;
pub const TAG_COMID: u64 = 506;
pub const TAG_COTS: u64 = 507;
pub const TAG_UEID: u64 = 550;
pub const TAG_SVN: u64 = 552;
pub const TAG_MIN_SVN: u64 = 553;
pub const TAG_PKIX_BASE64_KEY: u64 = 554;
pub const TAG_PKIX_BASE64_CERT: u64 = 555;
pub const TAG_PKIX_BASE64_CERT_PATH: u64 = 556;
pub const TAG_THUMBPRINT: u64 = 557;
pub const TAG_COSE_KEY: u64 = 558;
pub const TAG_CERT_THUMBPRINT: u64 = 559;
pub const TAG_BYTES: u64 = 560;
pub const TAG_CERT_PATH_THUMBPRINT: u64 = 561;
pub const TAG_PKIX_ASN1DER_CERT: u64 = 562;
pub const TAG_MASKED_RAW_VALUE: u64 = 563;
pub const TAG_NUMERIC_EXPRESSION: u64 = 565;
pub const TAG_SET_EXPRESSION: u64 = 566;
pub const TAG_CONCISE_EVIDENCE: u64 = 571;
pub const TAG_PSA_REFVAL_ID: u64 = 601;

const BUILTIN: &[(u64, &str)] = &[
    (TAG_RFC3339_TIME, "tdate"),
    (TAG_EPOCH_TIME, "time"),
    (TAG_COSE_SIGN1, "COSE_Sign1"),
    (TAG_URI, "uri"),
    (TAG_UUID, "uuid"),
    (TAG_OID, "oid"),
    (TAG_UNSIGNED_CORIM, "unsigned-corim"),
    (TAG_COSWID, "coswid"),
    (TAG_COMID, "comid"),
    (TAG_COTS, "cots"),
    (TAG_UEID, "ueid"),
    (TAG_SVN, "svn"),
    (TAG_MIN_SVN, "min-svn"),
    (TAG_PKIX_BASE64_KEY, "pkix-base64-key"),
    (TAG_PKIX_BASE64_CERT, "pkix-base64-cert"),
    (TAG_PKIX_BASE64_CERT_PATH, "pkix-base64-cert-path"),
    (TAG_THUMBPRINT, "thumbprint"),
    (TAG_COSE_KEY, "cose-key"),
    (TAG_CERT_THUMBPRINT, "cert-thumbprint"),
    (TAG_BYTES, "bytes"),
    (TAG_CERT_PATH_THUMBPRINT, "cert-path-thumbprint"),
    (TAG_PKIX_ASN1DER_CERT, "pkix-asn1der-cert"),
    (TAG_MASKED_RAW_VALUE, "masked-raw-value"),
    (TAG_NUMERIC_EXPRESSION, "numeric-expression"),
    (TAG_SET_EXPRESSION, "set-expression"),
    (TAG_CONCISE_EVIDENCE, "concise-evidence"),
    (TAG_PSA_REFVAL_ID, "psa.refval-id"),
];

static REGISTRY: Lazy<RwLock<BTreeMap<u64, String>>> = Lazy::new(|| {
    RwLock::new(
        BUILTIN
            .iter()
            .map(|(tag, owner)| (*tag, owner.to_string()))
            .collect(),
    )
});

/// Registers `tag` for `owner`.
///
/// Registering the same pair twice is a no-op; claiming a tag that belongs to
/// another owner fails.
pub fn register_tag(tag: u64, owner: &str) -> Result<()> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);

    match registry.get(&tag) {
        Some(existing) if existing == owner => Ok(()),
        Some(existing) => Err(CodecError::TagConflict {
            tag,
            owner: existing.clone(),
        }
        .into()),
        None => {
            log::debug!("registering CBOR tag {tag} for {owner}");
            registry.insert(tag, owner.to_string());
            Ok(())
        }
    }
}

/// The owner `tag` is registered to.
pub fn tag_owner(tag: u64) -> Option<String> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&tag)
        .cloned()
}

pub fn is_registered(tag: u64) -> bool {
    tag_owner(tag).is_some()
}

/// Fails with `unknown tag N` unless `tag` is registered.
pub fn require_registered(tag: u64) -> Result<()> {
    if is_registered(tag) {
        Ok(())
    } else {
        Err(CodecError::UnknownTag(tag).into())
    }
}

/// The encoded head of `tag`, e.g. `D9 02 3B` for 571.
pub fn tag_prefix(tag: u64) -> Vec<u8> {
    const MAJOR: u8 = 6 << 5;

    match tag {
        0..=23 => vec![MAJOR | tag as u8],
        24..=0xff => vec![MAJOR | 24, tag as u8],
        0x100..=0xffff => {
            let mut out = vec![MAJOR | 25];
            out.extend_from_slice(&(tag as u16).to_be_bytes());
            out
        }
        0x1_0000..=0xffff_ffff => {
            let mut out = vec![MAJOR | 26];
            out.extend_from_slice(&(tag as u32).to_be_bytes());
            out
        }
        _ => {
            let mut out = vec![MAJOR | 27];
            out.extend_from_slice(&tag.to_be_bytes());
            out
        }
    }
}

/// Prepends the head of `tag` to an encoded item.
pub fn add_prefix(tag: u64, body: &[u8]) -> Vec<u8> {
    let mut out = tag_prefix(tag);
    out.extend_from_slice(body);
    out
}

/// Returns the item following the head of `tag`, failing if `data` does not
/// start with it.
pub fn strip_prefix(tag: u64, data: &[u8]) -> Result<&[u8]> {
    let prefix = tag_prefix(tag);

    match data.strip_prefix(prefix.as_slice()) {
        Some(body) => Ok(body),
        None => Err(CodecError::UnexpectedTag {
            expected: tag,
            found: describe_head(data),
        }
        .into()),
    }
}

fn describe_head(data: &[u8]) -> String {
    match data.first() {
        None => "empty input".to_string(),
        Some(b) if b >> 5 == 6 => {
            let len = match b & 0x1f {
                0..=23 => 0,
                24 => 1,
                25 => 2,
                26 => 4,
                27 => 8,
                _ => return format!("malformed tag head {b:#04x}"),
            };
            if len == 0 {
                return format!("tag {}", b & 0x1f);
            }
            match data.get(1..1 + len) {
                Some(arg) => {
                    let tag = arg.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                    format!("tag {tag}")
                }
                None => "truncated tag head".to_string(),
            }
        }
        Some(b) => format!("untagged item {b:#04x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_prefix() {
        assert_eq!(tag_prefix(TAG_CONCISE_EVIDENCE), vec![0xd9, 0x02, 0x3b]);
        assert_eq!(tag_prefix(TAG_UNSIGNED_CORIM), vec![0xd9, 0x01, 0xf5]);
        assert_eq!(tag_prefix(TAG_COTS), vec![0xd9, 0x01, 0xfb]);
        assert_eq!(tag_prefix(TAG_COSE_SIGN1), vec![0xd2]);
        assert_eq!(tag_prefix(TAG_UUID), vec![0xd8, 0x25]);
        assert_eq!(tag_prefix(60010), vec![0xd9, 0xea, 0x6a]);
    }

    #[test]
    fn test_strip_prefix() {
        let body = strip_prefix(TAG_CONCISE_EVIDENCE, &[0xd9, 0x02, 0x3b, 0xa0]).unwrap();
        assert_eq!(body, &[0xa0]);

        let err = strip_prefix(TAG_CONCISE_EVIDENCE, &[0xd9, 0x01, 0xf5, 0xa0]).unwrap_err();
        assert_eq!(err.to_string(), "cbor: expected tag 571, found tag 501");

        let err = strip_prefix(TAG_CONCISE_EVIDENCE, &[0xa0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cbor: expected tag 571, found untagged item 0xa0"
        );
    }

    #[test]
    fn test_register_tag() {
        assert!(register_tag(64999, "test-owner").is_ok());
        assert!(register_tag(64999, "test-owner").is_ok());
        assert_eq!(tag_owner(64999).as_deref(), Some("test-owner"));

        let err = register_tag(TAG_UUID, "test-owner").unwrap_err();
        assert_eq!(err.to_string(), "tag 37 already registered to uuid");

        assert!(require_registered(TAG_BYTES).is_ok());
        assert_eq!(
            require_registered(64998).unwrap_err().to_string(),
            "unknown tag 64998"
        );
    }
}
