// SPDX-License-Identifier: MIT

//! Signed CoRIM: an unsigned CoRIM carried as the payload of a COSE_Sign1.
//!
//! The protected header holds the algorithm, the `application/rim+cbor`
//! content type, an optional key id and the `corim-meta` map (label 8)
//! naming the signer. Key handling is left to implementations of
//! [`CoseSigner`] and [`CoseVerifier`].

use ciborium::Value;
use coset::{
    iana, CoseSign1, CoseSign1Builder, HeaderBuilder, Label, RegisteredLabel,
    RegisteredLabelWithPrivate, TaggedCborSerializable,
};

use super::{UnsignedCorim, ValidityMap};
use crate::{
    codec::{self, Time},
    core::UriType,
    error::{CorimError, Error},
    result::Result,
    valid::{ResultExt, Valid},
};

/// Content type of a signed CoRIM payload.
pub const CORIM_CONTENT_TYPE: &str = "application/rim+cbor";

/// Protected header label of the `corim-meta` map.
pub const CORIM_META_LABEL: i64 = 8;

/// Produces signatures over the COSE `Sig_structure`.
pub trait CoseSigner {
    /// Algorithm this signer produces signatures for.
    fn algorithm(&self) -> iana::Algorithm;

    /// Key id to put in the protected header, if any.
    fn key_id(&self) -> Option<Vec<u8>> {
        None
    }

    fn sign(&self, alg: iana::Algorithm, data: &[u8]) -> Result<Vec<u8>>;
}

/// Checks signatures over the COSE `Sig_structure`.
pub trait CoseVerifier {
    fn verify_signature(&self, alg: iana::Algorithm, sig: &[u8], data: &[u8]) -> Result<()>;
}

keyed_record!(
    /// Who signed the manifest.
    CorimSignerMap, "signer" {
        signer_name: String => (0, "signer-name"),
        signer_uri: UriType => (1, "signer-uri"),
    }
);

impl CorimSignerMap {
    pub fn new(name: &str, uri: Option<UriType>) -> Self {
        Self {
            signer_name: Some(name.to_string()),
            signer_uri: uri,
        }
    }
}

impl Valid for CorimSignerMap {
    fn valid(&self) -> Result<()> {
        match self.signer_name.as_deref() {
            Some(name) if !name.is_empty() => {}
            _ => return Err(Error::invalid("empty signer-name")),
        }

        if let Some(uri) = &self.signer_uri {
            uri.valid().context("invalid signer-uri")?;
        }

        Ok(())
    }
}

keyed_record!(
    /// Signer and signature validity, carried in the protected header.
    CorimMetaMap, "corim-meta" {
        signer: CorimSignerMap => (0, "signer"),
        signature_validity: ValidityMap => (1, "signature-validity"),
    }
);

impl CorimMetaMap {
    pub fn new(signer: CorimSignerMap) -> Self {
        Self {
            signer: Some(signer),
            signature_validity: None,
        }
    }

    pub fn with_validity(mut self, not_before: Option<Time>, not_after: Time) -> Self {
        self.signature_validity = Some(ValidityMap::new(not_before, not_after));
        self
    }
}

impl Valid for CorimMetaMap {
    fn valid(&self) -> Result<()> {
        match &self.signer {
            Some(signer) => signer.valid().context("signer validation failed")?,
            None => return Err(Error::invalid("missing signer")),
        }

        if let Some(validity) = &self.signature_validity {
            validity.valid().context("signature-validity validation failed")?;
        }

        Ok(())
    }
}

/// A CoRIM signed with COSE_Sign1 (tag 18).
#[derive(Debug, Clone, PartialEq)]
pub struct SignedCorim {
    sign1: CoseSign1,
    corim: UnsignedCorim,
    meta: CorimMetaMap,
}

impl SignedCorim {
    /// Validates `corim` and `meta`, then signs the tagged manifest.
    pub fn sign(corim: UnsignedCorim, meta: CorimMetaMap, signer: &dyn CoseSigner) -> Result<Self> {
        meta.valid().context("corim-meta validation failed")?;
        let payload = corim.to_cbor()?;
        let meta_bytes = codec::to_cbor(&meta)?;

        let alg = signer.algorithm();
        let mut header = HeaderBuilder::new()
            .algorithm(alg)
            .content_type(CORIM_CONTENT_TYPE.to_string())
            .value(CORIM_META_LABEL, Value::Bytes(meta_bytes));
        if let Some(kid) = signer.key_id() {
            header = header.key_id(kid);
        }

        let sign1 = CoseSign1Builder::new()
            .protected(header.build())
            .payload(payload)
            .try_create_signature(b"", |data| signer.sign(alg, data))?
            .build();

        log::debug!("signed corim {} with {alg:?}", corim.id);

        Ok(Self { sign1, corim, meta })
    }

    /// Encodes the tagged COSE_Sign1.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.sign1
            .clone()
            .to_tagged_vec()
            .map_err(|err| CorimError::cose(err).into())
    }

    /// Decodes a tagged COSE_Sign1 and the manifest it carries.
    ///
    /// The signature is not checked; call [`SignedCorim::verify`].
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let sign1 = CoseSign1::from_tagged_slice(data).map_err(CorimError::cose)?;
        let protected = &sign1.protected.header;

        if protected.alg.is_none() {
            return Err(CorimError::MissingAlgorithm.into());
        }

        match &protected.content_type {
            Some(RegisteredLabel::Text(ct)) if ct == CORIM_CONTENT_TYPE => {}
            Some(RegisteredLabel::Text(ct)) => {
                return Err(CorimError::UnexpectedContentType(ct.clone()).into())
            }
            Some(RegisteredLabel::Assigned(format)) => {
                return Err(CorimError::UnexpectedContentType(format!("{format:?}")).into())
            }
            None => return Err(CorimError::UnexpectedContentType(String::new()).into()),
        }

        let meta_bytes = protected
            .rest
            .iter()
            .find_map(|(label, value)| match (label, value) {
                (Label::Int(CORIM_META_LABEL), Value::Bytes(bytes)) => Some(bytes),
                _ => None,
            })
            .ok_or(CorimError::MissingMeta)?;
        let meta: CorimMetaMap = codec::from_cbor(meta_bytes).context("invalid corim-meta")?;
        meta.valid().context("corim-meta validation failed")?;

        let payload = sign1.payload.as_deref().ok_or(CorimError::MissingPayload)?;
        let corim = UnsignedCorim::from_cbor(payload)?;

        Ok(Self { sign1, corim, meta })
    }

    /// Checks the signature with `verifier`.
    pub fn verify(&self, verifier: &dyn CoseVerifier) -> Result<()> {
        let alg = self.algorithm()?;
        self.sign1
            .verify_signature(b"", |sig, data| verifier.verify_signature(alg, sig, data))
    }

    /// Whether `now` falls inside the signature validity, when one is given.
    pub fn is_valid_at(&self, now: Time) -> bool {
        match &self.meta.signature_validity {
            Some(ValidityMap {
                not_before,
                not_after,
            }) => {
                not_before.map_or(true, |nb| nb <= now) && not_after.map_or(true, |na| now <= na)
            }
            None => true,
        }
    }

    pub fn corim(&self) -> &UnsignedCorim {
        &self.corim
    }

    pub fn meta(&self) -> &CorimMetaMap {
        &self.meta
    }

    pub fn key_id(&self) -> &[u8] {
        &self.sign1.protected.header.key_id
    }

    pub fn algorithm(&self) -> Result<iana::Algorithm> {
        match &self.sign1.protected.header.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => Ok(*alg),
            Some(other) => Err(CorimError::cose(format!("unsupported algorithm {other:?}")).into()),
            None => Err(CorimError::MissingAlgorithm.into()),
        }
    }

    pub fn into_inner(self) -> (UnsignedCorim, CorimMetaMap) {
        (self.corim, self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corim::{tests::sample_coswid, Corim};

    /// Keyed checksum standing in for a real signature scheme.
    struct ChecksumKey(u8);

    impl ChecksumKey {
        fn checksum(&self, data: &[u8]) -> Vec<u8> {
            let mut out = [self.0; 8];
            for (i, b) in data.iter().enumerate() {
                out[i % 8] = out[i % 8].rotate_left(3) ^ b;
            }
            out.to_vec()
        }
    }

    impl CoseSigner for ChecksumKey {
        fn algorithm(&self) -> iana::Algorithm {
            iana::Algorithm::ES256
        }

        fn key_id(&self) -> Option<Vec<u8>> {
            Some(vec![self.0])
        }

        fn sign(&self, _alg: iana::Algorithm, data: &[u8]) -> Result<Vec<u8>> {
            Ok(self.checksum(data))
        }
    }

    impl CoseVerifier for ChecksumKey {
        fn verify_signature(&self, alg: iana::Algorithm, sig: &[u8], data: &[u8]) -> Result<()> {
            if alg != iana::Algorithm::ES256 {
                return Err(CorimError::Verification(format!("unexpected {alg:?}")).into());
            }
            if sig != self.checksum(data).as_slice() {
                return Err(CorimError::Verification("signature mismatch".to_string()).into());
            }
            Ok(())
        }
    }

    fn unsigned() -> UnsignedCorim {
        let mut corim = UnsignedCorim::new("signed-corim");
        corim.add_coswid(sample_coswid()).unwrap();
        corim
    }

    fn meta() -> CorimMetaMap {
        CorimMetaMap::new(CorimSignerMap::new(
            "ACME Signer",
            Some(UriType::parse("https://acme.example").unwrap()),
        ))
    }

    #[test]
    fn test_sign_and_verify() {
        let key = ChecksumKey(0x5a);
        let signed = SignedCorim::sign(unsigned(), meta(), &key).unwrap();
        let cbor = signed.to_cbor().unwrap();

        // tag 18, array(4)
        assert_eq!(&cbor[..2], &[0xd2, 0x84]);

        let decoded = SignedCorim::from_cbor(&cbor).unwrap();
        assert_eq!(decoded.corim(), &unsigned());
        assert_eq!(decoded.meta(), &meta());
        assert_eq!(decoded.key_id(), &[0x5a]);
        assert_eq!(decoded.algorithm().unwrap(), iana::Algorithm::ES256);
        decoded.verify(&key).unwrap();

        let err = decoded.verify(&ChecksumKey(0x00)).unwrap_err();
        assert_eq!(err.to_string(), "signature verification failed: signature mismatch");

        let any = Corim::from_cbor(&cbor).unwrap();
        assert!(any.is_signed());
        assert_eq!(any.unsigned(), &unsigned());
    }

    #[test]
    fn test_sign_rejects_invalid_input() {
        let key = ChecksumKey(1);

        let err = SignedCorim::sign(unsigned(), CorimMetaMap::default(), &key).unwrap_err();
        assert_eq!(err.to_string(), "corim-meta validation failed: missing signer");

        let err = SignedCorim::sign(UnsignedCorim::new("empty"), meta(), &key).unwrap_err();
        assert_eq!(err.to_string(), "tags validation failed: no tags");
    }

    #[test]
    fn test_missing_meta() {
        let key = ChecksumKey(2);
        let payload = unsigned().to_cbor().unwrap();
        let sign1 = CoseSign1Builder::new()
            .protected(
                HeaderBuilder::new()
                    .algorithm(iana::Algorithm::ES256)
                    .content_type(CORIM_CONTENT_TYPE.to_string())
                    .build(),
            )
            .payload(payload)
            .create_signature(b"", |data| key.checksum(data))
            .build();

        let err = SignedCorim::from_cbor(&sign1.to_tagged_vec().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "protected header has no corim-meta");
    }

    #[test]
    fn test_unexpected_content_type() {
        let sign1 = CoseSign1Builder::new()
            .protected(
                HeaderBuilder::new()
                    .algorithm(iana::Algorithm::ES256)
                    .content_type("application/json".to_string())
                    .build(),
            )
            .payload(vec![])
            .build();

        let err = SignedCorim::from_cbor(&sign1.to_tagged_vec().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "unexpected content type \"application/json\"");
    }

    #[test]
    fn test_signature_validity() {
        let key = ChecksumKey(3);
        let meta = meta().with_validity(
            Some(Time::from_timestamp(1_000, 0).unwrap()),
            Time::from_timestamp(2_000, 0).unwrap(),
        );
        let signed = SignedCorim::sign(unsigned(), meta, &key).unwrap();

        assert!(signed.is_valid_at(Time::from_timestamp(1_500, 0).unwrap()));
        assert!(!signed.is_valid_at(Time::from_timestamp(2_001, 0).unwrap()));
        assert!(!signed.is_valid_at(Time::from_timestamp(999, 0).unwrap()));
    }
}
