// SPDX-License-Identifier: MIT

//! A TDX-style profile.
//!
//! Adds TEE-specific measurement values to reference and endorsed values and
//! claims the CBOR tags the profile's expressions use.

use crate::{
    codec::tags::register_tag,
    core::{OidType, ProfileTypeChoice},
    error::{Error, ProfileError},
    extensions::{ExtensionPoint, ExtensionShape, Extensions, ExtensionsMap, FieldKind},
    result::Result,
};

use super::{register_profile, ProfileManifest};

/// Profile OID.
pub const TDX_PROFILE_OID: &str = "2.16.840.1.113741.1.16.1";

pub const TAG_TEE_DIGEST_EXPRESSION: u64 = 60010;
pub const TAG_TEE_SET_EXPRESSION: u64 = 60020;
pub const TAG_TEE_NUMERIC_EXPRESSION: u64 = 60021;

pub fn profile_id() -> Result<ProfileTypeChoice> {
    OidType::parse(TDX_PROFILE_OID).map(ProfileTypeChoice::Oid)
}

/// Measurement-value fields of the profile.
pub fn mval_shape() -> Result<ExtensionShape> {
    ExtensionShape::builder("tdx.mval")
        .field("tcbdate", "tcbdate", -72, FieldKind::Text)
        .field("isvsvn", "isvsvn", -73, FieldKind::Any)
        .field("instanceid", "instanceid", -77, FieldKind::Any)
        .field("pceid", "pceid", -80, FieldKind::Text)
        .field("miscselect", "miscselect", -81, FieldKind::Bytes)
        .field("vendor", "vendor", -84, FieldKind::Text)
        .field("model", "model", -85, FieldKind::Text)
        .field("isvprodid", "isvprodid", -86, FieldKind::Any)
        .field("tcbevalnum", "tcbevalnum", -87, FieldKind::Any)
        .field("tcbstatus", "tcbstatus", -88, FieldKind::Array)
        .field("advisoryids", "advisoryids", -89, FieldKind::Array)
        .field("epoch", "epoch", -90, FieldKind::Text)
        .field("tcbcompsvn", "tcbcompsvn", -125, FieldKind::Array)
        .validator(validate_mval)
        .build()
}

fn validate_mval(ext: &Extensions) -> Result<()> {
    if let Ok(pceid) = ext.get_string("pceid") {
        if pceid.len() != 4 || !pceid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid(format!("pceid must be 4 hex digits, got {pceid:?}")));
        }
    }

    if let Ok(tcbcompsvn) = ext.get_slice("tcbcompsvn") {
        if tcbcompsvn.len() != 16 {
            return Err(Error::invalid(format!(
                "tcbcompsvn must hold 16 entries, got {}",
                tcbcompsvn.len()
            )));
        }
    }

    Ok(())
}

/// The profile's manifest.
pub fn manifest() -> Result<ProfileManifest> {
    let mval = mval_shape()?;
    let extensions = ExtensionsMap::new()
        .with(ExtensionPoint::ReferenceValue, mval.clone())
        .with(ExtensionPoint::EndorsedValue, mval);

    Ok(ProfileManifest::new(profile_id()?, extensions))
}

/// Registers the profile and its tags. Calling it again is a no-op.
pub fn register() -> Result<()> {
    register_tag(TAG_TEE_DIGEST_EXPRESSION, "tdx.tee-digest-expression")?;
    register_tag(TAG_TEE_SET_EXPRESSION, "tdx.tee-set-expression")?;
    register_tag(TAG_TEE_NUMERIC_EXPRESSION, "tdx.tee-numeric-expression")?;

    match register_profile(manifest()?) {
        Err(Error::Profile(ProfileError::Duplicate(_))) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{tags::tag_owner, MapKey},
        comid::{ComidEntityMap, ComidRole, ConciseMidTag},
        extensions::ExtensionValue,
        profiles::get_profile_manifest,
        triples::tests::reference_value,
    };

    fn tdx_comid() -> ConciseMidTag {
        let mut comid = ConciseMidTag::new();
        comid
            .set_tag_identity("tdx-seam", Some(1))
            .unwrap()
            .add_entity(ComidEntityMap::new("INTEL", vec![ComidRole::TagCreator]))
            .unwrap();
        comid
    }

    #[test]
    fn test_register() {
        register().unwrap();
        register().unwrap();

        assert_eq!(
            tag_owner(TAG_TEE_SET_EXPRESSION).as_deref(),
            Some("tdx.tee-set-expression")
        );
        assert_eq!(profile_id().unwrap().to_string(), TDX_PROFILE_OID);
        assert!(get_profile_manifest(&profile_id().unwrap()).is_some());
    }

    #[test]
    fn test_reference_value_fields() {
        register().unwrap();
        let id = profile_id().unwrap();

        let mut rv = reference_value();
        let mval = &mut rv.measurements[0].mval.extensions;
        mval.accept(MapKey::Int(-80), ExtensionValue::from("0000")).unwrap();
        mval.accept(MapKey::Int(-84), ExtensionValue::from("Intel")).unwrap();

        let mut comid = tdx_comid();
        comid.add_reference_value(rv).unwrap();
        let cbor = comid.to_cbor().unwrap();

        let decoded = ConciseMidTag::from_cbor_with_profile(&cbor, Some(&id)).unwrap();
        let rvs = decoded.triples.reference_values.as_ref().unwrap();
        let mval = &rvs[0].measurements[0].mval.extensions;
        assert_eq!(mval.get_string("pceid").unwrap(), "0000");
        assert_eq!(mval.get_string("vendor").unwrap(), "Intel");
    }

    #[test]
    fn test_pceid_validation() {
        let manifest = manifest().unwrap();
        let mut comid = manifest.new_comid().unwrap();
        comid
            .set_tag_identity("tdx-seam", None)
            .unwrap()
            .add_entity(ComidEntityMap::new("INTEL", vec![ComidRole::TagCreator]))
            .unwrap();

        let mut rv = reference_value();
        rv.measurements[0]
            .mval
            .extensions
            .accept(MapKey::Int(-80), ExtensionValue::from("xyz"))
            .unwrap();

        let err = comid.add_reference_value(rv).unwrap_err().to_string();
        assert!(err.ends_with("pceid must be 4 hex digits, got \"xyz\""), "{err}");
    }
}
