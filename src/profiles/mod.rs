// SPDX-License-Identifier: MIT

//! Process-wide registry of EAT profiles.
//!
//! A profile is identified by a URI or an OID and carries the extension
//! shapes it adds to the document model. Documents naming a registered
//! profile get those shapes bound when they are decoded.
//!
//! ```
//! use rats_corim::{
//!     core::ProfileTypeChoice,
//!     extensions::{ExtensionPoint, ExtensionShape, ExtensionsMap, FieldKind},
//!     profiles::{self, ProfileManifest},
//! };
//!
//! let id = ProfileTypeChoice::parse("http://example.com/doc-profile").unwrap();
//! let shape = ExtensionShape::builder("acme")
//!     .field("site", "acme.site", -1, FieldKind::Text)
//!     .build()
//!     .unwrap();
//! let manifest = ProfileManifest::new(id.clone(), ExtensionsMap::new().with(ExtensionPoint::Comid, shape));
//!
//! profiles::register_profile(manifest).unwrap();
//! assert!(profiles::get_profile_manifest(&id).is_some());
//! assert!(profiles::unregister_profile(&id));
//! ```

pub mod tdx;

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use once_cell::sync::Lazy;

use crate::{
    coev::ConciseEvidence,
    comid::ConciseMidTag,
    core::ProfileTypeChoice,
    corim::UnsignedCorim,
    error::ProfileError,
    extensions::ExtensionsMap,
    result::Result,
    valid::Valid,
};

/// A profile and the extensions it defines.
#[derive(Debug, Clone)]
pub struct ProfileManifest {
    id: ProfileTypeChoice,
    extensions: ExtensionsMap,
}

impl ProfileManifest {
    pub fn new(id: ProfileTypeChoice, extensions: ExtensionsMap) -> Self {
        Self { id, extensions }
    }

    pub fn id(&self) -> &ProfileTypeChoice {
        &self.id
    }

    pub fn extensions(&self) -> &ExtensionsMap {
        &self.extensions
    }

    /// An empty CoMID with the profile's extensions bound.
    pub fn new_comid(&self) -> Result<ConciseMidTag> {
        let mut comid = ConciseMidTag::new();
        comid.bind_extensions(&self.extensions)?;
        Ok(comid)
    }

    /// An empty CoRIM naming this profile, with its extensions bound.
    pub fn new_corim<T: Into<crate::corim::CorimIdTypeChoice>>(&self, id: T) -> Result<UnsignedCorim> {
        let mut corim = UnsignedCorim::new(id);
        corim.profile = Some(self.id.clone());
        corim.bind_extensions(&self.extensions)?;
        Ok(corim)
    }

    /// An empty Concise Evidence naming this profile, with its extensions
    /// bound.
    pub fn new_evidence(&self) -> Result<ConciseEvidence> {
        let mut evidence = ConciseEvidence::new();
        evidence.profile = Some(self.id.clone());
        evidence.bind_extensions(&self.extensions)?;
        Ok(evidence)
    }
}

type Registry = HashMap<ProfileTypeChoice, Arc<ProfileManifest>>;

static PROFILES: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Adds `manifest` to the registry. An id may be registered only once.
pub fn register_profile(manifest: ProfileManifest) -> Result<()> {
    manifest.id.valid().map_err(|err| ProfileError::InvalidId {
        id: manifest.id.to_string(),
        reason: err.to_string(),
    })?;

    let mut profiles = PROFILES.write().unwrap_or_else(PoisonError::into_inner);
    if profiles.contains_key(&manifest.id) {
        return Err(ProfileError::Duplicate(manifest.id.to_string()).into());
    }

    log::debug!("registering profile {}", manifest.id);
    profiles.insert(manifest.id.clone(), Arc::new(manifest));
    Ok(())
}

pub fn get_profile_manifest(id: &ProfileTypeChoice) -> Option<Arc<ProfileManifest>> {
    PROFILES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned()
}

/// Like [`get_profile_manifest`], failing for unknown ids.
pub fn lookup(id: &ProfileTypeChoice) -> Result<Arc<ProfileManifest>> {
    get_profile_manifest(id).ok_or_else(|| ProfileError::NotFound(id.to_string()).into())
}

/// Removes `id`, returning whether it was registered.
pub fn unregister_profile(id: &ProfileTypeChoice) -> bool {
    let removed = PROFILES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(id)
        .is_some();

    if removed {
        log::debug!("unregistered profile {id}");
    }
    removed
}
