// SPDX-License-Identifier: MIT

//! # rats-corim
//!
//! Types and codecs for the RATS endorsement and evidence documents:
//! - CoRIM manifests, unsigned and COSE_Sign1-signed
//! - CoMID tags (Concise Module Identifiers)
//! - CoSWID tags (Concise Software Identifiers)
//! - CoTS (Concise Trust Anchor Stores)
//! - Concise Evidence
//! - CoSERV queries and result sets
//!
//! Every document has a deterministic CBOR form and an equivalent JSON form
//! where type choices are written as `{"type": ..., "value": ...}`. Records
//! can be extended at runtime through profiles, see [`profiles`] and
//! [`extensions`].
//!
//! ```
//! use rats_corim::{
//!     comid::{ComidEntityMap, ComidRole, ConciseMidTag},
//!     core::{Digest, HashAlgorithm},
//!     triples::{ClassIdTypeChoice, ClassMap, EnvironmentMap, MeasurementMap,
//!               MeasurementValuesMap, ValueTriple},
//! };
//!
//! let mut rv = ValueTriple::new();
//! rv.set_environment(EnvironmentMap::from_class(ClassMap::from_id(ClassIdTypeChoice::Int(1))))
//!     .unwrap()
//!     .add_measurement(MeasurementMap::new(
//!         None,
//!         MeasurementValuesMap::with_digests(vec![Digest::new(
//!             HashAlgorithm::Sha256_32,
//!             vec![0xde, 0xad, 0xbe, 0xef],
//!         )]),
//!     ))
//!     .unwrap();
//!
//! let mut comid = ConciseMidTag::new();
//! comid
//!     .set_tag_identity("acme", None)
//!     .unwrap()
//!     .add_entity(ComidEntityMap::new("ACME", vec![ComidRole::TagCreator]))
//!     .unwrap()
//!     .add_reference_value(rv)
//!     .unwrap();
//!
//! let cbor = comid.to_cbor().unwrap();
//! assert_eq!(ConciseMidTag::from_cbor(&cbor).unwrap(), comid);
//! ```

#[macro_use]
mod macros;

/// CBOR and JSON encoding, map keys, tags and time
pub mod codec;

/// Concise Evidence
pub mod coev;

/// CoMID tag types and structures
pub mod comid;

/// Core types and utilities used across the library
pub mod core;

/// CoRIM manifest types and structures
pub mod corim;

/// CoSERV queries and results
pub mod coserv;

/// CoSWID tag types and structures
pub mod coswid;

/// Concise Trust Anchor Stores
pub mod cots;

/// Errors for easily handling problems.
pub mod error;

/// Profile-defined record extensions
pub mod extensions;

/// Fixed Bytes Arrays
pub mod fixed_bytes;

/// Integer and numeric types
pub mod numbers;

/// Registry of EAT profiles
pub mod profiles;

/// Custom CoRIM Results.
pub mod result;

/// Triple types used in CoMID tags and evidence
pub mod triples;

/// Registry-extensible type choices
pub mod type_choice;

/// Structural validation
pub mod valid;

/// Test utilities
#[cfg(test)]
pub(crate) mod test;

pub use error::Error;
pub use result::Result;
pub use valid::Valid;
