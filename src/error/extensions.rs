// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("unexpected extension point: {0}")]
    UnexpectedPoint(String),
    #[error("no extensions registered")]
    NotRegistered,
    #[error("extension field not found: {0}")]
    FieldNotFound(String),
    #[error("extension field {0} is not set")]
    FieldNotSet(String),
    #[error("missing mandatory extension field {0}")]
    MissingField(String),
    #[error("incompatible value for extension field {field}: expected {expected}, got {got}")]
    IncompatibleValue {
        field: String,
        expected: String,
        got: String,
    },
    #[error("duplicate field {field} in extension {shape}")]
    DuplicateField { shape: String, field: String },
    #[error("extension {shape} field {field} collides with {host} key {key}")]
    ReservedKey {
        shape: String,
        field: String,
        host: &'static str,
        key: String,
    },
}
