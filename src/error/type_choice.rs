// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeChoiceError {
    #[error("unknown {choice} type: {name}")]
    UnknownType { choice: &'static str, name: String },
    #[error("unknown tag {tag} for {choice}")]
    UnknownTag { choice: &'static str, tag: u64 },
    #[error("invalid {type_name}: {reason}")]
    InvalidValue { type_name: String, reason: String },
    #[error("{choice} type is: {actual}")]
    WrongType { choice: &'static str, actual: String },
    #[error("unexpected {choice} encoding: {found}")]
    UnexpectedEncoding { choice: &'static str, found: String },
    #[error("{choice} variant {name} already registered")]
    DuplicateVariant { choice: &'static str, name: String },
}

impl TypeChoiceError {
    pub fn unexpected<D: std::fmt::Display>(choice: &'static str, found: D) -> Self {
        Self::UnexpectedEncoding {
            choice,
            found: found.to_string(),
        }
    }
}
