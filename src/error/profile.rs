// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile with id {0} already registered")]
    Duplicate(String),
    #[error("profile {0} is not registered")]
    NotFound(String),
    #[error("invalid profile id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },
}
