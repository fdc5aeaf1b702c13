// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoservError {
    #[error("only one selector type is allowed")]
    MultipleSelectors,
    #[error("no selector set")]
    NoSelector,
    #[error("empty {0} selector")]
    EmptySelector(&'static str),
    #[error("invalid artifact type `{0}`")]
    InvalidArtifactType(String),
    #[error("{found} not allowed in {artifact} results")]
    InconsistentResults { artifact: String, found: &'static str },
    #[error("invalid media type: {0}")]
    MediaType(String),
}
