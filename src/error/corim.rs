// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures at the COSE boundary of a signed CoRIM.
#[derive(Debug, Error)]
pub enum CorimError {
    #[error("COSE: {0}")]
    Cose(String),
    #[error("COSE_Sign1 has no payload")]
    MissingPayload,
    #[error("protected header has no alg")]
    MissingAlgorithm,
    #[error("protected header has no corim-meta")]
    MissingMeta,
    #[error("unexpected content type {0:?}")]
    UnexpectedContentType(String),
    #[error("signing failed: {0}")]
    Signer(String),
    #[error("signature verification failed: {0}")]
    Verification(String),
    #[error("not a CoRIM: expected tag 501 or 18")]
    UnknownEnvelope,
}

impl CorimError {
    pub fn cose<D: std::fmt::Display>(message: D) -> Self {
        CorimError::Cose(message.to_string())
    }
}
