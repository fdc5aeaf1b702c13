// SPDX-License-Identifier: MIT

mod codec;
mod corim;
mod coserv;
mod extensions;
mod profile;
mod type_choice;

pub use codec::*;
pub use corim::*;
pub use coserv::*;
pub use extensions::*;
pub use profile::*;
pub use type_choice::*;

use thiserror::Error;

/// Crate-wide error.
///
/// Structural and cross-field failures are reported as [`Error::Invalid`];
/// every layer of a nested record wraps the failure of its child in
/// [`Error::Context`], so the rendered message reads as a breadcrumb, e.g.
/// `triples validation failed: invalid reference-value at index 0: no measurements`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Invalid(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    TypeChoice(#[from] TypeChoiceError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Corim(#[from] CorimError),
    #[error(transparent)]
    Coserv(#[from] CoservError),
}

impl Error {
    pub fn invalid<D: std::fmt::Display>(message: D) -> Self {
        Self::Invalid(message.to_string())
    }

    /// Wraps `self` with a breadcrumb.
    pub fn context<D: std::fmt::Display>(self, context: D) -> Self {
        Self::Context {
            context: context.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error of a breadcrumb chain.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(CodecError::Json(value))
    }
}
