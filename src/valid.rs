// SPDX-License-Identifier: MIT

//! Structural validation.
//!
//! Every record implements [`Valid`]. Failures deeper in a document are
//! wrapped with a breadcrumb at each level, so the final message locates the
//! offending value:
//!
//! ```
//! use rats_corim::{error::Error, valid::ResultExt};
//!
//! let res: rats_corim::result::Result<()> = Err(Error::invalid("no measurements"));
//! let err = res.context("invalid reference-value at index 2").unwrap_err();
//! assert_eq!(err.to_string(), "invalid reference-value at index 2: no measurements");
//! ```

use crate::{error::Error, result::Result};

/// Structural and cross-field checks of a record.
pub trait Valid {
    fn valid(&self) -> Result<()>;
}

impl<T: Valid + ?Sized> Valid for Box<T> {
    fn valid(&self) -> Result<()> {
        self.as_ref().valid()
    }
}

/// Breadcrumb helpers for [`Result`].
pub trait ResultExt<T> {
    fn context<D: std::fmt::Display>(self, context: D) -> Result<T>;

    fn with_context<D, F>(self, f: F) -> Result<T>
    where
        D: std::fmt::Display,
        F: FnOnce() -> D;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<D: std::fmt::Display>(self, context: D) -> Result<T> {
        self.map_err(|err| err.context(context))
    }

    fn with_context<D, F>(self, f: F) -> Result<T>
    where
        D: std::fmt::Display,
        F: FnOnce() -> D,
    {
        self.map_err(|err| err.context(f()))
    }
}

/// Validates each element, prefixing failures with `invalid <what> at index N`.
pub fn valid_each<'a, T, I>(items: I, what: &str) -> Result<()>
where
    T: Valid + 'a,
    I: IntoIterator<Item = &'a T>,
{
    for (i, item) in items.into_iter().enumerate() {
        item.valid()
            .with_context(|| format!("invalid {what} at index {i}"))?;
    }

    Ok(())
}

/// Fails with `message` if `items` is empty.
pub fn non_empty<T>(items: &[T], message: &str) -> Result<()> {
    if items.is_empty() {
        return Err(Error::invalid(message));
    }

    Ok(())
}
