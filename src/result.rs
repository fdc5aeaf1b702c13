// SPDX-License-Identifier: MIT

use crate::error::Error;

/// Crate Result
pub type Result<T> = std::result::Result<T, Error>;
