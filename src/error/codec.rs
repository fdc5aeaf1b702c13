// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cbor: unexpected \"break\" code")]
    UnexpectedBreak,
    #[error("cbor: unexpected EOF")]
    UnexpectedEof,
    #[error("cbor: invalid additional information {info} for type {major}")]
    InvalidAdditionalInfo { major: u8, info: u8 },
    #[error("cbor: {count} bytes of extraneous data starting at index {index}")]
    ExtraneousData { count: usize, index: usize },
    #[error("cbor: exceeded max nested level {0}")]
    NestingLimit(usize),
    #[error("cbor: syntax error at offset {0}")]
    Syntax(usize),
    #[error("cbor: found duplicate map key {0}")]
    DuplicateKey(String),
    #[error("cbor: expected tag {expected}, found {found}")]
    UnexpectedTag { expected: u64, found: String },
    #[error("cbor: {0}")]
    Semantic(String),
    #[error("cbor: {0}")]
    Io(String),
    #[error("cbor encode: {0}")]
    Encode(String),
    #[error("unknown tag {0}")]
    UnknownTag(u64),
    #[error("tag {tag} already registered to {owner}")]
    TagConflict { tag: u64, owner: String },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
