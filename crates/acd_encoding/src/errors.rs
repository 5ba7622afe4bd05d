// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("varint overflows 64 bits")]
    BadVarint,
    #[error("field {got} appears after field {last}; fields must ascend")]
    FieldOutOfOrder { last: u32, got: u32 },
    #[error("missing required field {0}")]
    MissingField(u32),
    #[error("{0} bytes of trailing data after the last field")]
    TrailingBytes(usize),
    #[error("length {0} exceeds the remaining input")]
    BadLength(u64),
    #[error("field is not valid UTF-8")]
    BadUtf8,
    #[error("invalid {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("unknown type code {1} for {0}")]
    UnknownType(&'static str, u64),
}
