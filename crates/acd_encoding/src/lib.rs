// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The canonical binary codec for on-chain objects.
//!
//! Objects encode as a sequence of `(field number, payload)` pairs. Field
//! numbers are unsigned varints and must ascend strictly within an object;
//! the only exception is a repeated field, which repeats its own tag.
//! Zero-valued fields are omitted entirely, so identical values always
//! produce identical bytes: `decode(encode(x)) == x` and re-encoding the
//! result of a decode reproduces the input byte for byte.
//!
//! Payload forms:
//! - `uint`: unsigned varint (LEB128, low 7 bits first)
//! - `bytes` / `string` / `biguint`: varint length followed by raw bytes;
//!   big unsigned integers use minimal-length big-endian bytes
//! - `hash`: exactly 32 raw bytes
//! - `value`: varint length followed by a nested encoding

mod errors;
mod reader;
mod varint;
mod writer;

pub use self::{
    errors::DecoderError,
    reader::Reader,
    varint::{read_uvarint, uvarint_len, write_uvarint},
    writer::Writer,
};

/// A type with a canonical binary encoding.
pub trait Encodable {
    fn append(&self, w: &mut Writer);
}

/// A type decodable from its canonical binary encoding.
pub trait Decodable: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError>;
}

/// Encodes a value to its canonical bytes.
pub fn encode<T: Encodable + ?Sized>(value: &T) -> Vec<u8> {
    let mut w = Writer::new();
    value.append(&mut w);
    w.into_bytes()
}

/// Decodes a value, requiring the buffer to be fully consumed.
pub fn decode<T: Decodable>(data: &[u8]) -> Result<T, DecoderError> {
    let mut r = Reader::new(data);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

#[cfg(test)]
mod tests;
