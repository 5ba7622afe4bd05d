// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{errors::DecoderError, varint::read_uvarint, Decodable};
use acd_types::{Hash, TxId, Url};

/// Decodes a canonical encoding. Readers consume fields in ascending
/// order; absent fields yield the type's zero value. After decoding,
/// `finish` rejects any unconsumed bytes, which makes decoding reject
/// non-canonical or unknown-field input.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    last_field: u32,
}

type Result<T> = std::result::Result<T, DecoderError>;

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0, last_field: 0 }
    }

    pub fn is_empty(&self) -> bool { self.pos >= self.data.len() }

    /// The complete input buffer, independent of the cursor. Paired with
    /// `skip_rest` to round-trip objects with unrecognized type codes.
    pub fn input(&self) -> &'a [u8] { self.data }

    pub fn skip_rest(&mut self) { self.pos = self.data.len(); }

    /// Consumes the tag for `field` if it is next in the stream. Rejects
    /// tags that move backwards.
    fn consume_field(&mut self, field: u32) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let (tag, n) = read_uvarint(&self.data[self.pos..])?;
        let tag = u32::try_from(tag)
            .map_err(|_| DecoderError::InvalidValue("field", tag.to_string()))?;
        if tag < self.last_field {
            return Err(DecoderError::FieldOutOfOrder {
                last: self.last_field,
                got: tag,
            });
        }
        if tag != field {
            return Ok(false);
        }
        self.pos += n;
        self.last_field = tag;
        Ok(true)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(DecoderError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_uvarint(&mut self) -> Result<u64> {
        let (v, n) = read_uvarint(&self.data[self.pos..])?;
        self.pos += n;
        Ok(v)
    }

    fn take_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.take_uvarint()?;
        let len = usize::try_from(len).map_err(|_| DecoderError::BadLength(len))?;
        if self.data.len() - self.pos < len {
            return Err(DecoderError::BadLength(len as u64));
        }
        self.take(len)
    }

    pub fn read_uint(&mut self, field: u32) -> Result<u64> {
        if !self.consume_field(field)? {
            return Ok(0);
        }
        self.take_uvarint()
    }

    pub fn read_bool(&mut self, field: u32) -> Result<bool> {
        Ok(self.read_uint(field)? != 0)
    }

    pub fn read_biguint(&mut self, field: u32) -> Result<u128> {
        if !self.consume_field(field)? {
            return Ok(0);
        }
        let bytes = self.take_len_prefixed()?;
        if bytes.len() > 16 || bytes.first() == Some(&0) {
            return Err(DecoderError::InvalidValue(
                "biguint",
                hex_of(bytes),
            ));
        }
        let mut v: u128 = 0;
        for b in bytes {
            v = v << 8 | u128::from(*b);
        }
        Ok(v)
    }

    pub fn read_bytes(&mut self, field: u32) -> Result<Vec<u8>> {
        if !self.consume_field(field)? {
            return Ok(Vec::new());
        }
        Ok(self.take_len_prefixed()?.to_vec())
    }

    pub fn read_string(&mut self, field: u32) -> Result<String> {
        let bytes = self.read_bytes(field)?;
        String::from_utf8(bytes).map_err(|_| DecoderError::BadUtf8)
    }

    pub fn read_hash(&mut self, field: u32) -> Result<Hash> {
        if !self.consume_field(field)? {
            return Ok(Hash::ZERO);
        }
        let bytes = self.take(32)?;
        Ok(Hash::from_slice(bytes).expect("take(32) returned 32 bytes"))
    }

    pub fn read_url(&mut self, field: u32) -> Result<Option<Url>> {
        if !self.consume_field(field)? {
            return Ok(None);
        }
        let bytes = self.take_len_prefixed()?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecoderError::BadUtf8)?;
        Url::parse(s)
            .map(Some)
            .map_err(|e| DecoderError::InvalidValue("url", e.to_string()))
    }

    pub fn read_required_url(&mut self, field: u32) -> Result<Url> {
        self.read_url(field)?.ok_or(DecoderError::MissingField(field))
    }

    pub fn read_txid(&mut self, field: u32) -> Result<Option<TxId>> {
        if !self.consume_field(field)? {
            return Ok(None);
        }
        let bytes = self.take_len_prefixed()?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecoderError::BadUtf8)?;
        TxId::parse(s)
            .map(Some)
            .map_err(|e| DecoderError::InvalidValue("txid", e.to_string()))
    }

    pub fn read_value<T: Decodable>(&mut self, field: u32) -> Result<Option<T>> {
        if !self.consume_field(field)? {
            return Ok(None);
        }
        let bytes = self.take_len_prefixed()?;
        let mut nested = Reader::new(bytes);
        let value = T::decode(&mut nested)?;
        nested.finish()?;
        Ok(Some(value))
    }

    pub fn read_values<T: Decodable>(&mut self, field: u32) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while self.consume_field(field)? {
            let bytes = self.take_len_prefixed()?;
            let mut nested = Reader::new(bytes);
            out.push(T::decode(&mut nested)?);
            nested.finish()?;
        }
        Ok(out)
    }

    pub fn read_hashes(&mut self, field: u32) -> Result<Vec<Hash>> {
        let mut out = Vec::new();
        while self.consume_field(field)? {
            let bytes = self.take(32)?;
            out.push(Hash::from_slice(bytes).expect("32 bytes"));
        }
        Ok(out)
    }

    pub fn read_strings(&mut self, field: u32) -> Result<Vec<String>> {
        let mut out = Vec::new();
        while self.consume_field(field)? {
            let bytes = self.take_len_prefixed()?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| DecoderError::BadUtf8)?;
            out.push(s.to_string());
        }
        Ok(out)
    }

    pub fn read_bytes_list(&mut self, field: u32) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        while self.consume_field(field)? {
            out.push(self.take_len_prefixed()?.to_vec());
        }
        Ok(out)
    }

    pub fn read_urls(&mut self, field: u32) -> Result<Vec<Url>> {
        self.read_strings(field)?
            .iter()
            .map(|s| {
                Url::parse(s).map_err(|e| {
                    DecoderError::InvalidValue("url", e.to_string())
                })
            })
            .collect()
    }

    pub fn read_txids(&mut self, field: u32) -> Result<Vec<TxId>> {
        self.read_strings(field)?
            .iter()
            .map(|s| {
                TxId::parse(s).map_err(|e| {
                    DecoderError::InvalidValue("txid", e.to_string())
                })
            })
            .collect()
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(DecoderError::TrailingBytes(self.data.len() - self.pos));
        }
        Ok(())
    }
}

fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
