// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{varint::write_uvarint, Encodable};
use acd_types::{Hash, TxId, Url};

/// Builds a canonical encoding. Fields must be written in ascending field
/// number order; zero values are skipped so that the encoding of a value
/// is unique.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
    last_field: u32,
}

impl Writer {
    pub fn new() -> Writer { Writer::default() }

    pub fn into_bytes(self) -> Vec<u8> { self.buf }

    fn tag(&mut self, field: u32) {
        debug_assert!(
            field >= self.last_field,
            "field {} written after field {}",
            field,
            self.last_field
        );
        self.last_field = field;
        write_uvarint(&mut self.buf, u64::from(field));
    }

    pub fn write_uint(&mut self, field: u32, v: u64) {
        if v == 0 {
            return;
        }
        self.tag(field);
        write_uvarint(&mut self.buf, v);
    }

    pub fn write_bool(&mut self, field: u32, v: bool) {
        self.write_uint(field, v as u64);
    }

    /// Big unsigned integers encode as minimal-length big-endian bytes.
    pub fn write_biguint(&mut self, field: u32, v: u128) {
        if v == 0 {
            return;
        }
        let be = v.to_be_bytes();
        let skip = be.iter().take_while(|b| **b == 0).count();
        self.tag(field);
        write_uvarint(&mut self.buf, (16 - skip) as u64);
        self.buf.extend_from_slice(&be[skip..]);
    }

    pub fn write_bytes(&mut self, field: u32, v: &[u8]) {
        if v.is_empty() {
            return;
        }
        self.tag(field);
        write_uvarint(&mut self.buf, v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    pub fn write_string(&mut self, field: u32, v: &str) {
        self.write_bytes(field, v.as_bytes());
    }

    pub fn write_hash(&mut self, field: u32, v: &Hash) {
        if v.is_zero() {
            return;
        }
        self.tag(field);
        self.buf.extend_from_slice(v.as_bytes());
    }

    pub fn write_url(&mut self, field: u32, v: &Url) {
        self.write_string(field, &v.to_string());
    }

    pub fn write_txid(&mut self, field: u32, v: &TxId) {
        self.write_string(field, &v.to_string());
    }

    /// Writes a nested object, length-prefixed. An object that encodes to
    /// zero bytes (all fields default) is omitted.
    pub fn write_value<T: Encodable + ?Sized>(&mut self, field: u32, v: &T) {
        let mut nested = Writer::new();
        v.append(&mut nested);
        let bytes = nested.into_bytes();
        if bytes.is_empty() {
            return;
        }
        self.tag(field);
        write_uvarint(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(&bytes);
    }

    /// Writes a repeated field: one tagged value per element, tags
    /// repeating in place.
    pub fn write_values<'a, T, I>(&mut self, field: u32, items: I)
    where
        T: Encodable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for item in items {
            // A repeated field may legitimately contain an all-default
            // element; encode it as an empty value rather than dropping it.
            let mut nested = Writer::new();
            item.append(&mut nested);
            let bytes = nested.into_bytes();
            self.tag(field);
            write_uvarint(&mut self.buf, bytes.len() as u64);
            self.buf.extend_from_slice(&bytes);
        }
    }

    pub fn write_hashes<'a, I>(&mut self, field: u32, items: I)
    where I: IntoIterator<Item = &'a Hash> {
        for item in items {
            self.tag(field);
            self.buf.extend_from_slice(item.as_bytes());
        }
    }

    pub fn write_bytes_list<'a, I>(&mut self, field: u32, items: I)
    where I: IntoIterator<Item = &'a [u8]> {
        for item in items {
            self.tag(field);
            write_uvarint(&mut self.buf, item.len() as u64);
            self.buf.extend_from_slice(item);
        }
    }

    pub fn write_urls<'a, I>(&mut self, field: u32, items: I)
    where I: IntoIterator<Item = &'a Url> {
        for item in items {
            let s = item.to_string();
            self.tag(field);
            write_uvarint(&mut self.buf, s.len() as u64);
            self.buf.extend_from_slice(s.as_bytes());
        }
    }

    pub fn write_txids<'a, I>(&mut self, field: u32, items: I)
    where I: IntoIterator<Item = &'a TxId> {
        for item in items {
            let s = item.to_string();
            self.tag(field);
            write_uvarint(&mut self.buf, s.len() as u64);
            self.buf.extend_from_slice(s.as_bytes());
        }
    }

    /// Emits pre-encoded fields verbatim. Used to round-trip objects whose
    /// type code is newer than this build understands.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_strings<'a, I, S>(&mut self, field: u32, items: I)
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + 'a,
    {
        for item in items {
            let bytes = item.as_ref().as_bytes();
            self.tag(field);
            write_uvarint(&mut self.buf, bytes.len() as u64);
            self.buf.extend_from_slice(bytes);
        }
    }
}
